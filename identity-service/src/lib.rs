pub mod config;
pub mod dtos;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;
pub mod store;
pub mod utils;

use std::sync::Arc;

use axum::{
    http::{header, HeaderValue, Method},
    middleware::from_fn_with_state,
    routing::{delete, get, post, put},
    Json, Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::config::AuthConfig;
use crate::middleware::{
    auth_middleware, authorize_middleware, token_kind_middleware, AuthzLayer, AuthzRequirements,
    RequiredKind,
};
use crate::models::TokenKind;
use crate::services::{
    AuthService, Mailer, OAuthService, PermissionService, RoleService, TokenService,
    UserAccessService,
};
use crate::store::AuthStore;
use service_core::error::AppError;

/// Role that may manage the role/permission graph.
pub const ADMIN_ROLE: &str = "admin";

#[derive(Clone)]
pub struct AppState {
    pub config: AuthConfig,
    pub store: Arc<dyn AuthStore>,
    pub tokens: TokenService,
    pub access: UserAccessService,
    pub roles: RoleService,
    pub permissions: PermissionService,
    pub auth: AuthService,
    pub oauth: OAuthService,
    pub mailer: Arc<dyn Mailer>,
}

impl AppState {
    /// Wire every service around one store + mailer.
    pub fn new(config: AuthConfig, store: Arc<dyn AuthStore>, mailer: Arc<dyn Mailer>) -> Self {
        let codec = services::TokenCodec::new(config.tokens.clone());
        let tokens = TokenService::new(codec, store.clone());
        let access = UserAccessService::new(store.clone());
        let roles = RoleService::new(store.clone());
        let permissions = PermissionService::new(store.clone());
        let auth = AuthService::new(
            store.clone(),
            tokens.clone(),
            mailer.clone(),
            config.base_url.clone(),
        );
        let oauth = OAuthService::new(store.clone(), tokens.clone());

        Self {
            config,
            store,
            tokens,
            access,
            roles,
            permissions,
            auth,
            oauth,
            mailer,
        }
    }
}

pub fn build_router(state: AppState) -> Router {
    // Admin surface for the role/permission graph.
    let admin_guard = AuthzLayer::new(state.clone(), AuthzRequirements::any_role(&[ADMIN_ROLE]));
    let rbac_routes = Router::new()
        .route(
            "/rbac/roles",
            post(handlers::rbac::create_role).get(handlers::rbac::list_roles),
        )
        .route(
            "/rbac/roles/:role_id",
            get(handlers::rbac::get_role)
                .patch(handlers::rbac::update_role)
                .delete(handlers::rbac::delete_role),
        )
        .route(
            "/rbac/roles/:role_id/permissions",
            put(handlers::rbac::sync_role_permissions).get(handlers::rbac::list_role_permissions),
        )
        .route(
            "/rbac/permissions",
            post(handlers::rbac::create_permission).get(handlers::rbac::list_permissions),
        )
        .route(
            "/rbac/permissions/:permission_id",
            delete(handlers::rbac::delete_permission),
        )
        .route(
            "/rbac/users/:user_id/roles",
            get(handlers::rbac::list_user_roles)
                .put(handlers::rbac::sync_user_roles)
                .post(handlers::rbac::add_user_role),
        )
        .route(
            "/rbac/users/:user_id/roles/:role_id",
            delete(handlers::rbac::remove_user_role),
        )
        .route(
            "/rbac/users/:user_id/permissions",
            get(handlers::rbac::list_user_permissions)
                .put(handlers::rbac::sync_user_permissions)
                .post(handlers::rbac::grant_user_permission),
        )
        .route(
            "/rbac/users/:user_id/permissions/:permission_id",
            delete(handlers::rbac::revoke_user_permission),
        )
        .route(
            "/rbac/users/:user_id/permissions/effective",
            get(handlers::rbac::effective_permissions),
        )
        // Order matters: authentication runs first, then the role gate.
        .layer(from_fn_with_state(admin_guard, authorize_middleware))
        .layer(from_fn_with_state(state.clone(), auth_middleware));

    // Resend is reachable with the TEMP_ACCESS token from registration.
    let temp_access_gate = RequiredKind {
        state: state.clone(),
        kind: TokenKind::TempAccess,
    };
    let resend_route = Router::new()
        .route(
            "/auth/verify/resend",
            post(handlers::auth::resend_verification),
        )
        .layer(from_fn_with_state(temp_access_gate, token_kind_middleware));

    let authenticated_routes = Router::new()
        .route("/auth/logout", post(handlers::auth::logout))
        .route("/users/me", get(handlers::auth::me))
        .layer(from_fn_with_state(state.clone(), auth_middleware));

    let allowed_origins: Vec<HeaderValue> = state
        .config
        .security
        .allowed_origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::error!(origin = %origin, error = %e, "invalid CORS origin, skipping");
                None
            }
        })
        .collect();

    Router::new()
        .route("/health", get(health_check))
        .route("/auth/register", post(handlers::auth::register))
        .route("/auth/login", post(handlers::auth::login))
        .route("/auth/verify", get(handlers::auth::verify_email))
        .route("/auth/refresh", post(handlers::auth::refresh))
        .route(
            "/auth/password-reset/request",
            post(handlers::auth::request_password_reset),
        )
        .route(
            "/auth/password-reset/confirm",
            post(handlers::auth::confirm_password_reset),
        )
        .route("/auth/oauth/callback", post(handlers::auth::oauth_callback))
        .merge(resend_route)
        .merge(authenticated_routes)
        .merge(rbac_routes)
        .with_state(state)
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &axum::http::Request<_>| {
                tracing::info_span!(
                    "http_request",
                    method = %request.method(),
                    uri = %request.uri(),
                )
            }),
        )
        .layer(
            CorsLayer::new()
                .allow_origin(allowed_origins)
                .allow_methods([
                    Method::GET,
                    Method::POST,
                    Method::PUT,
                    Method::PATCH,
                    Method::DELETE,
                    Method::OPTIONS,
                ])
                .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]),
        )
}

/// Service health check
pub async fn health_check(
    axum::extract::State(state): axum::extract::State<AppState>,
) -> Result<Json<serde_json::Value>, AppError> {
    Ok(Json(serde_json::json!({
        "status": "healthy",
        "service": state.config.service_name,
        "version": state.config.service_version,
        "environment": format!("{:?}", state.config.environment),
    })))
}
