use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts, HeaderMap},
    middleware::Next,
    response::Response,
};
use axum_extra::extract::cookie::CookieJar;
use service_core::error::AppError;
use uuid::Uuid;

use crate::models::TokenKind;
use crate::services::TokenClaims;
use crate::utils::cookie::ACCESS_TOKEN_COOKIE;
use crate::AppState;

/// Authenticated identity, stored in request extensions by the auth
/// middlewares and read back through the extractor.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: Uuid,
    pub claims: TokenClaims,
}

/// Bearer token from the named cookie, falling back to the Authorization
/// header. The cookie wins when both are present.
pub fn extract_bearer_token(headers: &HeaderMap, cookie_name: &str) -> Option<String> {
    let jar = CookieJar::from_headers(headers);
    if let Some(cookie) = jar.get(cookie_name) {
        return Some(cookie.value().to_string());
    }

    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(|token| token.to_string())
}

/// Middleware requiring a valid stateless ACCESS token.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = extract_bearer_token(req.headers(), ACCESS_TOKEN_COOKIE)
        .ok_or_else(|| AppError::Unauthorized(anyhow::anyhow!("no access token provided")))?;

    let claims = state
        .tokens
        .verify_stateless(TokenKind::Access, &token)
        .map_err(AppError::from)?;
    let user_id = claims.subject().map_err(AppError::from)?;

    req.extensions_mut().insert(AuthUser { user_id, claims });

    Ok(next.run(req).await)
}

#[axum::async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts.extensions.get::<AuthUser>().cloned().ok_or_else(|| {
            AppError::InternalError(anyhow::anyhow!(
                "auth claims missing from request extensions"
            ))
        })
    }
}
