use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use axum_extra::extract::cookie::CookieJar;
use service_core::error::AppError;

use crate::config::Environment;
use crate::dtos::auth::{
    LoginRequest, LogoutRequest, OAuthCallbackRequest, PasswordResetConfirm, PasswordResetRequest,
    RefreshRequest, RefreshResponse, RegisterRequest, SessionResponse, VerifyQuery,
};
use crate::dtos::MessageResponse;
use crate::middleware::AuthUser;
use crate::models::TokenKind;
use crate::services::OAuthProfile;
use crate::utils::cookie::{
    auth_cookie, removal_cookie, ACCESS_TOKEN_COOKIE, REFRESH_TOKEN_COOKIE,
};
use crate::utils::ValidatedJson;
use crate::AppState;

/// Set the auth cookies for a full session; temp-access sessions (no
/// refresh token) set nothing.
fn session_cookies(
    state: &AppState,
    jar: CookieJar,
    session: &SessionResponse,
) -> Result<CookieJar, AppError> {
    let Some(refresh_token) = &session.refresh_token else {
        return Ok(jar);
    };
    let secure = state.config.environment == Environment::Prod;
    let access_ttl = state
        .tokens
        .codec()
        .lifetime(TokenKind::Access)
        .map_err(AppError::from)?;
    let refresh_ttl = state
        .tokens
        .codec()
        .lifetime(TokenKind::Refresh)
        .map_err(AppError::from)?;

    Ok(jar
        .add(auth_cookie(
            ACCESS_TOKEN_COOKIE,
            session.access_token.clone(),
            access_ttl,
            secure,
        ))
        .add(auth_cookie(
            REFRESH_TOKEN_COOKIE,
            refresh_token.clone(),
            refresh_ttl,
            secure,
        )))
}

/// Register a new user
pub async fn register(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<RegisterRequest>,
) -> Result<impl IntoResponse, AppError> {
    let res = state.auth.register(req).await?;
    Ok((StatusCode::CREATED, Json(res)))
}

/// Login with email and password
pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    ValidatedJson(req): ValidatedJson<LoginRequest>,
) -> Result<impl IntoResponse, AppError> {
    let res = state.auth.login(req).await?;
    let jar = session_cookies(&state, jar, &res)?;
    Ok((StatusCode::OK, jar, Json(res)))
}

/// Consume an emailed verification token
pub async fn verify_email(
    State(state): State<AppState>,
    jar: CookieJar,
    Query(req): Query<VerifyQuery>,
) -> Result<impl IntoResponse, AppError> {
    let res = state.auth.verify_email(&req.token).await?;
    let jar = session_cookies(&state, jar, &res)?;
    Ok((StatusCode::OK, jar, Json(res)))
}

/// Re-send the verification link; gated by the TEMP_ACCESS token issued at
/// registration.
pub async fn resend_verification(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<impl IntoResponse, AppError> {
    let res = state.auth.resend_verification(user.user_id).await?;
    Ok((StatusCode::OK, Json(res)))
}

/// Logout: delete the stored refresh token and clear both cookies
pub async fn logout(
    State(state): State<AppState>,
    jar: CookieJar,
    req: Option<Json<LogoutRequest>>,
) -> Result<impl IntoResponse, AppError> {
    let refresh_token = jar
        .get(REFRESH_TOKEN_COOKIE)
        .map(|c| c.value().to_string())
        .or_else(|| req.and_then(|Json(r)| r.refresh_token));

    state.auth.logout(refresh_token.as_deref()).await?;

    let secure = state.config.environment == Environment::Prod;
    let jar = jar
        .add(removal_cookie(ACCESS_TOKEN_COOKIE, secure))
        .add(removal_cookie(REFRESH_TOKEN_COOKIE, secure));

    Ok((
        StatusCode::OK,
        jar,
        Json(MessageResponse {
            message: "Logged out successfully".to_string(),
        }),
    ))
}

/// Exchange the refresh token for a new access token
pub async fn refresh(
    State(state): State<AppState>,
    jar: CookieJar,
    req: Option<Json<RefreshRequest>>,
) -> Result<impl IntoResponse, AppError> {
    let refresh_token = jar
        .get(REFRESH_TOKEN_COOKIE)
        .map(|c| c.value().to_string())
        .or_else(|| req.and_then(|Json(r)| r.refresh_token))
        .ok_or_else(|| AppError::Unauthorized(anyhow::anyhow!("no refresh token provided")))?;

    let (access_token, expires_in) = state.auth.refresh(&refresh_token).await?;

    let secure = state.config.environment == Environment::Prod;
    let access_ttl = state
        .tokens
        .codec()
        .lifetime(TokenKind::Access)
        .map_err(AppError::from)?;
    let jar = jar.add(auth_cookie(
        ACCESS_TOKEN_COOKIE,
        access_token.clone(),
        access_ttl,
        secure,
    ));

    Ok((
        StatusCode::OK,
        jar,
        Json(RefreshResponse {
            access_token,
            token_type: "Bearer".to_string(),
            expires_in,
        }),
    ))
}

/// Request a password reset link
pub async fn request_password_reset(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<PasswordResetRequest>,
) -> Result<impl IntoResponse, AppError> {
    state.auth.request_password_reset(&req.email).await?;
    Ok((
        StatusCode::OK,
        Json(MessageResponse {
            message: "If that email exists, a reset link has been sent".to_string(),
        }),
    ))
}

/// Consume a password reset token
pub async fn confirm_password_reset(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<PasswordResetConfirm>,
) -> Result<impl IntoResponse, AppError> {
    state.auth.confirm_password_reset(req).await?;
    Ok((
        StatusCode::OK,
        Json(MessageResponse {
            message: "Password reset successfully".to_string(),
        }),
    ))
}

/// Complete an OAuth login with an exchanged provider profile
pub async fn oauth_callback(
    State(state): State<AppState>,
    jar: CookieJar,
    ValidatedJson(req): ValidatedJson<OAuthCallbackRequest>,
) -> Result<impl IntoResponse, AppError> {
    let (user, pair) = state
        .oauth
        .oauth_login(OAuthProfile {
            provider: req.provider,
            provider_account_id: req.provider_account_id,
            email: req.email,
            name: req.name,
        })
        .await?;

    let expires_in = state
        .tokens
        .codec()
        .lifetime(TokenKind::Access)
        .map_err(AppError::from)?
        .num_seconds();
    let res = SessionResponse {
        user,
        access_token: pair.access_token,
        refresh_token: Some(pair.refresh_token),
        token_type: "Bearer".to_string(),
        expires_in,
        requires_verification: false,
        verification_link: None,
    };
    let jar = session_cookies(&state, jar, &res)?;
    Ok((StatusCode::OK, jar, Json(res)))
}

/// Current user profile
pub async fn me(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<impl IntoResponse, AppError> {
    let user = state
        .store
        .find_user_by_id(user.user_id)
        .await
        .map_err(|e| AppError::InternalError(anyhow::anyhow!(e)))?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("user not found")))?;

    Ok(Json(crate::models::SanitizedUser::from(user)))
}
