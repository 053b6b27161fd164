use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use service_core::error::AppError;

use crate::middleware::auth::{extract_bearer_token, AuthUser};
use crate::models::TokenKind;
use crate::utils::cookie::ACCESS_TOKEN_COOKIE;
use crate::AppState;

/// State for [`token_kind_middleware`]: which stateless kind a route accepts.
#[derive(Clone)]
pub struct RequiredKind {
    pub state: AppState,
    pub kind: TokenKind,
}

/// Gate for routes that accept a specific stateless token kind (e.g. the
/// TEMP_ACCESS token handed out at registration). Verification runs against
/// the required kind's own secret, so an ACCESS token presented to a
/// TEMP_ACCESS route fails the signature check outright.
pub async fn token_kind_middleware(
    State(required): State<RequiredKind>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = extract_bearer_token(req.headers(), ACCESS_TOKEN_COOKIE)
        .ok_or_else(|| AppError::Unauthorized(anyhow::anyhow!("no token provided")))?;

    let claims = required
        .state
        .tokens
        .verify_stateless(required.kind, &token)
        .map_err(|_| {
            AppError::Forbidden(anyhow::anyhow!(format!(
                "requires a {} token",
                required.kind
            )))
        })?;
    let user_id = claims.subject().map_err(AppError::from)?;

    req.extensions_mut().insert(AuthUser { user_id, claims });

    Ok(next.run(req).await)
}
