use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::models::SanitizedUser;

#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    /// Defaults to the email local part when omitted.
    #[validate(length(min = 3, max = 32, message = "Username must be 3-32 characters"))]
    pub username: Option<String>,

    pub first_name: Option<String>,
    pub last_name: Option<String>,

    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    pub password: String,

    pub confirm_password: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct VerifyQuery {
    pub token: String,
}

#[derive(Debug, Deserialize, Default)]
pub struct LogoutRequest {
    /// Falls back to the refresh-token cookie when absent.
    pub refresh_token: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
pub struct RefreshRequest {
    /// Falls back to the refresh-token cookie when absent.
    pub refresh_token: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct PasswordResetRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct PasswordResetConfirm {
    #[validate(length(min = 1, message = "Token is required"))]
    pub token: String,

    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    pub new_password: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct OAuthCallbackRequest {
    #[validate(length(min = 1, message = "Provider is required"))]
    pub provider: String,

    #[validate(length(min = 1, message = "Provider account id is required"))]
    pub provider_account_id: String,

    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    pub name: Option<String>,
}

/// Session minted by register/login/verify/oauth flows.
///
/// Unverified users receive a TEMP_ACCESS bearer token and no refresh token;
/// verified sessions carry the full pair.
#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub user: SanitizedUser,
    pub access_token: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    pub token_type: String,
    pub expires_in: i64,
    pub requires_verification: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verification_link: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct RefreshResponse {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: i64,
}
