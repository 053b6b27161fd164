use service_core::error::AppError;
use thiserror::Error;

use crate::store::StoreError;

/// Domain error taxonomy.
///
/// Every lower-level failure is re-wrapped into one of these kinds before
/// leaving a service; the HTTP boundary maps them onto status codes via
/// `AppError`.
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("malformed token payload")]
    TokenMalformed,

    #[error("invalid token")]
    TokenInvalid,

    #[error("token expired")]
    TokenExpired,

    #[error("not authenticated")]
    Unauthenticated,

    #[error("invalid email or password")]
    InvalidCredentials,

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Validation(String),

    #[error("email delivery failed: {0}")]
    Email(String),

    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl From<StoreError> for ServiceError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict(msg) => ServiceError::Conflict(msg),
            StoreError::NotFound(msg) => ServiceError::NotFound(msg),
            StoreError::Internal(msg) => ServiceError::Internal(anyhow::anyhow!(msg)),
        }
    }
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Configuration(msg) => AppError::ConfigError(anyhow::anyhow!(msg)),
            ServiceError::TokenMalformed => {
                AppError::BadRequest(anyhow::anyhow!("malformed token payload"))
            }
            ServiceError::TokenInvalid => AppError::Unauthorized(anyhow::anyhow!("invalid token")),
            ServiceError::TokenExpired => AppError::Unauthorized(anyhow::anyhow!("token expired")),
            ServiceError::Unauthenticated => {
                AppError::Unauthorized(anyhow::anyhow!("not authenticated"))
            }
            ServiceError::InvalidCredentials => {
                AppError::Unauthorized(anyhow::anyhow!("invalid email or password"))
            }
            ServiceError::Forbidden(msg) => AppError::Forbidden(anyhow::anyhow!(msg)),
            ServiceError::Conflict(msg) => AppError::Conflict(anyhow::anyhow!(msg)),
            ServiceError::NotFound(msg) => AppError::NotFound(anyhow::anyhow!(msg)),
            ServiceError::Validation(msg) => AppError::BadRequest(anyhow::anyhow!(msg)),
            ServiceError::Email(msg) => AppError::EmailError(msg),
            ServiceError::Internal(err) => AppError::InternalError(err),
        }
    }
}
