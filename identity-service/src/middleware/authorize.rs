//! Role/permission gates composed on top of authentication.

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use service_core::error::AppError;

use crate::middleware::auth::AuthUser;
use crate::AppState;

/// Declarative authorization requirements for a route group.
///
/// With `require_all` unset, satisfying any one listed role/permission is
/// enough; with it set, every item is checked independently and the first
/// unmet one fails the request, named in the error.
#[derive(Debug, Clone, Default)]
pub struct AuthzRequirements {
    pub roles: Vec<String>,
    pub permissions: Vec<String>,
    pub require_all: bool,
}

impl AuthzRequirements {
    pub fn any_role(roles: &[&str]) -> Self {
        Self {
            roles: roles.iter().map(|r| r.to_string()).collect(),
            ..Default::default()
        }
    }

    pub fn any_permission(permissions: &[&str]) -> Self {
        Self {
            permissions: permissions.iter().map(|p| p.to_string()).collect(),
            ..Default::default()
        }
    }

    pub fn all_of(roles: &[&str], permissions: &[&str]) -> Self {
        Self {
            roles: roles.iter().map(|r| r.to_string()).collect(),
            permissions: permissions.iter().map(|p| p.to_string()).collect(),
            require_all: true,
        }
    }
}

/// State for [`authorize_middleware`].
#[derive(Clone)]
pub struct AuthzLayer {
    pub state: AppState,
    pub requirements: Arc<AuthzRequirements>,
}

impl AuthzLayer {
    pub fn new(state: AppState, requirements: AuthzRequirements) -> Self {
        Self {
            state,
            requirements: Arc::new(requirements),
        }
    }
}

/// Runs after `auth_middleware`: authentication presence, then role checks,
/// then permission checks.
pub async fn authorize_middleware(
    State(layer): State<AuthzLayer>,
    req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let user = req
        .extensions()
        .get::<AuthUser>()
        .cloned()
        .ok_or_else(|| AppError::Unauthorized(anyhow::anyhow!("not authenticated")))?;

    let access = &layer.state.access;
    let requirements = layer.requirements.as_ref();

    if !requirements.roles.is_empty() {
        if requirements.require_all {
            for role in &requirements.roles {
                if !access
                    .user_has_role(user.user_id, role)
                    .await
                    .map_err(AppError::from)?
                {
                    return Err(AppError::Forbidden(anyhow::anyhow!(format!(
                        "requires role '{}'",
                        role
                    ))));
                }
            }
        } else {
            let mut satisfied = false;
            for role in &requirements.roles {
                if access
                    .user_has_role(user.user_id, role)
                    .await
                    .map_err(AppError::from)?
                {
                    satisfied = true;
                    break;
                }
            }
            if !satisfied {
                return Err(AppError::Forbidden(anyhow::anyhow!(format!(
                    "requires one of these roles: {}",
                    requirements.roles.join(", ")
                ))));
            }
        }
    }

    if !requirements.permissions.is_empty() {
        if requirements.require_all {
            for permission in &requirements.permissions {
                if !access
                    .user_has_permission(user.user_id, permission)
                    .await
                    .map_err(AppError::from)?
                {
                    return Err(AppError::Forbidden(anyhow::anyhow!(format!(
                        "requires permission '{}'",
                        permission
                    ))));
                }
            }
        } else {
            let mut satisfied = false;
            for permission in &requirements.permissions {
                if access
                    .user_has_permission(user.user_id, permission)
                    .await
                    .map_err(AppError::from)?
                {
                    satisfied = true;
                    break;
                }
            }
            if !satisfied {
                return Err(AppError::Forbidden(anyhow::anyhow!(format!(
                    "requires one of these permissions: {}",
                    requirements.permissions.join(", ")
                ))));
            }
        }
    }

    Ok(next.run(req).await)
}
