//! Admin endpoints for the role/permission graph.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use service_core::error::AppError;
use uuid::Uuid;

use crate::dtos::rbac::{
    AssignRoleRequest, CreatePermissionRequest, CreateRoleRequest, EffectivePermissionsResponse,
    GrantPermissionRequest, PermissionResponse, RoleResponse, RoleWithPermissions,
    SyncPermissionsRequest, SyncRolesRequest, UpdateRoleRequest,
};
use crate::dtos::MessageResponse;
use crate::utils::ValidatedJson;
use crate::AppState;

// ==================== Roles ====================

pub async fn create_role(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<CreateRoleRequest>,
) -> Result<impl IntoResponse, AppError> {
    let role = state.roles.create_role(req.name, req.guard_name).await?;
    Ok((StatusCode::CREATED, Json(RoleResponse::from(role))))
}

pub async fn list_roles(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let roles = state.roles.list_roles().await?;
    Ok(Json(
        roles
            .into_iter()
            .map(RoleResponse::from)
            .collect::<Vec<_>>(),
    ))
}

pub async fn get_role(
    State(state): State<AppState>,
    Path(role_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let role = state.roles.get_role(role_id).await?;
    let permissions = state.roles.role_permissions(role_id).await?;
    Ok(Json(RoleWithPermissions {
        role: role.into(),
        permissions: permissions.into_iter().map(Into::into).collect(),
    }))
}

pub async fn update_role(
    State(state): State<AppState>,
    Path(role_id): Path<Uuid>,
    ValidatedJson(req): ValidatedJson<UpdateRoleRequest>,
) -> Result<impl IntoResponse, AppError> {
    let role = state
        .roles
        .update_role(role_id, req.name, req.guard_name)
        .await?;
    Ok(Json(RoleResponse::from(role)))
}

pub async fn delete_role(
    State(state): State<AppState>,
    Path(role_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    state.roles.delete_role(role_id).await?;
    Ok(Json(MessageResponse {
        message: "Role deleted".to_string(),
    }))
}

pub async fn list_role_permissions(
    State(state): State<AppState>,
    Path(role_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let permissions = state.roles.role_permissions(role_id).await?;
    Ok(Json(
        permissions
            .into_iter()
            .map(PermissionResponse::from)
            .collect::<Vec<_>>(),
    ))
}

pub async fn sync_role_permissions(
    State(state): State<AppState>,
    Path(role_id): Path<Uuid>,
    Json(req): Json<SyncPermissionsRequest>,
) -> Result<impl IntoResponse, AppError> {
    state
        .roles
        .sync_role_permissions(role_id, &req.permission_ids)
        .await?;
    Ok(Json(MessageResponse {
        message: "Role permissions synced".to_string(),
    }))
}

// ==================== Permissions ====================

pub async fn create_permission(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<CreatePermissionRequest>,
) -> Result<impl IntoResponse, AppError> {
    let permission = state
        .permissions
        .create_permission(req.name, req.guard_name)
        .await?;
    Ok((StatusCode::CREATED, Json(PermissionResponse::from(permission))))
}

pub async fn list_permissions(
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    let permissions = state.permissions.list_permissions().await?;
    Ok(Json(
        permissions
            .into_iter()
            .map(PermissionResponse::from)
            .collect::<Vec<_>>(),
    ))
}

pub async fn delete_permission(
    State(state): State<AppState>,
    Path(permission_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    state.permissions.delete_permission(permission_id).await?;
    Ok(Json(MessageResponse {
        message: "Permission deleted".to_string(),
    }))
}

// ==================== User access ====================

pub async fn list_user_roles(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let roles = state.access.user_roles(user_id).await?;
    Ok(Json(
        roles
            .into_iter()
            .map(RoleResponse::from)
            .collect::<Vec<_>>(),
    ))
}

pub async fn sync_user_roles(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
    Json(req): Json<SyncRolesRequest>,
) -> Result<impl IntoResponse, AppError> {
    state.access.sync_user_roles(user_id, &req.role_ids).await?;
    Ok(Json(MessageResponse {
        message: "User roles synced".to_string(),
    }))
}

pub async fn add_user_role(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
    Json(req): Json<AssignRoleRequest>,
) -> Result<impl IntoResponse, AppError> {
    state.access.add_role_to_user(user_id, req.role_id).await?;
    Ok((
        StatusCode::CREATED,
        Json(MessageResponse {
            message: "Role assigned".to_string(),
        }),
    ))
}

pub async fn remove_user_role(
    State(state): State<AppState>,
    Path((user_id, role_id)): Path<(Uuid, Uuid)>,
) -> Result<impl IntoResponse, AppError> {
    state.access.remove_role_from_user(user_id, role_id).await?;
    Ok(Json(MessageResponse {
        message: "Role removed".to_string(),
    }))
}

pub async fn list_user_permissions(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let permissions = state.access.user_permissions(user_id).await?;
    Ok(Json(
        permissions
            .into_iter()
            .map(PermissionResponse::from)
            .collect::<Vec<_>>(),
    ))
}

pub async fn sync_user_permissions(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
    Json(req): Json<SyncPermissionsRequest>,
) -> Result<impl IntoResponse, AppError> {
    state
        .access
        .sync_user_permissions(user_id, &req.permission_ids)
        .await?;
    Ok(Json(MessageResponse {
        message: "User permissions synced".to_string(),
    }))
}

pub async fn grant_user_permission(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
    Json(req): Json<GrantPermissionRequest>,
) -> Result<impl IntoResponse, AppError> {
    state
        .access
        .give_permission_to_user(user_id, req.permission_id)
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(MessageResponse {
            message: "Permission granted".to_string(),
        }),
    ))
}

pub async fn revoke_user_permission(
    State(state): State<AppState>,
    Path((user_id, permission_id)): Path<(Uuid, Uuid)>,
) -> Result<impl IntoResponse, AppError> {
    state
        .access
        .revoke_permission_from_user(user_id, permission_id)
        .await?;
    Ok(Json(MessageResponse {
        message: "Permission revoked".to_string(),
    }))
}

pub async fn effective_permissions(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let mut permissions: Vec<String> = state
        .access
        .effective_permissions(user_id)
        .await?
        .into_iter()
        .collect();
    permissions.sort();
    Ok(Json(EffectivePermissionsResponse { permissions }))
}
