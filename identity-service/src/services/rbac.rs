//! Role and permission management.

use std::sync::Arc;

use uuid::Uuid;

use crate::models::{Permission, Role};
use crate::services::ServiceError;
use crate::store::AuthStore;

#[derive(Clone)]
pub struct RoleService {
    store: Arc<dyn AuthStore>,
}

impl RoleService {
    pub fn new(store: Arc<dyn AuthStore>) -> Self {
        Self { store }
    }

    pub async fn create_role(
        &self,
        name: String,
        guard_name: Option<String>,
    ) -> Result<Role, ServiceError> {
        let role = Role::new(name, guard_name);
        self.store.insert_role(&role).await?;
        tracing::info!(role_id = %role.id, name = %role.name, "role created");
        Ok(role)
    }

    pub async fn get_role(&self, role_id: Uuid) -> Result<Role, ServiceError> {
        self.store
            .find_role_by_id(role_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound("role not found".to_string()))
    }

    pub async fn list_roles(&self) -> Result<Vec<Role>, ServiceError> {
        Ok(self.store.list_roles().await?)
    }

    pub async fn update_role(
        &self,
        role_id: Uuid,
        name: Option<String>,
        guard_name: Option<String>,
    ) -> Result<Role, ServiceError> {
        Ok(self
            .store
            .update_role(role_id, name.as_deref(), guard_name.as_deref())
            .await?)
    }

    pub async fn delete_role(&self, role_id: Uuid) -> Result<(), ServiceError> {
        self.store.delete_role(role_id).await?;
        tracing::info!(role_id = %role_id, "role deleted");
        Ok(())
    }

    pub async fn role_permissions(&self, role_id: Uuid) -> Result<Vec<Permission>, ServiceError> {
        Ok(self.store.list_role_permissions(role_id).await?)
    }

    /// Replace the role's entire permission set atomically; the change
    /// cascades to the effective permissions of every user holding the role.
    pub async fn sync_role_permissions(
        &self,
        role_id: Uuid,
        permission_ids: &[Uuid],
    ) -> Result<(), ServiceError> {
        self.store
            .sync_role_permissions(role_id, permission_ids)
            .await?;
        tracing::info!(role_id = %role_id, permissions = permission_ids.len(), "role permissions synced");
        Ok(())
    }
}

#[derive(Clone)]
pub struct PermissionService {
    store: Arc<dyn AuthStore>,
}

impl PermissionService {
    pub fn new(store: Arc<dyn AuthStore>) -> Self {
        Self { store }
    }

    pub async fn create_permission(
        &self,
        name: String,
        guard_name: Option<String>,
    ) -> Result<Permission, ServiceError> {
        let permission = Permission::new(name, guard_name);
        self.store.insert_permission(&permission).await?;
        tracing::info!(permission_id = %permission.id, name = %permission.name, "permission created");
        Ok(permission)
    }

    pub async fn list_permissions(&self) -> Result<Vec<Permission>, ServiceError> {
        Ok(self.store.list_permissions().await?)
    }

    pub async fn delete_permission(&self, permission_id: Uuid) -> Result<(), ServiceError> {
        self.store.delete_permission(permission_id).await?;
        tracing::info!(permission_id = %permission_id, "permission deleted");
        Ok(())
    }
}
