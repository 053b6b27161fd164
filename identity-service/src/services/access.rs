//! Permission resolver: answers authorization questions and mutates the
//! role/permission graph for a user.

use std::collections::HashSet;
use std::sync::Arc;

use uuid::Uuid;

use crate::models::{Permission, Role};
use crate::services::ServiceError;
use crate::store::AuthStore;

#[derive(Clone)]
pub struct UserAccessService {
    store: Arc<dyn AuthStore>,
}

impl UserAccessService {
    pub fn new(store: Arc<dyn AuthStore>) -> Self {
        Self { store }
    }

    pub async fn user_has_role(
        &self,
        user_id: Uuid,
        role_name: &str,
    ) -> Result<bool, ServiceError> {
        Ok(self.store.user_has_role(user_id, role_name).await?)
    }

    /// Direct grant OR role-inherited grant; answered as an existence query
    /// rather than by loading the full permission set.
    pub async fn user_has_permission(
        &self,
        user_id: Uuid,
        permission_name: &str,
    ) -> Result<bool, ServiceError> {
        Ok(self
            .store
            .user_has_permission(user_id, permission_name)
            .await?)
    }

    /// Union of direct and role-inherited permission names. A permission
    /// granted through both paths appears once. Unordered.
    pub async fn effective_permissions(
        &self,
        user_id: Uuid,
    ) -> Result<HashSet<String>, ServiceError> {
        Ok(self.store.effective_permission_names(user_id).await?)
    }

    pub async fn user_roles(&self, user_id: Uuid) -> Result<Vec<Role>, ServiceError> {
        Ok(self.store.list_user_roles(user_id).await?)
    }

    /// Direct grants only.
    pub async fn user_permissions(&self, user_id: Uuid) -> Result<Vec<Permission>, ServiceError> {
        Ok(self.store.list_user_permissions(user_id).await?)
    }

    /// Replace the user's entire role set as one all-or-nothing operation.
    pub async fn sync_user_roles(
        &self,
        user_id: Uuid,
        role_ids: &[Uuid],
    ) -> Result<(), ServiceError> {
        self.store.sync_user_roles(user_id, role_ids).await?;
        tracing::info!(user_id = %user_id, roles = role_ids.len(), "user roles synced");
        Ok(())
    }

    /// Replace the user's entire direct-permission set atomically.
    pub async fn sync_user_permissions(
        &self,
        user_id: Uuid,
        permission_ids: &[Uuid],
    ) -> Result<(), ServiceError> {
        self.store
            .sync_user_permissions(user_id, permission_ids)
            .await?;
        tracing::info!(user_id = %user_id, permissions = permission_ids.len(), "user permissions synced");
        Ok(())
    }

    /// Validates both endpoints; `Conflict` when the pair already exists.
    pub async fn add_role_to_user(&self, user_id: Uuid, role_id: Uuid) -> Result<(), ServiceError> {
        self.store.add_user_role(user_id, role_id).await?;
        tracing::info!(user_id = %user_id, role_id = %role_id, "role assigned to user");
        Ok(())
    }

    /// `NotFound` when the pair does not exist.
    pub async fn remove_role_from_user(
        &self,
        user_id: Uuid,
        role_id: Uuid,
    ) -> Result<(), ServiceError> {
        self.store.remove_user_role(user_id, role_id).await?;
        tracing::info!(user_id = %user_id, role_id = %role_id, "role removed from user");
        Ok(())
    }

    pub async fn give_permission_to_user(
        &self,
        user_id: Uuid,
        permission_id: Uuid,
    ) -> Result<(), ServiceError> {
        self.store.add_user_permission(user_id, permission_id).await?;
        tracing::info!(user_id = %user_id, permission_id = %permission_id, "permission granted to user");
        Ok(())
    }

    pub async fn revoke_permission_from_user(
        &self,
        user_id: Uuid,
        permission_id: Uuid,
    ) -> Result<(), ServiceError> {
        self.store
            .remove_user_permission(user_id, permission_id)
            .await?;
        tracing::info!(user_id = %user_id, permission_id = %permission_id, "permission revoked from user");
        Ok(())
    }
}
