//! Storage collaborator interface.
//!
//! The datastore itself is external; services talk to it through these
//! traits and receive their store as a constructor argument, so tests can
//! substitute the bundled [`memory::MemoryStore`].
//!
//! Atomicity contract: every single trait method is atomic at the storage
//! layer (`upsert_token` in particular must be a real upsert-by-unique-key,
//! not read-then-write). Multi-step sequences that must be all-or-nothing
//! run inside a [`StoreTx`] obtained from [`AuthStore::begin`].

pub mod memory;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use thiserror::Error;
use uuid::Uuid;

use crate::models::{LinkedAccount, Permission, Role, TokenKind, TokenRecord, User};

pub use memory::MemoryStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    NotFound(String),

    #[error("storage failure: {0}")]
    Internal(String),
}

/// Transaction scope for multi-step mutations.
///
/// Operations are buffered and applied all-or-nothing on [`commit`];
/// dropping the scope without committing discards everything. Unique-key
/// constraints are re-checked at commit time, so a conflicting concurrent
/// write surfaces as `Conflict` and leaves no residual rows.
///
/// [`commit`]: StoreTx::commit
#[async_trait]
pub trait StoreTx: Send {
    async fn insert_user(&mut self, user: &User) -> Result<(), StoreError>;

    async fn upsert_token(
        &mut self,
        user_id: Uuid,
        kind: TokenKind,
        token_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), StoreError>;

    async fn update_password(
        &mut self,
        user_id: Uuid,
        password_digest: &str,
    ) -> Result<(), StoreError>;

    async fn revoke_user_tokens(
        &mut self,
        user_id: Uuid,
        kind: TokenKind,
    ) -> Result<(), StoreError>;

    async fn delete_token(&mut self, token_hash: &str) -> Result<(), StoreError>;

    async fn commit(self: Box<Self>) -> Result<(), StoreError>;
}

/// Repository over users, tokens, and the role/permission graph.
#[async_trait]
pub trait AuthStore: Send + Sync {
    async fn begin(&self) -> Result<Box<dyn StoreTx>, StoreError>;

    // ==================== Token records ====================

    /// Replace any existing record for `(user_id, kind)`; resets the revoked
    /// flag. Exactly one record survives per key.
    async fn upsert_token(
        &self,
        user_id: Uuid,
        kind: TokenKind,
        token_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), StoreError>;

    /// Record matching the digest and kind, only while non-revoked and
    /// unexpired.
    async fn find_active_token(
        &self,
        token_hash: &str,
        kind: TokenKind,
    ) -> Result<Option<TokenRecord>, StoreError>;

    /// Mark matching records revoked. Idempotent.
    async fn revoke_token(&self, token_hash: &str) -> Result<(), StoreError>;

    /// Hard-remove matching records. Idempotent.
    async fn delete_token(&self, token_hash: &str) -> Result<(), StoreError>;

    /// Delete every record whose expiry is in the past; returns the count.
    async fn purge_expired_tokens(&self) -> Result<u64, StoreError>;

    // ==================== Users ====================

    async fn insert_user(&self, user: &User) -> Result<(), StoreError>;
    async fn find_user_by_id(&self, user_id: Uuid) -> Result<Option<User>, StoreError>;
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;
    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>, StoreError>;
    async fn mark_email_verified(
        &self,
        user_id: Uuid,
        at: DateTime<Utc>,
    ) -> Result<(), StoreError>;
    async fn touch_last_login(&self, user_id: Uuid, at: DateTime<Utc>) -> Result<(), StoreError>;

    // ==================== OAuth account links ====================

    async fn find_linked_account(
        &self,
        provider: &str,
        provider_account_id: &str,
    ) -> Result<Option<LinkedAccount>, StoreError>;
    async fn link_account(&self, account: &LinkedAccount) -> Result<(), StoreError>;

    // ==================== Roles & permissions ====================

    async fn insert_role(&self, role: &Role) -> Result<(), StoreError>;
    async fn find_role_by_id(&self, role_id: Uuid) -> Result<Option<Role>, StoreError>;
    async fn list_roles(&self) -> Result<Vec<Role>, StoreError>;
    async fn update_role(
        &self,
        role_id: Uuid,
        name: Option<&str>,
        guard_name: Option<&str>,
    ) -> Result<Role, StoreError>;
    /// Deletes the role and every join row referencing it.
    async fn delete_role(&self, role_id: Uuid) -> Result<(), StoreError>;

    async fn insert_permission(&self, permission: &Permission) -> Result<(), StoreError>;
    async fn list_permissions(&self) -> Result<Vec<Permission>, StoreError>;
    /// Deletes the permission and every join row referencing it.
    async fn delete_permission(&self, permission_id: Uuid) -> Result<(), StoreError>;

    async fn list_role_permissions(&self, role_id: Uuid) -> Result<Vec<Permission>, StoreError>;

    // ==================== Authorization queries ====================

    async fn user_has_role(&self, user_id: Uuid, role_name: &str) -> Result<bool, StoreError>;

    /// Existence-style check: direct grant OR any role-inherited grant.
    async fn user_has_permission(
        &self,
        user_id: Uuid,
        permission_name: &str,
    ) -> Result<bool, StoreError>;

    /// Direct ∪ role-inherited permission names, deduplicated. Unordered.
    async fn effective_permission_names(
        &self,
        user_id: Uuid,
    ) -> Result<HashSet<String>, StoreError>;

    async fn list_user_roles(&self, user_id: Uuid) -> Result<Vec<Role>, StoreError>;
    /// Direct grants only; role-inherited permissions are not included.
    async fn list_user_permissions(&self, user_id: Uuid) -> Result<Vec<Permission>, StoreError>;

    // ==================== Join mutations ====================

    /// Atomic replace of the user's whole role set.
    async fn sync_user_roles(&self, user_id: Uuid, role_ids: &[Uuid]) -> Result<(), StoreError>;

    /// Atomic replace of the user's whole direct-permission set.
    async fn sync_user_permissions(
        &self,
        user_id: Uuid,
        permission_ids: &[Uuid],
    ) -> Result<(), StoreError>;

    /// Atomic replace of the role's whole permission set.
    async fn sync_role_permissions(
        &self,
        role_id: Uuid,
        permission_ids: &[Uuid],
    ) -> Result<(), StoreError>;

    async fn add_user_role(&self, user_id: Uuid, role_id: Uuid) -> Result<(), StoreError>;
    async fn remove_user_role(&self, user_id: Uuid, role_id: Uuid) -> Result<(), StoreError>;
    async fn add_user_permission(
        &self,
        user_id: Uuid,
        permission_id: Uuid,
    ) -> Result<(), StoreError>;
    async fn remove_user_permission(
        &self,
        user_id: Uuid,
        permission_id: Uuid,
    ) -> Result<(), StoreError>;
}
