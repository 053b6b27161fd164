//! Bundled in-memory store.
//!
//! Backs the default binary and the test-suite. All state lives behind one
//! async mutex, which makes every trait method atomic; transactions buffer
//! their operations and replay them against a working copy on commit, so a
//! failed commit leaves no residual rows.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::models::{LinkedAccount, Permission, Role, TokenKind, TokenRecord, User};

use super::{AuthStore, StoreError, StoreTx};

#[derive(Debug, Default, Clone)]
struct StoreState {
    users: HashMap<Uuid, User>,
    /// Keyed by `(user_id, kind)`: the one-record-per-pair invariant holds
    /// by construction.
    tokens: HashMap<(Uuid, TokenKind), TokenRecord>,
    accounts: HashMap<(String, String), LinkedAccount>,
    roles: HashMap<Uuid, Role>,
    permissions: HashMap<Uuid, Permission>,
    user_roles: HashSet<(Uuid, Uuid)>,
    role_permissions: HashSet<(Uuid, Uuid)>,
    user_permissions: HashSet<(Uuid, Uuid)>,
}

impl StoreState {
    fn insert_user(&mut self, user: &User) -> Result<(), StoreError> {
        if self
            .users
            .values()
            .any(|u| u.email.eq_ignore_ascii_case(&user.email))
        {
            return Err(StoreError::Conflict("email already in use".to_string()));
        }
        if self.users.values().any(|u| u.username == user.username) {
            return Err(StoreError::Conflict("username already taken".to_string()));
        }
        self.users.insert(user.id, user.clone());
        Ok(())
    }

    fn upsert_token(
        &mut self,
        user_id: Uuid,
        kind: TokenKind,
        token_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        if !self.users.contains_key(&user_id) {
            return Err(StoreError::NotFound("user not found".to_string()));
        }
        self.tokens.insert(
            (user_id, kind),
            TokenRecord::new(user_id, kind, token_hash.to_string(), expires_at),
        );
        Ok(())
    }

    fn update_password(&mut self, user_id: Uuid, password_digest: &str) -> Result<(), StoreError> {
        let user = self
            .users
            .get_mut(&user_id)
            .ok_or_else(|| StoreError::NotFound("user not found".to_string()))?;
        user.password_digest = password_digest.to_string();
        user.updated_at = Utc::now();
        Ok(())
    }

    fn revoke_user_tokens(&mut self, user_id: Uuid, kind: TokenKind) -> Result<(), StoreError> {
        if let Some(record) = self.tokens.get_mut(&(user_id, kind)) {
            record.is_revoked = true;
        }
        Ok(())
    }

    fn delete_token(&mut self, token_hash: &str) -> Result<(), StoreError> {
        self.tokens.retain(|_, t| t.token_hash != token_hash);
        Ok(())
    }
}

/// Buffered transaction operation, replayed at commit.
#[derive(Debug, Clone)]
enum TxOp {
    InsertUser(User),
    UpsertToken {
        user_id: Uuid,
        kind: TokenKind,
        token_hash: String,
        expires_at: DateTime<Utc>,
    },
    UpdatePassword {
        user_id: Uuid,
        password_digest: String,
    },
    RevokeUserTokens {
        user_id: Uuid,
        kind: TokenKind,
    },
    DeleteToken {
        token_hash: String,
    },
}

fn apply(state: &mut StoreState, op: &TxOp) -> Result<(), StoreError> {
    match op {
        TxOp::InsertUser(user) => state.insert_user(user),
        TxOp::UpsertToken {
            user_id,
            kind,
            token_hash,
            expires_at,
        } => state.upsert_token(*user_id, *kind, token_hash, *expires_at),
        TxOp::UpdatePassword {
            user_id,
            password_digest,
        } => state.update_password(*user_id, password_digest),
        TxOp::RevokeUserTokens { user_id, kind } => state.revoke_user_tokens(*user_id, *kind),
        TxOp::DeleteToken { token_hash } => state.delete_token(token_hash),
    }
}

/// In-memory [`AuthStore`].
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<StoreState>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Test support: number of live records for a `(user, kind)` pair.
    pub async fn token_count(&self, user_id: Uuid, kind: TokenKind) -> usize {
        let state = self.inner.lock().await;
        state
            .tokens
            .values()
            .filter(|t| t.user_id == user_id && t.kind == kind)
            .count()
    }

    /// Test support: the stored record for a `(user, kind)` pair, if any.
    pub async fn token_record(&self, user_id: Uuid, kind: TokenKind) -> Option<TokenRecord> {
        let state = self.inner.lock().await;
        state.tokens.get(&(user_id, kind)).cloned()
    }
}

struct MemoryTx {
    inner: Arc<Mutex<StoreState>>,
    ops: Vec<TxOp>,
}

#[async_trait]
impl StoreTx for MemoryTx {
    async fn insert_user(&mut self, user: &User) -> Result<(), StoreError> {
        self.ops.push(TxOp::InsertUser(user.clone()));
        Ok(())
    }

    async fn upsert_token(
        &mut self,
        user_id: Uuid,
        kind: TokenKind,
        token_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        self.ops.push(TxOp::UpsertToken {
            user_id,
            kind,
            token_hash: token_hash.to_string(),
            expires_at,
        });
        Ok(())
    }

    async fn update_password(
        &mut self,
        user_id: Uuid,
        password_digest: &str,
    ) -> Result<(), StoreError> {
        self.ops.push(TxOp::UpdatePassword {
            user_id,
            password_digest: password_digest.to_string(),
        });
        Ok(())
    }

    async fn revoke_user_tokens(
        &mut self,
        user_id: Uuid,
        kind: TokenKind,
    ) -> Result<(), StoreError> {
        self.ops.push(TxOp::RevokeUserTokens { user_id, kind });
        Ok(())
    }

    async fn delete_token(&mut self, token_hash: &str) -> Result<(), StoreError> {
        self.ops.push(TxOp::DeleteToken {
            token_hash: token_hash.to_string(),
        });
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        let mut guard = self.inner.lock().await;
        // Replay against a working copy; swap in only when every op holds.
        let mut working = guard.clone();
        for op in &self.ops {
            apply(&mut working, op)?;
        }
        *guard = working;
        Ok(())
    }
}

#[async_trait]
impl AuthStore for MemoryStore {
    async fn begin(&self) -> Result<Box<dyn StoreTx>, StoreError> {
        Ok(Box::new(MemoryTx {
            inner: self.inner.clone(),
            ops: Vec::new(),
        }))
    }

    async fn upsert_token(
        &self,
        user_id: Uuid,
        kind: TokenKind,
        token_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let mut state = self.inner.lock().await;
        state.upsert_token(user_id, kind, token_hash, expires_at)
    }

    async fn find_active_token(
        &self,
        token_hash: &str,
        kind: TokenKind,
    ) -> Result<Option<TokenRecord>, StoreError> {
        let state = self.inner.lock().await;
        Ok(state
            .tokens
            .values()
            .find(|t| t.kind == kind && t.token_hash == token_hash && t.is_active())
            .cloned())
    }

    async fn revoke_token(&self, token_hash: &str) -> Result<(), StoreError> {
        let mut state = self.inner.lock().await;
        for record in state.tokens.values_mut() {
            if record.token_hash == token_hash {
                record.is_revoked = true;
            }
        }
        Ok(())
    }

    async fn delete_token(&self, token_hash: &str) -> Result<(), StoreError> {
        let mut state = self.inner.lock().await;
        state.delete_token(token_hash)
    }

    async fn purge_expired_tokens(&self) -> Result<u64, StoreError> {
        let mut state = self.inner.lock().await;
        let before = state.tokens.len();
        state.tokens.retain(|_, t| !t.is_expired());
        Ok((before - state.tokens.len()) as u64)
    }

    async fn insert_user(&self, user: &User) -> Result<(), StoreError> {
        let mut state = self.inner.lock().await;
        state.insert_user(user)
    }

    async fn find_user_by_id(&self, user_id: Uuid) -> Result<Option<User>, StoreError> {
        let state = self.inner.lock().await;
        Ok(state.users.get(&user_id).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let state = self.inner.lock().await;
        Ok(state
            .users
            .values()
            .find(|u| u.email.eq_ignore_ascii_case(email))
            .cloned())
    }

    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>, StoreError> {
        let state = self.inner.lock().await;
        Ok(state.users.values().find(|u| u.username == username).cloned())
    }

    async fn mark_email_verified(
        &self,
        user_id: Uuid,
        at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let mut state = self.inner.lock().await;
        let user = state
            .users
            .get_mut(&user_id)
            .ok_or_else(|| StoreError::NotFound("user not found".to_string()))?;
        user.email_verified = Some(at);
        user.updated_at = Utc::now();
        Ok(())
    }

    async fn touch_last_login(&self, user_id: Uuid, at: DateTime<Utc>) -> Result<(), StoreError> {
        let mut state = self.inner.lock().await;
        let user = state
            .users
            .get_mut(&user_id)
            .ok_or_else(|| StoreError::NotFound("user not found".to_string()))?;
        user.last_login = Some(at);
        user.updated_at = Utc::now();
        Ok(())
    }

    async fn find_linked_account(
        &self,
        provider: &str,
        provider_account_id: &str,
    ) -> Result<Option<LinkedAccount>, StoreError> {
        let state = self.inner.lock().await;
        Ok(state
            .accounts
            .get(&(provider.to_string(), provider_account_id.to_string()))
            .cloned())
    }

    async fn link_account(&self, account: &LinkedAccount) -> Result<(), StoreError> {
        let mut state = self.inner.lock().await;
        if !state.users.contains_key(&account.user_id) {
            return Err(StoreError::NotFound("user not found".to_string()));
        }
        let key = (
            account.provider.clone(),
            account.provider_account_id.clone(),
        );
        if state.accounts.contains_key(&key) {
            return Err(StoreError::Conflict("account already linked".to_string()));
        }
        state.accounts.insert(key, account.clone());
        Ok(())
    }

    async fn insert_role(&self, role: &Role) -> Result<(), StoreError> {
        let mut state = self.inner.lock().await;
        if state.roles.values().any(|r| r.name == role.name) {
            return Err(StoreError::Conflict(format!(
                "role '{}' already exists",
                role.name
            )));
        }
        state.roles.insert(role.id, role.clone());
        Ok(())
    }

    async fn find_role_by_id(&self, role_id: Uuid) -> Result<Option<Role>, StoreError> {
        let state = self.inner.lock().await;
        Ok(state.roles.get(&role_id).cloned())
    }

    async fn list_roles(&self) -> Result<Vec<Role>, StoreError> {
        let state = self.inner.lock().await;
        Ok(state.roles.values().cloned().collect())
    }

    async fn update_role(
        &self,
        role_id: Uuid,
        name: Option<&str>,
        guard_name: Option<&str>,
    ) -> Result<Role, StoreError> {
        let mut state = self.inner.lock().await;
        if let Some(name) = name {
            if state
                .roles
                .values()
                .any(|r| r.id != role_id && r.name == name)
            {
                return Err(StoreError::Conflict(format!(
                    "role '{}' already exists",
                    name
                )));
            }
        }
        let role = state
            .roles
            .get_mut(&role_id)
            .ok_or_else(|| StoreError::NotFound("role not found".to_string()))?;
        if let Some(name) = name {
            role.name = name.to_string();
        }
        if let Some(guard_name) = guard_name {
            role.guard_name = guard_name.to_string();
        }
        Ok(role.clone())
    }

    async fn delete_role(&self, role_id: Uuid) -> Result<(), StoreError> {
        let mut state = self.inner.lock().await;
        if state.roles.remove(&role_id).is_none() {
            return Err(StoreError::NotFound("role not found".to_string()));
        }
        state.user_roles.retain(|(_, r)| *r != role_id);
        state.role_permissions.retain(|(r, _)| *r != role_id);
        Ok(())
    }

    async fn insert_permission(&self, permission: &Permission) -> Result<(), StoreError> {
        let mut state = self.inner.lock().await;
        if state.permissions.values().any(|p| p.name == permission.name) {
            return Err(StoreError::Conflict(format!(
                "permission '{}' already exists",
                permission.name
            )));
        }
        state.permissions.insert(permission.id, permission.clone());
        Ok(())
    }

    async fn list_permissions(&self) -> Result<Vec<Permission>, StoreError> {
        let state = self.inner.lock().await;
        Ok(state.permissions.values().cloned().collect())
    }

    async fn delete_permission(&self, permission_id: Uuid) -> Result<(), StoreError> {
        let mut state = self.inner.lock().await;
        if state.permissions.remove(&permission_id).is_none() {
            return Err(StoreError::NotFound("permission not found".to_string()));
        }
        state.role_permissions.retain(|(_, p)| *p != permission_id);
        state.user_permissions.retain(|(_, p)| *p != permission_id);
        Ok(())
    }

    async fn list_role_permissions(&self, role_id: Uuid) -> Result<Vec<Permission>, StoreError> {
        let state = self.inner.lock().await;
        if !state.roles.contains_key(&role_id) {
            return Err(StoreError::NotFound("role not found".to_string()));
        }
        Ok(state
            .role_permissions
            .iter()
            .filter(|(r, _)| *r == role_id)
            .filter_map(|(_, p)| state.permissions.get(p))
            .cloned()
            .collect())
    }

    async fn user_has_role(&self, user_id: Uuid, role_name: &str) -> Result<bool, StoreError> {
        let state = self.inner.lock().await;
        let Some(role) = state.roles.values().find(|r| r.name == role_name) else {
            return Ok(false);
        };
        Ok(state.user_roles.contains(&(user_id, role.id)))
    }

    async fn user_has_permission(
        &self,
        user_id: Uuid,
        permission_name: &str,
    ) -> Result<bool, StoreError> {
        let state = self.inner.lock().await;
        let Some(permission) = state
            .permissions
            .values()
            .find(|p| p.name == permission_name)
        else {
            return Ok(false);
        };
        if state.user_permissions.contains(&(user_id, permission.id)) {
            return Ok(true);
        }
        Ok(state
            .user_roles
            .iter()
            .filter(|(u, _)| *u == user_id)
            .any(|(_, role_id)| state.role_permissions.contains(&(*role_id, permission.id))))
    }

    async fn effective_permission_names(
        &self,
        user_id: Uuid,
    ) -> Result<HashSet<String>, StoreError> {
        let state = self.inner.lock().await;
        let mut permission_ids: HashSet<Uuid> = state
            .user_permissions
            .iter()
            .filter(|(u, _)| *u == user_id)
            .map(|(_, p)| *p)
            .collect();
        for (u, role_id) in &state.user_roles {
            if *u == user_id {
                permission_ids.extend(
                    state
                        .role_permissions
                        .iter()
                        .filter(|(r, _)| r == role_id)
                        .map(|(_, p)| *p),
                );
            }
        }
        Ok(permission_ids
            .iter()
            .filter_map(|id| state.permissions.get(id))
            .map(|p| p.name.clone())
            .collect())
    }

    async fn list_user_roles(&self, user_id: Uuid) -> Result<Vec<Role>, StoreError> {
        let state = self.inner.lock().await;
        Ok(state
            .user_roles
            .iter()
            .filter(|(u, _)| *u == user_id)
            .filter_map(|(_, r)| state.roles.get(r))
            .cloned()
            .collect())
    }

    async fn list_user_permissions(&self, user_id: Uuid) -> Result<Vec<Permission>, StoreError> {
        let state = self.inner.lock().await;
        Ok(state
            .user_permissions
            .iter()
            .filter(|(u, _)| *u == user_id)
            .filter_map(|(_, p)| state.permissions.get(p))
            .cloned()
            .collect())
    }

    async fn sync_user_roles(&self, user_id: Uuid, role_ids: &[Uuid]) -> Result<(), StoreError> {
        let mut state = self.inner.lock().await;
        if !state.users.contains_key(&user_id) {
            return Err(StoreError::NotFound("user not found".to_string()));
        }
        for role_id in role_ids {
            if !state.roles.contains_key(role_id) {
                return Err(StoreError::NotFound("role not found".to_string()));
            }
        }
        state.user_roles.retain(|(u, _)| *u != user_id);
        for role_id in role_ids {
            state.user_roles.insert((user_id, *role_id));
        }
        Ok(())
    }

    async fn sync_user_permissions(
        &self,
        user_id: Uuid,
        permission_ids: &[Uuid],
    ) -> Result<(), StoreError> {
        let mut state = self.inner.lock().await;
        if !state.users.contains_key(&user_id) {
            return Err(StoreError::NotFound("user not found".to_string()));
        }
        for permission_id in permission_ids {
            if !state.permissions.contains_key(permission_id) {
                return Err(StoreError::NotFound("permission not found".to_string()));
            }
        }
        state.user_permissions.retain(|(u, _)| *u != user_id);
        for permission_id in permission_ids {
            state.user_permissions.insert((user_id, *permission_id));
        }
        Ok(())
    }

    async fn sync_role_permissions(
        &self,
        role_id: Uuid,
        permission_ids: &[Uuid],
    ) -> Result<(), StoreError> {
        let mut state = self.inner.lock().await;
        if !state.roles.contains_key(&role_id) {
            return Err(StoreError::NotFound("role not found".to_string()));
        }
        for permission_id in permission_ids {
            if !state.permissions.contains_key(permission_id) {
                return Err(StoreError::NotFound("permission not found".to_string()));
            }
        }
        state.role_permissions.retain(|(r, _)| *r != role_id);
        for permission_id in permission_ids {
            state.role_permissions.insert((role_id, *permission_id));
        }
        Ok(())
    }

    async fn add_user_role(&self, user_id: Uuid, role_id: Uuid) -> Result<(), StoreError> {
        let mut state = self.inner.lock().await;
        if !state.users.contains_key(&user_id) {
            return Err(StoreError::NotFound("user not found".to_string()));
        }
        if !state.roles.contains_key(&role_id) {
            return Err(StoreError::NotFound("role not found".to_string()));
        }
        if !state.user_roles.insert((user_id, role_id)) {
            return Err(StoreError::Conflict(
                "user already has this role".to_string(),
            ));
        }
        Ok(())
    }

    async fn remove_user_role(&self, user_id: Uuid, role_id: Uuid) -> Result<(), StoreError> {
        let mut state = self.inner.lock().await;
        if !state.user_roles.remove(&(user_id, role_id)) {
            return Err(StoreError::NotFound(
                "role assignment not found".to_string(),
            ));
        }
        Ok(())
    }

    async fn add_user_permission(
        &self,
        user_id: Uuid,
        permission_id: Uuid,
    ) -> Result<(), StoreError> {
        let mut state = self.inner.lock().await;
        if !state.users.contains_key(&user_id) {
            return Err(StoreError::NotFound("user not found".to_string()));
        }
        if !state.permissions.contains_key(&permission_id) {
            return Err(StoreError::NotFound("permission not found".to_string()));
        }
        if !state.user_permissions.insert((user_id, permission_id)) {
            return Err(StoreError::Conflict(
                "user already has this permission".to_string(),
            ));
        }
        Ok(())
    }

    async fn remove_user_permission(
        &self,
        user_id: Uuid,
        permission_id: Uuid,
    ) -> Result<(), StoreError> {
        let mut state = self.inner.lock().await;
        if !state.user_permissions.remove(&(user_id, permission_id)) {
            return Err(StoreError::NotFound(
                "permission assignment not found".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn test_user(email: &str, username: &str) -> User {
        User::new(
            email.to_string(),
            username.to_string(),
            "digest".to_string(),
            None,
            None,
        )
    }

    #[tokio::test]
    async fn test_upsert_replaces_and_clears_revocation() {
        let store = MemoryStore::new();
        let user = test_user("a@x.com", "a");
        store.insert_user(&user).await.unwrap();

        let expires = Utc::now() + Duration::days(7);
        store
            .upsert_token(user.id, TokenKind::Refresh, "hash-1", expires)
            .await
            .unwrap();
        store.revoke_token("hash-1").await.unwrap();

        store
            .upsert_token(user.id, TokenKind::Refresh, "hash-2", expires)
            .await
            .unwrap();

        assert_eq!(store.token_count(user.id, TokenKind::Refresh).await, 1);
        let record = store
            .token_record(user.id, TokenKind::Refresh)
            .await
            .unwrap();
        assert_eq!(record.token_hash, "hash-2");
        assert!(!record.is_revoked);
    }

    #[tokio::test]
    async fn test_tx_drop_discards_everything() {
        let store = MemoryStore::new();
        let user = test_user("a@x.com", "a");

        let mut tx = store.begin().await.unwrap();
        tx.insert_user(&user).await.unwrap();
        drop(tx);

        assert!(store.find_user_by_id(user.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_tx_commit_is_all_or_nothing() {
        let store = MemoryStore::new();
        let existing = test_user("a@x.com", "a");
        store.insert_user(&existing).await.unwrap();

        // Same email: the commit must fail and apply neither op.
        let duplicate = test_user("a@x.com", "b");
        let mut tx = store.begin().await.unwrap();
        tx.insert_user(&duplicate).await.unwrap();
        tx.upsert_token(
            existing.id,
            TokenKind::Verify,
            "hash-1",
            Utc::now() + Duration::hours(1),
        )
        .await
        .unwrap();
        let err = tx.commit().await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));

        assert_eq!(store.token_count(existing.id, TokenKind::Verify).await, 0);
        assert!(store.find_user_by_username("b").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_purge_expired_only_removes_past_records() {
        let store = MemoryStore::new();
        let user = test_user("a@x.com", "a");
        store.insert_user(&user).await.unwrap();

        store
            .upsert_token(
                user.id,
                TokenKind::Refresh,
                "live",
                Utc::now() + Duration::days(1),
            )
            .await
            .unwrap();
        store
            .upsert_token(
                user.id,
                TokenKind::Verify,
                "stale",
                Utc::now() - Duration::seconds(5),
            )
            .await
            .unwrap();

        assert_eq!(store.purge_expired_tokens().await.unwrap(), 1);
        assert_eq!(store.token_count(user.id, TokenKind::Refresh).await, 1);
        assert_eq!(store.token_count(user.id, TokenKind::Verify).await, 0);
    }

    #[tokio::test]
    async fn test_delete_role_cascades_joins() {
        let store = MemoryStore::new();
        let user = test_user("a@x.com", "a");
        store.insert_user(&user).await.unwrap();
        let role = Role::new("editor".to_string(), None);
        store.insert_role(&role).await.unwrap();
        let permission = Permission::new("edit_post".to_string(), None);
        store.insert_permission(&permission).await.unwrap();

        store.add_user_role(user.id, role.id).await.unwrap();
        store
            .sync_role_permissions(role.id, &[permission.id])
            .await
            .unwrap();

        store.delete_role(role.id).await.unwrap();
        assert!(store.list_user_roles(user.id).await.unwrap().is_empty());
        assert!(!store
            .user_has_permission(user.id, "edit_post")
            .await
            .unwrap());
    }
}
