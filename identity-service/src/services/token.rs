//! Token lifecycle manager: the only entry point combining codec and store
//! into verifiable, revocable credentials.

use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use crate::models::{TokenKind, TokenRecord};
use crate::services::jwt::{TokenClaims, TokenCodec};
use crate::services::ServiceError;
use crate::store::{AuthStore, StoreTx};

/// Stateless access token plus stored refresh token.
#[derive(Debug, Clone)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

#[derive(Clone)]
pub struct TokenService {
    codec: TokenCodec,
    store: Arc<dyn AuthStore>,
}

impl TokenService {
    pub fn new(codec: TokenCodec, store: Arc<dyn AuthStore>) -> Self {
        Self { codec, store }
    }

    pub fn codec(&self) -> &TokenCodec {
        &self.codec
    }

    /// Issue a token; revocable kinds are also upserted into the store,
    /// inside `tx` when one is given so issuance commits (or rolls back)
    /// with the caller's other writes.
    pub async fn issue_and_store(
        &self,
        kind: TokenKind,
        user_id: Uuid,
        tx: Option<&mut dyn StoreTx>,
    ) -> Result<String, ServiceError> {
        let token = self.codec.issue(kind, user_id)?;

        if kind.is_stored() {
            let expires_at = Utc::now() + self.codec.lifetime(kind)?;
            let token_hash = TokenRecord::hash_value(&token);
            match tx {
                Some(tx) => tx.upsert_token(user_id, kind, &token_hash, expires_at).await?,
                None => {
                    self.store
                        .upsert_token(user_id, kind, &token_hash, expires_at)
                        .await?
                }
            }
        }

        Ok(token)
    }

    /// Stateless access token plus a stored refresh token.
    pub async fn issue_pair(
        &self,
        user_id: Uuid,
        tx: Option<&mut dyn StoreTx>,
    ) -> Result<TokenPair, ServiceError> {
        let access_token = self.codec.issue(TokenKind::Access, user_id)?;
        let refresh_token = self
            .issue_and_store(TokenKind::Refresh, user_id, tx)
            .await?;

        Ok(TokenPair {
            access_token,
            refresh_token,
        })
    }

    /// Verify a revocable token: a live store record AND a valid signature
    /// whose subject matches the record. A token removed or revoked in the
    /// store fails here even before its embedded expiry, which is what makes
    /// stored bearer tokens revocable.
    pub async fn verify_stored(
        &self,
        kind: TokenKind,
        token: &str,
    ) -> Result<TokenClaims, ServiceError> {
        let token_hash = TokenRecord::hash_value(token);
        let record = self
            .store
            .find_active_token(&token_hash, kind)
            .await?
            .ok_or(ServiceError::TokenInvalid)?;

        let claims = self.codec.verify(kind, token)?;
        if claims.subject()? != record.user_id {
            return Err(ServiceError::TokenInvalid);
        }

        Ok(claims)
    }

    /// Signature + expiry check only; used for the stateless kinds.
    pub fn verify_stateless(
        &self,
        kind: TokenKind,
        token: &str,
    ) -> Result<TokenClaims, ServiceError> {
        self.codec.verify(kind, token)
    }

    /// Exchange a refresh token for a fresh access token. The refresh token
    /// itself is deliberately not rotated: a single stored record stays
    /// valid until logout or expiry.
    pub async fn rotate_refresh(&self, refresh_token: &str) -> Result<String, ServiceError> {
        let claims = self
            .verify_stored(TokenKind::Refresh, refresh_token)
            .await?;
        self.codec.issue(TokenKind::Access, claims.subject()?)
    }

    /// Mark every record holding this token value revoked. Idempotent.
    pub async fn revoke_by_value(&self, token: &str) -> Result<(), ServiceError> {
        self.store
            .revoke_token(&TokenRecord::hash_value(token))
            .await?;
        Ok(())
    }

    /// Hard-remove every record holding this token value. Idempotent.
    pub async fn delete_by_value(&self, token: &str) -> Result<(), ServiceError> {
        self.store
            .delete_token(&TokenRecord::hash_value(token))
            .await?;
        Ok(())
    }

    /// Drop every expired record; safe to run concurrently with anything.
    pub async fn purge_expired(&self) -> Result<u64, ServiceError> {
        Ok(self.store.purge_expired_tokens().await?)
    }
}
