use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// Closed set of token kinds.
///
/// The kind decides which signing secret and expiry apply and whether the
/// token is tracked in the store. ACCESS and TEMP_ACCESS are stateless;
/// REFRESH, VERIFY and RESET must be revocable server-side and are stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TokenKind {
    Access,
    Refresh,
    Verify,
    Reset,
    TempAccess,
}

impl TokenKind {
    /// Whether this kind is backed by a store record.
    pub fn is_stored(&self) -> bool {
        matches!(self, TokenKind::Refresh | TokenKind::Verify | TokenKind::Reset)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TokenKind::Access => "ACCESS",
            TokenKind::Refresh => "REFRESH",
            TokenKind::Verify => "VERIFY",
            TokenKind::Reset => "RESET",
            TokenKind::TempAccess => "TEMP_ACCESS",
        }
    }
}

impl std::fmt::Display for TokenKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Stored token record for the revocable kinds.
///
/// At most one record exists per `(user_id, kind)` pair; re-issuance replaces
/// the previous record. The token value itself is kept as a SHA-256 digest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenRecord {
    pub id: Uuid,
    pub user_id: Uuid,
    pub kind: TokenKind,
    pub token_hash: String,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub is_revoked: bool,
}

impl TokenRecord {
    pub fn new(
        user_id: Uuid,
        kind: TokenKind,
        token_hash: String,
        expires_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            kind,
            token_hash,
            expires_at,
            created_at: Utc::now(),
            is_revoked: false,
        }
    }

    /// SHA-256 digest of a token string, hex-encoded.
    pub fn hash_value(token: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(token.as_bytes());
        hex::encode(hasher.finalize())
    }

    pub fn is_expired(&self) -> bool {
        Utc::now() > self.expires_at
    }

    /// Not expired and not revoked.
    pub fn is_active(&self) -> bool {
        !self.is_expired() && !self.is_revoked
    }
}
