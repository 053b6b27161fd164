use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// User account with credentials and verification state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub username: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    /// Argon2 digest; empty for accounts created through an OAuth provider.
    pub password_digest: String,
    pub email_verified: Option<DateTime<Utc>>,
    pub last_login: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn new(
        email: String,
        username: String,
        password_digest: String,
        first_name: Option<String>,
        last_name: Option<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            email,
            username,
            first_name,
            last_name,
            password_digest,
            email_verified: None,
            last_login: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_verified(&self) -> bool {
        self.email_verified.is_some()
    }
}

/// User shape safe to return to clients (no credential material).
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedUser {
    pub id: Uuid,
    pub email: String,
    pub username: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email_verified: Option<DateTime<Utc>>,
    pub last_login: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl From<User> for SanitizedUser {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            email: user.email,
            username: user.username,
            first_name: user.first_name,
            last_name: user.last_name,
            email_verified: user.email_verified,
            last_login: user.last_login,
            created_at: user.created_at,
        }
    }
}

/// Link between a user and a third-party OAuth identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkedAccount {
    pub provider: String,
    pub provider_account_id: String,
    pub user_id: Uuid,
    pub created_at: DateTime<Utc>,
}

impl LinkedAccount {
    pub fn new(provider: String, provider_account_id: String, user_id: Uuid) -> Self {
        Self {
            provider,
            provider_account_id,
            user_id,
            created_at: Utc::now(),
        }
    }
}
