//! Role and Permission entities.
//!
//! Join rows (user-role, role-permission, user-permission) are pure pairs
//! with a uniqueness invariant on the key; the store owns them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Guard name applied when a request does not specify one.
pub const DEFAULT_GUARD: &str = "api";

/// Named role, unique by name. Grants its permissions to every assigned user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Role {
    pub id: Uuid,
    pub name: String,
    pub guard_name: String,
    pub created_at: DateTime<Utc>,
}

impl Role {
    pub fn new(name: String, guard_name: Option<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name,
            guard_name: guard_name.unwrap_or_else(|| DEFAULT_GUARD.to_string()),
            created_at: Utc::now(),
        }
    }
}

/// Named capability, unique by name. Held directly by users or through roles.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Permission {
    pub id: Uuid,
    pub name: String,
    pub guard_name: String,
    pub created_at: DateTime<Utc>,
}

impl Permission {
    pub fn new(name: String, guard_name: Option<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name,
            guard_name: guard_name.unwrap_or_else(|| DEFAULT_GUARD.to_string()),
            created_at: Utc::now(),
        }
    }
}
