//! OAuth login orchestration.
//!
//! The provider handshake is external; by the time this service runs, the
//! provider profile has already been exchanged. This only reconciles the
//! profile against local users/accounts and mints a session.

use std::sync::Arc;

use chrono::Utc;

use crate::models::{LinkedAccount, SanitizedUser, User};
use crate::services::token::{TokenPair, TokenService};
use crate::services::ServiceError;
use crate::store::AuthStore;

/// Normalized profile handed over by the provider handshake.
#[derive(Debug, Clone)]
pub struct OAuthProfile {
    pub provider: String,
    pub provider_account_id: String,
    pub email: String,
    pub name: Option<String>,
}

#[derive(Clone)]
pub struct OAuthService {
    store: Arc<dyn AuthStore>,
    tokens: TokenService,
}

impl OAuthService {
    pub fn new(store: Arc<dyn AuthStore>, tokens: TokenService) -> Self {
        Self { store, tokens }
    }

    /// Log in (or sign up) through a provider profile and mint a full token
    /// pair. A known account link wins; otherwise the account is linked to
    /// the user with that email, creating one first if needed.
    pub async fn oauth_login(
        &self,
        profile: OAuthProfile,
    ) -> Result<(SanitizedUser, TokenPair), ServiceError> {
        if profile.email.is_empty() {
            return Err(ServiceError::Validation(
                "no email found in provider profile".to_string(),
            ));
        }

        let user = match self
            .store
            .find_linked_account(&profile.provider, &profile.provider_account_id)
            .await?
        {
            Some(account) => self
                .store
                .find_user_by_id(account.user_id)
                .await?
                .ok_or_else(|| ServiceError::NotFound("user not found".to_string()))?,
            None => {
                let user = match self.store.find_user_by_email(&profile.email).await? {
                    Some(user) => user,
                    None => {
                        let (first_name, last_name) = split_name(profile.name.as_deref());
                        let username = profile
                            .email
                            .split('@')
                            .next()
                            .unwrap_or(profile.email.as_str())
                            .to_string();
                        // Provider-asserted email counts as verified; no
                        // usable password digest exists for this account.
                        let mut user = User::new(
                            profile.email.clone(),
                            username,
                            String::new(),
                            first_name,
                            last_name,
                        );
                        user.email_verified = Some(Utc::now());
                        self.store.insert_user(&user).await?;
                        tracing::info!(user_id = %user.id, provider = %profile.provider, "user created via oauth");
                        user
                    }
                };
                self.store
                    .link_account(&LinkedAccount::new(
                        profile.provider.clone(),
                        profile.provider_account_id.clone(),
                        user.id,
                    ))
                    .await?;
                user
            }
        };

        self.store.touch_last_login(user.id, Utc::now()).await?;
        let pair = self.tokens.issue_pair(user.id, None).await?;
        tracing::info!(user_id = %user.id, provider = %profile.provider, "oauth login");

        Ok((user.into(), pair))
    }
}

fn split_name(name: Option<&str>) -> (Option<String>, Option<String>) {
    let Some(name) = name else {
        return (None, None);
    };
    let mut parts = name.split_whitespace();
    let first = parts.next().map(|s| s.to_string());
    let rest: Vec<&str> = parts.collect();
    let last = if rest.is_empty() {
        None
    } else {
        Some(rest.join(" "))
    };
    (first, last)
}
