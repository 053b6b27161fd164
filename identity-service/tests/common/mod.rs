//! Shared setup for integration tests: isolated service instances over the
//! in-memory store and a recording mailer.

#![allow(dead_code)]

use std::sync::Arc;

use chrono::Utc;
use identity_service::{
    config::{
        AuthConfig, Environment, MailConfig, MailDriver, SecurityConfig, TokenKindConfig,
        TokensConfig,
    },
    dtos::auth::RegisterRequest,
    models::User,
    services::RecordingMailer,
    store::{AuthStore, MemoryStore},
    utils::{hash_password, Password},
    AppState,
};

pub fn test_config() -> AuthConfig {
    let kind = |secret: &str, expiry: &str| TokenKindConfig {
        secret: secret.to_string(),
        expiry: expiry.to_string(),
    };

    AuthConfig {
        common: service_core::config::Config { port: 8080 },
        environment: Environment::Dev,
        service_name: "identity-service-test".to_string(),
        service_version: "0.0.0".to_string(),
        log_level: "debug".to_string(),
        base_url: "http://localhost:8080".to_string(),
        tokens: TokensConfig {
            access: kind("test-access-secret", "15m"),
            temp_access: kind("test-temp-access-secret", "15m"),
            refresh: kind("test-refresh-secret", "7d"),
            verify: kind("test-verification-secret", "1h"),
            reset: kind("test-reset-secret", "1h"),
        },
        mail: MailConfig {
            driver: MailDriver::Log,
            smtp_host: String::new(),
            smtp_port: 587,
            smtp_user: String::new(),
            smtp_password: String::new(),
            from_address: "no-reply@localhost".to_string(),
        },
        security: SecurityConfig {
            allowed_origins: vec!["http://localhost:3000".to_string()],
        },
        token_purge_interval_seconds: 3600,
    }
}

pub fn test_state() -> (AppState, Arc<MemoryStore>, Arc<RecordingMailer>) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("info")
        .try_init();

    let store = Arc::new(MemoryStore::new());
    let mailer = Arc::new(RecordingMailer::new());
    let state = AppState::new(test_config(), store.clone(), mailer.clone());
    (state, store, mailer)
}

/// Insert a user directly into the store, bypassing the register flow.
pub async fn seed_user(
    store: &MemoryStore,
    email: &str,
    username: &str,
    password: &str,
    verified: bool,
) -> User {
    let digest = hash_password(&Password::new(password.to_string())).expect("hashing failed");
    let mut user = User::new(
        email.to_string(),
        username.to_string(),
        digest.into_string(),
        None,
        None,
    );
    if verified {
        user.email_verified = Some(Utc::now());
    }
    store.insert_user(&user).await.expect("seed user failed");
    user
}

pub fn register_request(email: &str, password: &str) -> RegisterRequest {
    RegisterRequest {
        email: email.to_string(),
        username: None,
        first_name: None,
        last_name: None,
        password: password.to_string(),
        confirm_password: password.to_string(),
    }
}
