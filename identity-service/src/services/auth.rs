//! Auth flow orchestrators: register, login, email verification, logout,
//! refresh, and password reset.

use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use crate::dtos::auth::{LoginRequest, PasswordResetConfirm, RegisterRequest, SessionResponse};
use crate::models::{TokenKind, TokenRecord, User};
use crate::services::email::Mailer;
use crate::services::token::TokenService;
use crate::services::ServiceError;
use crate::store::AuthStore;
use crate::utils::{hash_password, verify_password, Password, PasswordDigest};

#[derive(Clone)]
pub struct AuthService {
    store: Arc<dyn AuthStore>,
    tokens: TokenService,
    mailer: Arc<dyn Mailer>,
    base_url: String,
}

impl AuthService {
    pub fn new(
        store: Arc<dyn AuthStore>,
        tokens: TokenService,
        mailer: Arc<dyn Mailer>,
        base_url: String,
    ) -> Self {
        Self {
            store,
            tokens,
            mailer,
            base_url,
        }
    }

    /// Create an unverified user and mail a verification link. User creation
    /// and VERIFY-token issuance commit in one transaction scope; the caller
    /// gets a TEMP_ACCESS bearer token and no refresh token.
    pub async fn register(&self, req: RegisterRequest) -> Result<SessionResponse, ServiceError> {
        if req.password != req.confirm_password {
            return Err(ServiceError::Validation(
                "passwords do not match".to_string(),
            ));
        }

        if self.store.find_user_by_email(&req.email).await?.is_some() {
            return Err(ServiceError::Conflict("email already in use".to_string()));
        }
        let username = match req.username {
            Some(username) => username,
            None => req
                .email
                .split('@')
                .next()
                .unwrap_or(req.email.as_str())
                .to_string(),
        };
        if self.store.find_user_by_username(&username).await?.is_some() {
            return Err(ServiceError::Conflict("username already taken".to_string()));
        }

        let digest = hash_password(&Password::new(req.password))
            .map_err(|e| ServiceError::Internal(anyhow::anyhow!("password hashing error: {}", e)))?;

        let user = User::new(
            req.email,
            username,
            digest.into_string(),
            req.first_name,
            req.last_name,
        );

        let mut tx = self.store.begin().await?;
        tx.insert_user(&user).await?;
        let verification_token = self
            .tokens
            .issue_and_store(TokenKind::Verify, user.id, Some(tx.as_mut()))
            .await?;
        tx.commit().await?;

        tracing::info!(user_id = %user.id, "user registered");

        let temp_access = self
            .tokens
            .issue_and_store(TokenKind::TempAccess, user.id, None)
            .await?;
        let verification_link = self
            .mailer
            .send_verification_email(&user.email, &verification_token, &self.base_url)
            .await?;

        Ok(SessionResponse {
            user: user.into(),
            access_token: temp_access,
            refresh_token: None,
            token_type: "Bearer".to_string(),
            expires_in: self
                .tokens
                .codec()
                .lifetime(TokenKind::TempAccess)?
                .num_seconds(),
            requires_verification: true,
            verification_link: Some(verification_link),
        })
    }

    /// Password login. Unknown email and wrong password are deliberately
    /// indistinguishable. Unverified users get a fresh verification link and
    /// a TEMP_ACCESS token instead of a session.
    pub async fn login(&self, req: LoginRequest) -> Result<SessionResponse, ServiceError> {
        let user = self
            .store
            .find_user_by_email(&req.email)
            .await?
            .ok_or(ServiceError::InvalidCredentials)?;

        let matches = verify_password(
            &Password::new(req.password),
            &PasswordDigest::new(user.password_digest.clone()),
        )
        .unwrap_or(false);
        if !matches {
            return Err(ServiceError::InvalidCredentials);
        }

        if !user.is_verified() {
            return self.send_verification_link(&user).await;
        }

        self.store.touch_last_login(user.id, Utc::now()).await?;
        let pair = self.tokens.issue_pair(user.id, None).await?;

        tracing::info!(user_id = %user.id, "user logged in");

        Ok(SessionResponse {
            user: user.into(),
            access_token: pair.access_token,
            refresh_token: Some(pair.refresh_token),
            token_type: "Bearer".to_string(),
            expires_in: self
                .tokens
                .codec()
                .lifetime(TokenKind::Access)?
                .num_seconds(),
            requires_verification: false,
            verification_link: None,
        })
    }

    /// Consume a VERIFY token: stamp the verification time, revoke the
    /// token, and mint a full session.
    pub async fn verify_email(&self, token: &str) -> Result<SessionResponse, ServiceError> {
        let claims = self.tokens.verify_stored(TokenKind::Verify, token).await?;
        let user_id = claims.subject()?;

        self.store.mark_email_verified(user_id, Utc::now()).await?;
        self.tokens.revoke_by_value(token).await?;

        let user = self
            .store
            .find_user_by_id(user_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound("user not found".to_string()))?;
        let pair = self.tokens.issue_pair(user.id, None).await?;

        tracing::info!(user_id = %user.id, "email verified");

        Ok(SessionResponse {
            user: user.into(),
            access_token: pair.access_token,
            refresh_token: Some(pair.refresh_token),
            token_type: "Bearer".to_string(),
            expires_in: self
                .tokens
                .codec()
                .lifetime(TokenKind::Access)?
                .num_seconds(),
            requires_verification: false,
            verification_link: None,
        })
    }

    /// Re-send the verification link for the holder of a TEMP_ACCESS token.
    pub async fn resend_verification(
        &self,
        user_id: Uuid,
    ) -> Result<SessionResponse, ServiceError> {
        let user = self
            .store
            .find_user_by_id(user_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound("user not found".to_string()))?;

        if user.is_verified() {
            return Err(ServiceError::Validation(
                "email is already verified".to_string(),
            ));
        }

        self.send_verification_link(&user).await
    }

    /// Issue a fresh VERIFY token (replacing any previous one), mail the
    /// link, and hand back a TEMP_ACCESS bearer token.
    async fn send_verification_link(&self, user: &User) -> Result<SessionResponse, ServiceError> {
        let verification_token = self
            .tokens
            .issue_and_store(TokenKind::Verify, user.id, None)
            .await?;
        let temp_access = self
            .tokens
            .issue_and_store(TokenKind::TempAccess, user.id, None)
            .await?;
        let verification_link = self
            .mailer
            .send_verification_email(&user.email, &verification_token, &self.base_url)
            .await?;

        tracing::info!(user_id = %user.id, "verification link sent");

        Ok(SessionResponse {
            user: user.clone().into(),
            access_token: temp_access,
            refresh_token: None,
            token_type: "Bearer".to_string(),
            expires_in: self
                .tokens
                .codec()
                .lifetime(TokenKind::TempAccess)?
                .num_seconds(),
            requires_verification: true,
            verification_link: Some(verification_link),
        })
    }

    /// Delete the stored refresh token. Cookie clearing happens at the
    /// handler; deleting an unknown token is not an error.
    pub async fn logout(&self, refresh_token: Option<&str>) -> Result<(), ServiceError> {
        if let Some(token) = refresh_token {
            self.tokens.delete_by_value(token).await?;
        }
        Ok(())
    }

    /// Exchange a refresh token for a new access token.
    pub async fn refresh(&self, refresh_token: &str) -> Result<(String, i64), ServiceError> {
        let access_token = self.tokens.rotate_refresh(refresh_token).await?;
        let expires_in = self
            .tokens
            .codec()
            .lifetime(TokenKind::Access)?
            .num_seconds();
        Ok((access_token, expires_in))
    }

    /// Mail a reset link when the email is known; succeed silently either
    /// way so the endpoint cannot be used to enumerate users.
    pub async fn request_password_reset(&self, email: &str) -> Result<(), ServiceError> {
        if let Some(user) = self.store.find_user_by_email(email).await? {
            let reset_token = self
                .tokens
                .issue_and_store(TokenKind::Reset, user.id, None)
                .await?;
            self.mailer
                .send_password_reset_email(&user.email, &reset_token, &self.base_url)
                .await?;
            tracing::info!(user_id = %user.id, "password reset requested");
        }
        Ok(())
    }

    /// Consume a RESET token: atomically set the new digest, revoke the
    /// user's refresh token, and delete the reset token.
    pub async fn confirm_password_reset(
        &self,
        req: PasswordResetConfirm,
    ) -> Result<(), ServiceError> {
        let claims = self
            .tokens
            .verify_stored(TokenKind::Reset, &req.token)
            .await?;
        let user_id = claims.subject()?;

        let digest = hash_password(&Password::new(req.new_password))
            .map_err(|e| ServiceError::Internal(anyhow::anyhow!("password hashing error: {}", e)))?;

        let mut tx = self.store.begin().await?;
        tx.update_password(user_id, digest.as_str()).await?;
        tx.revoke_user_tokens(user_id, TokenKind::Refresh).await?;
        tx.delete_token(&TokenRecord::hash_value(&req.token)).await?;
        tx.commit().await?;

        tracing::info!(user_id = %user_id, "password reset");
        Ok(())
    }
}
