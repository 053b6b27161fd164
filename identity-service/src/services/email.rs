use async_trait::async_trait;
use lettre::{
    message::header::ContentType, transport::smtp::authentication::Credentials, Message,
    SmtpTransport, Transport,
};
use std::time::Duration;

use crate::config::MailConfig;
use crate::services::ServiceError;

/// Outbound mail collaborator. Implementations return the link they sent so
/// callers can surface it (and tests can capture tokens).
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send_verification_email(
        &self,
        to_email: &str,
        verification_token: &str,
        base_url: &str,
    ) -> Result<String, ServiceError>;

    async fn send_password_reset_email(
        &self,
        to_email: &str,
        reset_token: &str,
        base_url: &str,
    ) -> Result<String, ServiceError>;
}

pub fn verification_link(base_url: &str, token: &str) -> String {
    format!("{}/auth/verify?token={}", base_url, token)
}

pub fn password_reset_link(base_url: &str, token: &str) -> String {
    format!("{}/auth/password-reset/confirm?token={}", base_url, token)
}

/// SMTP-backed mailer.
#[derive(Clone)]
pub struct SmtpMailer {
    mailer: SmtpTransport,
    from_address: String,
}

impl SmtpMailer {
    pub fn new(config: &MailConfig) -> Result<Self, ServiceError> {
        let creds = Credentials::new(config.smtp_user.clone(), config.smtp_password.clone());

        let mailer = SmtpTransport::relay(&config.smtp_host)
            .map_err(|e| ServiceError::Email(e.to_string()))?
            .credentials(creds)
            .port(config.smtp_port)
            .timeout(Some(Duration::from_secs(10)))
            .build();

        tracing::info!(host = %config.smtp_host, "SMTP mailer initialized");

        Ok(Self {
            mailer,
            from_address: config.from_address.clone(),
        })
    }

    async fn send(&self, to_email: &str, subject: &str, body: String) -> Result<(), ServiceError> {
        let email = Message::builder()
            .from(
                self.from_address
                    .parse()
                    .map_err(|e: lettre::address::AddressError| {
                        ServiceError::Internal(anyhow::anyhow!(e))
                    })?,
            )
            .to(to_email
                .parse()
                .map_err(|e: lettre::address::AddressError| {
                    ServiceError::Validation(format!("invalid recipient address: {}", e))
                })?)
            .subject(subject)
            .header(ContentType::TEXT_PLAIN)
            .body(body)
            .map_err(|e| ServiceError::Internal(anyhow::anyhow!(e)))?;

        // Blocking SMTP send off the async runtime.
        let mailer = self.mailer.clone();
        let result = tokio::task::spawn_blocking(move || mailer.send(&email))
            .await
            .map_err(|e| ServiceError::Internal(anyhow::anyhow!(e)))?;

        match result {
            Ok(_) => {
                tracing::info!(to = %to_email, subject = %subject, "email sent");
                Ok(())
            }
            Err(e) => {
                tracing::error!(error = %e, to = %to_email, "failed to send email");
                Err(ServiceError::Email(e.to_string()))
            }
        }
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send_verification_email(
        &self,
        to_email: &str,
        verification_token: &str,
        base_url: &str,
    ) -> Result<String, ServiceError> {
        let link = verification_link(base_url, verification_token);
        let body = format!(
            "Welcome! Please verify your email address by opening the link below.\n\n{}\n\nIf you did not create an account, you can ignore this message.",
            link
        );
        self.send(to_email, "Verify your email", body).await?;
        Ok(link)
    }

    async fn send_password_reset_email(
        &self,
        to_email: &str,
        reset_token: &str,
        base_url: &str,
    ) -> Result<String, ServiceError> {
        let link = password_reset_link(base_url, reset_token);
        let body = format!(
            "A password reset was requested for your account.\n\n{}\n\nThe link expires shortly. If you did not request this, ignore this message.",
            link
        );
        self.send(to_email, "Reset your password", body).await?;
        Ok(link)
    }
}

/// Dev/test mailer: logs the link instead of sending anything.
#[derive(Clone, Default)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send_verification_email(
        &self,
        to_email: &str,
        verification_token: &str,
        base_url: &str,
    ) -> Result<String, ServiceError> {
        let link = verification_link(base_url, verification_token);
        tracing::info!(to = %to_email, link = %link, "verification email (log driver)");
        Ok(link)
    }

    async fn send_password_reset_email(
        &self,
        to_email: &str,
        reset_token: &str,
        base_url: &str,
    ) -> Result<String, ServiceError> {
        let link = password_reset_link(base_url, reset_token);
        tracing::info!(to = %to_email, link = %link, "password reset email (log driver)");
        Ok(link)
    }
}

/// Test mailer that records every token it was asked to deliver.
#[derive(Default)]
pub struct RecordingMailer {
    sent: std::sync::Mutex<Vec<SentMail>>,
}

#[derive(Debug, Clone)]
pub struct SentMail {
    pub to: String,
    pub token: String,
    pub link: String,
}

impl RecordingMailer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<SentMail> {
        self.sent.lock().expect("mailer mutex poisoned").clone()
    }

    pub fn last_token(&self) -> Option<String> {
        self.sent
            .lock()
            .expect("mailer mutex poisoned")
            .last()
            .map(|m| m.token.clone())
    }

    fn record(&self, to: &str, token: &str, link: String) -> String {
        self.sent
            .lock()
            .expect("mailer mutex poisoned")
            .push(SentMail {
                to: to.to_string(),
                token: token.to_string(),
                link: link.clone(),
            });
        link
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send_verification_email(
        &self,
        to_email: &str,
        verification_token: &str,
        base_url: &str,
    ) -> Result<String, ServiceError> {
        Ok(self.record(
            to_email,
            verification_token,
            verification_link(base_url, verification_token),
        ))
    }

    async fn send_password_reset_email(
        &self,
        to_email: &str,
        reset_token: &str,
        base_url: &str,
    ) -> Result<String, ServiceError> {
        Ok(self.record(
            to_email,
            reset_token,
            password_reset_link(base_url, reset_token),
        ))
    }
}
