use service_core::config as core_config;
use service_core::error::AppError;
use std::env;

use crate::models::TokenKind;

#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub common: core_config::Config,
    pub environment: Environment,
    pub service_name: String,
    pub service_version: String,
    pub log_level: String,
    /// Base URL used when building verification/reset links.
    pub base_url: String,
    pub tokens: TokensConfig,
    pub mail: MailConfig,
    pub security: SecurityConfig,
    pub token_purge_interval_seconds: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Environment {
    Dev,
    Prod,
}

/// Signing secret and expiry duration for one token kind.
///
/// Expiry strings are `<integer><unit>` with unit in s/m/h/d; an unrecognized
/// unit falls back to hours.
#[derive(Debug, Clone)]
pub struct TokenKindConfig {
    pub secret: String,
    pub expiry: String,
}

/// Per-kind token configuration. Every kind carries an independent secret so
/// a leaked secret for one kind can never forge another.
#[derive(Debug, Clone)]
pub struct TokensConfig {
    pub access: TokenKindConfig,
    pub temp_access: TokenKindConfig,
    pub refresh: TokenKindConfig,
    pub verify: TokenKindConfig,
    pub reset: TokenKindConfig,
}

impl TokensConfig {
    pub fn for_kind(&self, kind: TokenKind) -> &TokenKindConfig {
        match kind {
            TokenKind::Access => &self.access,
            TokenKind::TempAccess => &self.temp_access,
            TokenKind::Refresh => &self.refresh,
            TokenKind::Verify => &self.verify,
            TokenKind::Reset => &self.reset,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum MailDriver {
    Smtp,
    Log,
}

#[derive(Debug, Clone)]
pub struct MailConfig {
    pub driver: MailDriver,
    pub smtp_host: String,
    pub smtp_port: u16,
    pub smtp_user: String,
    pub smtp_password: String,
    pub from_address: String,
}

#[derive(Debug, Clone)]
pub struct SecurityConfig {
    pub allowed_origins: Vec<String>,
}

impl AuthConfig {
    pub fn from_env() -> Result<Self, AppError> {
        let common_config = core_config::Config::load()?;

        let env_str = env::var("ENVIRONMENT").unwrap_or_else(|_| "dev".to_string());
        let environment: Environment = env_str
            .parse()
            .map_err(|e: String| AppError::ConfigError(anyhow::anyhow!(e)))?;

        let is_prod = environment == Environment::Prod;

        let config = AuthConfig {
            common: common_config,
            environment: environment.clone(),
            service_name: get_env("SERVICE_NAME", Some("identity-service"), is_prod)?,
            service_version: get_env("SERVICE_VERSION", Some(env!("CARGO_PKG_VERSION")), is_prod)?,
            log_level: get_env("LOG_LEVEL", Some("info"), is_prod)?,
            base_url: get_env("BASE_URL", Some("http://localhost:8080"), is_prod)?,
            tokens: TokensConfig {
                access: TokenKindConfig {
                    secret: get_env("JWT_ACCESS_TOKEN_SECRET", Some("dev-access-secret"), is_prod)?,
                    expiry: get_env("JWT_ACCESS_TOKEN_EXPIRY", Some("15m"), is_prod)?,
                },
                temp_access: TokenKindConfig {
                    secret: get_env(
                        "JWT_TEMP_ACCESS_TOKEN_SECRET",
                        Some("dev-temp-access-secret"),
                        is_prod,
                    )?,
                    expiry: get_env("JWT_TEMP_ACCESS_TOKEN_EXPIRY", Some("15m"), is_prod)?,
                },
                refresh: TokenKindConfig {
                    secret: get_env(
                        "JWT_REFRESH_TOKEN_SECRET",
                        Some("dev-refresh-secret"),
                        is_prod,
                    )?,
                    expiry: get_env("JWT_REFRESH_TOKEN_EXPIRY", Some("7d"), is_prod)?,
                },
                verify: TokenKindConfig {
                    secret: get_env(
                        "JWT_VERIFICATION_TOKEN_SECRET",
                        Some("dev-verification-secret"),
                        is_prod,
                    )?,
                    expiry: get_env("JWT_VERIFICATION_TOKEN_EXPIRY", Some("1h"), is_prod)?,
                },
                reset: TokenKindConfig {
                    secret: get_env("JWT_RESET_TOKEN_SECRET", Some("dev-reset-secret"), is_prod)?,
                    expiry: get_env("JWT_RESET_TOKEN_EXPIRY", Some("1h"), is_prod)?,
                },
            },
            mail: MailConfig {
                driver: get_env("MAIL_DRIVER", Some("log"), is_prod)?
                    .parse()
                    .map_err(|e: String| AppError::ConfigError(anyhow::anyhow!(e)))?,
                smtp_host: get_env("SMTP_HOST", Some(""), is_prod)?,
                smtp_port: get_env("SMTP_PORT", Some("587"), is_prod)?
                    .parse()
                    .unwrap_or(587),
                smtp_user: get_env("SMTP_USER", Some(""), is_prod)?,
                smtp_password: get_env("SMTP_PASSWORD", Some(""), is_prod)?,
                from_address: get_env("MAIL_FROM", Some("no-reply@localhost"), is_prod)?,
            },
            security: SecurityConfig {
                allowed_origins: get_env(
                    "ALLOWED_ORIGINS",
                    Some("http://localhost:3000"),
                    is_prod,
                )?
                .split(',')
                .map(|s| s.trim().to_string())
                .collect(),
            },
            token_purge_interval_seconds: get_env(
                "TOKEN_PURGE_INTERVAL_SECONDS",
                Some("3600"),
                is_prod,
            )?
            .parse()
            .unwrap_or(3600),
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), AppError> {
        if self.common.port == 0 {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "PORT must be greater than 0"
            )));
        }

        // Kinds must never be cross-verifiable, which requires distinct secrets.
        let secrets = [
            ("access", &self.tokens.access.secret),
            ("temp_access", &self.tokens.temp_access.secret),
            ("refresh", &self.tokens.refresh.secret),
            ("verify", &self.tokens.verify.secret),
            ("reset", &self.tokens.reset.secret),
        ];
        for (i, (name_a, secret_a)) in secrets.iter().enumerate() {
            for (name_b, secret_b) in secrets.iter().skip(i + 1) {
                if !secret_a.is_empty() && secret_a == secret_b {
                    let msg = format!(
                        "{} and {} token kinds share a signing secret",
                        name_a, name_b
                    );
                    if self.environment == Environment::Prod {
                        return Err(AppError::ConfigError(anyhow::anyhow!(msg)));
                    }
                    tracing::warn!("{}", msg);
                }
            }
        }

        if self.environment == Environment::Prod {
            if self.security.allowed_origins.iter().any(|o| o == "*") {
                return Err(AppError::ConfigError(anyhow::anyhow!(
                    "Wildcard CORS origin not allowed in production"
                )));
            }

            if self.mail.driver == MailDriver::Smtp && self.mail.smtp_host.is_empty() {
                return Err(AppError::ConfigError(anyhow::anyhow!(
                    "SMTP_HOST is required when MAIL_DRIVER=smtp"
                )));
            }
        }

        Ok(())
    }
}

fn get_env(key: &str, default: Option<&str>, is_prod: bool) -> Result<String, AppError> {
    match env::var(key) {
        Ok(val) => Ok(val),
        Err(_) => {
            if is_prod {
                Err(AppError::ConfigError(anyhow::anyhow!(format!(
                    "{} is required in production but not set",
                    key
                ))))
            } else if let Some(def) = default {
                Ok(def.to_string())
            } else {
                Err(AppError::ConfigError(anyhow::anyhow!(format!(
                    "{} is required but not set",
                    key
                ))))
            }
        }
    }
}

impl std::str::FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "dev" => Ok(Environment::Dev),
            "prod" => Ok(Environment::Prod),
            _ => Err(format!("Invalid environment: {}", s)),
        }
    }
}

impl std::str::FromStr for MailDriver {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "smtp" => Ok(MailDriver::Smtp),
            "log" => Ok(MailDriver::Log),
            _ => Err(format!("Invalid mail driver: {}", s)),
        }
    }
}
