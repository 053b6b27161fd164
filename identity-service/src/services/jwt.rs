//! Token codec: signed, typed, expiring token strings.
//!
//! Each kind signs with its own secret, so kinds are never cross-verifiable
//! even though every payload shares the same claim shape.

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::{TokenKindConfig, TokensConfig};
use crate::models::TokenKind;
use crate::services::ServiceError;

/// Signed payload carried by every token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenClaims {
    /// Subject (user ID)
    pub sub: String,
    /// Token kind, also enforced by the per-kind secret
    pub kind: TokenKind,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
}

impl TokenClaims {
    /// The subject as a user id; `TokenMalformed` when absent or not a UUID.
    pub fn subject(&self) -> Result<Uuid, ServiceError> {
        Uuid::parse_str(&self.sub).map_err(|_| ServiceError::TokenMalformed)
    }
}

#[derive(Clone)]
pub struct TokenCodec {
    tokens: TokensConfig,
}

impl TokenCodec {
    pub fn new(tokens: TokensConfig) -> Self {
        Self { tokens }
    }

    /// Secret/expiry pair for a kind; a blank entry is a configuration error
    /// surfaced at first use.
    fn kind_config(&self, kind: TokenKind) -> Result<&TokenKindConfig, ServiceError> {
        let config = self.tokens.for_kind(kind);
        if config.secret.is_empty() {
            return Err(ServiceError::Configuration(format!(
                "no signing secret configured for {} tokens",
                kind
            )));
        }
        if config.expiry.is_empty() {
            return Err(ServiceError::Configuration(format!(
                "no expiry configured for {} tokens",
                kind
            )));
        }
        Ok(config)
    }

    /// Configured lifetime of a kind.
    pub fn lifetime(&self, kind: TokenKind) -> Result<Duration, ServiceError> {
        parse_expiry(&self.kind_config(kind)?.expiry)
    }

    pub fn issue(&self, kind: TokenKind, user_id: Uuid) -> Result<String, ServiceError> {
        let config = self.kind_config(kind)?;
        let now = Utc::now();
        let exp = now + parse_expiry(&config.expiry)?;

        let claims = TokenClaims {
            sub: user_id.to_string(),
            kind,
            iat: now.timestamp(),
            exp: exp.timestamp(),
        };

        encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(config.secret.as_bytes()),
        )
        .map_err(|e| ServiceError::Internal(anyhow::anyhow!("failed to encode token: {}", e)))
    }

    pub fn verify(&self, kind: TokenKind, token: &str) -> Result<TokenClaims, ServiceError> {
        let config = self.kind_config(kind)?;

        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        validation.leeway = 0;

        let data = decode::<TokenClaims>(
            token,
            &DecodingKey::from_secret(config.secret.as_bytes()),
            &validation,
        )
        .map_err(|e| match e.kind() {
            jsonwebtoken::errors::ErrorKind::ExpiredSignature => ServiceError::TokenExpired,
            jsonwebtoken::errors::ErrorKind::Json(_) => ServiceError::TokenMalformed,
            _ => ServiceError::TokenInvalid,
        })?;

        if data.claims.kind != kind {
            return Err(ServiceError::TokenInvalid);
        }
        if data.claims.sub.is_empty() {
            return Err(ServiceError::TokenMalformed);
        }

        Ok(data.claims)
    }
}

/// Parse an expiry duration string: `<integer><unit>` with unit s/m/h/d.
///
/// An unrecognized (or absent) unit counts as hours; a missing numeric value
/// is an error.
pub fn parse_expiry(expiry: &str) -> Result<Duration, ServiceError> {
    let expiry = expiry.trim();
    let Some(unit) = expiry.chars().last() else {
        return Err(ServiceError::Configuration(
            "empty expiry duration".to_string(),
        ));
    };

    let value: i64 = expiry[..expiry.len() - unit.len_utf8()]
        .parse()
        .map_err(|_| {
            ServiceError::Configuration(format!("invalid expiry duration '{}'", expiry))
        })?;

    Ok(match unit {
        's' => Duration::seconds(value),
        'm' => Duration::minutes(value),
        'h' => Duration::hours(value),
        'd' => Duration::days(value),
        _ => Duration::hours(value),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TokenKindConfig;

    fn test_tokens_config() -> TokensConfig {
        let kind = |secret: &str, expiry: &str| TokenKindConfig {
            secret: secret.to_string(),
            expiry: expiry.to_string(),
        };
        TokensConfig {
            access: kind("access-secret", "15m"),
            temp_access: kind("temp-access-secret", "15m"),
            refresh: kind("refresh-secret", "7d"),
            verify: kind("verify-secret", "1h"),
            reset: kind("reset-secret", "1h"),
        }
    }

    #[test]
    fn test_issue_and_verify_roundtrip() {
        let codec = TokenCodec::new(test_tokens_config());
        let user_id = Uuid::new_v4();

        for kind in [
            TokenKind::Access,
            TokenKind::Refresh,
            TokenKind::Verify,
            TokenKind::Reset,
            TokenKind::TempAccess,
        ] {
            let token = codec.issue(kind, user_id).expect("issue failed");
            let claims = codec.verify(kind, &token).expect("verify failed");
            assert_eq!(claims.subject().unwrap(), user_id);
            assert_eq!(claims.kind, kind);
        }
    }

    #[test]
    fn test_cross_kind_verification_always_fails() {
        let codec = TokenCodec::new(test_tokens_config());
        let token = codec.issue(TokenKind::Verify, Uuid::new_v4()).unwrap();

        let err = codec.verify(TokenKind::Access, &token).unwrap_err();
        assert!(matches!(err, ServiceError::TokenInvalid));
    }

    #[test]
    fn test_expired_token_is_rejected_as_expired() {
        let codec = TokenCodec::new(test_tokens_config());
        let now = Utc::now();
        let claims = TokenClaims {
            sub: Uuid::new_v4().to_string(),
            kind: TokenKind::Access,
            iat: now.timestamp() - 120,
            exp: now.timestamp() - 60,
        };
        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(b"access-secret"),
        )
        .unwrap();

        let err = codec.verify(TokenKind::Access, &token).unwrap_err();
        assert!(matches!(err, ServiceError::TokenExpired));
    }

    #[test]
    fn test_garbage_token_is_invalid() {
        let codec = TokenCodec::new(test_tokens_config());
        let err = codec
            .verify(TokenKind::Access, "not-even-a-token")
            .unwrap_err();
        assert!(matches!(err, ServiceError::TokenInvalid));
    }

    #[test]
    fn test_missing_secret_is_a_configuration_error() {
        let mut config = test_tokens_config();
        config.reset.secret = String::new();
        let codec = TokenCodec::new(config);

        let err = codec.issue(TokenKind::Reset, Uuid::new_v4()).unwrap_err();
        assert!(matches!(err, ServiceError::Configuration(_)));
    }

    #[test]
    fn test_parse_expiry_units() {
        assert_eq!(parse_expiry("30s").unwrap(), Duration::seconds(30));
        assert_eq!(parse_expiry("15m").unwrap(), Duration::minutes(15));
        assert_eq!(parse_expiry("2h").unwrap(), Duration::hours(2));
        assert_eq!(parse_expiry("7d").unwrap(), Duration::days(7));
    }

    #[test]
    fn test_parse_expiry_unknown_unit_counts_as_hours() {
        assert_eq!(parse_expiry("3x").unwrap(), Duration::hours(3));
        // A bare number loses its last digit to the unit position.
        assert_eq!(parse_expiry("15").unwrap(), Duration::hours(1));
    }

    #[test]
    fn test_parse_expiry_missing_value_is_an_error() {
        assert!(parse_expiry("m").is_err());
        assert!(parse_expiry("").is_err());
        assert!(parse_expiry("abc-m").is_err());
    }
}
