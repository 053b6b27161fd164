use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};

/// Newtype for a plaintext password to prevent accidental logging
#[derive(Debug, Clone)]
pub struct Password(String);

impl Password {
    pub fn new(password: String) -> Self {
        Self(password)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Newtype for a stored password digest
#[derive(Debug, Clone)]
pub struct PasswordDigest(String);

impl PasswordDigest {
    pub fn new(digest: String) -> Self {
        Self(digest)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

/// Hash a password using Argon2id with a generated salt.
pub fn hash_password(password: &Password) -> Result<PasswordDigest, anyhow::Error> {
    let argon2 = Argon2::default();
    let salt = SaltString::generate(&mut OsRng);

    let digest = argon2
        .hash_password(password.as_str().as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("Failed to hash password: {}", e))?
        .to_string();

    Ok(PasswordDigest::new(digest))
}

/// Check a password against a stored digest.
///
/// `Ok(false)` on mismatch; `Err` only when the digest itself is not a
/// parseable hash (e.g. the empty digest of an OAuth-created account).
pub fn verify_password(
    password: &Password,
    digest: &PasswordDigest,
) -> Result<bool, anyhow::Error> {
    let parsed_hash = PasswordHash::new(digest.as_str())
        .map_err(|e| anyhow::anyhow!("Invalid password digest format: {}", e))?;

    match Argon2::default().verify_password(password.as_str().as_bytes(), &parsed_hash) {
        Ok(()) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(e) => Err(anyhow::anyhow!("Password verification failed: {}", e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_and_verify() {
        let password = Password::new("mySecurePassword123".to_string());
        let digest = hash_password(&password).expect("Failed to hash password");

        assert!(digest.as_str().starts_with("$argon2"));
        assert!(verify_password(&password, &digest).unwrap());
    }

    #[test]
    fn test_wrong_password_is_rejected() {
        let password = Password::new("mySecurePassword123".to_string());
        let digest = hash_password(&password).expect("Failed to hash password");

        let wrong = Password::new("wrongPassword".to_string());
        assert!(!verify_password(&wrong, &digest).unwrap());
    }

    #[test]
    fn test_empty_digest_is_unusable() {
        let password = Password::new("anything-at-all".to_string());
        assert!(verify_password(&password, &PasswordDigest::new(String::new())).is_err());
    }

    #[test]
    fn test_same_password_hashes_differently() {
        let password = Password::new("mySecurePassword123".to_string());
        let a = hash_password(&password).unwrap();
        let b = hash_password(&password).unwrap();

        assert_ne!(a.as_str(), b.as_str());
        assert!(verify_password(&password, &a).unwrap());
        assert!(verify_password(&password, &b).unwrap());
    }
}
