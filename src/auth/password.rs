//! Password hashing and verification using Argon2id

use crate::{
    config::{AppConfig, SecurityConfig},
    error::AppError,
};
use argon2::{
    password_hash::{
        rand_core::OsRng, PasswordHash, PasswordHasher as _, PasswordVerifier, SaltString,
    },
    Algorithm, Argon2, Params, Version,
};

/// Plaintext behind the dummy hash used to equalize timing for unknown accounts
const DUMMY_PASSWORD: &str = "lms-dummy-password-for-timing";

/// Password hasher with configurable cost parameters
pub struct PasswordHasher {
    argon2: Argon2<'static>,
    dummy_hash: String,
}

impl PasswordHasher {
    /// `memory_kib`, `iterations` and `parallelism` are the Argon2 m/t/p costs.
    pub fn from_params(memory_kib: u32, iterations: u32, parallelism: u32) -> Result<Self, AppError> {
        let params = Params::new(memory_kib, iterations, parallelism, None)
            .map_err(|e| AppError::Config(format!("Invalid Argon2 params: {}", e)))?;

        let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);
        let dummy_hash = hash_with(&argon2, DUMMY_PASSWORD)?;

        Ok(Self { argon2, dummy_hash })
    }

    pub fn from_config(config: &AppConfig) -> Result<Self, AppError> {
        let security = &config.security;
        Self::from_params(
            security.hash_memory_kib,
            security.hash_iterations,
            security.hash_parallelism,
        )
    }

    /// Hash a password. Failure here is fatal to the calling operation.
    pub fn hash(&self, password: &str) -> Result<String, AppError> {
        hash_with(&self.argon2, password)
    }

    /// Verify a password against a stored digest.
    ///
    /// A mismatch and an unparseable digest both yield `false`; the comparison
    /// itself is constant-time inside argon2.
    pub fn verify(&self, password: &str, hash: &str) -> bool {
        let parsed_hash = match PasswordHash::new(hash) {
            Ok(parsed) => parsed,
            Err(e) => {
                tracing::warn!(error = %e, "Stored password hash is malformed");
                return false;
            }
        };

        self.argon2
            .verify_password(password.as_bytes(), &parsed_hash)
            .is_ok()
    }

    /// Spend the same work as a real verification without a real account.
    pub fn dummy_verify(&self, password: &str) {
        let _ = self.verify(password, &self.dummy_hash);
    }
}

fn hash_with(argon2: &Argon2<'static>, password: &str) -> Result<String, AppError> {
    let salt = SaltString::generate(&mut OsRng);

    argon2
        .hash_password(password.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|e| {
            tracing::error!("Failed to hash password: {:?}", e);
            AppError::Internal(format!("Failed to hash password: {}", e))
        })
}

/// Check a candidate password against the configured policy
pub fn validate_password_policy(password: &str, policy: &SecurityConfig) -> Result<(), AppError> {
    if password.chars().count() < policy.password_min_length {
        return Err(AppError::field(
            "password",
            &format!(
                "Password must be at least {} characters",
                policy.password_min_length
            ),
        ));
    }

    if policy.password_require_uppercase && !password.chars().any(|c| c.is_uppercase()) {
        return Err(AppError::field(
            "password",
            "Password must contain at least one uppercase letter",
        ));
    }

    if policy.password_require_digit && !password.chars().any(|c| c.is_ascii_digit()) {
        return Err(AppError::field(
            "password",
            "Password must contain at least one digit",
        ));
    }

    if policy.password_require_special && password.chars().all(|c| c.is_alphanumeric()) {
        return Err(AppError::field(
            "password",
            "Password must contain at least one special character",
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fast_hasher() -> PasswordHasher {
        PasswordHasher::from_params(8, 1, 1).unwrap()
    }

    #[test]
    fn test_hash_and_verify() {
        let hasher = fast_hasher();
        let hash = hasher.hash("secret1").unwrap();

        assert!(hash.starts_with("$argon2id$"));
        assert!(hasher.verify("secret1", &hash));
        assert!(!hasher.verify("secret2", &hash));
    }

    #[test]
    fn test_hash_is_salted() {
        let hasher = fast_hasher();
        let hash1 = hasher.hash("secret1").unwrap();
        let hash2 = hasher.hash("secret1").unwrap();

        assert_ne!(hash1, hash2);
        assert!(hasher.verify("secret1", &hash1));
        assert!(hasher.verify("secret1", &hash2));
    }

    #[test]
    fn test_malformed_digest_is_negative_result() {
        let hasher = fast_hasher();
        assert!(!hasher.verify("secret1", "not-a-phc-string"));
        assert!(!hasher.verify("secret1", ""));
    }

    #[test]
    fn test_invalid_params_rejected() {
        assert!(PasswordHasher::from_params(8, 0, 1).is_err());
    }

    #[test]
    fn test_password_policy_validation() {
        let mut config = AppConfig::in_memory("unit-test-secret-key-with-at-least-32-chars");
        config.security.password_min_length = 8;
        config.security.password_require_uppercase = true;
        config.security.password_require_digit = true;
        let policy = &config.security;

        assert!(validate_password_policy("Test1234", policy).is_ok());
        assert!(validate_password_policy("Test1", policy).is_err());
        assert!(validate_password_policy("test1234", policy).is_err());
        assert!(validate_password_policy("Testtest", policy).is_err());

        config.security.password_require_special = true;
        assert!(validate_password_policy("Test1234", &config.security).is_err());
        assert!(validate_password_policy("Test123!", &config.security).is_ok());
    }

    #[test]
    fn test_policy_error_names_password_field() {
        let config = AppConfig::in_memory("unit-test-secret-key-with-at-least-32-chars");
        match validate_password_policy("abc", &config.security) {
            Err(AppError::Validation { field_errors, .. }) => {
                assert!(field_errors.contains_key("password"));
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }
}
