// Password hashing and verification utilities using Argon2
// Argon2id with OWASP-recommended parameters, plus the password strength policy

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Algorithm, Argon2, Params, Version,
};
use thiserror::Error;

use crate::app_config::SecuritySettings;

/// Errors that can occur during password operations
#[derive(Error, Debug)]
pub enum PasswordError {
    #[error("Failed to hash password: {0}")]
    HashingError(String),

    #[error("Failed to verify password: {0}")]
    VerificationError(String),

    #[error("Invalid password hash format")]
    InvalidHashFormat,
}

/// Configuration for Argon2 password hashing
pub struct PasswordConfig {
    /// Memory cost in KiB (default: 19456 = 19 MiB)
    pub memory_cost: u32,
    /// Time cost (iterations, default: 2)
    pub time_cost: u32,
    /// Parallelism factor (default: 1)
    pub parallelism: u32,
    /// Output hash length in bytes (default: 32)
    pub output_length: usize,
}

impl Default for PasswordConfig {
    fn default() -> Self {
        // OWASP recommended minimum parameters for Argon2id
        Self {
            memory_cost: 19456,
            time_cost: 2,
            parallelism: 1,
            output_length: 32,
        }
    }
}

impl PasswordConfig {
    fn build_hasher(&self) -> Result<Argon2<'static>, PasswordError> {
        let params = Params::new(
            self.memory_cost,
            self.time_cost,
            self.parallelism,
            Some(self.output_length),
        )
        .map_err(|e| PasswordError::HashingError(e.to_string()))?;

        Ok(Argon2::new(Algorithm::Argon2id, Version::V0x13, params))
    }
}

/// Hash a password using Argon2id with secure defaults
pub fn hash_password(password: &str) -> Result<String, PasswordError> {
    hash_password_with_config(password, &PasswordConfig::default())
}

/// Hash a password using Argon2id with custom configuration
pub fn hash_password_with_config(
    password: &str,
    config: &PasswordConfig,
) -> Result<String, PasswordError> {
    let argon2 = config.build_hasher()?;
    let salt = SaltString::generate(&mut OsRng);

    let password_hash = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| PasswordError::HashingError(e.to_string()))?;

    Ok(password_hash.to_string())
}

/// Verify a password against a hashed password in PHC string format
pub fn verify_password(password: &str, hash: &str) -> Result<bool, PasswordError> {
    let parsed_hash = PasswordHash::new(hash).map_err(|_| PasswordError::InvalidHashFormat)?;

    let argon2 = Argon2::default();

    match argon2.verify_password(password.as_bytes(), &parsed_hash) {
        Ok(()) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(e) => Err(PasswordError::VerificationError(e.to_string())),
    }
}

/// Passwords too common to accept regardless of character classes
const COMMON_PASSWORDS: &[&str] = &[
    "password",
    "123456",
    "qwerty",
    "abc123",
    "password123",
    "admin",
    "user",
    "test",
    "111111",
    "000000",
];

/// Validate a password against the configured strength policy.
/// Returns a human-readable reason on rejection.
pub fn validate_password_strength(
    password: &str,
    settings: &SecuritySettings,
) -> Result<(), String> {
    if password.len() < settings.password_min_length {
        return Err(format!(
            "Password must be at least {} characters long",
            settings.password_min_length
        ));
    }

    if !settings.require_strong_password {
        return Ok(());
    }

    let has_upper = password.chars().any(|c| c.is_ascii_uppercase());
    let has_lower = password.chars().any(|c| c.is_ascii_lowercase());
    let has_digit = password.chars().any(|c| c.is_ascii_digit());
    let has_special = password
        .chars()
        .any(|c| "!@#$%^&*(),.?\":{}|<>".contains(c));

    let mut missing = Vec::new();
    if !has_upper {
        missing.push("uppercase letters");
    }
    if !has_lower {
        missing.push("lowercase letters");
    }
    if !has_digit {
        missing.push("digits");
    }
    if !has_special {
        missing.push("special characters");
    }

    if !missing.is_empty() {
        return Err(format!("Password must contain: {}", missing.join(", ")));
    }

    if COMMON_PASSWORDS.contains(&password.to_lowercase().as_str()) {
        return Err("Password is too common, please choose a stronger one".to_string());
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fast_config() -> PasswordConfig {
        PasswordConfig {
            memory_cost: 4096, // Lower for testing
            time_cost: 1,
            parallelism: 1,
            output_length: 32,
        }
    }

    #[test]
    fn test_hash_and_verify_password() {
        let password = "MySecureP@ssw0rd123!";

        let hash =
            hash_password_with_config(password, &fast_config()).expect("Failed to hash password");

        assert!(hash.starts_with("$argon2id$"));
        assert!(verify_password(password, &hash).expect("Failed to verify password"));
        assert!(!verify_password("WrongPassword", &hash).expect("Failed to verify password"));
    }

    #[test]
    fn test_different_hashes_for_same_password() {
        let password = "TestPassword123!";

        let hash1 = hash_password_with_config(password, &fast_config()).expect("Failed to hash");
        let hash2 = hash_password_with_config(password, &fast_config()).expect("Failed to hash");

        // Same password should produce different hashes (random salt)
        assert_ne!(hash1, hash2);

        assert!(verify_password(password, &hash1).expect("Failed to verify"));
        assert!(verify_password(password, &hash2).expect("Failed to verify"));
    }

    #[test]
    fn test_invalid_hash_format() {
        let result = verify_password("password", "not_a_valid_hash");
        assert!(matches!(result, Err(PasswordError::InvalidHashFormat)));
    }

    #[test]
    fn test_password_strength_policy() {
        let settings = SecuritySettings::default();

        assert!(validate_password_strength("Str0ng!Pass", &settings).is_ok());

        // Too short
        assert!(validate_password_strength("Ab1!", &settings).is_err());

        // Missing classes
        let err = validate_password_strength("alllowercase1!", &settings).unwrap_err();
        assert!(err.contains("uppercase"));

        let err = validate_password_strength("NoDigitsHere!", &settings).unwrap_err();
        assert!(err.contains("digits"));

        let mut relaxed = settings.clone();
        relaxed.require_strong_password = false;
        assert!(validate_password_strength("longenough", &relaxed).is_ok());
    }

    #[test]
    fn test_common_password_rejected() {
        let settings = SecuritySettings {
            password_min_length: 6,
            require_strong_password: false,
            ..Default::default()
        };
        let err = validate_password_strength("123456", &settings);
        assert!(err.is_ok(), "relaxed mode skips the blacklist");

        let strict = SecuritySettings {
            password_min_length: 6,
            ..Default::default()
        };
        let err = validate_password_strength("123456", &strict).unwrap_err();
        assert!(err.contains("must contain"));
    }
}
