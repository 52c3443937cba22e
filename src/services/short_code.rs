// Short code generation
// Random alphanumeric codes with a uniqueness retry loop against the links
// table; custom aliases are validated and checked for collisions.

use diesel_async::AsyncPgConnection;
use rand::Rng;
use thiserror::Error;
use tracing::warn;

use crate::models::link::{Link, CUSTOM_ALIAS_REGEX};

/// Alphabet for generated codes: a-z, A-Z, 0-9
const CODE_ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Default generated code length
pub const DEFAULT_CODE_LENGTH: usize = 6;

/// Retries before giving up on finding a free code
const MAX_GENERATION_ATTEMPTS: usize = 10;

#[derive(Debug, Error)]
pub enum ShortCodeError {
    #[error("Database error: {0}")]
    DatabaseError(#[from] diesel::result::Error),

    #[error("Could not generate a unique short code after {0} attempts")]
    Exhausted(usize),

    #[error("Invalid custom alias: {0}")]
    InvalidCustomAlias(String),

    #[error("Alias already exists")]
    AliasAlreadyExists,
}

pub struct ShortCodeGenerator {
    length: usize,
}

impl Default for ShortCodeGenerator {
    fn default() -> Self {
        Self {
            length: DEFAULT_CODE_LENGTH,
        }
    }
}

impl ShortCodeGenerator {
    pub fn with_length(length: usize) -> Self {
        Self { length }
    }

    /// One random candidate code
    pub fn random_code(&self) -> String {
        let mut rng = rand::thread_rng();
        (0..self.length)
            .map(|_| {
                let idx = rng.gen_range(0..CODE_ALPHABET.len());
                CODE_ALPHABET[idx] as char
            })
            .collect()
    }

    /// Generate a code not present in the links table
    pub async fn generate_unique_code(
        &self,
        conn: &mut AsyncPgConnection,
    ) -> Result<String, ShortCodeError> {
        for attempt in 0..MAX_GENERATION_ATTEMPTS {
            let code = self.random_code();
            if !Link::code_exists(conn, &code).await? {
                return Ok(code);
            }
            warn!(
                "Short code collision on attempt {}: {}",
                attempt + 1,
                code
            );
        }
        Err(ShortCodeError::Exhausted(MAX_GENERATION_ATTEMPTS))
    }

    /// Validate a custom alias and check it is free
    pub async fn validate_custom_alias(
        conn: &mut AsyncPgConnection,
        alias: &str,
    ) -> Result<(), ShortCodeError> {
        if alias.len() < 3 || alias.len() > 50 {
            return Err(ShortCodeError::InvalidCustomAlias(
                "Custom alias must be 3-50 characters".to_string(),
            ));
        }

        if !CUSTOM_ALIAS_REGEX.is_match(alias) {
            return Err(ShortCodeError::InvalidCustomAlias(
                "Custom alias can only contain letters, numbers, hyphens, and underscores"
                    .to_string(),
            ));
        }

        if Link::code_exists(conn, alias).await? {
            return Err(ShortCodeError::AliasAlreadyExists);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_random_code_length_and_charset() {
        let generator = ShortCodeGenerator::default();
        let code = generator.random_code();
        assert_eq!(code.len(), DEFAULT_CODE_LENGTH);
        assert!(code.bytes().all(|b| CODE_ALPHABET.contains(&b)));
    }

    #[test]
    fn test_custom_length() {
        let generator = ShortCodeGenerator::with_length(10);
        assert_eq!(generator.random_code().len(), 10);
    }

    #[test]
    fn test_codes_vary() {
        let generator = ShortCodeGenerator::default();
        let codes: std::collections::HashSet<String> =
            (0..50).map(|_| generator.random_code()).collect();
        // 50 random 6-char codes colliding down to a handful would mean a
        // broken RNG
        assert!(codes.len() > 40);
    }
}
