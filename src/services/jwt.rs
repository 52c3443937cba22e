// JWT issue and validation service
// Separate HS256 secrets for access and refresh tokens; permissions ride
// in the access token's scope claim

use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::app_config::AppConfig;
use crate::models::user::User;

#[derive(Debug, Error)]
pub enum JwtError {
    #[error("Token has expired")]
    Expired,

    #[error("Invalid token: {0}")]
    Invalid(String),

    #[error("Wrong token type, expected {expected}")]
    WrongTokenType { expected: &'static str },
}

/// Claims carried by an access token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessTokenClaims {
    /// User ID
    pub sub: String,
    pub username: String,
    pub is_admin: bool,
    /// Permission names resolved at login
    pub scope: Vec<String>,
    /// Token ID
    pub jti: String,
    pub iat: u64,
    pub exp: u64,
    pub iss: String,
    pub aud: String,
    pub token_type: String,
}

/// Claims carried by a refresh token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshTokenClaims {
    pub sub: String,
    pub username: String,
    pub jti: String,
    pub iat: u64,
    pub exp: u64,
    pub iss: String,
    pub aud: String,
    pub token_type: String,
}

/// Access + refresh token pair returned at login
#[derive(Debug, Clone, Serialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    pub expires_in: u64,
}

pub struct JwtService {
    access_encoding: EncodingKey,
    access_decoding: DecodingKey,
    refresh_encoding: EncodingKey,
    refresh_decoding: DecodingKey,
    access_expiry: u64,
    refresh_expiry: u64,
    issuer: String,
    audience: String,
}

impl JwtService {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            access_encoding: EncodingKey::from_secret(config.jwt_access_secret.as_bytes()),
            access_decoding: DecodingKey::from_secret(config.jwt_access_secret.as_bytes()),
            refresh_encoding: EncodingKey::from_secret(config.jwt_refresh_secret.as_bytes()),
            refresh_decoding: DecodingKey::from_secret(config.jwt_refresh_secret.as_bytes()),
            access_expiry: config.jwt_access_expiry,
            refresh_expiry: config.jwt_refresh_expiry,
            issuer: config.jwt_issuer.clone(),
            audience: config.jwt_audience.clone(),
        }
    }

    fn now() -> u64 {
        chrono::Utc::now().timestamp() as u64
    }

    /// Issue an access + refresh token pair for a user
    pub fn issue_token_pair(
        &self,
        user: &User,
        permissions: Vec<String>,
    ) -> Result<TokenPair, JwtError> {
        let now = Self::now();

        let access_claims = AccessTokenClaims {
            sub: user.id.to_string(),
            username: user.username.clone(),
            is_admin: user.is_admin,
            scope: permissions,
            jti: Uuid::new_v4().to_string(),
            iat: now,
            exp: now + self.access_expiry,
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
            token_type: "access".to_string(),
        };

        let refresh_claims = RefreshTokenClaims {
            sub: user.id.to_string(),
            username: user.username.clone(),
            jti: Uuid::new_v4().to_string(),
            iat: now,
            exp: now + self.refresh_expiry,
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
            token_type: "refresh".to_string(),
        };

        let access_token = encode(&Header::default(), &access_claims, &self.access_encoding)
            .map_err(|e| JwtError::Invalid(e.to_string()))?;
        let refresh_token = encode(&Header::default(), &refresh_claims, &self.refresh_encoding)
            .map_err(|e| JwtError::Invalid(e.to_string()))?;

        Ok(TokenPair {
            access_token,
            refresh_token,
            token_type: "Bearer".to_string(),
            expires_in: self.access_expiry,
        })
    }

    /// Issue a fresh access token from validated refresh claims
    pub fn issue_access_token(
        &self,
        user: &User,
        permissions: Vec<String>,
    ) -> Result<(String, u64), JwtError> {
        let now = Self::now();

        let claims = AccessTokenClaims {
            sub: user.id.to_string(),
            username: user.username.clone(),
            is_admin: user.is_admin,
            scope: permissions,
            jti: Uuid::new_v4().to_string(),
            iat: now,
            exp: now + self.access_expiry,
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
            token_type: "access".to_string(),
        };

        let token = encode(&Header::default(), &claims, &self.access_encoding)
            .map_err(|e| JwtError::Invalid(e.to_string()))?;
        Ok((token, self.access_expiry))
    }

    fn validation(&self) -> Validation {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[self.issuer.clone()]);
        validation.set_audience(&[self.audience.clone()]);
        validation
    }

    pub fn validate_access_token(&self, token: &str) -> Result<AccessTokenClaims, JwtError> {
        let data = decode::<AccessTokenClaims>(token, &self.access_decoding, &self.validation())
            .map_err(map_jwt_error)?;

        if data.claims.token_type != "access" {
            return Err(JwtError::WrongTokenType { expected: "access" });
        }

        Ok(data.claims)
    }

    pub fn validate_refresh_token(&self, token: &str) -> Result<RefreshTokenClaims, JwtError> {
        let data = decode::<RefreshTokenClaims>(token, &self.refresh_decoding, &self.validation())
            .map_err(map_jwt_error)?;

        if data.claims.token_type != "refresh" {
            return Err(JwtError::WrongTokenType {
                expected: "refresh",
            });
        }

        Ok(data.claims)
    }
}

fn map_jwt_error(error: jsonwebtoken::errors::Error) -> JwtError {
    match error.kind() {
        jsonwebtoken::errors::ErrorKind::ExpiredSignature => JwtError::Expired,
        _ => JwtError::Invalid(error.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn test_service() -> JwtService {
        JwtService {
            access_encoding: EncodingKey::from_secret(b"test-access-secret-32-bytes-long!!"),
            access_decoding: DecodingKey::from_secret(b"test-access-secret-32-bytes-long!!"),
            refresh_encoding: EncodingKey::from_secret(b"test-refresh-secret-32-bytes-long!"),
            refresh_decoding: DecodingKey::from_secret(b"test-refresh-secret-32-bytes-long!"),
            access_expiry: 3600,
            refresh_expiry: 86400,
            issuer: "rfah.me".to_string(),
            audience: "rfah.me".to_string(),
        }
    }

    fn test_user() -> User {
        let now = Utc::now();
        User {
            id: Uuid::new_v4(),
            username: "tester".to_string(),
            email: "tester@example.com".to_string(),
            password_hash: "hash".to_string(),
            full_name: "Test User".to_string(),
            phone: None,
            department: None,
            position: None,
            is_admin: false,
            is_active: true,
            role_id: None,
            last_login_at: None,
            deleted_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_issue_and_validate_pair() {
        let service = test_service();
        let user = test_user();

        let pair = service
            .issue_token_pair(&user, vec!["urls.create".to_string()])
            .expect("Failed to issue tokens");

        let access = service
            .validate_access_token(&pair.access_token)
            .expect("Access token should validate");
        assert_eq!(access.sub, user.id.to_string());
        assert_eq!(access.username, "tester");
        assert_eq!(access.scope, vec!["urls.create".to_string()]);
        assert_eq!(access.token_type, "access");

        let refresh = service
            .validate_refresh_token(&pair.refresh_token)
            .expect("Refresh token should validate");
        assert_eq!(refresh.sub, user.id.to_string());
        assert_eq!(refresh.token_type, "refresh");
    }

    #[test]
    fn test_tokens_not_interchangeable() {
        let service = test_service();
        let user = test_user();
        let pair = service.issue_token_pair(&user, vec![]).unwrap();

        // Access token is signed with the access secret; refresh validation
        // must reject it
        assert!(service.validate_refresh_token(&pair.access_token).is_err());
        assert!(service.validate_access_token(&pair.refresh_token).is_err());
    }

    #[test]
    fn test_garbage_token_rejected() {
        let service = test_service();
        assert!(matches!(
            service.validate_access_token("not-a-jwt"),
            Err(JwtError::Invalid(_))
        ));
    }
}
