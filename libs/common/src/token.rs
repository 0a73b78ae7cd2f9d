//! JWT claim types and token verification
//!
//! The auth service signs tokens with its RS256 private key; every service
//! verifies them with the matching public key through [`TokenVerifier`].

use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::TokenError;

/// JWT claims structure
///
/// The role is not part of the token: it is resolved per request from the
/// user directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// User ID
    pub sub: Uuid,
    /// Verified email address
    pub email: String,
    /// Issued at time
    pub iat: u64,
    /// Expiration time
    pub exp: u64,
    /// Token type (access or refresh)
    pub token_type: TokenType,
    /// Unique token id, so two tokens minted in the same second differ
    pub jti: Uuid,
}

/// Token type enum
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub enum TokenType {
    /// Access token
    Access,
    /// Refresh token
    Refresh,
}

/// Load a PEM key from an environment variable
///
/// The variable holds either the PEM text itself or a path to a PEM file.
pub fn load_pem(var: &str) -> Result<String, TokenError> {
    let value =
        std::env::var(var).map_err(|_| TokenError::Key(format!("{} environment variable not set", var)))?;

    if value.starts_with("-----BEGIN") {
        return Ok(value);
    }

    std::fs::read_to_string(&value)
        .map(|pem| pem.trim().to_string())
        .map_err(|e| TokenError::Key(format!("Failed to read key file {}: {}", value, e)))
}

/// Verifies RS256 tokens issued by the auth service
#[derive(Clone)]
pub struct TokenVerifier {
    decoding_key: DecodingKey,
    validation: Validation,
}

impl TokenVerifier {
    /// Build a verifier from a PEM encoded RSA public key
    pub fn from_public_pem(public_key: &str) -> Result<Self, TokenError> {
        let decoding_key = DecodingKey::from_rsa_pem(public_key.as_bytes())
            .map_err(|e| TokenError::Key(format!("Invalid public key: {}", e)))?;
        let mut validation = Validation::new(Algorithm::RS256);
        validation.validate_exp = true;

        Ok(Self {
            decoding_key,
            validation,
        })
    }

    /// Build a verifier from `JWT_PUBLIC_KEY`
    pub fn from_env() -> Result<Self, TokenError> {
        Self::from_public_pem(&load_pem("JWT_PUBLIC_KEY")?)
    }

    /// Validate a token of any type and return the claims
    pub fn verify(&self, token: &str) -> Result<Claims, TokenError> {
        let token_data = decode::<Claims>(token, &self.decoding_key, &self.validation)?;
        Ok(token_data.claims)
    }

    /// Validate an access token
    pub fn verify_access(&self, token: &str) -> Result<Claims, TokenError> {
        self.verify_kind(token, TokenType::Access)
    }

    /// Validate a refresh token
    pub fn verify_refresh(&self, token: &str) -> Result<Claims, TokenError> {
        self.verify_kind(token, TokenType::Refresh)
    }

    fn verify_kind(&self, token: &str, expected: TokenType) -> Result<Claims, TokenError> {
        let claims = self.verify(token)?;
        if claims.token_type != expected {
            return Err(TokenError::WrongType);
        }
        Ok(claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{EncodingKey, Header, encode};
    use serial_test::serial;
    use std::time::{SystemTime, UNIX_EPOCH};

    const PRIVATE_KEY: &str = include_str!("../../../test-keys/jwt_private.pem");
    const PUBLIC_KEY: &str = include_str!("../../../test-keys/jwt_public.pem");

    fn now() -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_secs()
    }

    fn sign(token_type: TokenType, exp: u64) -> String {
        let claims = Claims {
            sub: Uuid::new_v4(),
            email: "ada@example.com".to_string(),
            iat: now(),
            exp,
            token_type,
            jti: Uuid::new_v4(),
        };
        let key = EncodingKey::from_rsa_pem(PRIVATE_KEY.as_bytes()).unwrap();
        encode(&Header::new(Algorithm::RS256), &claims, &key).unwrap()
    }

    #[test]
    fn test_verify_access_accepts_access_token() {
        let verifier = TokenVerifier::from_public_pem(PUBLIC_KEY).unwrap();
        let claims = verifier
            .verify_access(&sign(TokenType::Access, now() + 600))
            .unwrap();
        assert_eq!(claims.email, "ada@example.com");
    }

    #[test]
    fn test_verify_access_rejects_refresh_token() {
        let verifier = TokenVerifier::from_public_pem(PUBLIC_KEY).unwrap();
        let result = verifier.verify_access(&sign(TokenType::Refresh, now() + 600));
        assert!(matches!(result, Err(TokenError::WrongType)));
    }

    #[test]
    fn test_verify_rejects_expired_token() {
        let verifier = TokenVerifier::from_public_pem(PUBLIC_KEY).unwrap();
        let result = verifier.verify(&sign(TokenType::Access, now() - 3600));
        assert!(matches!(result, Err(TokenError::Invalid(_))));
    }

    #[test]
    fn test_verify_rejects_garbage() {
        let verifier = TokenVerifier::from_public_pem(PUBLIC_KEY).unwrap();
        assert!(verifier.verify("not.a.token").is_err());
    }

    #[test]
    #[serial]
    fn test_load_pem_accepts_inline_key() {
        unsafe {
            std::env::set_var("TEST_INLINE_PEM", PUBLIC_KEY);
        }
        assert_eq!(load_pem("TEST_INLINE_PEM").unwrap(), PUBLIC_KEY);
        unsafe {
            std::env::remove_var("TEST_INLINE_PEM");
        }
    }

    #[test]
    #[serial]
    fn test_load_pem_reports_missing_variable() {
        unsafe {
            std::env::remove_var("TEST_MISSING_PEM");
        }
        assert!(matches!(load_pem("TEST_MISSING_PEM"), Err(TokenError::Key(_))));
    }
}
