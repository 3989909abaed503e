//! JWT token handling

use chrono::Duration;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use std::sync::Arc;

use super::models::{Claims, Role, RESET_TOKEN_TYPE};
use crate::clock::{Clock, SystemClock};

/// Reset tokens live for a fixed ten minutes regardless of configuration
pub const RESET_TOKEN_TTL_SECS: i64 = 10 * 60;

/// Default access token lifetime (one day)
pub const DEFAULT_ACCESS_TTL_SECS: i64 = 24 * 3600;

/// Longest accepted access token lifetime (one year)
pub const MAX_ACCESS_TTL_SECS: i64 = 365 * 24 * 3600;

#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    #[error("Token has expired")]
    Expired,

    #[error("Invalid token: {0}")]
    Invalid(String),

    #[error("Wrong token type")]
    WrongType,

    #[error("Failed to sign token: {0}")]
    Signing(String),
}

/// JWT configuration
#[derive(Clone)]
pub struct JwtConfig {
    secret: String,
    access_ttl_secs: i64,
}

impl JwtConfig {
    pub fn new(secret: String, access_ttl_secs: i64) -> Self {
        Self {
            secret,
            access_ttl_secs,
        }
    }

    pub fn access_ttl_secs(&self) -> i64 {
        self.access_ttl_secs
    }
}

impl std::fmt::Debug for JwtConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtConfig")
            .field("secret", &"<redacted>")
            .field("access_ttl_secs", &self.access_ttl_secs)
            .finish()
    }
}

/// Signs and verifies access and reset tokens (HS256)
#[derive(Clone)]
pub struct TokenIssuer {
    config: JwtConfig,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    clock: Arc<dyn Clock>,
}

impl TokenIssuer {
    pub fn new(config: JwtConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    pub fn with_clock(config: JwtConfig, clock: Arc<dyn Clock>) -> Self {
        let encoding_key = EncodingKey::from_secret(config.secret.as_bytes());
        let decoding_key = DecodingKey::from_secret(config.secret.as_bytes());
        Self {
            config,
            encoding_key,
            decoding_key,
            clock,
        }
    }

    /// Create an access token for a user
    pub fn issue_access(
        &self,
        user_id: &str,
        role: Role,
        display_name: &str,
    ) -> Result<String, TokenError> {
        let claims = Claims {
            sub: user_id.to_string(),
            role: Some(role),
            name: Some(display_name.to_string()),
            token_type: None,
            exp: 0,
            iat: 0,
        };
        self.sign(claims, self.config.access_ttl_secs)
    }

    /// Create a single-purpose password reset token
    pub fn issue_reset(&self, user_id: &str) -> Result<String, TokenError> {
        let claims = Claims {
            sub: user_id.to_string(),
            role: None,
            name: None,
            token_type: Some(RESET_TOKEN_TYPE.to_string()),
            exp: 0,
            iat: 0,
        };
        self.sign(claims, RESET_TOKEN_TTL_SECS)
    }

    fn sign(&self, mut claims: Claims, ttl_secs: i64) -> Result<String, TokenError> {
        let now = self.clock.now();
        claims.iat = now.timestamp();
        let exp = Duration::try_seconds(ttl_secs)
            .and_then(|ttl| now.checked_add_signed(ttl))
            .ok_or_else(|| {
                TokenError::Signing(format!("token lifetime {ttl_secs}s is out of range"))
            })?;
        claims.exp = exp.timestamp();

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| TokenError::Signing(e.to_string()))
    }

    /// Verify signature and expiry, returning the claims of any token type
    pub fn verify(&self, token: &str) -> Result<Claims, TokenError> {
        let mut validation = Validation::new(Algorithm::HS256);
        // Expiry is checked against the injected clock below
        validation.validate_exp = false;
        validation.leeway = 0;

        let data = decode::<Claims>(token, &self.decoding_key, &validation)
            .map_err(|e| TokenError::Invalid(e.to_string()))?;

        if data.claims.exp <= self.clock.now().timestamp() {
            return Err(TokenError::Expired);
        }
        Ok(data.claims)
    }

    /// Verify a token that must carry `type=reset`; returns the user id
    pub fn verify_reset(&self, token: &str) -> Result<String, TokenError> {
        let claims = self.verify(token)?;
        if !claims.is_reset() {
            return Err(TokenError::WrongType);
        }
        Ok(claims.sub)
    }

    /// Verify an access token; reset tokens carry no role and are refused
    pub fn verify_access(&self, token: &str) -> Result<Claims, TokenError> {
        let claims = self.verify(token)?;
        if claims.token_type.is_some() || claims.role.is_none() {
            return Err(TokenError::WrongType);
        }
        Ok(claims)
    }
}
