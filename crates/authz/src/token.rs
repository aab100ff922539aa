//! Signed bearer tokens.
//!
//! Tokens are HS256 JWTs carrying `sub`, `iat` and `exp`. Nothing is stored
//! server-side: a token is valid exactly when its signature checks out under
//! the configured secret and `exp` has not passed.

use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use time::{Duration, OffsetDateTime};

use bookshelf_kernel::settings::AuthSettings;

use crate::errors::{AuthError, AuthResult};

pub const TOKEN_TYPE: &str = "bearer";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TokenClaims {
    /// Subject (username)
    pub sub: String,
    /// Issued at (Unix seconds)
    pub iat: i64,
    /// Expiry (Unix seconds)
    pub exp: i64,
}

/// Response body of a successful login.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IssuedToken {
    pub access_token: String,
    pub token_type: String,
    /// Lifetime in seconds.
    pub expires_in: i64,
}

#[derive(Clone)]
pub struct TokenManager {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    ttl: Duration,
}

impl TokenManager {
    pub fn new(secret: &str, ttl: Duration) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;

        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
            ttl,
        }
    }

    pub fn from_settings(settings: &AuthSettings) -> Self {
        Self::new(
            &settings.secret_key,
            Duration::minutes(i64::from(settings.token_ttl_minutes)),
        )
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Sign a fresh token for `subject`, expiring one TTL from now.
    pub fn issue(&self, subject: &str) -> AuthResult<IssuedToken> {
        let now = OffsetDateTime::now_utc();
        let claims = TokenClaims {
            sub: subject.to_string(),
            iat: now.unix_timestamp(),
            exp: (now + self.ttl).unix_timestamp(),
        };

        let access_token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(AuthError::TokenSigning)?;

        Ok(IssuedToken {
            access_token,
            token_type: TOKEN_TYPE.to_string(),
            expires_in: self.ttl.whole_seconds(),
        })
    }

    /// Check signature and expiry. Every failure collapses to
    /// [`AuthError::InvalidToken`].
    pub fn verify(&self, token: &str) -> AuthResult<TokenClaims> {
        decode::<TokenClaims>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| {
                tracing::debug!(target: "bookshelf-authz", reason = ?e.kind(), "token rejected");
                AuthError::InvalidToken
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager(secret: &str) -> TokenManager {
        TokenManager::new(secret, Duration::minutes(30))
    }

    #[test]
    fn test_issued_token_verifies() {
        let tokens = manager("test-secret");
        let issued = tokens.issue("admin").unwrap();

        assert_eq!(issued.token_type, "bearer");
        assert_eq!(issued.expires_in, 1800);
        assert_eq!(issued.access_token.split('.').count(), 3);

        let claims = tokens.verify(&issued.access_token).unwrap();
        assert_eq!(claims.sub, "admin");
        assert_eq!(claims.exp - claims.iat, 1800);
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let issued = manager("secret-one").issue("admin").unwrap();
        let result = manager("secret-two").verify(&issued.access_token);
        assert!(matches!(result, Err(AuthError::InvalidToken)));
    }

    #[test]
    fn test_expired_token_rejected() {
        let expired = TokenManager::new("test-secret", Duration::minutes(-5));
        let issued = expired.issue("admin").unwrap();

        let result = manager("test-secret").verify(&issued.access_token);
        assert!(matches!(result, Err(AuthError::InvalidToken)));
    }

    #[test]
    fn test_garbage_rejected() {
        let result = manager("test-secret").verify("not.a.token");
        assert!(matches!(result, Err(AuthError::InvalidToken)));
    }

    #[test]
    fn test_ttl_follows_settings() {
        let settings = AuthSettings {
            token_ttl_minutes: 5,
            ..AuthSettings::default()
        };
        assert_eq!(TokenManager::from_settings(&settings).ttl(), Duration::minutes(5));
    }
}
