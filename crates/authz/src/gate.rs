use axum::http::{header::AUTHORIZATION, HeaderMap};
use subtle::ConstantTimeEq;

use bookshelf_kernel::settings::AuthSettings;

use crate::errors::{AuthError, AuthResult};
use crate::token::{IssuedToken, TokenClaims, TokenManager};

/// Header carrying the static API key.
pub const API_KEY_HEADER: &str = "x-api-key";

/// The single login accepted by the token endpoint.
pub const DEMO_USERNAME: &str = "admin";
pub const DEMO_PASSWORD: &str = "admin";

/// Who got through the gate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Principal {
    ApiKey,
    Token { subject: String },
}

impl Principal {
    pub fn scheme(&self) -> &'static str {
        match self {
            Principal::ApiKey => "api_key",
            Principal::Token { .. } => "bearer",
        }
    }
}

/// Decides whether a request carries acceptable credentials.
pub struct AuthGate {
    api_key: Option<String>,
    tokens: TokenManager,
}

impl AuthGate {
    /// An empty `api_key` disables the static key scheme.
    pub fn new(api_key: impl Into<String>, tokens: TokenManager) -> Self {
        let api_key = api_key.into();
        Self {
            api_key: (!api_key.is_empty()).then_some(api_key),
            tokens,
        }
    }

    pub fn from_settings(settings: &AuthSettings) -> Self {
        Self::new(
            settings.api_key.clone(),
            TokenManager::from_settings(settings),
        )
    }

    /// Static key scheme evaluated on its own: missing is 401, wrong is 403.
    pub fn verify_api_key(&self, headers: &HeaderMap) -> AuthResult<Principal> {
        let presented = presented_api_key(headers).ok_or(AuthError::MissingApiKey)?;
        if self.key_matches(presented) {
            Ok(Principal::ApiKey)
        } else {
            Err(AuthError::InvalidApiKey)
        }
    }

    /// Bearer scheme evaluated on its own. Bad or expired tokens are 401,
    /// never 403.
    pub fn verify_bearer(&self, headers: &HeaderMap) -> AuthResult<TokenClaims> {
        let token = bearer_token(headers).ok_or(AuthError::MissingBearerToken)?;
        self.tokens.verify(token)
    }

    /// Combined gate used by protected routes.
    ///
    /// A matching key wins. A missing or wrong key falls through to the
    /// bearer check; if that fails too the request is unauthenticated.
    pub fn authenticate(&self, headers: &HeaderMap) -> AuthResult<Principal> {
        if let Some(presented) = presented_api_key(headers) {
            if self.key_matches(presented) {
                return Ok(Principal::ApiKey);
            }
            tracing::debug!(target: "bookshelf-authz", "api key mismatch, trying bearer token");
        }

        if let Some(token) = bearer_token(headers) {
            if let Ok(claims) = self.tokens.verify(token) {
                return Ok(Principal::Token {
                    subject: claims.sub,
                });
            }
        }

        Err(AuthError::MissingCredentials)
    }

    /// Exchange the demo login for a signed token.
    pub fn issue_token(&self, username: &str, password: &str) -> AuthResult<IssuedToken> {
        let user_ok: bool = username.as_bytes().ct_eq(DEMO_USERNAME.as_bytes()).into();
        let pass_ok: bool = password.as_bytes().ct_eq(DEMO_PASSWORD.as_bytes()).into();
        if !(user_ok && pass_ok) {
            return Err(AuthError::InvalidLogin);
        }

        self.tokens.issue(username)
    }

    fn key_matches(&self, presented: &[u8]) -> bool {
        match &self.api_key {
            Some(expected) => presented.ct_eq(expected.as_bytes()).into(),
            None => false,
        }
    }
}

fn presented_api_key(headers: &HeaderMap) -> Option<&[u8]> {
    headers
        .get(API_KEY_HEADER)
        .map(|value| value.as_bytes())
        .filter(|value| !value.is_empty())
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}
