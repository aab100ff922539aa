use thiserror::Error;

/// Reasons a credential check can fail.
///
/// The display strings are the client-facing details.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("API Key required")]
    MissingApiKey,

    #[error("Invalid API Key")]
    InvalidApiKey,

    #[error("Bearer token required")]
    MissingBearerToken,

    #[error("Could not validate credentials")]
    InvalidToken,

    #[error("Invalid authentication credentials. Provide either X-API-Key header or Bearer token.")]
    MissingCredentials,

    #[error("Incorrect username or password")]
    InvalidLogin,

    #[error("failed to sign access token")]
    TokenSigning(#[source] jsonwebtoken::errors::Error),
}

/// Coarse outcome class used to pick a response status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthFailure {
    Unauthenticated,
    Forbidden,
    Internal,
}

impl AuthError {
    pub fn failure(&self) -> AuthFailure {
        match self {
            AuthError::InvalidApiKey => AuthFailure::Forbidden,
            AuthError::TokenSigning(_) => AuthFailure::Internal,
            _ => AuthFailure::Unauthenticated,
        }
    }
}

pub type AuthResult<T> = Result<T, AuthError>;
