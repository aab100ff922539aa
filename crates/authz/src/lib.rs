//! Authentication for protected routes: a static API key, HS256 bearer
//! tokens, and the combined gate that accepts either.

pub mod errors;
pub mod gate;
pub mod token;

pub use errors::{AuthError, AuthFailure, AuthResult};
pub use gate::{AuthGate, Principal, API_KEY_HEADER};
pub use token::{IssuedToken, TokenClaims, TokenManager};
