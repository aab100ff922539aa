//! Authentication stage for protected routes.

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    middleware::{self, Next},
    response::Response,
    routing::MethodRouter,
};

use bookshelf_authz::AuthGate;

use crate::error::AppError;

/// Require the combined gate (API key or bearer token) in front of
/// `method_router`. The accepted [`bookshelf_authz::Principal`] is stored in
/// the request extensions.
pub fn protect<S>(gate: &Arc<AuthGate>, method_router: MethodRouter<S>) -> MethodRouter<S>
where
    S: Clone + Send + Sync + 'static,
{
    method_router.layer(middleware::from_fn_with_state(
        Arc::clone(gate),
        require_credentials,
    ))
}

async fn require_credentials(
    State(gate): State<Arc<AuthGate>>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let principal = gate.authenticate(request.headers()).inspect_err(|err| {
        tracing::info!(
            method = %request.method(),
            path = %request.uri().path(),
            reason = %err,
            "request rejected by auth gate"
        );
    })?;

    tracing::debug!(scheme = principal.scheme(), "request authenticated");
    request.extensions_mut().insert(principal);

    Ok(next.run(request).await)
}
