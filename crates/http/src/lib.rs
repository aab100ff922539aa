//! HTTP server facade for bookshelf: router assembly, the error envelope,
//! the auth guard and per-route rate limits.

use std::future::Future;
use std::net::SocketAddr;

use anyhow::Context;
use axum::{routing::get, Router};
use tokio::net::TcpListener;

use bookshelf_kernel::{settings::Settings, ModuleRegistry};

pub mod error;
pub mod guard;
pub mod rate_limit;
pub mod router;

pub use error::{AppError, ErrorBody};
pub use guard::protect;
pub use rate_limit::{RateLimiter, RouteQuota};

use router::RouterBuilder;

/// Bind the configured address and serve until Ctrl-C.
pub async fn start_server(router: Router, settings: &Settings) -> anyhow::Result<()> {
    let addr = settings.server.bind_addr();
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind to {addr}"))?;

    serve(listener, router, shutdown_signal()).await
}

/// Serve `router` on an already bound listener until `shutdown` resolves.
///
/// Peer addresses are exposed to handlers as `ConnectInfo<SocketAddr>`,
/// which the rate limiter keys on.
pub async fn serve<F>(listener: TcpListener, router: Router, shutdown: F) -> anyhow::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let local = listener
        .local_addr()
        .context("listener has no local address")?;
    tracing::info!("HTTP server listening on http://{local}");

    axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown)
    .await
    .context("HTTP server failed")?;

    tracing::info!("HTTP server stopped");
    Ok(())
}

/// Build the main HTTP router with all module routes mounted
pub fn build_router(registry: &ModuleRegistry, settings: &Settings) -> Router {
    let mut router_builder = RouterBuilder::new().route("/healthz", get(health_check));

    for module in registry.modules() {
        router_builder = router_builder.mount_module(module.name(), module.routes());
    }

    router_builder
        .with_openapi(registry)
        .with_tracing()
        .with_cors()
        .with_request_id()
        .with_timeout(settings.server.request_timeout_ms)
        .build()
}

/// Health check endpoint
async fn health_check() -> &'static str {
    "ok"
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown signal received");
}
