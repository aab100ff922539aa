//! Application assembly: database, shared auth and rate-limit state,
//! module registration and the module lifecycle around the HTTP server.

use std::future::Future;
use std::sync::Arc;

use anyhow::Context;
use axum::Router;
use tokio::net::TcpListener;

use bookshelf_authz::AuthGate;
use bookshelf_db::Database;
use bookshelf_http::RateLimiter;
use bookshelf_kernel::{settings::Settings, InitCtx, ModuleRegistry};

use crate::modules::{self, Shared};

/// A fully initialised service instance.
///
/// Everything it needs comes from the `Settings` it was bootstrapped with,
/// so several instances can live side by side in one process.
pub struct Application {
    settings: Settings,
    registry: ModuleRegistry,
}

impl Application {
    /// Open the database, register modules, apply their migrations and run
    /// their `init`/`start` hooks.
    pub async fn bootstrap(settings: Settings) -> anyhow::Result<Self> {
        let db = Database::open(&settings.database)
            .with_context(|| format!("failed to open database '{}'", settings.database.path))?;

        let shared = Shared {
            db: db.clone(),
            gate: Arc::new(AuthGate::from_settings(&settings.auth)),
            limiter: Arc::new(RateLimiter::from_settings(&settings.rate_limit)),
            limits: settings.rate_limit.clone(),
        };

        if settings.auth.api_key.is_empty() {
            tracing::warn!("no API key configured; protected routes accept bearer tokens only");
        }
        if !shared.limiter.is_enabled() {
            tracing::warn!("rate limiting disabled");
        }

        let mut registry = ModuleRegistry::new();
        modules::register_all(&mut registry, &shared);

        let applied = db
            .migrate(&registry.collect_migrations())
            .context("failed to apply migrations")?;
        tracing::info!(applied, "database schema up to date");

        let ctx = InitCtx {
            settings: &settings,
        };
        registry.init_modules(&ctx).await?;
        registry.start_modules(&ctx).await?;

        tracing::info!(
            modules = registry.module_count(),
            env = ?settings.environment,
            "bookshelf bootstrap complete"
        );

        Ok(Self { settings, registry })
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// The complete HTTP router, middleware included.
    pub fn router(&self) -> Router {
        bookshelf_http::build_router(&self.registry, &self.settings)
    }

    /// Serve on the configured address until Ctrl-C, then stop modules.
    pub async fn run(self) -> anyhow::Result<()> {
        let served = bookshelf_http::start_server(self.router(), &self.settings).await;
        self.shutdown().await?;
        served
    }

    /// Serve on `listener` until `shutdown` resolves, then stop modules.
    pub async fn run_with<F>(self, listener: TcpListener, shutdown: F) -> anyhow::Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let served = bookshelf_http::serve(listener, self.router(), shutdown).await;
        self.shutdown().await?;
        served
    }

    async fn shutdown(&self) -> anyhow::Result<()> {
        self.registry.stop_modules().await
    }
}
