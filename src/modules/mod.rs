pub mod auth;
pub mod books;
pub mod meta;

use std::sync::Arc;

use bookshelf_authz::AuthGate;
use bookshelf_db::Database;
use bookshelf_http::RateLimiter;
use bookshelf_kernel::{settings::RateLimitSettings, ModuleRegistry};

/// Handles every module is built from.
#[derive(Clone)]
pub struct Shared {
    pub db: Database,
    pub gate: Arc<AuthGate>,
    pub limiter: Arc<RateLimiter>,
    pub limits: RateLimitSettings,
}

/// Register all project-specific modules with the registry
pub fn register_all(registry: &mut ModuleRegistry, shared: &Shared) {
    registry.register(Arc::new(meta::MetaModule::new(
        Arc::clone(&shared.limiter),
        shared.limits.clone(),
    )));
    registry.register(Arc::new(auth::AuthModule::new(
        Arc::clone(&shared.gate),
        Arc::clone(&shared.limiter),
        shared.limits.clone(),
    )));
    registry.register(Arc::new(books::BooksModule::new(
        books::store::BookStore::new(shared.db.clone()),
        Arc::clone(&shared.gate),
        Arc::clone(&shared.limiter),
        shared.limits.clone(),
    )));
}
