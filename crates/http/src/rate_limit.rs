//! Per-route, per-client request ceilings.
//!
//! Each (route, client address) pair gets a fixed window; once the window's
//! count reaches the route's limit further requests are rejected with 429
//! until the window rolls over. Decisions never touch the store.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use axum::{
    extract::{ConnectInfo, Request, State},
    middleware::{self, Next},
    response::Response,
    routing::MethodRouter,
};

use bookshelf_kernel::settings::RateLimitSettings;

use crate::error::AppError;

const WINDOW: Duration = Duration::from_secs(60);
/// Tracked windows before stale ones are swept.
const SWEEP_THRESHOLD: usize = 4096;
const UNKNOWN_CLIENT: &str = "unknown";

#[derive(Debug, Clone, Copy)]
struct Window {
    started: Instant,
    count: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allowed { remaining: u32 },
    Limited { retry_after: Duration },
}

#[derive(Debug)]
pub struct RateLimiter {
    enabled: bool,
    window: Duration,
    windows: Mutex<HashMap<(&'static str, String), Window>>,
}

impl RateLimiter {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            window: WINDOW,
            windows: Mutex::new(HashMap::new()),
        }
    }

    pub fn from_settings(settings: &RateLimitSettings) -> Self {
        Self::new(settings.enabled)
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Count one request from `client` against `route`.
    pub fn check(&self, route: &'static str, client: &str, limit: u32) -> Decision {
        self.check_at(route, client, limit, Instant::now())
    }

    fn check_at(&self, route: &'static str, client: &str, limit: u32, now: Instant) -> Decision {
        if !self.enabled {
            return Decision::Allowed { remaining: limit };
        }

        let mut windows = match self.windows.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        if windows.len() >= SWEEP_THRESHOLD {
            let window = self.window;
            windows.retain(|_, w| now.duration_since(w.started) < window);
        }

        let entry = windows
            .entry((route, client.to_string()))
            .or_insert(Window {
                started: now,
                count: 0,
            });

        if now.duration_since(entry.started) >= self.window {
            entry.started = now;
            entry.count = 0;
        }

        if entry.count >= limit {
            let retry_after = self.window.saturating_sub(now.duration_since(entry.started));
            return Decision::Limited { retry_after };
        }

        entry.count += 1;
        Decision::Allowed {
            remaining: limit - entry.count,
        }
    }

    /// Quota for one route, to be attached to its method routers.
    pub fn quota(self: &Arc<Self>, route: &'static str, limit: u32) -> RouteQuota {
        RouteQuota {
            limiter: Arc::clone(self),
            route,
            limit,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RouteQuota {
    limiter: Arc<RateLimiter>,
    route: &'static str,
    limit: u32,
}

impl RouteQuota {
    /// Wrap `method_router` so every request is counted before it runs.
    ///
    /// Apply this last so the check happens ahead of any other layer.
    pub fn apply<S>(&self, method_router: MethodRouter<S>) -> MethodRouter<S>
    where
        S: Clone + Send + Sync + 'static,
    {
        method_router.layer(middleware::from_fn_with_state(self.clone(), enforce))
    }
}

fn client_key(request: &Request) -> String {
    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| UNKNOWN_CLIENT.to_string())
}

async fn enforce(
    State(quota): State<RouteQuota>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let client = client_key(&request);

    match quota.limiter.check(quota.route, &client, quota.limit) {
        Decision::Allowed { .. } => Ok(next.run(request).await),
        Decision::Limited { retry_after } => {
            tracing::warn!(
                route = quota.route,
                client = %client,
                limit = quota.limit,
                "rate limit exceeded"
            );
            Err(AppError::rate_limited(
                format!("Rate limit exceeded: {} per 1 minute", quota.limit),
                retry_after.as_secs().max(1),
            ))
        }
    }
}
