//! Application-layer rate limiting for checkout
//!
//! The limiter is a trait object on [`AppState`] so a shared backend can
//! replace the in-process one when several instances run behind a balancer.

use async_trait::async_trait;
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use shared::error::AppError;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::state::AppState;

/// Fixed-window limit for one route
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitRule {
    pub max_requests: u32,
    pub window_secs: u64,
}

#[async_trait]
pub trait RateLimiter: Send + Sync {
    /// Returns `true` if the request is allowed, `false` if rate-limited.
    async fn check(&self, route: &'static str, key: &str, rule: RateLimitRule) -> bool;

    /// Drop state that can no longer affect a decision
    async fn cleanup(&self);
}

struct KeyEntry {
    count: u32,
    window_start: Instant,
}

/// Per-process fixed-window limiter
#[derive(Clone, Default)]
pub struct InMemoryRateLimiter {
    /// route name -> (key -> entry)
    inner: Arc<Mutex<HashMap<&'static str, HashMap<String, KeyEntry>>>>,
}

impl InMemoryRateLimiter {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RateLimiter for InMemoryRateLimiter {
    async fn check(&self, route: &'static str, key: &str, rule: RateLimitRule) -> bool {
        let mut map = self.inner.lock().await;
        let route_map = map.entry(route).or_default();
        let now = Instant::now();

        let entry = route_map.entry(key.to_owned()).or_insert_with(|| KeyEntry {
            count: 0,
            window_start: now,
        });

        // Reset window if expired
        if now.duration_since(entry.window_start).as_secs() >= rule.window_secs {
            entry.count = 0;
            entry.window_start = now;
        }

        entry.count += 1;
        entry.count <= rule.max_requests
    }

    /// Remove entries older than 5 minutes
    async fn cleanup(&self) {
        let mut map = self.inner.lock().await;
        let cutoff = Duration::from_secs(300);
        let now = Instant::now();

        for route_map in map.values_mut() {
            route_map.retain(|_, entry| now.duration_since(entry.window_start) < cutoff);
        }
        map.retain(|_, route_map| !route_map.is_empty());
    }
}

/// Client IP: X-Forwarded-For first (load balancer), then the peer address.
pub fn extract_ip(request: &Request) -> String {
    if let Some(forwarded) = request.headers().get("x-forwarded-for")
        && let Ok(val) = forwarded.to_str()
        && let Some(first) = val.split(',').next()
    {
        let ip = first.trim();
        if !ip.is_empty() {
            return ip.to_owned();
        }
    }

    request
        .extensions()
        .get::<axum::extract::ConnectInfo<std::net::SocketAddr>>()
        .map(|ci| ci.0.ip().to_string())
        .unwrap_or_else(|| "unknown".to_owned())
}

/// Checkout limit per client IP
pub async fn checkout_rate_limit(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let ip = extract_ip(&request);
    if !state
        .rate_limiter
        .check("checkout", &ip, state.checkout_limit)
        .await
    {
        tracing::debug!(ip = %ip, "Checkout rate limit exceeded");
        return Err(AppError::too_many_requests());
    }
    Ok(next.run(request).await)
}
