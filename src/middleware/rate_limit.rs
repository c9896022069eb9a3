// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Fixed-window request rate limiting per client address.

use crate::config::RateLimitConfig;
use crate::error::AppError;
use crate::AppState;
use axum::{
    extract::{ConnectInfo, Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use dashmap::DashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

#[derive(Debug)]
struct Window {
    requests: u32,
    started: Instant,
}

/// Counts requests per client within a fixed window.
#[derive(Debug, Clone)]
pub struct RateLimiter {
    windows: Arc<DashMap<String, Window>>,
    max_requests: u32,
    window: Duration,
}

impl RateLimiter {
    pub fn new(config: &RateLimitConfig) -> Self {
        Self {
            windows: Arc::new(DashMap::new()),
            max_requests: config.max_requests,
            window: config.window,
        }
    }

    /// Record a request from `client`.
    ///
    /// Returns the number of seconds until the window resets when the
    /// client is over its limit.
    pub fn check(&self, client: &str) -> Result<(), u64> {
        let now = Instant::now();
        let mut entry = self
            .windows
            .entry(client.to_string())
            .or_insert_with(|| Window {
                requests: 0,
                started: now,
            });

        if now.duration_since(entry.started) >= self.window {
            entry.requests = 0;
            entry.started = now;
        }

        if entry.requests >= self.max_requests {
            let remaining = self.window.saturating_sub(now.duration_since(entry.started));
            return Err(remaining.as_secs().max(1));
        }

        entry.requests += 1;
        Ok(())
    }

    /// Drop windows that have already expired.
    pub fn cleanup(&self) {
        let now = Instant::now();
        self.windows
            .retain(|_, w| now.duration_since(w.started) < self.window);
    }
}

/// Identify the client: first `X-Forwarded-For` hop, then `X-Real-IP`,
/// then the peer address.
fn client_key(headers: &HeaderMap, peer: Option<SocketAddr>) -> String {
    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|h| h.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty());

    let real_ip = headers
        .get("x-real-ip")
        .and_then(|h| h.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty());

    forwarded
        .or(real_ip)
        .map(str::to_string)
        .or_else(|| peer.map(|addr| addr.ip().to_string()))
        .unwrap_or_else(|| "unknown".to_string())
}

/// Middleware rejecting clients over their request budget with 429.
pub async fn rate_limit(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    let client = client_key(request.headers(), peer);

    if let Err(retry_after_secs) = state.rate_limiter.check(&client) {
        tracing::warn!(client = %client, retry_after_secs, "Rate limit exceeded");
        return Err(AppError::RateLimited { retry_after_secs });
    }

    Ok(next.run(request).await)
}
