// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! User Auth API: accounts, sessions and notifications over REST
//!
//! This crate provides registration and login with short-lived access
//! tokens and persisted refresh tokens, administrative user management,
//! and email/push notification delivery.

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;

use config::Config;
use db::Store;
use middleware::RateLimiter;
use services::{AuthService, Notifier, PasswordHasher, TokenSigner, UserService};
use std::sync::Arc;
use std::time::Instant;

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub store: Arc<dyn Store>,
    pub auth: AuthService,
    pub users: UserService,
    pub notifier: Notifier,
    pub rate_limiter: RateLimiter,
    pub started_at: Instant,
}

impl AppState {
    /// Wire the services together over a single store and notifier.
    pub fn new(config: Config, store: Arc<dyn Store>, notifier: Notifier) -> Self {
        let hasher = Arc::new(PasswordHasher::new(config.bcrypt_cost));
        let signer = TokenSigner::new(&config.jwt);

        Self {
            auth: AuthService::new(store.clone(), hasher.clone(), signer, notifier.clone()),
            users: UserService::new(store.clone(), hasher),
            rate_limiter: RateLimiter::new(&config.rate_limit),
            started_at: Instant::now(),
            config,
            store,
            notifier,
        }
    }
}
