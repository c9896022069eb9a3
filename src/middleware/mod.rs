// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Middleware modules (authentication, rate limiting, security headers).

pub mod auth;
pub mod rate_limit;
pub mod security;

pub use auth::{authorize, require_auth, AuthUser, ADMIN_ONLY};
pub use rate_limit::{rate_limit, RateLimiter};
