// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - business logic layer.

pub mod auth;
pub mod notification;
pub mod password;
pub mod tokens;
pub mod users;

pub use auth::{AuthService, TokenPair};
pub use notification::{NotificationError, Notifier};
pub use password::PasswordHasher;
pub use tokens::{AccessClaims, TokenError, TokenSigner};
pub use users::UserService;
