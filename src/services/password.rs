// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! bcrypt password hashing on the blocking thread pool.

use crate::error::AppError;
use anyhow::Context;
use tokio::sync::OnceCell;

/// Hashes and verifies passwords with a fixed bcrypt cost.
pub struct PasswordHasher {
    cost: u32,
    /// Hash of a throwaway password, verified against when the account is
    /// unknown so the response time matches a real check.
    dummy_hash: OnceCell<String>,
}

impl PasswordHasher {
    pub fn new(cost: u32) -> Self {
        Self {
            cost,
            dummy_hash: OnceCell::new(),
        }
    }

    /// Hash a password. Runs bcrypt off the async executor.
    pub async fn hash(&self, password: &str) -> Result<String, AppError> {
        let password = password.to_string();
        let cost = self.cost;

        let hash = tokio::task::spawn_blocking(move || bcrypt::hash(password, cost))
            .await
            .context("password hashing task failed")?
            .context("bcrypt hash failed")?;

        Ok(hash)
    }

    /// Verify a password against a stored hash.
    ///
    /// A malformed stored hash counts as a mismatch.
    pub async fn verify(&self, password: &str, hash: &str) -> Result<bool, AppError> {
        let password = password.to_string();
        let hash = hash.to_string();

        let result = tokio::task::spawn_blocking(move || bcrypt::verify(password, &hash))
            .await
            .context("password verification task failed")?;

        match result {
            Ok(matches) => Ok(matches),
            Err(e) => {
                tracing::warn!(error = %e, "Stored password hash could not be parsed");
                Ok(false)
            }
        }
    }

    /// Burn the same work as [`verify`](Self::verify) and always fail.
    pub async fn verify_dummy(&self, password: &str) -> Result<bool, AppError> {
        let dummy = self
            .dummy_hash
            .get_or_try_init(|| self.hash("dummy-password-for-timing"))
            .await?;
        self.verify(password, dummy).await?;
        Ok(false)
    }
}
