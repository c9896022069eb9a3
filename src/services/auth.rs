// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Session lifecycle: registration, credential checks, token issuance,
//! refresh and revocation.
//!
//! Refresh tokens are valid only while both their signature verifies and
//! their digest is present in the store. They are not rotated on refresh.

use crate::db::Store;
use crate::error::{AppError, Result};
use crate::models::refresh_token::hash_token;
use crate::models::{NewUser, RefreshTokenRecord, User, UserRecord};
use crate::services::notification::Notifier;
use crate::services::password::PasswordHasher;
use crate::services::tokens::{AccessClaims, TokenError, TokenSigner};
use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;

const INVALID_CREDENTIALS: &str = "Invalid credentials";
const INVALID_REFRESH_TOKEN: &str = "Invalid refresh token";
const ACCOUNT_INACTIVE: &str = "Account is inactive";

/// Access and refresh token returned at login and registration.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

/// Authentication service.
pub struct AuthService {
    store: Arc<dyn Store>,
    hasher: Arc<PasswordHasher>,
    signer: TokenSigner,
    notifier: Notifier,
}

impl AuthService {
    pub fn new(
        store: Arc<dyn Store>,
        hasher: Arc<PasswordHasher>,
        signer: TokenSigner,
        notifier: Notifier,
    ) -> Self {
        Self {
            store,
            hasher,
            signer,
            notifier,
        }
    }

    pub fn signer(&self) -> &TokenSigner {
        &self.signer
    }

    /// Create an account and kick off the welcome email.
    ///
    /// A duplicate email is reported by the store as `Conflict`. The welcome
    /// email runs detached; its outcome never affects the result.
    pub async fn register(&self, input: NewUser) -> Result<User> {
        let password_hash = self.hasher.hash(&input.password).await?;
        let record = UserRecord::new(
            input.email,
            password_hash,
            input.name,
            input.role.unwrap_or_default(),
        );

        let record = self.store.insert_user(record).await?;
        tracing::info!(user_id = %record.id, role = %record.role, "User registered");

        self.notifier.send_welcome(&record.email, &record.name);

        Ok(record.to_user())
    }

    /// Check credentials.
    ///
    /// Unknown email and wrong password fail identically. The password is
    /// checked before the active flag, so an inactive account is only
    /// revealed to someone who knows its password.
    pub async fn login(&self, email: &str, password: &str) -> Result<User> {
        let Some(record) = self.store.find_user_by_email(email).await? else {
            self.hasher.verify_dummy(password).await?;
            tracing::debug!("Login failed: unknown email");
            return Err(AppError::Authentication(INVALID_CREDENTIALS.to_string()));
        };

        if !self.hasher.verify(password, &record.password_hash).await? {
            tracing::debug!(user_id = %record.id, "Login failed: wrong password");
            return Err(AppError::Authentication(INVALID_CREDENTIALS.to_string()));
        }

        if !record.is_active {
            tracing::info!(user_id = %record.id, "Login refused: account inactive");
            return Err(AppError::Authorization(ACCOUNT_INACTIVE.to_string()));
        }

        tracing::info!(user_id = %record.id, "User logged in");
        Ok(record.to_user())
    }

    /// Sign a token pair for `user` and persist the refresh token.
    pub async fn issue_token_pair(&self, user: &User) -> Result<TokenPair> {
        let access_token = self.signer.issue_access(&user.id, &user.email, user.role)?;
        let refresh = self.signer.issue_refresh(&user.id)?;

        self.store
            .insert_refresh_token(RefreshTokenRecord::new(
                &refresh.token,
                &user.id,
                refresh.expires_at,
            ))
            .await?;

        Ok(TokenPair {
            access_token,
            refresh_token: refresh.token,
        })
    }

    /// Exchange a refresh token for a new access token.
    ///
    /// An expired token that is still persisted is deleted before failing.
    pub async fn refresh(&self, refresh_token: &str) -> Result<String> {
        let claims = match self.signer.verify_refresh(refresh_token) {
            Ok(claims) => Some(claims),
            Err(TokenError::Expired) => None,
            Err(TokenError::Invalid) => return Err(invalid_refresh_token()),
        };

        let token_hash = hash_token(refresh_token);
        let Some(record) = self.store.find_refresh_token(&token_hash).await? else {
            return Err(invalid_refresh_token());
        };

        let claims = match claims {
            Some(claims) if !record.is_expired_at(Utc::now()) => claims,
            _ => {
                self.store.delete_refresh_token(&token_hash).await?;
                tracing::debug!(user_id = %record.user_id, "Removed expired refresh token");
                return Err(invalid_refresh_token());
            }
        };

        if claims.id != record.user_id {
            return Err(invalid_refresh_token());
        }

        let user = self
            .store
            .find_user_by_id(&record.user_id)
            .await?
            .ok_or_else(invalid_refresh_token)?;

        if !user.is_active {
            return Err(AppError::Authorization(ACCOUNT_INACTIVE.to_string()));
        }

        self.signer.issue_access(&user.id, &user.email, user.role)
    }

    /// Forget a refresh token. Unknown tokens are ignored.
    pub async fn logout(&self, refresh_token: &str) -> Result<()> {
        let removed = self
            .store
            .delete_refresh_token(&hash_token(refresh_token))
            .await?;
        tracing::debug!(removed, "Logout");
        Ok(())
    }

    /// Delete every refresh token of a user. Returns the number removed.
    pub async fn revoke_all_sessions(&self, user_id: &str) -> Result<u64> {
        let removed = self.store.delete_refresh_tokens_for_user(user_id).await?;
        tracing::info!(user_id, removed, "Revoked all sessions");
        Ok(removed)
    }

    /// Current user's profile.
    pub async fn profile(&self, user_id: &str) -> Result<User> {
        self.store
            .find_user_by_id(user_id)
            .await?
            .map(|record| record.to_user())
            .ok_or_else(|| AppError::NotFound("User not found".to_string()))
    }

    /// Verify a bearer access token.
    pub fn verify_access_token(&self, token: &str) -> Result<AccessClaims> {
        self.signer
            .verify_access(token)
            .map_err(|_| AppError::Authentication("Invalid or expired token".to_string()))
    }
}

fn invalid_refresh_token() -> AppError {
    AppError::Authentication(INVALID_REFRESH_TOKEN.to_string())
}
