// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Administrative user management.

use crate::db::Store;
use crate::error::{AppError, Result};
use crate::models::{
    NewUser, PaginationMeta, Role, User, UserChanges, UserPatch, UserQuery, UserRecord,
};
use crate::services::password::PasswordHasher;
use std::sync::Arc;

/// Demo accounts created by [`UserService::seed_demo_users`].
const DEMO_USERS: [(&str, &str, &str, Role); 3] = [
    ("admin@example.com", "admin123", "Admin User", Role::Admin),
    ("user@example.com", "user123", "Regular User", Role::User),
    ("mod@example.com", "mod123", "Moderator User", Role::Moderator),
];

pub struct UserService {
    store: Arc<dyn Store>,
    hasher: Arc<PasswordHasher>,
}

impl UserService {
    pub fn new(store: Arc<dyn Store>, hasher: Arc<PasswordHasher>) -> Self {
        Self { store, hasher }
    }

    pub async fn list(&self, query: &UserQuery) -> Result<(Vec<User>, PaginationMeta)> {
        let (records, total) = self.store.list_users(query).await?;
        let users = records.iter().map(UserRecord::to_user).collect();
        Ok((users, PaginationMeta::new(total, query.page, query.limit)))
    }

    pub async fn get(&self, id: &str) -> Result<User> {
        Ok(self.find(id).await?.to_user())
    }

    /// Create a user directly. No tokens are issued and no email is sent.
    pub async fn create(&self, input: NewUser) -> Result<User> {
        let password_hash = self.hasher.hash(&input.password).await?;
        let record = UserRecord::new(
            input.email,
            password_hash,
            input.name,
            input.role.unwrap_or_default(),
        );

        let record = self.store.insert_user(record).await?;
        tracing::info!(user_id = %record.id, role = %record.role, "User created");
        Ok(record.to_user())
    }

    /// Apply a partial update.
    ///
    /// Only the fields named in `patch` are written. Changing the password or
    /// deactivating the account revokes all of the user's refresh tokens.
    pub async fn update(&self, id: &str, patch: UserPatch) -> Result<User> {
        let was_active = self.find(id).await?.is_active;

        let password_hash = match patch.password {
            Some(password) => Some(self.hasher.hash(&password).await?),
            None => None,
        };
        let password_changed = password_hash.is_some();
        let changes = UserChanges {
            email: patch.email,
            password_hash,
            name: patch.name,
            role: patch.role,
            is_active: patch.is_active,
            fcm_token: None,
        };

        let record = self.store.update_user(id, changes).await.map_err(|e| match e {
            AppError::Conflict(_) => AppError::Conflict("Email already in use".to_string()),
            other => other,
        })?;

        if password_changed || (was_active && !record.is_active) {
            let revoked = self.store.delete_refresh_tokens_for_user(&record.id).await?;
            tracing::info!(user_id = %record.id, revoked, "Sessions revoked after account change");
        }

        tracing::info!(user_id = %record.id, "User updated");
        Ok(record.to_user())
    }

    /// Delete a user and, with it, all of their refresh tokens.
    pub async fn delete(&self, id: &str) -> Result<()> {
        if !self.store.delete_user(id).await? {
            return Err(user_not_found());
        }
        tracing::info!(user_id = %id, "User deleted");
        Ok(())
    }

    /// Store the caller's FCM device token.
    pub async fn update_fcm_token(&self, id: &str, fcm_token: String) -> Result<User> {
        let changes = UserChanges {
            fcm_token: Some(fcm_token),
            ..UserChanges::default()
        };
        let record = self.store.update_user(id, changes).await?;
        Ok(record.to_user())
    }

    /// Create the demo accounts unless they already exist.
    pub async fn seed_demo_users(&self) -> Result<()> {
        for (email, password, name, role) in DEMO_USERS {
            let result = self
                .create(NewUser {
                    email: email.to_string(),
                    password: password.to_string(),
                    name: name.to_string(),
                    role: Some(role),
                })
                .await;

            match result {
                Ok(user) => tracing::info!(email = %user.email, role = %user.role, "Seeded demo user"),
                Err(AppError::Conflict(_)) => tracing::debug!(email, "Demo user already exists"),
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }

    async fn find(&self, id: &str) -> Result<UserRecord> {
        self.store
            .find_user_by_id(id)
            .await?
            .ok_or_else(user_not_found)
    }
}

fn user_not_found() -> AppError {
    AppError::NotFound("User not found".to_string())
}
