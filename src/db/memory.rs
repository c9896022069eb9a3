// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! In-memory store backed by concurrent maps.
//!
//! Email uniqueness is enforced through `DashMap::entry` on the email index,
//! so two concurrent inserts with the same email cannot both succeed.

use crate::db::{Store, EMAIL_CONFLICT};
use crate::error::{AppError, Result};
use crate::models::{RefreshTokenRecord, UserChanges, UserQuery, UserRecord};
use async_trait::async_trait;
use chrono::Utc;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::Arc;

/// Process-local store. Cloning shares the underlying maps.
#[derive(Clone, Default)]
pub struct MemoryStore {
    users: Arc<DashMap<String, UserRecord>>,
    /// email -> user id
    emails: Arc<DashMap<String, String>>,
    /// token digest -> record
    refresh_tokens: Arc<DashMap<String, RefreshTokenRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserve `email` for `user_id`, failing if another user holds it.
    fn reserve_email(&self, email: &str, user_id: &str) -> Result<()> {
        match self.emails.entry(email.to_string()) {
            Entry::Occupied(_) => Err(AppError::Conflict(EMAIL_CONFLICT.to_string())),
            Entry::Vacant(slot) => {
                slot.insert(user_id.to_string());
                Ok(())
            }
        }
    }

    fn release_email(&self, email: &str, user_id: &str) {
        self.emails.remove_if(email, |_, owner| owner == user_id);
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn insert_user(&self, user: UserRecord) -> Result<UserRecord> {
        self.reserve_email(&user.email, &user.id)?;
        self.users.insert(user.id.clone(), user.clone());
        Ok(user)
    }

    async fn find_user_by_id(&self, id: &str) -> Result<Option<UserRecord>> {
        Ok(self.users.get(id).map(|entry| entry.value().clone()))
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<UserRecord>> {
        let Some(user_id) = self.emails.get(email).map(|entry| entry.value().clone()) else {
            return Ok(None);
        };
        self.find_user_by_id(&user_id).await
    }

    async fn update_user(&self, id: &str, changes: UserChanges) -> Result<UserRecord> {
        let previous_email = self
            .users
            .get(id)
            .map(|entry| entry.email.clone())
            .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

        let new_email = changes
            .email
            .clone()
            .filter(|email| *email != previous_email);
        if let Some(email) = &new_email {
            self.reserve_email(email, id)?;
        }

        // Changes are applied under the entry lock, so fields written
        // concurrently by another update survive
        let (updated, replaced_email) = match self.users.get_mut(id) {
            Some(mut entry) => {
                let replaced_email = entry.email.clone();
                changes.apply_to(entry.value_mut(), Utc::now());
                (entry.value().clone(), replaced_email)
            }
            None => {
                // Deleted between the read and the write
                if let Some(email) = &new_email {
                    self.release_email(email, id);
                }
                return Err(AppError::NotFound("User not found".to_string()));
            }
        };

        if new_email.is_some() && replaced_email != updated.email {
            self.release_email(&replaced_email, id);
        }

        Ok(updated)
    }

    async fn delete_user(&self, id: &str) -> Result<bool> {
        let Some((_, user)) = self.users.remove(id) else {
            return Ok(false);
        };

        self.release_email(&user.email, &user.id);
        let removed = self.delete_refresh_tokens_for_user(id).await?;

        tracing::debug!(user_id = %id, refresh_tokens = removed, "Deleted user");
        Ok(true)
    }

    async fn list_users(&self, query: &UserQuery) -> Result<(Vec<UserRecord>, u64)> {
        let snapshot: Vec<UserRecord> = self
            .users
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        Ok(query.apply(snapshot))
    }

    async fn insert_refresh_token(&self, record: RefreshTokenRecord) -> Result<()> {
        if !self.users.contains_key(&record.user_id) {
            return Err(AppError::NotFound("User not found".to_string()));
        }

        let user_id = record.user_id.clone();
        let token_hash = record.token_hash.clone();
        match self.refresh_tokens.entry(token_hash.clone()) {
            Entry::Occupied(_) => {
                return Err(AppError::Conflict(
                    "Refresh token already exists".to_string(),
                ))
            }
            Entry::Vacant(slot) => {
                slot.insert(record);
            }
        }

        // Owner deleted concurrently: do not leave an orphan behind
        if !self.users.contains_key(&user_id) {
            self.refresh_tokens.remove(&token_hash);
            return Err(AppError::NotFound("User not found".to_string()));
        }

        Ok(())
    }

    async fn find_refresh_token(&self, token_hash: &str) -> Result<Option<RefreshTokenRecord>> {
        Ok(self
            .refresh_tokens
            .get(token_hash)
            .map(|entry| entry.value().clone()))
    }

    async fn delete_refresh_token(&self, token_hash: &str) -> Result<u64> {
        Ok(self.refresh_tokens.remove(token_hash).map_or(0, |_| 1))
    }

    async fn delete_refresh_tokens_for_user(&self, user_id: &str) -> Result<u64> {
        let mut removed = 0;
        self.refresh_tokens.retain(|_, record| {
            if record.user_id == user_id {
                removed += 1;
                false
            } else {
                true
            }
        });
        Ok(removed)
    }
}
