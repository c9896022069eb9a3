// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Firestore client wrapper with typed operations.
//!
//! Collections:
//! - `users/{id}`: user records
//! - `user_emails/{urlencoded email}`: email reservations, created with
//!   insert-if-absent so uniqueness holds under concurrent registration
//! - `refresh_tokens/{sha256}`: issued refresh tokens

use crate::db::{collections, Store, EMAIL_CONFLICT};
use crate::error::AppError;
use crate::models::{RefreshTokenRecord, UserChanges, UserQuery, UserRecord};
use async_trait::async_trait;
use chrono::Utc;
use firestore::errors::FirestoreError;
use firestore::FirestoreWritePrecondition;
use serde::{Deserialize, Serialize};

// Firestore limits batch/transaction writes to 500 operations.
// We use a safe limit of 400 to allow headroom.
const BATCH_SIZE: usize = 400;

/// Firestore database client.
#[derive(Clone)]
pub struct FirestoreDb {
    client: Option<firestore::FirestoreDb>,
}

/// Document in `user_emails` binding an email to its owner.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct EmailReservation {
    user_id: String,
}

fn email_doc_id(email: &str) -> String {
    urlencoding::encode(email).into_owned()
}

fn db_err(e: FirestoreError) -> AppError {
    AppError::Database(e.to_string())
}

impl FirestoreDb {
    /// Create a new Firestore client.
    ///
    /// For local development with emulator, set FIRESTORE_EMULATOR_HOST.
    pub async fn new(project_id: &str) -> Result<Self, AppError> {
        // If the emulator environment variable is set, use unauthenticated connection
        // to avoid local credential warnings and leakage.
        if std::env::var("FIRESTORE_EMULATOR_HOST").is_ok() {
            return Self::create_emulator_client(project_id).await;
        }

        let client = firestore::FirestoreDb::new(project_id)
            .await
            .map_err(|e| AppError::Database(format!("Failed to connect to Firestore: {}", e)))?;

        tracing::info!(project = project_id, "Connected to Firestore");

        Ok(Self {
            client: Some(client),
        })
    }

    /// Create a Firestore client for the emulator with unauthenticated access.
    async fn create_emulator_client(project_id: &str) -> Result<Self, AppError> {
        tracing::info!("Using unauthenticated connection for Firestore Emulator");

        let token_source = gcloud_sdk::ExternalJwtFunctionSource::new(|| async {
            Ok(gcloud_sdk::Token {
                token_type: "Bearer".to_string(),
                token: gcloud_sdk::SecretValue::new(
                    "eyJhbGciOiJub25lIn0.eyJ1aWQiOiJ0ZXN0In0."
                        .to_string()
                        .into(),
                ),
                expiry: chrono::Utc::now() + chrono::Duration::hours(1),
            })
        });

        let options = firestore::FirestoreDbOptions::new(project_id.to_string());

        let client = firestore::FirestoreDb::with_options_token_source(
            options,
            gcloud_sdk::GCP_DEFAULT_SCOPES.clone(),
            gcloud_sdk::TokenSourceType::ExternalSource(Box::new(token_source)),
        )
        .await
        .map_err(|e| {
            AppError::Database(format!("Failed to connect to Firestore Emulator: {}", e))
        })?;

        tracing::info!(
            project = project_id,
            "Connected to Firestore (Emulator/Unauthenticated)"
        );

        Ok(Self {
            client: Some(client),
        })
    }

    /// Create a mock Firestore client for testing (offline mode).
    ///
    /// All database operations will return an error if called.
    pub fn new_mock() -> Self {
        Self { client: None }
    }

    /// Helper to get the client or return an error if offline.
    fn get_client(&self) -> Result<&firestore::FirestoreDb, AppError> {
        self.client
            .as_ref()
            .ok_or_else(|| AppError::Database("Database not connected (offline mode)".to_string()))
    }

    // ─── Email Reservations ──────────────────────────────────────

    /// Claim `email` for `user_id`. Fails with `Conflict` if already claimed.
    async fn reserve_email(&self, email: &str, user_id: &str) -> Result<(), AppError> {
        let reservation = EmailReservation {
            user_id: user_id.to_string(),
        };

        let result: Result<EmailReservation, FirestoreError> = self
            .get_client()?
            .fluent()
            .insert()
            .into(collections::USER_EMAILS)
            .document_id(email_doc_id(email))
            .object(&reservation)
            .execute()
            .await;

        match result {
            Ok(_) => Ok(()),
            Err(FirestoreError::DataConflictError(_)) => {
                Err(AppError::Conflict(EMAIL_CONFLICT.to_string()))
            }
            Err(e) => Err(db_err(e)),
        }
    }

    async fn release_email(&self, email: &str) -> Result<(), AppError> {
        self.get_client()?
            .fluent()
            .delete()
            .from(collections::USER_EMAILS)
            .document_id(email_doc_id(email))
            .execute()
            .await
            .map_err(db_err)
    }

    async fn get_reservation(&self, email: &str) -> Result<Option<EmailReservation>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .by_id_in(collections::USER_EMAILS)
            .obj()
            .one(&email_doc_id(email))
            .await
            .map_err(db_err)
    }

    async fn refresh_tokens_for_user(
        &self,
        user_id: &str,
    ) -> Result<Vec<RefreshTokenRecord>, AppError> {
        let user_id = user_id.to_string();
        self.get_client()?
            .fluent()
            .select()
            .from(collections::REFRESH_TOKENS)
            .filter(move |q| q.for_all([q.field("user_id").eq(user_id.clone())]))
            .obj()
            .query()
            .await
            .map_err(db_err)
    }

    // ─── Helper Methods ────────────────────────────────────────────

    /// Helper to batch delete documents using transactions.
    async fn batch_delete<T, F>(
        &self,
        items: &[T],
        collection: &str,
        id_extractor: F,
    ) -> Result<(), AppError>
    where
        F: Fn(&T) -> String,
    {
        let client = self.get_client()?;

        for chunk in items.chunks(BATCH_SIZE) {
            let mut transaction = client
                .begin_transaction()
                .await
                .map_err(|e| AppError::Database(format!("Failed to begin transaction: {}", e)))?;

            for item in chunk {
                let doc_id = id_extractor(item);
                client
                    .fluent()
                    .delete()
                    .from(collection)
                    .document_id(&doc_id)
                    .add_to_transaction(&mut transaction)
                    .map_err(|e| {
                        AppError::Database(format!(
                            "Failed to add deletion to transaction for {}: {}",
                            collection, e
                        ))
                    })?;
            }

            transaction.commit().await.map_err(|e| {
                AppError::Database(format!("Failed to commit batch deletion: {}", e))
            })?;
        }

        Ok(())
    }
}

#[async_trait]
impl Store for FirestoreDb {
    async fn insert_user(&self, user: UserRecord) -> Result<UserRecord, AppError> {
        self.reserve_email(&user.email, &user.id).await?;

        let result: Result<UserRecord, FirestoreError> = self
            .get_client()?
            .fluent()
            .insert()
            .into(collections::USERS)
            .document_id(&user.id)
            .object(&user)
            .execute()
            .await;

        if let Err(e) = result {
            // Roll back the reservation so the email is not stranded
            if let Err(release_err) = self.release_email(&user.email).await {
                tracing::error!(
                    user_id = %user.id,
                    error = %release_err,
                    "Failed to release email reservation after insert failure"
                );
            }
            return Err(db_err(e));
        }

        Ok(user)
    }

    async fn find_user_by_id(&self, id: &str) -> Result<Option<UserRecord>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .by_id_in(collections::USERS)
            .obj()
            .one(id)
            .await
            .map_err(db_err)
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<UserRecord>, AppError> {
        let Some(reservation) = self.get_reservation(email).await? else {
            return Ok(None);
        };

        // A reservation can briefly outlive its user during deletion
        Ok(self
            .find_user_by_id(&reservation.user_id)
            .await?
            .filter(|user| user.email == email))
    }

    async fn update_user(&self, id: &str, changes: UserChanges) -> Result<UserRecord, AppError> {
        let existing = self
            .find_user_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

        let new_email = changes
            .email
            .clone()
            .filter(|email| *email != existing.email);
        if let Some(email) = &new_email {
            self.reserve_email(email, id).await?;
        }

        // The field mask limits the write to the changed fields; the rest of
        // `merged` is ignored by Firestore
        let mut merged = existing.clone();
        changes.apply_to(&mut merged, Utc::now());

        let result: Result<UserRecord, FirestoreError> = self
            .get_client()?
            .fluent()
            .update()
            .fields(changes.field_paths())
            .in_col(collections::USERS)
            .precondition(FirestoreWritePrecondition::Exists(true))
            .document_id(id)
            .object(&merged)
            .execute()
            .await;

        match result {
            Ok(updated) => {
                if new_email.is_some() {
                    self.release_email(&existing.email).await?;
                }
                Ok(updated)
            }
            Err(e) => {
                if let Some(email) = &new_email {
                    if let Err(release_err) = self.release_email(email).await {
                        tracing::error!(
                            user_id = %id,
                            error = %release_err,
                            "Failed to release email reservation after update failure"
                        );
                    }
                }
                match e {
                    FirestoreError::DataNotFoundError(_) => {
                        Err(AppError::NotFound("User not found".to_string()))
                    }
                    e => Err(db_err(e)),
                }
            }
        }
    }

    async fn delete_user(&self, id: &str) -> Result<bool, AppError> {
        let Some(user) = self.find_user_by_id(id).await? else {
            return Ok(false);
        };

        let tokens = self.delete_refresh_tokens_for_user(id).await?;

        let client = self.get_client()?;
        let mut transaction = client
            .begin_transaction()
            .await
            .map_err(|e| AppError::Database(format!("Failed to begin transaction: {}", e)))?;

        client
            .fluent()
            .delete()
            .from(collections::USERS)
            .document_id(id)
            .add_to_transaction(&mut transaction)
            .map_err(db_err)?;
        client
            .fluent()
            .delete()
            .from(collections::USER_EMAILS)
            .document_id(email_doc_id(&user.email))
            .add_to_transaction(&mut transaction)
            .map_err(db_err)?;

        transaction
            .commit()
            .await
            .map_err(|e| AppError::Database(format!("Transaction commit failed: {}", e)))?;

        tracing::info!(user_id = %id, refresh_tokens = tokens, "User deleted");
        Ok(true)
    }

    async fn list_users(&self, query: &UserQuery) -> Result<(Vec<UserRecord>, u64), AppError> {
        let role = query.role.map(|r| r.as_str());
        let is_active = query.is_active;

        // Equality filters run server side; search, sort and paging in process
        let records: Vec<UserRecord> = self
            .get_client()?
            .fluent()
            .select()
            .from(collections::USERS)
            .filter(move |q| {
                q.for_all([
                    role.and_then(|r| q.field("role").eq(r)),
                    is_active.and_then(|a| q.field("is_active").eq(a)),
                ])
            })
            .obj()
            .query()
            .await
            .map_err(db_err)?;

        Ok(query.apply(records))
    }

    async fn insert_refresh_token(&self, record: RefreshTokenRecord) -> Result<(), AppError> {
        if self.find_user_by_id(&record.user_id).await?.is_none() {
            return Err(AppError::NotFound("User not found".to_string()));
        }

        let result: Result<RefreshTokenRecord, FirestoreError> = self
            .get_client()?
            .fluent()
            .insert()
            .into(collections::REFRESH_TOKENS)
            .document_id(&record.token_hash)
            .object(&record)
            .execute()
            .await;

        match result {
            Ok(_) => Ok(()),
            Err(FirestoreError::DataConflictError(_)) => Err(AppError::Conflict(
                "Refresh token already exists".to_string(),
            )),
            Err(e) => Err(db_err(e)),
        }
    }

    async fn find_refresh_token(
        &self,
        token_hash: &str,
    ) -> Result<Option<RefreshTokenRecord>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .by_id_in(collections::REFRESH_TOKENS)
            .obj()
            .one(token_hash)
            .await
            .map_err(db_err)
    }

    async fn delete_refresh_token(&self, token_hash: &str) -> Result<u64, AppError> {
        if self.find_refresh_token(token_hash).await?.is_none() {
            return Ok(0);
        }

        self.get_client()?
            .fluent()
            .delete()
            .from(collections::REFRESH_TOKENS)
            .document_id(token_hash)
            .execute()
            .await
            .map_err(db_err)?;
        Ok(1)
    }

    async fn delete_refresh_tokens_for_user(&self, user_id: &str) -> Result<u64, AppError> {
        let tokens = self.refresh_tokens_for_user(user_id).await?;
        let count = tokens.len() as u64;

        self.batch_delete(&tokens, collections::REFRESH_TOKENS, |t: &RefreshTokenRecord| {
            t.token_hash.clone()
        })
        .await?;

        tracing::debug!(user_id, count, "Deleted refresh tokens");
        Ok(count)
    }
}
