//! Database layer.
//!
//! The [`Store`] trait is the only way services touch persistence. Two
//! backends implement it: [`MemoryStore`] for development and tests, and
//! [`FirestoreDb`] for deployments.

pub mod firestore;
pub mod memory;

pub use firestore::FirestoreDb;
pub use memory::MemoryStore;

use crate::error::{AppError, Result};
use crate::models::{RefreshTokenRecord, UserChanges, UserQuery, UserRecord};
use async_trait::async_trait;
use std::sync::Arc;

/// Collection names as constants.
pub mod collections {
    pub const USERS: &str = "users";
    /// Email reservations keyed by URL-encoded email (uniqueness constraint)
    pub const USER_EMAILS: &str = "user_emails";
    /// Refresh tokens keyed by token digest
    pub const REFRESH_TOKENS: &str = "refresh_tokens";
}

/// Conflict message for a duplicate email.
pub const EMAIL_CONFLICT: &str = "User with this email already exists";

/// Persistence boundary for users and refresh tokens.
///
/// Implementations enforce uniqueness of `UserRecord::email` and
/// `RefreshTokenRecord::token_hash` atomically, reporting violations as
/// [`AppError::Conflict`], and delete a user's refresh tokens when the user
/// is deleted.
#[async_trait]
pub trait Store: Send + Sync {
    /// Insert a new user. Fails with `Conflict` if the email is taken.
    async fn insert_user(&self, user: UserRecord) -> Result<UserRecord>;

    async fn find_user_by_id(&self, id: &str) -> Result<Option<UserRecord>>;

    async fn find_user_by_email(&self, email: &str) -> Result<Option<UserRecord>>;

    /// Write `changes` to an existing user and return the stored result.
    ///
    /// Only the fields present in `changes` are written. Fails with
    /// `NotFound` if absent and `Conflict` if the email changed to one that
    /// is taken.
    async fn update_user(&self, id: &str, changes: UserChanges) -> Result<UserRecord>;

    /// Delete a user and all of their refresh tokens.
    ///
    /// Returns `false` if the user did not exist.
    async fn delete_user(&self, id: &str) -> Result<bool>;

    /// Return one page of users matching `query` and the total match count.
    async fn list_users(&self, query: &UserQuery) -> Result<(Vec<UserRecord>, u64)>;

    /// Persist a refresh token. Fails with `NotFound` if the owner is gone.
    async fn insert_refresh_token(&self, record: RefreshTokenRecord) -> Result<()>;

    async fn find_refresh_token(&self, token_hash: &str) -> Result<Option<RefreshTokenRecord>>;

    /// Delete a refresh token by digest. Returns the number removed (0 or 1).
    async fn delete_refresh_token(&self, token_hash: &str) -> Result<u64>;

    /// Delete every refresh token owned by a user. Returns the number removed.
    async fn delete_refresh_tokens_for_user(&self, user_id: &str) -> Result<u64>;
}

/// Open the store named by `database_url`.
///
/// Supported schemes: `memory://` and `firestore://<project-id>`.
pub async fn connect(database_url: &str) -> Result<Arc<dyn Store>> {
    if database_url.starts_with("memory://") {
        tracing::warn!("Using in-memory store; data is lost on restart");
        return Ok(Arc::new(MemoryStore::new()));
    }

    if let Some(project_id) = database_url.strip_prefix("firestore://") {
        let project_id = project_id.trim_end_matches('/');
        if project_id.is_empty() {
            return Err(AppError::Database(
                "firestore:// URL is missing a project id".to_string(),
            ));
        }
        return Ok(Arc::new(FirestoreDb::new(project_id).await?));
    }

    Err(AppError::Database(format!(
        "Unsupported DATABASE_URL scheme: {}",
        database_url.split("://").next().unwrap_or(database_url)
    )))
}
