//! Store traits consumed by the HTTP layer.
//!
//! Handlers and the cleanup scheduler only ever see `Arc<dyn ...Store>`, so
//! the PostgreSQL implementations in [`crate::repositories`] and the
//! in-memory ones in [`crate::memory`] are interchangeable.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use userhub_core::session::{CookieMeta, SessionPatch, SessionRecord};
use userhub_core::types::{SessionId, UserId};
use uuid::Uuid;

use crate::models::user::{CreateUser, PasswordChange, UpdateProfile, User};

/// PostgreSQL unique-violation SQLSTATE.
const UNIQUE_VIOLATION: &str = "23505";

/// Error type shared by every store implementation.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[source] sqlx::Error),

    /// A stored session document could not be (de)serialized.
    #[error("Malformed session document: {0}")]
    Document(#[from] serde_json::Error),

    /// A unique constraint was violated; carries the constraint name.
    #[error("Duplicate value violates unique constraint: {0}")]
    Duplicate(String),

    #[error("Store call timed out after {0:?}")]
    Timeout(Duration),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &err {
            if db_err.code().as_deref() == Some(UNIQUE_VIOLATION) {
                let constraint = db_err.constraint().unwrap_or("unknown").to_string();
                return StoreError::Duplicate(constraint);
            }
        }
        StoreError::Database(err)
    }
}

/// Persistence of [`SessionRecord`] documents keyed by session id.
///
/// Reads apply lazy expiration: a record found with either expiry in the past
/// is destroyed and reported as absent.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Fetch a live record by session id.
    async fn get(&self, session_id: SessionId) -> Result<Option<SessionRecord>, StoreError>;

    /// Fetch a live record by its `{user_id, session_id}` compound key.
    async fn get_for_user(
        &self,
        user_id: UserId,
        session_id: SessionId,
    ) -> Result<Option<SessionRecord>, StoreError>;

    /// Upsert keyed by `record.session_id`, merging into any existing
    /// document. Stamps `last_access` with the current time.
    async fn set(&self, record: &SessionRecord) -> Result<(), StoreError>;

    /// Apply a partial update to an existing record. Returns `false` if the
    /// record does not exist.
    async fn patch(&self, session_id: SessionId, patch: &SessionPatch) -> Result<bool, StoreError>;

    /// Update only `last_access` and the cookie expiry sub-document.
    async fn touch(&self, session_id: SessionId, cookie: &CookieMeta) -> Result<bool, StoreError>;

    /// Hard delete. Deleting an unknown id is not an error.
    async fn destroy(&self, session_id: SessionId) -> Result<(), StoreError>;

    /// Delete many records in one bulk operation. Returns the deleted count.
    async fn destroy_many(&self, session_ids: &[SessionId]) -> Result<u64, StoreError>;

    /// Delete every record owned by `user_id`.
    async fn destroy_for_user(&self, user_id: UserId) -> Result<u64, StoreError>;

    /// Atomically replace the accepted refresh-token id. Returns `false` if
    /// the stored id is not `expected` (already rotated, or unknown record).
    async fn rotate_refresh(
        &self,
        session_id: SessionId,
        expected: Uuid,
        next: Uuid,
    ) -> Result<bool, StoreError>;

    /// Enumerate every record, expired ones included.
    async fn all(&self) -> Result<HashMap<SessionId, SessionRecord>, StoreError>;

    /// Delete every record in a single operation. Returns the deleted count.
    async fn clear(&self) -> Result<u64, StoreError>;

    async fn length(&self) -> Result<u64, StoreError>;
}

/// Account persistence used by the auth flows and account handlers.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Insert a user. A duplicate email yields [`StoreError::Duplicate`].
    async fn create(&self, input: &CreateUser) -> Result<User, StoreError>;

    async fn find_by_id(&self, id: UserId) -> Result<Option<User>, StoreError>;

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;

    async fn find_by_account_token(&self, token: &str) -> Result<Option<User>, StoreError>;

    /// Returns `None` if no user with `id` exists.
    async fn update_profile(
        &self,
        id: UserId,
        input: &UpdateProfile,
    ) -> Result<Option<User>, StoreError>;

    async fn change_password(&self, id: UserId, change: &PasswordChange)
        -> Result<bool, StoreError>;

    /// Set `last_login_at` to now.
    async fn record_login(&self, id: UserId) -> Result<(), StoreError>;

    async fn mark_email_verified(&self, id: UserId) -> Result<bool, StoreError>;

    async fn delete(&self, id: UserId) -> Result<bool, StoreError>;
}

/// One-time email verification codes.
#[async_trait]
pub trait OtpStore: Send + Sync {
    async fn issue(&self, user_id: UserId, code: &str) -> Result<(), StoreError>;

    /// Delete every code of `user_id` equal to `code`. Returns `true` if at
    /// least one existed.
    async fn consume(&self, user_id: UserId, code: &str) -> Result<bool, StoreError>;
}
