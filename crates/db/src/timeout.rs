//! Store decorators that bound every call with a deadline.
//!
//! A call that does not complete within the limit fails with
//! [`StoreError::Timeout`], which the HTTP layer reports as 503.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use userhub_core::session::{CookieMeta, SessionPatch, SessionRecord};
use userhub_core::types::{SessionId, UserId};
use uuid::Uuid;

use crate::models::user::{CreateUser, PasswordChange, UpdateProfile, User};
use crate::store::{OtpStore, SessionStore, StoreError, UserStore};

/// Default per-call deadline.
pub const DEFAULT_STORE_TIMEOUT: Duration = Duration::from_secs(5);

async fn guard<T, F>(limit: Duration, fut: F) -> Result<T, StoreError>
where
    F: Future<Output = Result<T, StoreError>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => {
            tracing::warn!(limit_ms = limit.as_millis() as u64, "Store call timed out");
            Err(StoreError::Timeout(limit))
        }
    }
}

// ---------------------------------------------------------------------------
// Sessions
// ---------------------------------------------------------------------------

pub struct TimeoutSessionStore {
    inner: Arc<dyn SessionStore>,
    limit: Duration,
}

impl TimeoutSessionStore {
    pub fn new(inner: Arc<dyn SessionStore>, limit: Duration) -> Self {
        Self { inner, limit }
    }
}

#[async_trait]
impl SessionStore for TimeoutSessionStore {
    async fn get(&self, session_id: SessionId) -> Result<Option<SessionRecord>, StoreError> {
        guard(self.limit, self.inner.get(session_id)).await
    }

    async fn get_for_user(
        &self,
        user_id: UserId,
        session_id: SessionId,
    ) -> Result<Option<SessionRecord>, StoreError> {
        guard(self.limit, self.inner.get_for_user(user_id, session_id)).await
    }

    async fn set(&self, record: &SessionRecord) -> Result<(), StoreError> {
        guard(self.limit, self.inner.set(record)).await
    }

    async fn patch(&self, session_id: SessionId, patch: &SessionPatch) -> Result<bool, StoreError> {
        guard(self.limit, self.inner.patch(session_id, patch)).await
    }

    async fn touch(&self, session_id: SessionId, cookie: &CookieMeta) -> Result<bool, StoreError> {
        guard(self.limit, self.inner.touch(session_id, cookie)).await
    }

    async fn destroy(&self, session_id: SessionId) -> Result<(), StoreError> {
        guard(self.limit, self.inner.destroy(session_id)).await
    }

    async fn destroy_many(&self, session_ids: &[SessionId]) -> Result<u64, StoreError> {
        guard(self.limit, self.inner.destroy_many(session_ids)).await
    }

    async fn destroy_for_user(&self, user_id: UserId) -> Result<u64, StoreError> {
        guard(self.limit, self.inner.destroy_for_user(user_id)).await
    }

    async fn rotate_refresh(
        &self,
        session_id: SessionId,
        expected: Uuid,
        next: Uuid,
    ) -> Result<bool, StoreError> {
        guard(self.limit, self.inner.rotate_refresh(session_id, expected, next)).await
    }

    async fn all(&self) -> Result<HashMap<SessionId, SessionRecord>, StoreError> {
        guard(self.limit, self.inner.all()).await
    }

    async fn clear(&self) -> Result<u64, StoreError> {
        guard(self.limit, self.inner.clear()).await
    }

    async fn length(&self) -> Result<u64, StoreError> {
        guard(self.limit, self.inner.length()).await
    }
}

// ---------------------------------------------------------------------------
// Users
// ---------------------------------------------------------------------------

pub struct TimeoutUserStore {
    inner: Arc<dyn UserStore>,
    limit: Duration,
}

impl TimeoutUserStore {
    pub fn new(inner: Arc<dyn UserStore>, limit: Duration) -> Self {
        Self { inner, limit }
    }
}

#[async_trait]
impl UserStore for TimeoutUserStore {
    async fn create(&self, input: &CreateUser) -> Result<User, StoreError> {
        guard(self.limit, self.inner.create(input)).await
    }

    async fn find_by_id(&self, id: UserId) -> Result<Option<User>, StoreError> {
        guard(self.limit, self.inner.find_by_id(id)).await
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        guard(self.limit, self.inner.find_by_email(email)).await
    }

    async fn find_by_account_token(&self, token: &str) -> Result<Option<User>, StoreError> {
        guard(self.limit, self.inner.find_by_account_token(token)).await
    }

    async fn update_profile(
        &self,
        id: UserId,
        input: &UpdateProfile,
    ) -> Result<Option<User>, StoreError> {
        guard(self.limit, self.inner.update_profile(id, input)).await
    }

    async fn change_password(
        &self,
        id: UserId,
        change: &PasswordChange,
    ) -> Result<bool, StoreError> {
        guard(self.limit, self.inner.change_password(id, change)).await
    }

    async fn record_login(&self, id: UserId) -> Result<(), StoreError> {
        guard(self.limit, self.inner.record_login(id)).await
    }

    async fn mark_email_verified(&self, id: UserId) -> Result<bool, StoreError> {
        guard(self.limit, self.inner.mark_email_verified(id)).await
    }

    async fn delete(&self, id: UserId) -> Result<bool, StoreError> {
        guard(self.limit, self.inner.delete(id)).await
    }
}

// ---------------------------------------------------------------------------
// OTPs
// ---------------------------------------------------------------------------

pub struct TimeoutOtpStore {
    inner: Arc<dyn OtpStore>,
    limit: Duration,
}

impl TimeoutOtpStore {
    pub fn new(inner: Arc<dyn OtpStore>, limit: Duration) -> Self {
        Self { inner, limit }
    }
}

#[async_trait]
impl OtpStore for TimeoutOtpStore {
    async fn issue(&self, user_id: UserId, code: &str) -> Result<(), StoreError> {
        guard(self.limit, self.inner.issue(user_id, code)).await
    }

    async fn consume(&self, user_id: UserId, code: &str) -> Result<bool, StoreError> {
        guard(self.limit, self.inner.consume(user_id, code)).await
    }
}
