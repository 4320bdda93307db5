//! In-memory store implementations.
//!
//! Session documents are kept as raw JSON values and merged with
//! [`merge_document`], so `set`, `patch` and `touch` behave exactly like the
//! `data || $n` writes of [`crate::repositories::SessionRepo`]. Used by the
//! API integration tests and by local runs without a database.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::{json, Value};
use tokio::sync::RwLock;
use userhub_core::session::{merge_document, CookieMeta, SessionPatch, SessionRecord};
use userhub_core::types::{SessionId, UserId};
use uuid::Uuid;

use crate::models::otp::EmailOtp;
use crate::models::user::{CreateUser, PasswordChange, UpdateProfile, User};
use crate::store::{OtpStore, SessionStore, StoreError, UserStore};

// ---------------------------------------------------------------------------
// Sessions
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct MemorySessionStore {
    documents: RwLock<HashMap<SessionId, Value>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode a document and apply lazy expiration under the write lock.
    fn live(
        documents: &mut HashMap<SessionId, Value>,
        session_id: SessionId,
    ) -> Result<Option<SessionRecord>, StoreError> {
        let Some(document) = documents.get(&session_id) else {
            return Ok(None);
        };
        let record: SessionRecord = serde_json::from_value(document.clone())?;
        if record.is_expired_at(Utc::now()) {
            tracing::debug!(%session_id, "Destroying expired session on read");
            documents.remove(&session_id);
            return Ok(None);
        }
        Ok(Some(record))
    }

    fn merge(
        documents: &mut HashMap<SessionId, Value>,
        session_id: SessionId,
        fields: Value,
    ) -> bool {
        match documents.get_mut(&session_id) {
            Some(document) => {
                merge_document(document, fields);
                true
            }
            None => false,
        }
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn get(&self, session_id: SessionId) -> Result<Option<SessionRecord>, StoreError> {
        let mut documents = self.documents.write().await;
        Self::live(&mut documents, session_id)
    }

    async fn get_for_user(
        &self,
        user_id: UserId,
        session_id: SessionId,
    ) -> Result<Option<SessionRecord>, StoreError> {
        let mut documents = self.documents.write().await;
        let record = Self::live(&mut documents, session_id)?;
        Ok(record.filter(|r| r.user_id == user_id))
    }

    async fn set(&self, record: &SessionRecord) -> Result<(), StoreError> {
        let mut document = record.clone();
        document.last_access = Some(Utc::now());
        let incoming = serde_json::to_value(&document)?;

        let mut documents = self.documents.write().await;
        match documents.get_mut(&record.session_id) {
            Some(existing) => merge_document(existing, incoming),
            None => {
                documents.insert(record.session_id, incoming);
            }
        }
        Ok(())
    }

    async fn patch(&self, session_id: SessionId, patch: &SessionPatch) -> Result<bool, StoreError> {
        let fields = serde_json::to_value(patch)?;
        let mut documents = self.documents.write().await;
        Ok(Self::merge(&mut documents, session_id, fields))
    }

    async fn touch(&self, session_id: SessionId, cookie: &CookieMeta) -> Result<bool, StoreError> {
        let fields = json!({ "last_access": Utc::now(), "cookie": cookie });
        let mut documents = self.documents.write().await;
        Ok(Self::merge(&mut documents, session_id, fields))
    }

    async fn destroy(&self, session_id: SessionId) -> Result<(), StoreError> {
        self.documents.write().await.remove(&session_id);
        Ok(())
    }

    async fn destroy_many(&self, session_ids: &[SessionId]) -> Result<u64, StoreError> {
        let mut documents = self.documents.write().await;
        let removed = session_ids
            .iter()
            .filter(|id| documents.remove(id).is_some())
            .count();
        Ok(removed as u64)
    }

    async fn destroy_for_user(&self, user_id: UserId) -> Result<u64, StoreError> {
        let owner = json!(user_id);
        let mut documents = self.documents.write().await;
        let before = documents.len();
        documents.retain(|_, document| document.get("user_id") != Some(&owner));
        Ok((before - documents.len()) as u64)
    }

    async fn rotate_refresh(
        &self,
        session_id: SessionId,
        expected: Uuid,
        next: Uuid,
    ) -> Result<bool, StoreError> {
        let mut documents = self.documents.write().await;
        let Some(document) = documents.get_mut(&session_id) else {
            return Ok(false);
        };
        if document.get("refresh_jti") != Some(&json!(expected)) {
            return Ok(false);
        }
        merge_document(document, json!({ "refresh_jti": next }));
        Ok(true)
    }

    async fn all(&self) -> Result<HashMap<SessionId, SessionRecord>, StoreError> {
        let documents = self.documents.read().await;
        documents
            .iter()
            .map(|(id, document)| -> Result<_, StoreError> {
                let record: SessionRecord = serde_json::from_value(document.clone())?;
                Ok((*id, record))
            })
            .collect()
    }

    async fn clear(&self) -> Result<u64, StoreError> {
        let mut documents = self.documents.write().await;
        let count = documents.len();
        documents.clear();
        Ok(count as u64)
    }

    async fn length(&self) -> Result<u64, StoreError> {
        Ok(self.documents.read().await.len() as u64)
    }
}

// ---------------------------------------------------------------------------
// Users
// ---------------------------------------------------------------------------

/// Constraint name reported for a duplicate email, as in the migration.
const EMAIL_CONSTRAINT: &str = "uq_users_email";

#[derive(Default)]
pub struct MemoryUserStore {
    users: RwLock<HashMap<UserId, User>>,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Change a user's role; there is no API operation for this.
    pub async fn set_role(&self, id: UserId, role: &str) -> bool {
        match self.users.write().await.get_mut(&id) {
            Some(user) => {
                user.role = role.to_string();
                true
            }
            None => false,
        }
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn create(&self, input: &CreateUser) -> Result<User, StoreError> {
        let mut users = self.users.write().await;
        if users.values().any(|u| u.email == input.email) {
            return Err(StoreError::Duplicate(EMAIL_CONSTRAINT.to_string()));
        }
        let now = Utc::now();
        let user = User {
            id: input.id,
            email: input.email.clone(),
            password_hash: input.password_hash.clone(),
            salt: input.salt.clone(),
            account_token: input.account_token.clone(),
            firstname: input.firstname.clone(),
            lastname: input.lastname.clone(),
            phone: input.phone.clone(),
            city: input.city.clone(),
            country: input.country.clone(),
            birth_date: input.birth_date,
            gender: input.gender.map(|g| g.as_str().to_string()),
            role: input.role.clone(),
            email_verified: false,
            phone_verified: false,
            last_login_at: None,
            created_at: now,
            updated_at: now,
        };
        users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn find_by_id(&self, id: UserId) -> Result<Option<User>, StoreError> {
        Ok(self.users.read().await.get(&id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let users = self.users.read().await;
        Ok(users.values().find(|u| u.email == email).cloned())
    }

    async fn find_by_account_token(&self, token: &str) -> Result<Option<User>, StoreError> {
        let users = self.users.read().await;
        Ok(users.values().find(|u| u.account_token == token).cloned())
    }

    async fn update_profile(
        &self,
        id: UserId,
        input: &UpdateProfile,
    ) -> Result<Option<User>, StoreError> {
        let mut users = self.users.write().await;
        let Some(user) = users.get_mut(&id) else {
            return Ok(None);
        };
        if let Some(firstname) = &input.firstname {
            user.firstname = firstname.clone();
        }
        if let Some(lastname) = &input.lastname {
            user.lastname = lastname.clone();
        }
        if input.phone.is_some() {
            user.phone = input.phone.clone();
        }
        if input.city.is_some() {
            user.city = input.city.clone();
        }
        if input.country.is_some() {
            user.country = input.country.clone();
        }
        if input.birth_date.is_some() {
            user.birth_date = input.birth_date;
        }
        if let Some(gender) = input.gender {
            user.gender = Some(gender.as_str().to_string());
        }
        user.updated_at = Utc::now();
        Ok(Some(user.clone()))
    }

    async fn change_password(
        &self,
        id: UserId,
        change: &PasswordChange,
    ) -> Result<bool, StoreError> {
        let mut users = self.users.write().await;
        let Some(user) = users.get_mut(&id) else {
            return Ok(false);
        };
        user.password_hash = change.password_hash.clone();
        user.salt = change.salt.clone();
        user.account_token = change.account_token.clone();
        user.updated_at = Utc::now();
        Ok(true)
    }

    async fn record_login(&self, id: UserId) -> Result<(), StoreError> {
        if let Some(user) = self.users.write().await.get_mut(&id) {
            user.last_login_at = Some(Utc::now());
        }
        Ok(())
    }

    async fn mark_email_verified(&self, id: UserId) -> Result<bool, StoreError> {
        let mut users = self.users.write().await;
        let Some(user) = users.get_mut(&id) else {
            return Ok(false);
        };
        user.email_verified = true;
        user.updated_at = Utc::now();
        Ok(true)
    }

    async fn delete(&self, id: UserId) -> Result<bool, StoreError> {
        Ok(self.users.write().await.remove(&id).is_some())
    }
}

// ---------------------------------------------------------------------------
// OTPs
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct MemoryOtpStore {
    codes: RwLock<Vec<EmailOtp>>,
}

impl MemoryOtpStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Most recently issued code for `user_id`.
    pub async fn latest_for(&self, user_id: UserId) -> Option<String> {
        let codes = self.codes.read().await;
        codes
            .iter()
            .rev()
            .find(|otp| otp.user_id == user_id)
            .map(|otp| otp.code.clone())
    }
}

#[async_trait]
impl OtpStore for MemoryOtpStore {
    async fn issue(&self, user_id: UserId, code: &str) -> Result<(), StoreError> {
        self.codes.write().await.push(EmailOtp {
            id: Uuid::new_v4(),
            user_id,
            code: code.to_string(),
            created_at: Utc::now(),
        });
        Ok(())
    }

    async fn consume(&self, user_id: UserId, code: &str) -> Result<bool, StoreError> {
        let mut codes = self.codes.write().await;
        let before = codes.len();
        codes.retain(|otp| !(otp.user_id == user_id && otp.code == code));
        Ok(codes.len() < before)
    }
}
