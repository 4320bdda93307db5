//! Session records and their lifecycle rules.
//!
//! A [`SessionRecord`] is created at login and shared by both credential
//! mechanisms: the JWT pair embeds its `session_id`, and the signed session
//! cookie carries the same id. Two expiry representations live on the record:
//!
//! - `expires_at` -- rolled forward on every authenticated request;
//! - `cookie.expires` -- expiry of the session cookie, present only when a
//!   server-side session was established.
//!
//! A record is expired as soon as *either* of them is in the past, and a
//! record with `is_active == false` is never valid regardless of expiry.

use chrono::Duration;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::types::{SessionId, Timestamp, UserId};

/// Rolling lifetime of a session (and of the session cookie).
pub const DEFAULT_SESSION_LIFETIME_DAYS: i64 = 365;

/// Records without cookie expiry are swept once `last_access` is this old.
pub const STALE_SESSION_DAYS: i64 = 30;

// ---------------------------------------------------------------------------
// CookieMeta
// ---------------------------------------------------------------------------

/// Expiry metadata of the session cookie, stored under the `cookie` key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CookieMeta {
    pub expires: Timestamp,
    pub max_age_secs: i64,
}

impl CookieMeta {
    pub fn new(now: Timestamp, lifetime: Duration) -> Self {
        Self {
            expires: now + lifetime,
            max_age_secs: lifetime.num_seconds(),
        }
    }

    /// Metadata for a cookie that is already expired at `now`.
    pub fn expired(now: Timestamp) -> Self {
        Self {
            expires: now,
            max_age_secs: 0,
        }
    }

    pub fn is_expired_at(&self, now: Timestamp) -> bool {
        self.expires <= now
    }
}

// ---------------------------------------------------------------------------
// SessionRecord
// ---------------------------------------------------------------------------

/// Persisted state of one login session.
///
/// Optional fields are omitted from the serialized document when `None`, so a
/// merge write of a record never erases data another writer put there.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub session_id: SessionId,
    pub user_id: UserId,
    /// Denormalized so the owner can be identified without a user lookup.
    pub email: String,
    pub last_activity: Timestamp,
    pub created_at: Timestamp,
    pub expires_at: Timestamp,
    pub is_active: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cookie: Option<CookieMeta>,
    /// Stamped by the store on every `set` and `touch`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_access: Option<Timestamp>,
    /// `jti` of the only refresh token currently accepted for this session.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_jti: Option<uuid::Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logged_out_at: Option<Timestamp>,
}

/// Sweep classification of a record at a given instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Live,
    /// Cookie expiry or `expires_at` is in the past.
    Expired,
    /// No cookie expiry and not accessed for longer than the stale threshold.
    Stale,
}

impl SessionRecord {
    /// Build a fresh, active record whose expiry is `now + lifetime`.
    pub fn new(
        user_id: UserId,
        email: impl Into<String>,
        session_id: SessionId,
        now: Timestamp,
        lifetime: Duration,
    ) -> Self {
        Self {
            session_id,
            user_id,
            email: email.into(),
            last_activity: now,
            created_at: now,
            expires_at: now + lifetime,
            is_active: true,
            cookie: None,
            last_access: None,
            refresh_jti: None,
            logged_out_at: None,
        }
    }

    /// Attach server-session cookie metadata expiring at `now + lifetime`.
    pub fn with_cookie(mut self, now: Timestamp, lifetime: Duration) -> Self {
        self.cookie = Some(CookieMeta::new(now, lifetime));
        self
    }

    /// Record activity at `now`: the expiry window slides to `now + lifetime`.
    ///
    /// Cookie metadata, when present, slides with it so the two expiry
    /// representations never disagree about a session in active use.
    pub fn with_activity(&self, now: Timestamp, lifetime: Duration) -> Self {
        let mut next = self.clone();
        next.last_activity = now;
        next.expires_at = now + lifetime;
        if next.cookie.is_some() {
            next.cookie = Some(CookieMeta::new(now, lifetime));
        }
        next
    }

    /// A session is valid iff it is active and its rolling expiry is ahead.
    pub fn is_valid_at(&self, now: Timestamp) -> bool {
        self.is_active && self.expires_at > now
    }

    /// Mark the session inactive. Expiry fields are left untouched.
    pub fn revoked(&self, now: Timestamp) -> Self {
        let mut next = self.clone();
        next.is_active = false;
        next.logged_out_at = Some(now);
        next
    }

    /// True if either expiry representation is in the past.
    pub fn is_expired_at(&self, now: Timestamp) -> bool {
        self.expires_at <= now || self.cookie.is_some_and(|c| c.is_expired_at(now))
    }

    pub fn classify(&self, now: Timestamp, stale_after: Duration) -> SessionState {
        if self.is_expired_at(now) {
            return SessionState::Expired;
        }
        match (self.cookie, self.last_access) {
            (None, Some(last_access)) if now - last_access > stale_after => SessionState::Stale,
            _ => SessionState::Live,
        }
    }
}

// ---------------------------------------------------------------------------
// SessionPatch
// ---------------------------------------------------------------------------

/// Partial update of a stored record. Only `Some` fields are written.
///
/// Distinct from a full [`SessionRecord`] write: a patch can never create a
/// record and never touches fields it does not name.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SessionPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_activity: Option<Timestamp>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<Timestamp>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_active: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cookie: Option<CookieMeta>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_access: Option<Timestamp>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logged_out_at: Option<Timestamp>,
}

impl SessionPatch {
    /// Persist the activity fields of a record produced by
    /// [`SessionRecord::with_activity`].
    pub fn activity(bumped: &SessionRecord) -> Self {
        Self {
            last_activity: Some(bumped.last_activity),
            expires_at: Some(bumped.expires_at),
            cookie: bumped.cookie,
            ..Self::default()
        }
    }

    pub fn revocation(now: Timestamp) -> Self {
        Self {
            is_active: Some(false),
            logged_out_at: Some(now),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

// ---------------------------------------------------------------------------
// Document merge
// ---------------------------------------------------------------------------

/// Shallow merge of `incoming` into `target`, matching PostgreSQL's
/// `jsonb || jsonb`: top-level keys of `incoming` overwrite, all other keys
/// of `target` are preserved. Non-object values replace `target` wholesale.
pub fn merge_document(target: &mut Value, incoming: Value) {
    match (target, incoming) {
        (Value::Object(existing), Value::Object(fields)) => {
            for (key, value) in fields {
                existing.insert(key, value);
            }
        }
        (target, incoming) => *target = incoming,
    }
}

// ---------------------------------------------------------------------------
// SessionStats
// ---------------------------------------------------------------------------

/// Counts reported by the session statistics endpoint.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SessionStats {
    pub total_sessions: usize,
    pub active_sessions: usize,
    pub expired_sessions: usize,
}

impl SessionStats {
    /// Classify every record at `now`. Stale records still count as active.
    pub fn tally<'a>(records: impl IntoIterator<Item = &'a SessionRecord>, now: Timestamp) -> Self {
        let mut stats = Self::default();
        for record in records {
            stats.total_sessions += 1;
            if record.is_expired_at(now) {
                stats.expired_sessions += 1;
            } else {
                stats.active_sessions += 1;
            }
        }
        stats
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use chrono::Utc;
    use serde_json::json;
    use uuid::Uuid;

    use super::*;

    fn lifetime() -> Duration {
        Duration::days(DEFAULT_SESSION_LIFETIME_DAYS)
    }

    fn record_at(now: Timestamp) -> SessionRecord {
        SessionRecord::new(Uuid::new_v4(), "a@x.com", Uuid::new_v4(), now, lifetime())
    }

    #[test]
    fn new_record_is_active_and_expires_after_lifetime() {
        let now = Utc::now();
        let record = record_at(now);

        assert!(record.is_active);
        assert_eq!(record.created_at, now);
        assert_eq!(record.last_activity, now);
        assert_eq!(record.expires_at, now + lifetime());
        assert!(record.is_valid_at(now));
    }

    #[test]
    fn activity_slides_expiry_forward() {
        let created = Utc::now() - Duration::minutes(10);
        let record = record_at(created);

        let now = Utc::now();
        let bumped = record.with_activity(now, lifetime());

        assert!(bumped.expires_at > record.expires_at);
        assert_eq!(bumped.expires_at, now + lifetime());
        assert_eq!(bumped.last_activity, now);
        assert_eq!(bumped.created_at, record.created_at);
    }

    #[test]
    fn activity_rolls_cookie_expiry_when_present() {
        let created = Utc::now() - Duration::days(2);
        let record = record_at(created).with_cookie(created, lifetime());

        let now = Utc::now();
        let bumped = record.with_activity(now, lifetime());

        assert_eq!(bumped.cookie.map(|c| c.expires), Some(now + lifetime()));
        assert!(record_at(created).with_activity(now, lifetime()).cookie.is_none());
    }

    #[test]
    fn revoked_session_is_never_valid() {
        let now = Utc::now();
        let revoked = record_at(now).revoked(now);

        assert!(!revoked.is_active);
        assert!(revoked.expires_at > now, "revocation must not alter expiry");
        assert!(!revoked.is_valid_at(now));
        assert_eq!(revoked.logged_out_at, Some(now));
    }

    #[test]
    fn past_expiry_is_invalid() {
        let now = Utc::now();
        let mut record = record_at(now);
        record.expires_at = now - Duration::seconds(1);
        assert!(!record.is_valid_at(now));
    }

    #[test]
    fn either_expiry_representation_expires_the_record() {
        let now = Utc::now();

        let mut cookie_past = record_at(now);
        cookie_past.cookie = Some(CookieMeta::expired(now - Duration::hours(1)));
        assert!(cookie_past.is_expired_at(now));

        let mut rolling_past = record_at(now).with_cookie(now, lifetime());
        rolling_past.expires_at = now - Duration::hours(1);
        assert!(rolling_past.is_expired_at(now));

        assert!(!record_at(now).with_cookie(now, lifetime()).is_expired_at(now));
    }

    #[test]
    fn classify_distinguishes_expired_stale_and_live() {
        let now = Utc::now();
        let stale_after = Duration::days(STALE_SESSION_DAYS);

        let mut expired = record_at(now);
        expired.cookie = Some(CookieMeta::expired(now - Duration::minutes(1)));
        assert_matches!(expired.classify(now, stale_after), SessionState::Expired);

        let mut stale = record_at(now);
        stale.last_access = Some(now - Duration::days(31));
        assert_matches!(stale.classify(now, stale_after), SessionState::Stale);

        // Old last_access does not matter once cookie expiry is present.
        let mut with_cookie = record_at(now).with_cookie(now, lifetime());
        with_cookie.last_access = Some(now - Duration::days(90));
        assert_matches!(with_cookie.classify(now, stale_after), SessionState::Live);

        let mut recent = record_at(now);
        recent.last_access = Some(now - Duration::days(2));
        assert_matches!(recent.classify(now, stale_after), SessionState::Live);
    }

    #[test]
    fn stats_count_records_without_cookie_as_active() {
        let now = Utc::now();
        let mut records: Vec<SessionRecord> = (0..7).map(|_| record_at(now)).collect();
        for _ in 0..3 {
            let mut r = record_at(now);
            r.cookie = Some(CookieMeta::expired(now - Duration::days(1)));
            records.push(r);
        }

        let stats = SessionStats::tally(&records, now);
        assert_eq!(
            stats,
            SessionStats {
                total_sessions: 10,
                active_sessions: 7,
                expired_sessions: 3,
            }
        );
    }

    #[test]
    fn patch_serializes_only_named_fields() {
        let now = Utc::now();
        let value = serde_json::to_value(SessionPatch::revocation(now)).unwrap();
        let object = value.as_object().unwrap();

        assert_eq!(object.len(), 2);
        assert_eq!(object["is_active"], json!(false));
        assert!(SessionPatch::default().is_empty());
        assert!(!SessionPatch::revocation(now).is_empty());
    }

    #[test]
    fn merge_preserves_fields_missing_from_incoming() {
        let mut doc = json!({ "a": 1, "b": { "x": 1 }, "c": "keep" });
        merge_document(&mut doc, json!({ "a": 2, "b": { "y": 2 } }));

        assert_eq!(doc, json!({ "a": 2, "b": { "y": 2 }, "c": "keep" }));
    }

    #[test]
    fn record_without_optional_fields_round_trips_through_json() {
        let record = record_at(Utc::now());
        let value = serde_json::to_value(&record).unwrap();

        assert!(value.get("cookie").is_none());
        assert!(value.get("refresh_jti").is_none());

        let back: SessionRecord = serde_json::from_value(value).unwrap();
        assert_eq!(back, record);
    }
}
