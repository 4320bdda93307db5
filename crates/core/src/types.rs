/// Users and sessions are keyed by random (v4) UUIDs.
pub type UserId = uuid::Uuid;

/// Opaque session identifier shared by the JWT pair and the session cookie.
pub type SessionId = uuid::Uuid;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;
