//! Email verification codes.

use sqlx::FromRow;
use userhub_core::types::{Timestamp, UserId};

/// A row from the `email_otps` table.
#[derive(Debug, Clone, FromRow)]
pub struct EmailOtp {
    pub id: uuid::Uuid,
    pub user_id: UserId,
    pub code: String,
    pub created_at: Timestamp,
}
