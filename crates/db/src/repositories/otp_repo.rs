//! Repository for the `email_otps` table.

use async_trait::async_trait;
use sqlx::PgPool;
use userhub_core::types::UserId;
use uuid::Uuid;

use crate::store::{OtpStore, StoreError};

/// PostgreSQL-backed [`OtpStore`].
#[derive(Clone)]
pub struct OtpRepo {
    pool: PgPool,
}

impl OtpRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl OtpStore for OtpRepo {
    async fn issue(&self, user_id: UserId, code: &str) -> Result<(), StoreError> {
        sqlx::query("INSERT INTO email_otps (id, user_id, code) VALUES ($1, $2, $3)")
            .bind(Uuid::new_v4())
            .bind(user_id)
            .bind(code)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn consume(&self, user_id: UserId, code: &str) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM email_otps WHERE user_id = $1 AND code = $2")
            .bind(user_id)
            .bind(code)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
