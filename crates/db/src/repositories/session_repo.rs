//! Repository for the `session_documents` table.
//!
//! Each row holds one [`SessionRecord`] as a JSONB document. Merge writes use
//! `data || $n`, so keys absent from the incoming document are preserved.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::json;
use sqlx::types::Json;
use sqlx::PgPool;
use userhub_core::session::{CookieMeta, SessionPatch, SessionRecord};
use userhub_core::types::{SessionId, UserId};
use uuid::Uuid;

use crate::store::{SessionStore, StoreError};

/// PostgreSQL-backed [`SessionStore`].
#[derive(Clone)]
pub struct SessionRepo {
    pool: PgPool,
}

impl SessionRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Lazy expiration: destroy a record that is already expired.
    async fn live_or_destroy(
        &self,
        record: Option<SessionRecord>,
    ) -> Result<Option<SessionRecord>, StoreError> {
        match record {
            Some(record) if record.is_expired_at(Utc::now()) => {
                tracing::debug!(session_id = %record.session_id, "Destroying expired session on read");
                self.destroy(record.session_id).await?;
                Ok(None)
            }
            other => Ok(other),
        }
    }
}

#[async_trait]
impl SessionStore for SessionRepo {
    async fn get(&self, session_id: SessionId) -> Result<Option<SessionRecord>, StoreError> {
        let row = sqlx::query_as::<_, (Json<SessionRecord>,)>(
            "SELECT data FROM session_documents WHERE session_id = $1",
        )
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await?;
        self.live_or_destroy(row.map(|(Json(record),)| record)).await
    }

    async fn get_for_user(
        &self,
        user_id: UserId,
        session_id: SessionId,
    ) -> Result<Option<SessionRecord>, StoreError> {
        let row = sqlx::query_as::<_, (Json<SessionRecord>,)>(
            "SELECT data FROM session_documents WHERE session_id = $1 AND user_id = $2",
        )
        .bind(session_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        self.live_or_destroy(row.map(|(Json(record),)| record)).await
    }

    async fn set(&self, record: &SessionRecord) -> Result<(), StoreError> {
        let mut document = record.clone();
        document.last_access = Some(Utc::now());

        sqlx::query(
            "INSERT INTO session_documents (session_id, user_id, data, updated_at)
             VALUES ($1, $2, $3, NOW())
             ON CONFLICT (session_id) DO UPDATE SET
                user_id = EXCLUDED.user_id,
                data = session_documents.data || EXCLUDED.data,
                updated_at = NOW()",
        )
        .bind(document.session_id)
        .bind(document.user_id)
        .bind(Json(&document))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn patch(&self, session_id: SessionId, patch: &SessionPatch) -> Result<bool, StoreError> {
        let result = sqlx::query(
            "UPDATE session_documents SET data = data || $2, updated_at = NOW()
             WHERE session_id = $1",
        )
        .bind(session_id)
        .bind(Json(patch))
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn touch(&self, session_id: SessionId, cookie: &CookieMeta) -> Result<bool, StoreError> {
        let fields = json!({ "last_access": Utc::now(), "cookie": cookie });
        let result = sqlx::query(
            "UPDATE session_documents SET data = data || $2, updated_at = NOW()
             WHERE session_id = $1",
        )
        .bind(session_id)
        .bind(Json(fields))
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn destroy(&self, session_id: SessionId) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM session_documents WHERE session_id = $1")
            .bind(session_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn destroy_many(&self, session_ids: &[SessionId]) -> Result<u64, StoreError> {
        if session_ids.is_empty() {
            return Ok(0);
        }
        let result = sqlx::query("DELETE FROM session_documents WHERE session_id = ANY($1)")
            .bind(session_ids)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn destroy_for_user(&self, user_id: UserId) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM session_documents WHERE user_id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn rotate_refresh(
        &self,
        session_id: SessionId,
        expected: Uuid,
        next: Uuid,
    ) -> Result<bool, StoreError> {
        let result = sqlx::query(
            "UPDATE session_documents
             SET data = jsonb_set(data, '{refresh_jti}', to_jsonb($3::text)), updated_at = NOW()
             WHERE session_id = $1 AND data->>'refresh_jti' = $2",
        )
        .bind(session_id)
        .bind(expected.to_string())
        .bind(next.to_string())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn all(&self) -> Result<HashMap<SessionId, SessionRecord>, StoreError> {
        let rows = sqlx::query_as::<_, (Uuid, Json<SessionRecord>)>(
            "SELECT session_id, data FROM session_documents",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows
            .into_iter()
            .map(|(session_id, Json(record))| (session_id, record))
            .collect())
    }

    async fn clear(&self) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM session_documents")
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn length(&self) -> Result<u64, StoreError> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM session_documents")
            .fetch_one(&self.pool)
            .await?;
        Ok(count as u64)
    }
}
