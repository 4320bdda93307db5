//! Handlers for `/admin/sessions` (statistics, manual sweep, wipe, schedule).

use axum::body::Bytes;
use axum::extract::State;
use axum::Json;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use userhub_core::session::SessionStats;
use userhub_core::types::Timestamp;
use validator::Validate;

use crate::background::session_cleanup::CleanupStatus;
use crate::error::AppResult;
use crate::middleware::rbac::RequireAdmin;
use crate::response::DataResponse;
use crate::state::AppState;
use crate::validation::optional_json;

#[derive(Debug, Serialize)]
pub struct SessionStatsResponse {
    pub stats: SessionStats,
    pub scheduler: CleanupStatus,
    pub timestamp: Timestamp,
}

#[derive(Debug, Serialize)]
pub struct CleanupResponse {
    pub deleted: u64,
    /// Statistics after the sweep.
    pub stats: SessionStats,
}

#[derive(Debug, Serialize)]
pub struct ClearResponse {
    pub deleted: u64,
}

/// Optional body of `PUT /admin/sessions/cleanup-schedule`.
#[derive(Debug, Deserialize, Validate)]
pub struct ScheduleRequest {
    #[validate(range(min = 1, max = 168, message = "must be between 1 and 168"))]
    pub interval_hours: Option<u64>,
}

/// GET /api/v1/admin/sessions/stats
pub async fn session_stats(
    RequireAdmin(_admin): RequireAdmin,
    State(state): State<AppState>,
) -> AppResult<Json<DataResponse<SessionStatsResponse>>> {
    let stats = state.cleanup.session_stats().await?;
    Ok(Json(DataResponse {
        data: SessionStatsResponse {
            stats,
            scheduler: state.cleanup.status(),
            timestamp: Utc::now(),
        },
    }))
}

/// POST /api/v1/admin/sessions/cleanup
///
/// Run one sweep now. Unlike the scheduled sweep, a failure is reported.
pub async fn run_cleanup(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
) -> AppResult<Json<DataResponse<CleanupResponse>>> {
    let deleted = state.cleanup.sweep().await?;
    tracing::info!(admin_id = %admin.id, deleted, "Manual session cleanup");
    let stats = state.cleanup.session_stats().await?;
    Ok(Json(DataResponse {
        data: CleanupResponse { deleted, stats },
    }))
}

/// DELETE /api/v1/admin/sessions
pub async fn clear_sessions(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
) -> AppResult<Json<DataResponse<ClearResponse>>> {
    let deleted = state.sessions.clear().await?;
    tracing::warn!(admin_id = %admin.id, deleted, "All sessions cleared");
    Ok(Json(DataResponse {
        data: ClearResponse { deleted },
    }))
}

/// PUT /api/v1/admin/sessions/cleanup-schedule
///
/// Restart the sweep schedule. Without `interval_hours` the configured
/// interval is used.
pub async fn restart_schedule(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    body: Bytes,
) -> AppResult<Json<DataResponse<CleanupStatus>>> {
    let interval_hours = optional_json::<ScheduleRequest>(&body)?
        .and_then(|r| r.interval_hours)
        .unwrap_or(state.config.session.cleanup_interval_hours);

    state.cleanup.stop();
    state.cleanup.start(interval_hours).await;
    tracing::info!(admin_id = %admin.id, interval_hours, "Session cleanup schedule restarted");

    Ok(Json(DataResponse {
        data: state.cleanup.status(),
    }))
}
