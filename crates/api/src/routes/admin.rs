//! Route definitions for `/admin` (admin role required).

use axum::routing::{delete, get, post, put};
use axum::Router;

use crate::handlers::admin;
use crate::state::AppState;

/// Routes mounted at `/admin`.
///
/// ```text
/// GET    /sessions/stats             -> session_stats
/// POST   /sessions/cleanup           -> run_cleanup
/// DELETE /sessions                   -> clear_sessions
/// PUT    /sessions/cleanup-schedule  -> restart_schedule
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/sessions/stats", get(admin::session_stats))
        .route("/sessions/cleanup", post(admin::run_cleanup))
        .route("/sessions", delete(admin::clear_sessions))
        .route("/sessions/cleanup-schedule", put(admin::restart_schedule))
}
