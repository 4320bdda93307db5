pub mod admin;
pub mod auth;
pub mod health;
pub mod users;

use axum::Router;

use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// Route hierarchy:
///
/// ```text
/// /users                               create account (public)
/// /users/verify-email                  verify email with token + OTP (public)
/// /users/me                            get, update, delete own account
/// /users/me/password                   change password
///
/// /auth/login                          login (public)
/// /auth/refresh                        refresh (public)
/// /auth/logout                         logout (requires auth)
///
/// /admin/sessions                      clear all sessions (admin only)
/// /admin/sessions/stats                session statistics
/// /admin/sessions/cleanup              manual sweep
/// /admin/sessions/cleanup-schedule     restart the sweep schedule
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .nest("/users", users::router())
        .nest("/auth", auth::router())
        .nest("/admin", admin::router())
}
