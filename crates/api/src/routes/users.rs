//! Route definitions for the `/users` resource.

use axum::routing::{get, post, put};
use axum::Router;

use crate::handlers::users;
use crate::state::AppState;

/// Routes mounted at `/users`.
///
/// ```text
/// POST   /               -> create_user
/// POST   /verify-email   -> verify_email
/// GET    /me             -> get_me (requires auth)
/// PATCH  /me             -> update_me (requires auth)
/// DELETE /me             -> delete_me (requires auth)
/// PUT    /me/password    -> change_password (requires auth)
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(users::create_user))
        .route("/verify-email", post(users::verify_email))
        .route(
            "/me",
            get(users::get_me)
                .patch(users::update_me)
                .delete(users::delete_me),
        )
        .route("/me/password", put(users::change_password))
}
