//! Email + password credential check.

use userhub_db::models::user::User;
use userhub_db::UserStore;

use crate::auth::password::verify_password;
use crate::error::{AppError, AppResult};

/// The only message a failed login ever returns, whether the email is
/// unknown or the password is wrong.
pub const INVALID_CREDENTIALS: &str = "Invalid email or password";

/// Emails are compared trimmed and lowercased.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Resolve the user owning `email` if `password` matches.
pub async fn authenticate(users: &dyn UserStore, email: &str, password: &str) -> AppResult<User> {
    let email = normalize_email(email);
    let Some(user) = users.find_by_email(&email).await? else {
        tracing::debug!("Login rejected: unknown email");
        return Err(AppError::unauthorized(INVALID_CREDENTIALS));
    };

    let valid = verify_password(password, &user.salt, &user.password_hash)
        .map_err(|e| AppError::InternalError(format!("Password verification error: {e}")))?;
    if !valid {
        tracing::debug!(user_id = %user.id, "Login rejected: wrong password");
        return Err(AppError::unauthorized(INVALID_CREDENTIALS));
    }

    Ok(user)
}
