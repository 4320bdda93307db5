//! Handlers for the `/users` resource (signup, verification, own profile).

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use axum_extra::extract::cookie::{CookieJar, SignedCookieJar};
use chrono::NaiveDate;
use rand::Rng;
use serde::{Deserialize, Serialize};
use userhub_core::error::CoreError;
use userhub_core::roles::ROLE_USER;
use userhub_db::models::user::{CreateUser, Gender, PasswordChange, UpdateProfile, UserResponse};
use uuid::Uuid;
use validator::Validate;

use crate::auth::local::normalize_email;
use crate::auth::password::{generate_salt, hash_password, verify_password};
use crate::error::{AppError, AppResult};
use crate::handlers::auth::clear_auth_cookies;
use crate::middleware::auth::AuthUser;
use crate::notifications::mailer::verification_email;
use crate::response::{DataResponse, MessageResponse};
use crate::state::AppState;
use crate::validation::{validate_otp, ValidJson};

const CREATED_MESSAGE: &str = "Account created. A verification code has been sent to your email.";
const CREATED_NO_EMAIL_MESSAGE: &str =
    "Account created, but the verification email could not be sent.";

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

/// Request body for `POST /users`.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateUserRequest {
    #[validate(email(message = "must be a valid email address"))]
    pub email: String,
    #[validate(length(min = 6, max = 100, message = "must be 6 to 100 characters"))]
    pub password: String,
    #[validate(length(min = 1, max = 50, message = "must be 1 to 50 characters"))]
    pub firstname: String,
    #[validate(length(min = 1, max = 50, message = "must be 1 to 50 characters"))]
    pub lastname: String,
    #[validate(length(max = 30))]
    pub phone: Option<String>,
    #[validate(length(max = 100))]
    pub city: Option<String>,
    #[validate(length(max = 100))]
    pub country: Option<String>,
    pub birth_date: Option<NaiveDate>,
    pub gender: Option<Gender>,
}

#[derive(Debug, Serialize)]
pub struct CreateUserResponse {
    /// Account token used together with the OTP to verify the email.
    pub token: String,
    pub message: &'static str,
    pub user: UserResponse,
}

/// Request body for `POST /users/verify-email`.
#[derive(Debug, Deserialize, Validate)]
pub struct VerifyEmailRequest {
    #[validate(length(min = 1, message = "is required"))]
    pub token: String,
    #[validate(custom(function = "validate_otp"))]
    pub otp: String,
}

/// Request body for `PATCH /users/me`. Only present fields are updated.
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateProfileRequest {
    #[validate(length(min = 1, max = 50, message = "must be 1 to 50 characters"))]
    pub firstname: Option<String>,
    #[validate(length(min = 1, max = 50, message = "must be 1 to 50 characters"))]
    pub lastname: Option<String>,
    #[validate(length(max = 30))]
    pub phone: Option<String>,
    #[validate(length(max = 100))]
    pub city: Option<String>,
    #[validate(length(max = 100))]
    pub country: Option<String>,
    pub birth_date: Option<NaiveDate>,
    pub gender: Option<Gender>,
}

impl From<UpdateProfileRequest> for UpdateProfile {
    fn from(req: UpdateProfileRequest) -> Self {
        Self {
            firstname: req.firstname,
            lastname: req.lastname,
            phone: req.phone,
            city: req.city,
            country: req.country,
            birth_date: req.birth_date,
            gender: req.gender,
        }
    }
}

/// Request body for `PUT /users/me/password`.
#[derive(Debug, Deserialize, Validate)]
pub struct ChangePasswordRequest {
    #[validate(length(min = 1, message = "is required"))]
    pub current_password: String,
    #[validate(length(min = 6, max = 100, message = "must be 6 to 100 characters"))]
    pub new_password: String,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// POST /api/v1/users
///
/// Create an account and email a verification code. A failure to issue or
/// send the code does not undo the signup; the response message says so.
pub async fn create_user(
    State(state): State<AppState>,
    ValidJson(input): ValidJson<CreateUserRequest>,
) -> AppResult<(StatusCode, Json<DataResponse<CreateUserResponse>>)> {
    let email = normalize_email(&input.email);
    if state.users.find_by_email(&email).await?.is_some() {
        return Err(AppError::Core(CoreError::Conflict(
            "Email already registered".into(),
        )));
    }

    let salt = generate_salt();
    let password_hash = hash_password(&input.password, &salt)
        .map_err(|e| AppError::InternalError(format!("Password hashing error: {e}")))?;

    let create = CreateUser {
        id: Uuid::new_v4(),
        email,
        password_hash,
        salt,
        account_token: Uuid::new_v4().to_string(),
        firstname: input.firstname,
        lastname: input.lastname,
        phone: input.phone,
        city: input.city,
        country: input.country,
        birth_date: input.birth_date,
        gender: input.gender,
        role: ROLE_USER.to_string(),
    };
    let user = state.users.create(&create).await?;
    tracing::info!(user_id = %user.id, "User created");

    let message = match send_verification(&state, &user).await {
        Ok(()) => CREATED_MESSAGE,
        Err(e) => {
            tracing::warn!(user_id = %user.id, error = %e, "Verification email not sent");
            CREATED_NO_EMAIL_MESSAGE
        }
    };

    let response = CreateUserResponse {
        token: user.account_token.clone(),
        message,
        user: UserResponse::from(&user),
    };
    Ok((StatusCode::CREATED, Json(DataResponse { data: response })))
}

/// POST /api/v1/users/verify-email
pub async fn verify_email(
    State(state): State<AppState>,
    ValidJson(input): ValidJson<VerifyEmailRequest>,
) -> AppResult<Json<DataResponse<UserResponse>>> {
    let user = state
        .users
        .find_by_account_token(&input.token)
        .await?
        .ok_or_else(|| AppError::BadRequest("Invalid verification token".into()))?;

    if !state.otps.consume(user.id, &input.otp).await? {
        return Err(AppError::BadRequest("Invalid verification code".into()));
    }
    state.users.mark_email_verified(user.id).await?;
    tracing::info!(user_id = %user.id, "Email verified");

    let mut user = user;
    user.email_verified = true;
    Ok(Json(DataResponse {
        data: UserResponse::from(&user),
    }))
}

/// GET /api/v1/users/me
pub async fn get_me(
    State(state): State<AppState>,
    auth_user: AuthUser,
) -> AppResult<Json<DataResponse<UserResponse>>> {
    let user = state
        .users
        .find_by_id(auth_user.id)
        .await?
        .ok_or_else(|| user_not_found(&auth_user))?;
    Ok(Json(DataResponse {
        data: UserResponse::from(&user),
    }))
}

/// PATCH /api/v1/users/me
pub async fn update_me(
    State(state): State<AppState>,
    auth_user: AuthUser,
    ValidJson(input): ValidJson<UpdateProfileRequest>,
) -> AppResult<Json<DataResponse<UserResponse>>> {
    let user = state
        .users
        .update_profile(auth_user.id, &UpdateProfile::from(input))
        .await?
        .ok_or_else(|| user_not_found(&auth_user))?;
    Ok(Json(DataResponse {
        data: UserResponse::from(&user),
    }))
}

/// PUT /api/v1/users/me/password
///
/// A new salt and a new account token are generated with the new hash.
pub async fn change_password(
    State(state): State<AppState>,
    auth_user: AuthUser,
    ValidJson(input): ValidJson<ChangePasswordRequest>,
) -> AppResult<Json<DataResponse<MessageResponse>>> {
    let user = state
        .users
        .find_by_id(auth_user.id)
        .await?
        .ok_or_else(|| user_not_found(&auth_user))?;

    let current_ok = verify_password(&input.current_password, &user.salt, &user.password_hash)
        .map_err(|e| AppError::InternalError(format!("Password verification error: {e}")))?;
    if !current_ok {
        return Err(AppError::Core(CoreError::Validation(
            "Current password is incorrect".into(),
        )));
    }

    let salt = generate_salt();
    let change = PasswordChange {
        password_hash: hash_password(&input.new_password, &salt)
            .map_err(|e| AppError::InternalError(format!("Password hashing error: {e}")))?,
        salt,
        account_token: Uuid::new_v4().to_string(),
    };
    if !state.users.change_password(user.id, &change).await? {
        return Err(user_not_found(&auth_user));
    }
    tracing::info!(user_id = %user.id, "Password changed");

    Ok(Json(MessageResponse::new("Password updated successfully")))
}

/// DELETE /api/v1/users/me
///
/// Deletes the account and every session it owns, then clears the cookies.
pub async fn delete_me(
    State(state): State<AppState>,
    auth_user: AuthUser,
    jar: CookieJar,
    session_jar: SignedCookieJar,
) -> AppResult<(CookieJar, SignedCookieJar, Json<DataResponse<MessageResponse>>)> {
    if !state.users.delete(auth_user.id).await? {
        return Err(user_not_found(&auth_user));
    }
    let sessions = state.sessions.destroy_for_user(auth_user.id).await?;
    tracing::info!(user_id = %auth_user.id, sessions, "User deleted");

    let (jar, session_jar) = clear_auth_cookies(&state, jar, session_jar);
    Ok((jar, session_jar, Json(MessageResponse::new("Account deleted successfully"))))
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn user_not_found(auth_user: &AuthUser) -> AppError {
    AppError::Core(CoreError::NotFound {
        entity: "User",
        id: auth_user.id.to_string(),
    })
}

/// Six random digits.
pub fn generate_otp() -> String {
    format!("{:06}", rand::rng().random_range(0..1_000_000u32))
}

async fn send_verification(
    state: &AppState,
    user: &userhub_db::models::user::User,
) -> Result<(), String> {
    let otp = generate_otp();
    state
        .otps
        .issue(user.id, &otp)
        .await
        .map_err(|e| e.to_string())?;
    let (subject, body) = verification_email(&user.firstname, &otp);
    state
        .mailer
        .send(&user.email, &subject, &body)
        .await
        .map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn otp_is_six_digits() {
        for _ in 0..100 {
            let otp = generate_otp();
            assert!(validate_otp(&otp).is_ok(), "bad otp {otp}");
        }
    }

    #[test]
    fn create_request_validation() {
        let mut req = CreateUserRequest {
            email: "a@x.com".into(),
            password: "secret1".into(),
            firstname: "Ada".into(),
            lastname: "Lovelace".into(),
            phone: None,
            city: None,
            country: None,
            birth_date: None,
            gender: None,
        };
        assert!(req.validate().is_ok());

        req.password = "short".into();
        assert!(req.validate().is_err());

        req.password = "secret1".into();
        req.email = "not-an-email".into();
        assert!(req.validate().is_err());
    }
}
