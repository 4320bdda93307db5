//! User entity model and DTOs.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use userhub_core::types::{Timestamp, UserId};

/// Full user row from the `users` table.
///
/// Contains the password hash and salt -- NEVER serialize this to API
/// responses directly. Use [`UserResponse`] for external-facing output.
#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: UserId,
    pub email: String,
    pub password_hash: String,
    pub salt: String,
    /// Opaque token handed out at signup; identifies the account for
    /// email verification.
    pub account_token: String,
    pub firstname: String,
    pub lastname: String,
    pub phone: Option<String>,
    pub city: Option<String>,
    pub country: Option<String>,
    pub birth_date: Option<NaiveDate>,
    pub gender: Option<String>,
    pub role: String,
    pub email_verified: bool,
    pub phone_verified: bool,
    pub last_login_at: Option<Timestamp>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// Values accepted for `users.gender`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Male,
    Female,
}

impl Gender {
    pub fn as_str(self) -> &'static str {
        match self {
            Gender::Male => "male",
            Gender::Female => "female",
        }
    }
}

/// Safe user representation for API responses.
#[derive(Debug, Clone, Serialize)]
pub struct UserResponse {
    pub id: UserId,
    pub firstname: String,
    pub lastname: String,
    pub email: String,
    pub phone: Option<String>,
    pub city: Option<String>,
    pub country: Option<String>,
    pub birth_date: Option<NaiveDate>,
    pub gender: Option<String>,
    pub email_verified: bool,
    pub phone_verified: bool,
    pub last_login_at: Option<Timestamp>,
    pub created_at: Timestamp,
}

impl From<&User> for UserResponse {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            firstname: user.firstname.clone(),
            lastname: user.lastname.clone(),
            email: user.email.clone(),
            phone: user.phone.clone(),
            city: user.city.clone(),
            country: user.country.clone(),
            birth_date: user.birth_date,
            gender: user.gender.clone(),
            email_verified: user.email_verified,
            phone_verified: user.phone_verified,
            last_login_at: user.last_login_at,
            created_at: user.created_at,
        }
    }
}

/// DTO for creating a new user. The caller supplies id, hash and salt.
#[derive(Debug, Clone)]
pub struct CreateUser {
    pub id: UserId,
    pub email: String,
    pub password_hash: String,
    pub salt: String,
    pub account_token: String,
    pub firstname: String,
    pub lastname: String,
    pub phone: Option<String>,
    pub city: Option<String>,
    pub country: Option<String>,
    pub birth_date: Option<NaiveDate>,
    pub gender: Option<Gender>,
    pub role: String,
}

/// DTO for a partial profile update. Only `Some` fields are applied.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateProfile {
    pub firstname: Option<String>,
    pub lastname: Option<String>,
    pub phone: Option<String>,
    pub city: Option<String>,
    pub country: Option<String>,
    pub birth_date: Option<NaiveDate>,
    pub gender: Option<Gender>,
}

/// New credential material written on a password change.
#[derive(Debug, Clone)]
pub struct PasswordChange {
    pub password_hash: String,
    pub salt: String,
    pub account_token: String,
}
