//! Repository for the `users` table.

use async_trait::async_trait;
use sqlx::PgPool;
use userhub_core::types::UserId;

use crate::models::user::{CreateUser, PasswordChange, UpdateProfile, User};
use crate::store::{StoreError, UserStore};

/// Column list shared across queries to avoid repetition.
const COLUMNS: &str = "id, email, password_hash, salt, account_token, firstname, lastname, \
                        phone, city, country, birth_date, gender, role, email_verified, \
                        phone_verified, last_login_at, created_at, updated_at";

/// PostgreSQL-backed [`UserStore`].
#[derive(Clone)]
pub struct UserRepo {
    pool: PgPool,
}

impl UserRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserStore for UserRepo {
    async fn create(&self, input: &CreateUser) -> Result<User, StoreError> {
        let query = format!(
            "INSERT INTO users (id, email, password_hash, salt, account_token, firstname, \
                                lastname, phone, city, country, birth_date, gender, role)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
             RETURNING {COLUMNS}"
        );
        let user = sqlx::query_as::<_, User>(&query)
            .bind(input.id)
            .bind(&input.email)
            .bind(&input.password_hash)
            .bind(&input.salt)
            .bind(&input.account_token)
            .bind(&input.firstname)
            .bind(&input.lastname)
            .bind(&input.phone)
            .bind(&input.city)
            .bind(&input.country)
            .bind(input.birth_date)
            .bind(input.gender.map(|g| g.as_str()))
            .bind(&input.role)
            .fetch_one(&self.pool)
            .await?;
        Ok(user)
    }

    async fn find_by_id(&self, id: UserId) -> Result<Option<User>, StoreError> {
        let query = format!("SELECT {COLUMNS} FROM users WHERE id = $1");
        let user = sqlx::query_as::<_, User>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let query = format!("SELECT {COLUMNS} FROM users WHERE email = $1");
        let user = sqlx::query_as::<_, User>(&query)
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    async fn find_by_account_token(&self, token: &str) -> Result<Option<User>, StoreError> {
        let query = format!("SELECT {COLUMNS} FROM users WHERE account_token = $1");
        let user = sqlx::query_as::<_, User>(&query)
            .bind(token)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    async fn update_profile(
        &self,
        id: UserId,
        input: &UpdateProfile,
    ) -> Result<Option<User>, StoreError> {
        let query = format!(
            "UPDATE users SET
                firstname = COALESCE($2, firstname),
                lastname = COALESCE($3, lastname),
                phone = COALESCE($4, phone),
                city = COALESCE($5, city),
                country = COALESCE($6, country),
                birth_date = COALESCE($7, birth_date),
                gender = COALESCE($8, gender),
                updated_at = NOW()
             WHERE id = $1
             RETURNING {COLUMNS}"
        );
        let user = sqlx::query_as::<_, User>(&query)
            .bind(id)
            .bind(&input.firstname)
            .bind(&input.lastname)
            .bind(&input.phone)
            .bind(&input.city)
            .bind(&input.country)
            .bind(input.birth_date)
            .bind(input.gender.map(|g| g.as_str()))
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    async fn change_password(
        &self,
        id: UserId,
        change: &PasswordChange,
    ) -> Result<bool, StoreError> {
        let result = sqlx::query(
            "UPDATE users SET password_hash = $2, salt = $3, account_token = $4, updated_at = NOW()
             WHERE id = $1",
        )
        .bind(id)
        .bind(&change.password_hash)
        .bind(&change.salt)
        .bind(&change.account_token)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn record_login(&self, id: UserId) -> Result<(), StoreError> {
        sqlx::query("UPDATE users SET last_login_at = NOW() WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn mark_email_verified(&self, id: UserId) -> Result<bool, StoreError> {
        let result = sqlx::query(
            "UPDATE users SET email_verified = true, updated_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete(&self, id: UserId) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
