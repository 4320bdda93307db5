//! Handlers for the `/auth` resource (login, refresh, logout).

use axum::body::Bytes;
use axum::extract::State;
use axum::Json;
use axum_extra::extract::cookie::{CookieJar, SignedCookieJar};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use userhub_core::session::{CookieMeta, SessionPatch, SessionRecord};
use userhub_db::models::user::UserResponse;
use validator::Validate;

use crate::auth::cookies::{auth_cookie, removal, ACCESS_TOKEN_COOKIE, REFRESH_TOKEN_COOKIE};
use crate::auth::jwt::TokenPair;
use crate::auth::local;
use crate::error::{AppError, AppResult};
use crate::middleware::auth::AuthUser;
use crate::response::{DataResponse, MessageResponse};
use crate::state::AppState;
use crate::validation::{optional_json, ValidJson};

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

/// Request body for `POST /auth/login`.
#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(email(message = "must be a valid email address"))]
    pub email: String,
    #[validate(length(min = 1, message = "is required"))]
    pub password: String,
}

/// Optional body of `POST /auth/refresh`; the cookie takes precedence.
#[derive(Debug, Deserialize, Validate)]
pub struct RefreshRequest {
    #[validate(length(min = 1, message = "is required"))]
    pub refresh_token: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub user: UserResponse,
    pub tokens: TokenPair,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// POST /api/v1/auth/login
///
/// Check credentials, create a session record shared by the JWT pair and the
/// server-session cookie, and set all three cookies.
pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    session_jar: SignedCookieJar,
    ValidJson(input): ValidJson<LoginRequest>,
) -> AppResult<(CookieJar, SignedCookieJar, Json<DataResponse<LoginResponse>>)> {
    let user = local::authenticate(state.users.as_ref(), &input.email, &input.password).await?;

    let session_id = state.tokens.generate_session_id();
    let tokens = state
        .tokens
        .generate_token_pair(user.id, &user.email, session_id)
        .map_err(|e| AppError::InternalError(format!("Token generation error: {e}")))?;

    let record = state
        .tokens
        .create_session_data(user.id, &user.email, session_id);
    let created_at = record.created_at;
    let mut record = record.with_cookie(created_at, state.tokens.session_lifetime());
    record.refresh_jti = Some(tokens.refresh_jti);
    state.sessions.set(&record).await?;

    state.users.record_login(user.id).await?;
    tracing::info!(user_id = %user.id, %session_id, "User logged in");

    let jar = set_token_cookies(&state, jar, &tokens)?;
    let session_jar = session_jar.add(auth_cookie(
        &state.config.session.cookie_name,
        &session_id.to_string(),
        state.tokens.session_lifetime().num_seconds(),
        state.config.secure_cookies(),
    )?);

    let mut user = user;
    user.last_login_at = Some(Utc::now());
    let response = LoginResponse {
        user: UserResponse::from(&user),
        tokens,
    };
    Ok((jar, session_jar, Json(DataResponse { data: response })))
}

/// POST /api/v1/auth/refresh
///
/// Exchange a refresh token (cookie or body) for a new pair bound to the same
/// session. Each refresh token is single-use: presenting one that was already
/// exchanged revokes the session.
pub async fn refresh(
    State(state): State<AppState>,
    jar: CookieJar,
    body: Bytes,
) -> AppResult<(CookieJar, Json<DataResponse<TokenPair>>)> {
    let from_cookie = jar
        .get(REFRESH_TOKEN_COOKIE)
        .map(|c| c.value().to_string())
        .filter(|t| !t.is_empty());
    let token = match from_cookie {
        Some(token) => token,
        None => optional_json::<RefreshRequest>(&body)?
            .map(|r| r.refresh_token)
            .ok_or_else(|| AppError::unauthorized("Refresh token required"))?,
    };

    let claims = state
        .tokens
        .verify_refresh_token(&token)
        .ok_or_else(|| AppError::unauthorized("Invalid or expired refresh token"))?;

    let record = state
        .sessions
        .get_for_user(claims.user_id, claims.session_id)
        .await?
        .ok_or_else(|| AppError::unauthorized("Invalid session"))?;

    if !state.tokens.is_session_valid(&record) {
        return Err(AppError::unauthorized("Session expired"));
    }

    if record.refresh_jti != Some(claims.jti) {
        return Err(revoke_on_reuse(&state, &record).await);
    }

    let tokens = state
        .tokens
        .generate_token_pair(claims.user_id, &claims.email, claims.session_id)
        .map_err(|e| AppError::InternalError(format!("Token generation error: {e}")))?;

    if !state
        .sessions
        .rotate_refresh(record.session_id, claims.jti, tokens.refresh_jti)
        .await?
    {
        // Another request exchanged the same token first.
        return Err(revoke_on_reuse(&state, &record).await);
    }

    let bumped = state.tokens.update_session_activity(&record);
    state
        .sessions
        .patch(record.session_id, &SessionPatch::activity(&bumped))
        .await?;
    tracing::debug!(session_id = %record.session_id, "Tokens refreshed");

    let jar = set_token_cookies(&state, jar, &tokens)?;
    Ok((jar, Json(DataResponse { data: tokens })))
}

/// POST /api/v1/auth/logout
///
/// Revoke the caller's session and clear every auth cookie.
pub async fn logout(
    State(state): State<AppState>,
    auth_user: AuthUser,
    jar: CookieJar,
    session_jar: SignedCookieJar,
) -> AppResult<(CookieJar, SignedCookieJar, Json<DataResponse<MessageResponse>>)> {
    let now = Utc::now();
    state
        .sessions
        .patch(auth_user.session_id, &SessionPatch::revocation(now))
        .await?;

    // Expiring the cookie metadata makes the record collectable by the sweep.
    if let Err(e) = state
        .sessions
        .touch(auth_user.session_id, &CookieMeta::expired(now))
        .await
    {
        tracing::warn!(error = %e, session_id = %auth_user.session_id, "Server session teardown failed");
    }

    tracing::info!(user_id = %auth_user.id, session_id = %auth_user.session_id, "User logged out");

    let (jar, session_jar) = clear_auth_cookies(&state, jar, session_jar);
    Ok((jar, session_jar, Json(MessageResponse::new("Logged out successfully"))))
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Replace the access and refresh cookies with `tokens`.
fn set_token_cookies(state: &AppState, jar: CookieJar, tokens: &TokenPair) -> AppResult<CookieJar> {
    let secure = state.config.secure_cookies();
    Ok(jar
        .add(auth_cookie(
            ACCESS_TOKEN_COOKIE,
            &tokens.access_token,
            tokens.access_expires_in,
            secure,
        )?)
        .add(auth_cookie(
            REFRESH_TOKEN_COOKIE,
            &tokens.refresh_token,
            tokens.refresh_expires_in,
            secure,
        )?))
}

/// Remove the access, refresh and session cookies.
pub(crate) fn clear_auth_cookies(
    state: &AppState,
    jar: CookieJar,
    session_jar: SignedCookieJar,
) -> (CookieJar, SignedCookieJar) {
    let jar = jar
        .remove(removal(ACCESS_TOKEN_COOKIE))
        .remove(removal(REFRESH_TOKEN_COOKIE));
    let session_jar = session_jar.remove(removal(state.config.session.cookie_name.clone()));
    (jar, session_jar)
}

/// A refresh token was presented twice: revoke the whole session.
async fn revoke_on_reuse(state: &AppState, record: &SessionRecord) -> AppError {
    tracing::warn!(
        user_id = %record.user_id,
        session_id = %record.session_id,
        "Refresh token reuse detected, revoking session"
    );
    let revoked = state.tokens.revoke_session(record);
    let now = revoked.logged_out_at.unwrap_or_else(Utc::now);
    if let Err(e) = state
        .sessions
        .patch(record.session_id, &SessionPatch::revocation(now))
        .await
    {
        return AppError::Store(e);
    }
    if let Err(e) = state
        .sessions
        .touch(record.session_id, &CookieMeta::expired(now))
        .await
    {
        tracing::warn!(error = %e, session_id = %record.session_id, "Server session teardown failed");
    }
    AppError::unauthorized("Refresh token already used")
}
