//! Request authentication.
//!
//! Credentials are tried in priority order:
//!
//! 1. `Authorization: Bearer <access token>`
//! 2. the `accessToken` cookie
//! 3. the signed server-session cookie
//!
//! A JWT that is present but fails any check rejects the request; it never
//! falls through to the session cookie.

use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use axum::http::HeaderMap;
use axum_extra::extract::cookie::{CookieJar, SignedCookieJar};
use chrono::Utc;
use serde::Serialize;
use userhub_core::session::{CookieMeta, SessionPatch};
use userhub_core::types::{SessionId, UserId};
use userhub_db::models::user::User;
use uuid::Uuid;

use crate::auth::cookies::ACCESS_TOKEN_COOKIE;
use crate::error::{AppError, AppResult};
use crate::state::AppState;

/// Identity resolved for the current request. Never persisted.
///
/// ```ignore
/// async fn my_handler(user: AuthUser) -> AppResult<Json<()>> {
///     tracing::info!(user_id = %user.id, "handling request");
///     Ok(Json(()))
/// }
/// ```
#[derive(Debug, Clone, Serialize)]
pub struct AuthUser {
    pub id: UserId,
    pub email: String,
    pub firstname: String,
    pub lastname: String,
    pub session_id: SessionId,
    pub role: String,
}

impl AuthUser {
    fn new(user: &User, session_id: SessionId) -> Self {
        Self {
            id: user.id,
            email: user.email.clone(),
            firstname: user.firstname.clone(),
            lastname: user.lastname.clone(),
            session_id,
            role: user.role.clone(),
        }
    }
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        // Resolved once per request even when several extractors ask.
        if let Some(user) = parts.extensions.get::<AuthUser>() {
            return Ok(user.clone());
        }

        let user = match access_token(&parts.headers) {
            Some(token) => authenticate_jwt(state, &token).await?,
            None => {
                let jar = SignedCookieJar::from_headers(&parts.headers, state.cookie_key.clone());
                match jar.get(&state.config.session.cookie_name) {
                    Some(cookie) => authenticate_session(state, cookie.value()).await?,
                    None => return Err(AppError::unauthorized("Authentication required")),
                }
            }
        };

        parts.extensions.insert(user.clone());
        Ok(user)
    }
}

/// Bearer header first, then the `accessToken` cookie.
fn access_token(headers: &HeaderMap) -> Option<String> {
    let bearer = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty());
    if let Some(token) = bearer {
        return Some(token.to_string());
    }

    CookieJar::from_headers(headers)
        .get(ACCESS_TOKEN_COOKIE)
        .map(|c| c.value().to_string())
        .filter(|t| !t.is_empty())
}

/// JWT path: verify the token, check the session, persist the activity bump.
async fn authenticate_jwt(state: &AppState, token: &str) -> AppResult<AuthUser> {
    let claims = state
        .tokens
        .verify_access_token(token)
        .ok_or_else(|| AppError::unauthorized("Invalid or expired token"))?;

    let record = state
        .sessions
        .get_for_user(claims.user_id, claims.session_id)
        .await?
        .ok_or_else(|| AppError::unauthorized("Invalid session"))?;

    if !state.tokens.is_session_valid(&record) {
        tracing::debug!(session_id = %record.session_id, "Rejected inactive or expired session");
        return Err(AppError::unauthorized("Session expired"));
    }

    let bumped = state.tokens.update_session_activity(&record);
    if !state
        .sessions
        .patch(record.session_id, &SessionPatch::activity(&bumped))
        .await?
    {
        // Deleted between the read and the write.
        return Err(AppError::unauthorized("Invalid session"));
    }

    let user = load_user(state, claims.user_id).await?;
    Ok(AuthUser::new(&user, record.session_id))
}

/// Session-cookie path: the signed value is the session id.
async fn authenticate_session(state: &AppState, raw_id: &str) -> AppResult<AuthUser> {
    let session_id =
        Uuid::parse_str(raw_id).map_err(|_| AppError::unauthorized("Invalid session"))?;

    // `get` destroys records whose cookie expiry has passed.
    let record = state
        .sessions
        .get(session_id)
        .await?
        .ok_or_else(|| AppError::unauthorized("Invalid session"))?;

    if !state.tokens.is_session_valid(&record) {
        return Err(AppError::unauthorized("Session expired"));
    }

    let bumped = state.tokens.update_session_activity(&record);
    let cookie = bumped
        .cookie
        .unwrap_or_else(|| CookieMeta::new(Utc::now(), state.tokens.session_lifetime()));
    let patch = SessionPatch {
        cookie: Some(cookie),
        last_access: Some(bumped.last_activity),
        ..SessionPatch::activity(&bumped)
    };
    if !state.sessions.patch(session_id, &patch).await? {
        return Err(AppError::unauthorized("Invalid session"));
    }

    let user = load_user(state, record.user_id).await?;
    Ok(AuthUser::new(&user, session_id))
}

async fn load_user(state: &AppState, user_id: UserId) -> AppResult<User> {
    state
        .users
        .find_by_id(user_id)
        .await?
        .ok_or_else(|| AppError::unauthorized("User not found"))
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderValue;

    use super::*;

    #[test]
    fn bearer_header_takes_priority_over_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer from-header"));
        headers.insert("cookie", HeaderValue::from_static("accessToken=from-cookie"));

        assert_eq!(access_token(&headers).as_deref(), Some("from-header"));
    }

    #[test]
    fn cookie_is_used_without_bearer_header() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Basic abc"));
        headers.insert("cookie", HeaderValue::from_static("other=1; accessToken=from-cookie"));

        assert_eq!(access_token(&headers).as_deref(), Some("from-cookie"));
    }

    #[test]
    fn no_credentials_yields_none() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer "));
        assert!(access_token(&headers).is_none());
    }
}
