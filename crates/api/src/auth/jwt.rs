//! JWT access/refresh token issuance and session-record lifecycle helpers.
//!
//! Access and refresh tokens are HS256-signed JWTs carrying a [`Claims`]
//! payload bound to a session id. The two token kinds are signed with
//! distinct secrets and additionally carry a `type` claim, so neither can be
//! presented in place of the other. Every refresh token has a unique `jti`;
//! the session record remembers the only `jti` currently accepted.

use std::ops::RangeInclusive;

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use userhub_core::session::SessionRecord;
use userhub_core::types::{SessionId, UserId};
use uuid::Uuid;

use crate::config::{parse_in_range, resolve_secret, ConfigError, Environment, SESSION_LIFETIME_DAYS_RANGE};

/// `iss` claim of every token.
pub const ISSUER: &str = "userhub-backend";
/// `aud` claim of every token.
pub const AUDIENCE: &str = "userhub-client";

const DEV_ACCESS_SECRET: &str = "userhub-dev-access-secret-change-me";
const DEV_REFRESH_SECRET: &str = "userhub-dev-refresh-secret-change-me";

/// Default access token expiry in minutes.
const DEFAULT_ACCESS_EXPIRY_MINS: i64 = 15;
/// Default refresh token expiry in days.
const DEFAULT_REFRESH_EXPIRY_DAYS: i64 = 365;

/// Accepted `JWT_ACCESS_EXPIRY_MINS`.
pub const ACCESS_EXPIRY_MINS_RANGE: RangeInclusive<i64> = 1..=1440;
/// Accepted `JWT_REFRESH_EXPIRY_DAYS`.
pub const REFRESH_EXPIRY_DAYS_RANGE: RangeInclusive<i64> = 1..=3650;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
    Access,
    Refresh,
}

/// JWT claims embedded in access and refresh tokens.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    pub user_id: UserId,
    pub email: String,
    pub session_id: SessionId,
    #[serde(rename = "type")]
    pub token_type: TokenType,
    pub iss: String,
    pub aud: String,
    /// Expiration time (UTC Unix timestamp).
    pub exp: i64,
    /// Issued-at time (UTC Unix timestamp).
    pub iat: i64,
    /// Unique token identifier.
    pub jti: Uuid,
}

/// Configuration for JWT token generation and validation.
#[derive(Debug, Clone)]
pub struct JwtConfig {
    /// HMAC secret for access tokens.
    pub access_secret: String,
    /// HMAC secret for refresh tokens; never equal to `access_secret`.
    pub refresh_secret: String,
    /// Access token lifetime in minutes (default: 15).
    pub access_token_expiry_mins: i64,
    /// Refresh token lifetime in days (default: 365).
    pub refresh_token_expiry_days: i64,
}

impl JwtConfig {
    /// Load JWT configuration from environment variables.
    ///
    /// | Env Var                    | Required        | Default |
    /// |----------------------------|-----------------|---------|
    /// | `JWT_ACCESS_SECRET`        | in production   | dev     |
    /// | `JWT_REFRESH_SECRET`       | in production   | dev     |
    /// | `JWT_ACCESS_EXPIRY_MINS`   | no              | `15`    |
    /// | `JWT_REFRESH_EXPIRY_DAYS`  | no              | `365`   |
    pub fn from_env(env: Environment) -> Result<Self, ConfigError> {
        let access_secret = resolve_secret(
            "JWT_ACCESS_SECRET",
            std::env::var("JWT_ACCESS_SECRET").ok(),
            env,
            DEV_ACCESS_SECRET,
        )?;
        let refresh_secret = resolve_secret(
            "JWT_REFRESH_SECRET",
            std::env::var("JWT_REFRESH_SECRET").ok(),
            env,
            DEV_REFRESH_SECRET,
        )?;

        let config = Self {
            access_secret,
            refresh_secret,
            access_token_expiry_mins: parse_in_range(
                "JWT_ACCESS_EXPIRY_MINS",
                DEFAULT_ACCESS_EXPIRY_MINS,
                ACCESS_EXPIRY_MINS_RANGE,
            )?,
            refresh_token_expiry_days: parse_in_range(
                "JWT_REFRESH_EXPIRY_DAYS",
                DEFAULT_REFRESH_EXPIRY_DAYS,
                REFRESH_EXPIRY_DAYS_RANGE,
            )?,
        };
        config.check_distinct(env)?;
        Ok(config)
    }

    /// Identical access and refresh secrets are rejected in production.
    pub fn check_distinct(&self, env: Environment) -> Result<(), ConfigError> {
        if self.access_secret != self.refresh_secret {
            return Ok(());
        }
        if env.is_production() {
            return Err(ConfigError::SharedJwtSecret);
        }
        tracing::warn!("JWT_ACCESS_SECRET equals JWT_REFRESH_SECRET");
        Ok(())
    }
}

/// A freshly issued access/refresh pair.
#[derive(Debug, Clone, Serialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    /// Access token lifetime in seconds.
    pub access_expires_in: i64,
    /// Refresh token lifetime in seconds.
    pub refresh_expires_in: i64,
    /// `jti` of `refresh_token`; stored on the session record.
    #[serde(skip)]
    pub refresh_jti: Uuid,
}

/// Issues and verifies tokens and builds session records.
///
/// Holds pre-built keys so no per-request key derivation happens.
pub struct TokenService {
    access_encoding: EncodingKey,
    access_decoding: DecodingKey,
    refresh_encoding: EncodingKey,
    refresh_decoding: DecodingKey,
    access_ttl: Duration,
    refresh_ttl: Duration,
    session_lifetime: Duration,
    validation: Validation,
}

impl TokenService {
    /// Lifetimes outside the accepted ranges are clamped into them.
    pub fn new(config: &JwtConfig, session_lifetime_days: i64) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[ISSUER]);
        validation.set_audience(&[AUDIENCE]);
        validation.set_required_spec_claims(&["exp", "iss", "aud"]);

        Self {
            access_encoding: EncodingKey::from_secret(config.access_secret.as_bytes()),
            access_decoding: DecodingKey::from_secret(config.access_secret.as_bytes()),
            refresh_encoding: EncodingKey::from_secret(config.refresh_secret.as_bytes()),
            refresh_decoding: DecodingKey::from_secret(config.refresh_secret.as_bytes()),
            access_ttl: Duration::minutes(clamp(
                config.access_token_expiry_mins,
                &ACCESS_EXPIRY_MINS_RANGE,
            )),
            refresh_ttl: Duration::days(clamp(
                config.refresh_token_expiry_days,
                &REFRESH_EXPIRY_DAYS_RANGE,
            )),
            session_lifetime: Duration::days(clamp(
                session_lifetime_days,
                &SESSION_LIFETIME_DAYS_RANGE,
            )),
            validation,
        }
    }

    pub fn session_lifetime(&self) -> Duration {
        self.session_lifetime
    }

    pub fn generate_session_id(&self) -> SessionId {
        Uuid::new_v4()
    }

    /// Sign a new access/refresh pair bound to `session_id`.
    pub fn generate_token_pair(
        &self,
        user_id: UserId,
        email: &str,
        session_id: SessionId,
    ) -> Result<TokenPair, jsonwebtoken::errors::Error> {
        let now = Utc::now().timestamp();
        let claims = |token_type: TokenType, ttl: Duration| Claims {
            user_id,
            email: email.to_string(),
            session_id,
            token_type,
            iss: ISSUER.to_string(),
            aud: AUDIENCE.to_string(),
            exp: now + ttl.num_seconds(),
            iat: now,
            jti: Uuid::new_v4(),
        };

        let access = claims(TokenType::Access, self.access_ttl);
        let refresh = claims(TokenType::Refresh, self.refresh_ttl);
        let refresh_jti = refresh.jti;

        Ok(TokenPair {
            access_token: encode(&Header::default(), &access, &self.access_encoding)?,
            refresh_token: encode(&Header::default(), &refresh, &self.refresh_encoding)?,
            access_expires_in: self.access_ttl.num_seconds(),
            refresh_expires_in: self.refresh_ttl.num_seconds(),
            refresh_jti,
        })
    }

    /// Verify signature, issuer, audience, expiry and `type == access`.
    pub fn verify_access_token(&self, token: &str) -> Option<Claims> {
        self.verify(token, &self.access_decoding, TokenType::Access)
    }

    /// Verify signature, issuer, audience, expiry and `type == refresh`.
    pub fn verify_refresh_token(&self, token: &str) -> Option<Claims> {
        self.verify(token, &self.refresh_decoding, TokenType::Refresh)
    }

    fn verify(&self, token: &str, key: &DecodingKey, expected: TokenType) -> Option<Claims> {
        let claims = match decode::<Claims>(token, key, &self.validation) {
            Ok(data) => data.claims,
            Err(e) => {
                tracing::debug!(error = %e, kind = ?expected, "Token rejected");
                return None;
            }
        };
        if claims.token_type != expected {
            tracing::debug!(kind = ?expected, "Token rejected: wrong type");
            return None;
        }
        Some(claims)
    }

    /// A new active record expiring one session lifetime from now.
    pub fn create_session_data(
        &self,
        user_id: UserId,
        email: &str,
        session_id: SessionId,
    ) -> SessionRecord {
        SessionRecord::new(user_id, email, session_id, Utc::now(), self.session_lifetime)
    }

    /// Slide the rolling expiry window to now.
    pub fn update_session_activity(&self, record: &SessionRecord) -> SessionRecord {
        record.with_activity(Utc::now(), self.session_lifetime)
    }

    pub fn is_session_valid(&self, record: &SessionRecord) -> bool {
        record.is_valid_at(Utc::now())
    }

    pub fn revoke_session(&self, record: &SessionRecord) -> SessionRecord {
        record.revoked(Utc::now())
    }
}

fn clamp(value: i64, range: &RangeInclusive<i64>) -> i64 {
    value.clamp(*range.start(), *range.end())
}
