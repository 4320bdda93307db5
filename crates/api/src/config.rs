use std::fmt::Display;
use std::ops::RangeInclusive;
use std::str::FromStr;

use crate::auth::jwt::JwtConfig;

/// Secret used outside production when `SESSION_SECRET` is unset.
const DEV_SESSION_SECRET: &str = "userhub-dev-session-secret-change-me";

/// Default rolling session lifetime in days.
pub const DEFAULT_SESSION_LIFETIME_DAYS: i64 = userhub_core::session::DEFAULT_SESSION_LIFETIME_DAYS;

/// Accepted `SESSION_LIFETIME_DAYS`.
pub const SESSION_LIFETIME_DAYS_RANGE: RangeInclusive<i64> = 1..=3650;

/// Accepted sweep interval, for both the env var and the admin endpoint.
pub const CLEANUP_INTERVAL_HOURS_RANGE: RangeInclusive<u64> = 1..=168;

/// Accepted `STORE_TIMEOUT_SECS`.
pub const STORE_TIMEOUT_SECS_RANGE: RangeInclusive<u64> = 1..=300;

/// Default cookie name of the server-side session.
pub const DEFAULT_SESSION_COOKIE_NAME: &str = "userhub.sid";

/// Configuration errors that stop the server from starting.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} must be set when APP_ENV=production")]
    MissingSecret(&'static str),

    #[error("JWT_ACCESS_SECRET and JWT_REFRESH_SECRET must differ")]
    SharedJwtSecret,

    #[error("{name} has an invalid value: {value:?}")]
    Invalid { name: &'static str, value: String },
}

/// Deployment environment selected by `APP_ENV`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Production,
}

impl Environment {
    /// Anything other than `production` (case-insensitive) is development.
    pub fn parse(value: Option<&str>) -> Self {
        match value {
            Some(v) if v.trim().eq_ignore_ascii_case("production") => Environment::Production,
            _ => Environment::Development,
        }
    }

    pub fn is_production(self) -> bool {
        self == Environment::Production
    }

    /// Default sweep interval of the session cleanup job.
    pub fn default_cleanup_interval_hours(self) -> u64 {
        if self.is_production() {
            6
        } else {
            1
        }
    }
}

/// Server-side session settings.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Rolling lifetime of session records and the session cookie.
    pub lifetime_days: i64,
    pub cookie_name: String,
    /// Material the cookie signing key is derived from.
    pub secret: String,
    pub cleanup_interval_hours: u64,
    /// Deadline applied to every store call.
    pub store_timeout_secs: u64,
}

impl SessionConfig {
    /// | Env Var                          | Default                            |
    /// |----------------------------------|------------------------------------|
    /// | `SESSION_LIFETIME_DAYS`          | `365`                              |
    /// | `SESSION_COOKIE_NAME`            | `userhub.sid`                      |
    /// | `SESSION_SECRET`                 | dev fallback (required in prod)    |
    /// | `SESSION_CLEANUP_INTERVAL_HOURS` | `6` in production, `1` otherwise   |
    /// | `STORE_TIMEOUT_SECS`             | `5`                                |
    pub fn from_env(env: Environment) -> Result<Self, ConfigError> {
        Ok(Self {
            lifetime_days: parse_in_range(
                "SESSION_LIFETIME_DAYS",
                DEFAULT_SESSION_LIFETIME_DAYS,
                SESSION_LIFETIME_DAYS_RANGE,
            )?,
            cookie_name: std::env::var("SESSION_COOKIE_NAME")
                .unwrap_or_else(|_| DEFAULT_SESSION_COOKIE_NAME.into()),
            secret: resolve_secret(
                "SESSION_SECRET",
                std::env::var("SESSION_SECRET").ok(),
                env,
                DEV_SESSION_SECRET,
            )?,
            cleanup_interval_hours: parse_in_range(
                "SESSION_CLEANUP_INTERVAL_HOURS",
                env.default_cleanup_interval_hours(),
                CLEANUP_INTERVAL_HOURS_RANGE,
            )?,
            store_timeout_secs: parse_in_range("STORE_TIMEOUT_SECS", 5, STORE_TIMEOUT_SECS_RANGE)?,
        })
    }
}

/// Server configuration loaded from environment variables.
///
/// All fields have sensible defaults suitable for local development.
/// In production, secrets must be provided explicitly.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `3000`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS` env var.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `30`).
    pub request_timeout_secs: u64,
    pub environment: Environment,
    /// JWT signing secrets and token lifetimes.
    pub jwt: JwtConfig,
    pub session: SessionConfig,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                | Default                    |
    /// |------------------------|----------------------------|
    /// | `HOST`                 | `0.0.0.0`                  |
    /// | `PORT`                 | `3000`                     |
    /// | `CORS_ORIGINS`         | `http://localhost:3000`    |
    /// | `REQUEST_TIMEOUT_SECS` | `30`                       |
    /// | `APP_ENV`              | `development`              |
    ///
    /// See [`JwtConfig::from_env`] and [`SessionConfig::from_env`] for the
    /// remaining variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let environment = Environment::parse(std::env::var("APP_ENV").ok().as_deref());

        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into());
        let port: u16 = parse_var("PORT", 3000)?;

        let cors_origins = parse_origins(
            &std::env::var("CORS_ORIGINS").unwrap_or_else(|_| "http://localhost:3000".into()),
        )?;

        let request_timeout_secs: u64 = parse_var("REQUEST_TIMEOUT_SECS", 30)?;

        let jwt = JwtConfig::from_env(environment)?;
        let session = SessionConfig::from_env(environment)?;

        Ok(Self {
            host,
            port,
            cors_origins,
            request_timeout_secs,
            environment,
            jwt,
            session,
        })
    }

    /// Cookies carry the `Secure` attribute only in production.
    pub fn secure_cookies(&self) -> bool {
        self.environment.is_production()
    }
}

/// Read `name` and parse it, falling back to `default` when unset.
pub(crate) fn parse_var<T: FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match std::env::var(name) {
        Ok(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { name, value }),
        Err(_) => Ok(default),
    }
}

/// [`parse_var`], then reject values outside `range`.
pub(crate) fn parse_in_range<T>(
    name: &'static str,
    default: T,
    range: RangeInclusive<T>,
) -> Result<T, ConfigError>
where
    T: FromStr + PartialOrd + Display,
{
    check_range(name, parse_var(name, default)?, &range)
}

/// Reject `value` unless it lies within `range`.
pub fn check_range<T>(name: &'static str, value: T, range: &RangeInclusive<T>) -> Result<T, ConfigError>
where
    T: PartialOrd + Display,
{
    if range.contains(&value) {
        Ok(value)
    } else {
        Err(ConfigError::Invalid {
            name,
            value: value.to_string(),
        })
    }
}

/// Split a comma-separated origin list and reject entries that are not valid
/// header values.
pub fn parse_origins(raw: &str) -> Result<Vec<String>, ConfigError> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|origin| {
            axum::http::HeaderValue::from_str(origin)
                .map(|_| origin.to_string())
                .map_err(|_| ConfigError::Invalid {
                    name: "CORS_ORIGINS",
                    value: origin.to_string(),
                })
        })
        .collect()
}

/// Pick a signing secret.
///
/// A configured non-empty value always wins. Without one, production is a
/// hard error and development falls back to `fallback` with a warning.
pub fn resolve_secret(
    name: &'static str,
    configured: Option<String>,
    env: Environment,
    fallback: &str,
) -> Result<String, ConfigError> {
    match configured.filter(|s| !s.trim().is_empty()) {
        Some(secret) => Ok(secret),
        None if env.is_production() => Err(ConfigError::MissingSecret(name)),
        None => {
            tracing::warn!(var = name, "Secret not configured, using development fallback");
            Ok(fallback.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn environment_defaults_to_development() {
        assert_eq!(Environment::parse(None), Environment::Development);
        assert_eq!(Environment::parse(Some("staging")), Environment::Development);
        assert_eq!(Environment::parse(Some("Production")), Environment::Production);
    }

    #[test]
    fn cleanup_interval_default_depends_on_environment() {
        assert_eq!(Environment::Production.default_cleanup_interval_hours(), 6);
        assert_eq!(Environment::Development.default_cleanup_interval_hours(), 1);
    }

    #[test]
    fn configured_secret_wins() {
        let secret = resolve_secret(
            "JWT_ACCESS_SECRET",
            Some("configured".into()),
            Environment::Production,
            "fallback",
        )
        .unwrap();
        assert_eq!(secret, "configured");
    }

    #[test]
    fn missing_secret_is_fatal_in_production() {
        let result = resolve_secret("SESSION_SECRET", None, Environment::Production, "fallback");
        assert_matches!(result, Err(ConfigError::MissingSecret("SESSION_SECRET")));

        let blank = resolve_secret(
            "SESSION_SECRET",
            Some("   ".into()),
            Environment::Production,
            "fallback",
        );
        assert_matches!(blank, Err(ConfigError::MissingSecret(_)));
    }

    #[test]
    fn missing_secret_falls_back_in_development() {
        let secret =
            resolve_secret("SESSION_SECRET", None, Environment::Development, "fallback").unwrap();
        assert_eq!(secret, "fallback");
    }

    #[test]
    fn origins_are_trimmed_and_validated() {
        let origins = parse_origins("http://a.test, http://b.test ,").unwrap();
        assert_eq!(origins, vec!["http://a.test", "http://b.test"]);

        assert_matches!(
            parse_origins("http://ok.test,bad\norigin"),
            Err(ConfigError::Invalid { name: "CORS_ORIGINS", .. })
        );
    }

    #[test]
    fn session_settings_reject_out_of_range_values() {
        assert_matches!(
            check_range("SESSION_LIFETIME_DAYS", 0, &SESSION_LIFETIME_DAYS_RANGE),
            Err(ConfigError::Invalid { name: "SESSION_LIFETIME_DAYS", value }) if value == "0"
        );
        assert_matches!(
            check_range("SESSION_LIFETIME_DAYS", 3651, &SESSION_LIFETIME_DAYS_RANGE),
            Err(ConfigError::Invalid { .. })
        );
        assert_eq!(
            check_range("SESSION_LIFETIME_DAYS", 365, &SESSION_LIFETIME_DAYS_RANGE).unwrap(),
            365
        );

        assert_matches!(
            check_range("SESSION_CLEANUP_INTERVAL_HOURS", 0, &CLEANUP_INTERVAL_HOURS_RANGE),
            Err(ConfigError::Invalid { .. })
        );
        assert_matches!(
            check_range("SESSION_CLEANUP_INTERVAL_HOURS", u64::MAX, &CLEANUP_INTERVAL_HOURS_RANGE),
            Err(ConfigError::Invalid { .. })
        );
        assert_eq!(
            check_range("SESSION_CLEANUP_INTERVAL_HOURS", 168, &CLEANUP_INTERVAL_HOURS_RANGE)
                .unwrap(),
            168
        );

        assert_matches!(
            check_range("STORE_TIMEOUT_SECS", 0, &STORE_TIMEOUT_SECS_RANGE),
            Err(ConfigError::Invalid { name: "STORE_TIMEOUT_SECS", .. })
        );
        assert_eq!(check_range("STORE_TIMEOUT_SECS", 1, &STORE_TIMEOUT_SECS_RANGE).unwrap(), 1);
    }

    #[test]
    fn token_settings_reject_out_of_range_values() {
        use crate::auth::jwt::{ACCESS_EXPIRY_MINS_RANGE, REFRESH_EXPIRY_DAYS_RANGE};

        assert_matches!(
            check_range("JWT_ACCESS_EXPIRY_MINS", 0, &ACCESS_EXPIRY_MINS_RANGE),
            Err(ConfigError::Invalid { name: "JWT_ACCESS_EXPIRY_MINS", .. })
        );
        assert_matches!(
            check_range("JWT_ACCESS_EXPIRY_MINS", 1441, &ACCESS_EXPIRY_MINS_RANGE),
            Err(ConfigError::Invalid { .. })
        );
        assert_matches!(
            check_range("JWT_REFRESH_EXPIRY_DAYS", -1, &REFRESH_EXPIRY_DAYS_RANGE),
            Err(ConfigError::Invalid { .. })
        );
        assert_matches!(
            check_range("JWT_REFRESH_EXPIRY_DAYS", i64::MAX, &REFRESH_EXPIRY_DAYS_RANGE),
            Err(ConfigError::Invalid { .. })
        );
        assert_eq!(
            check_range("JWT_REFRESH_EXPIRY_DAYS", 3650, &REFRESH_EXPIRY_DAYS_RANGE).unwrap(),
            3650
        );
    }
}
