//! `Set-Cookie` construction for the token cookies and the session cookie.
//!
//! Every cookie is `HttpOnly`, `SameSite=Lax`, scoped to `/`, and `Secure`
//! when the server runs in production.

use axum_extra::extract::cookie::Cookie;

use crate::error::{AppError, AppResult};

pub const ACCESS_TOKEN_COOKIE: &str = "accessToken";
pub const REFRESH_TOKEN_COOKIE: &str = "refreshToken";

/// Build an auth cookie living `max_age_secs` seconds.
pub fn auth_cookie(
    name: &str,
    value: &str,
    max_age_secs: i64,
    secure: bool,
) -> AppResult<Cookie<'static>> {
    let secure = if secure { "; Secure" } else { "" };
    let raw = format!("{name}={value}; HttpOnly; SameSite=Lax; Path=/; Max-Age={max_age_secs}{secure}");
    Cookie::parse(raw).map_err(|e| AppError::InternalError(format!("Invalid cookie {name}: {e}")))
}

/// A cookie suitable for `CookieJar::remove`; only name and path matter.
pub fn removal(name: impl Into<String>) -> Cookie<'static> {
    let mut cookie = Cookie::new(name.into(), "");
    cookie.set_path("/");
    cookie
}

#[cfg(test)]
mod tests {
    use axum_extra::extract::cookie::SameSite;

    use super::*;

    #[test]
    fn auth_cookie_carries_flags() {
        let cookie = auth_cookie(ACCESS_TOKEN_COOKIE, "abc", 900, true).unwrap();

        assert_eq!(cookie.name(), "accessToken");
        assert_eq!(cookie.value(), "abc");
        assert_eq!(cookie.http_only(), Some(true));
        assert_eq!(cookie.secure(), Some(true));
        assert_eq!(cookie.same_site(), Some(SameSite::Lax));
        assert_eq!(cookie.path(), Some("/"));
        assert_eq!(cookie.max_age().map(|d| d.whole_seconds()), Some(900));
    }

    #[test]
    fn secure_flag_is_omitted_outside_production() {
        let cookie = auth_cookie(REFRESH_TOKEN_COOKIE, "abc", 60, false).unwrap();
        assert_eq!(cookie.secure(), None);
    }
}
