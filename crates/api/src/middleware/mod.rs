//! Authentication and authorization extractors.
//!
//! - [`auth::AuthUser`] -- resolves the caller from a JWT (Bearer header or
//!   `accessToken` cookie) or from the signed server-session cookie.
//! - [`rbac::RequireAdmin`] -- requires the `admin` role.

pub mod auth;
pub mod rbac;
