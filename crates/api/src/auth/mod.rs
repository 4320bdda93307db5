//! Authentication primitives.
//!
//! - [`password`] -- salted Argon2id hashing and constant-time verification.
//! - [`jwt`] -- token issuance/verification and session-record helpers.
//! - [`local`] -- email + password credential check.
//! - [`cookies`] -- `Set-Cookie` builders for tokens and the session id.

pub mod cookies;
pub mod jwt;
pub mod local;
pub mod password;
