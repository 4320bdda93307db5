//! Salted Argon2id password hashing and verification.
//!
//! The salt is generated per account (and regenerated on every password
//! change) and stored next to the hash. Hashing is deterministic for a given
//! `(password, salt)` pair, so verification rehashes with the stored salt and
//! compares the raw digests in constant time.

use argon2::password_hash::{PasswordHash, PasswordHasher, SaltString};
use argon2::Argon2;
use uuid::Uuid;

/// A fresh random salt.
pub fn generate_salt() -> String {
    Uuid::new_v4().to_string()
}

/// Hash `password` with `salt` using Argon2id.
///
/// Returns the PHC-formatted hash string. `salt` must be 4..=48 bytes.
pub fn hash_password(password: &str, salt: &str) -> Result<String, argon2::password_hash::Error> {
    let salt = SaltString::encode_b64(salt.as_bytes())?;
    let hash = Argon2::default().hash_password(password.as_bytes(), &salt)?;
    Ok(hash.to_string())
}

/// Verify `password` against a stored hash produced with `salt`.
///
/// Returns `Ok(true)` if the password matches, `Ok(false)` if it does not.
/// Digest equality uses the constant-time comparison of
/// [`argon2::password_hash::Output`].
pub fn verify_password(
    password: &str,
    salt: &str,
    stored_hash: &str,
) -> Result<bool, argon2::password_hash::Error> {
    let stored = PasswordHash::new(stored_hash)?;
    let candidate = hash_password(password, salt)?;
    let candidate = PasswordHash::new(&candidate)?;

    Ok(match (stored.hash, candidate.hash) {
        (Some(expected), Some(actual)) => expected == actual,
        _ => false,
    })
}
