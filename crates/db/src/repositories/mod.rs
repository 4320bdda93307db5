//! PostgreSQL repositories.
//!
//! Each repository owns a clone of the pool and implements one of the store
//! traits from [`crate::store`].

pub mod otp_repo;
pub mod session_repo;
pub mod user_repo;

pub use otp_repo::OtpRepo;
pub use session_repo::SessionRepo;
pub use user_repo::UserRepo;
