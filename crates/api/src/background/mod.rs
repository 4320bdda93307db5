//! Background tasks and scheduled jobs.
//!
//! Tasks are owned by explicitly constructed objects held in
//! [`crate::state::AppState`] and stop through a `CancellationToken`.

pub mod session_cleanup;
