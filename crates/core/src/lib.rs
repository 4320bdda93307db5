//! Domain types shared by the persistence and HTTP layers.
//!
//! Nothing in this crate performs I/O: session lifecycle rules are expressed
//! as pure functions over [`session::SessionRecord`] that take the current
//! time as an argument.

pub mod error;
pub mod roles;
pub mod session;
pub mod types;
