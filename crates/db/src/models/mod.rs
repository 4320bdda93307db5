//! Row structs and DTOs.
//!
//! Session documents are modelled by [`userhub_core::session::SessionRecord`];
//! this module only holds the relational rows.

pub mod otp;
pub mod user;
