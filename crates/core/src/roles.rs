//! Role names stored on the `users.role` column.

pub const ROLE_USER: &str = "user";
pub const ROLE_ADMIN: &str = "admin";
