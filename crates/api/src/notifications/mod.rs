//! Outbound user notifications.

pub mod mailer;
