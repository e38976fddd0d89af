//! In-app notifications with per-user muting.

pub mod handlers;
pub mod service;

pub use service::{NotificationItem, NotificationService};
