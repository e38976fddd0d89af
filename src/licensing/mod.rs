//! Plans, subscriptions and per-user quota enforcement.

pub mod handlers;
pub mod plans;
pub mod quota;
pub mod service;
pub mod subscription;

pub use quota::QuotaKind;
pub use service::{LicensingService, QuotaReservation};
