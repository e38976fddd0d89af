//! Viewer analytics: raw events, the per-product daily rollup, and the
//! dashboard built on top of it.

pub mod handlers;
pub mod repository;
pub mod service;
pub mod types;

pub use service::{AnalyticsService, DashboardService};
