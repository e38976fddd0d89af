//! Labelled points on a product model.

pub mod handlers;
pub mod repository;
pub mod service;
pub mod types;

pub use repository::{DIMENSION_MARKER_PREFIX, HotspotFields, HotspotRepository, HotspotRow};
pub use service::HotspotService;
pub use types::{HotspotPosition, HotspotResponse};
