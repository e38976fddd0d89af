//! Measurements between two marker hotspots on a product.

pub mod handlers;
pub mod repository;
pub mod service;
pub mod types;

pub use service::DimensionService;
