//! Standalone image-to-3D jobs and the assets they produce.

pub mod handlers;
pub mod repository;
pub mod service;
pub mod types;

pub use service::JobService;
pub use types::JobStatus;
