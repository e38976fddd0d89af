//! Galleries: curated product collections of an organisation, gated by plan.

pub mod handlers;
pub mod repository;
pub mod service;
pub mod types;

pub use repository::GalleryRepository;
pub use service::GalleryService;
pub use types::GalleryResponse;
