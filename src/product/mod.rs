//! Products: catalogue CRUD, publishing, viewer payloads and image-to-3D
//! generation.
//!
//! - [`service`]: ownership-scoped operations behind the REST routes
//! - [`generation`]: `createProduct` and the status poller
//! - [`assets`]: asset mappings and the viewer payload
//! - [`reference`]: currency, background and background-type tables

pub mod assets;
pub mod background;
pub mod generation;
pub mod handlers;
pub mod reference;
pub mod repository;
pub mod service;
pub mod types;

pub use generation::GenerationTracker;
pub use repository::{ProductRepository, ProductRow};
pub use service::ProductService;
pub use types::{ProductResponse, ProductStatus};
