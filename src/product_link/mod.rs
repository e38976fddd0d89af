pub mod handlers;
pub mod repository;
pub mod service;

pub use repository::ProductLinkRepository;
pub use service::{
    LinkInput, LinkTypeResponse, ProductLinkResponse, ProductLinkService, ProductLinkUpdate,
};
