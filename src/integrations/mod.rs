//! Outbound integrations: inference service, Service Bus, background removal
//! and model conversion.

pub mod background_removal;
pub mod converter;
pub mod model_service;
pub mod service_bus;
pub mod signing;

pub use background_removal::BackgroundRemovalClient;
pub use converter::ModelConverter;
pub use model_service::{ImagePayload, ModelServiceClient, StatusReply};
pub use service_bus::{ProductProcessingMessage, ServiceBusPublisher};
