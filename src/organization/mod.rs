//! Organisations: personal org provisioning and branding.

pub mod handlers;
pub mod service;

pub use service::OrganizationService;
