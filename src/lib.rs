//! Rivollo API - backend for a 3D product catalog
//!
//! Products are created from a photo, turned into a 3D model by an external
//! inference service, annotated with hotspots and dimensions, grouped into
//! galleries and published behind public links. Plans and licenses meter
//! what each account may create.
//!
//! # Modules
//!
//! - [`config`] / [`logging`] / [`db`] / [`error`] - ambient plumbing
//! - [`gateway`] - axum router, shared state, response envelope, OpenAPI
//! - [`user_auth`] - accounts, JWT and Google sign-in
//! - [`licensing`] - plans, licenses and quota reservation
//! - [`product`] - catalog, assets, generation and publishing
//! - [`hotspot`] / [`dimension`] / [`product_link`] - product annotations
//! - [`gallery`] - product collections
//! - [`storage`] / [`integrations`] - blob storage and outbound services
//! - [`job`] - standalone image-to-3D jobs
//! - [`analytics`] / [`search`] / [`notification`] / [`activity`] / [`support`]

// Ambient
pub mod config;
pub mod db;
pub mod error;
pub mod logging;

// HTTP surface
pub mod gateway;

// Accounts and plans
pub mod activity;
pub mod licensing;
pub mod notification;
pub mod organization;
pub mod user_auth;

// Catalog
pub mod dimension;
pub mod gallery;
pub mod hotspot;
pub mod product;
pub mod product_link;
pub mod slug;

// Files and outbound services
pub mod integrations;
pub mod job;
pub mod storage;

// Reporting
pub mod analytics;
pub mod search;
pub mod support;

pub use error::AppError;
