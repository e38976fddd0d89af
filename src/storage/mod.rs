//! Blob storage: signed upload URLs, server-side uploads and the `uploads`
//! audit table.

pub mod handlers;
pub mod repository;
pub mod sas;

pub use sas::{BlobStorage, UploadTarget, product_blob_path, upload_blob_path};
