//! User accounts: email/password and Google sign-in, JWT issuance and the
//! request guards that resolve the caller.

pub mod google;
pub mod handlers;
pub mod middleware;
pub mod repository;
pub mod service;

pub use google::GoogleVerifier;
pub use middleware::CurrentUser;
pub use service::{AuthService, Claims};
