//! Handlers owned by the gateway itself

pub mod health;
