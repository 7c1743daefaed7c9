//! Shared models and error types for the Stratus weather proxy.

pub mod error;
pub mod models;

pub use error::{ProxyError, ProxyResult};
pub use models::credential::Credential;
