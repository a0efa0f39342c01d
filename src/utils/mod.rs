//! Utility modules for the xtream-proxy application
//!
//! This module contains reusable utilities that can be used
//! across different parts of the system.

pub mod http_client_factory;
pub mod url;

// Re-export commonly used types for convenience
pub use http_client_factory::{HttpClientFactory, HttpClients};
pub use url::UrlUtils;
