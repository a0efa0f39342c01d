//! Centralized error handling for the Xtream proxy
//!
//! This module provides the error taxonomy shared by all application layers.
//! Errors fall into three groups:
//!
//! - **Request errors**: missing or unusable caller parameters
//! - **Upstream errors**: failures talking to the Xtream catalog server
//! - **Proxy errors**: failures on the stream/image passthrough paths
//!
//! The mapping from error to HTTP status code lives in [`crate::web::responses`].

pub mod types;

pub use types::*;

/// Convenience type alias for Results using AppError
pub type AppResult<T> = Result<T, AppError>;
