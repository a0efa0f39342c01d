//! Error type definitions for the Xtream proxy application

use axum::http::StatusCode;
use thiserror::Error;

/// Top-level application error type
///
/// Each variant corresponds to one externally observable failure mode and
/// carries the human-readable detail surfaced in the JSON error body.
/// Recoverable conditions (optional catalog endpoints, per-series episode
/// lookups, mid-stream relay failures) are absorbed at their call sites and
/// never reach this type.
#[derive(Error, Debug)]
pub enum AppError {
    /// Required request parameters are absent or unusable
    #[error("Missing parameters: {detail}")]
    MissingParameters { detail: String },

    /// The upstream rejected the credentials or returned an auth response
    /// without the required `user_info`/`server_info` objects
    #[error("Invalid credentials: {detail}")]
    InvalidCredentials { detail: String },

    /// The auth endpoint answered with something that is not JSON at all
    #[error("Malformed authentication response: {detail}")]
    AuthResponseMalformed { detail: String },

    /// Network, TLS, or HTTP-level failure reaching the catalog upstream
    #[error("Upstream transport error: {detail}")]
    UpstreamTransport { detail: String },

    /// A mandatory catalog endpoint returned data that is not list-shaped
    #[error("Invalid catalog format: {detail}")]
    InvalidCatalogFormat { detail: String },

    /// The proxied origin did not answer within the timeout budget
    #[error("Upstream timed out")]
    ProxyUpstreamTimeout,

    /// The proxied origin answered with a non-success status, forwarded as-is
    #[error("Upstream returned HTTP {status}")]
    ProxyUpstreamHttp { status: StatusCode },

    /// The proxied origin served a content category the endpoint rejects
    #[error("Unsupported content type: {content_type}")]
    ProxyUnsupportedContentType { content_type: String },

    /// Any other failure before the proxied response has started
    #[error("Proxy failure: {detail}")]
    ProxyFailure { detail: String },

    /// Generic internal errors
    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl AppError {
    /// Create a missing-parameters error
    pub fn missing_parameters<S: Into<String>>(detail: S) -> Self {
        Self::MissingParameters {
            detail: detail.into(),
        }
    }

    /// Create an invalid-credentials error
    pub fn invalid_credentials<S: Into<String>>(detail: S) -> Self {
        Self::InvalidCredentials {
            detail: detail.into(),
        }
    }

    /// Create an upstream transport error
    pub fn upstream_transport<S: Into<String>>(detail: S) -> Self {
        Self::UpstreamTransport {
            detail: detail.into(),
        }
    }

    /// Create an invalid-catalog-format error
    pub fn invalid_catalog_format<S: Into<String>>(detail: S) -> Self {
        Self::InvalidCatalogFormat {
            detail: detail.into(),
        }
    }

    /// Create a proxy failure error
    pub fn proxy_failure<S: Into<String>>(detail: S) -> Self {
        Self::ProxyFailure {
            detail: detail.into(),
        }
    }

    /// Create an internal error
    pub fn internal<S: Into<String>>(message: S) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Short error label used in JSON error bodies
    pub fn label(&self) -> &'static str {
        match self {
            Self::MissingParameters { .. } => "Missing Parameters",
            Self::InvalidCredentials { .. } => "Invalid Credentials",
            Self::AuthResponseMalformed { .. } => "Malformed Auth Response",
            Self::UpstreamTransport { .. } => "Upstream Transport Error",
            Self::InvalidCatalogFormat { .. } => "Invalid Catalog Format",
            Self::ProxyUpstreamTimeout => "Upstream Timeout",
            Self::ProxyUpstreamHttp { .. } => "Upstream HTTP Error",
            Self::ProxyUnsupportedContentType { .. } => "Unsupported Content Type",
            Self::ProxyFailure { .. } => "Proxy Failure",
            Self::Internal { .. } => "Internal Error",
        }
    }

    /// HTTP status code this error surfaces as
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::MissingParameters { .. } => StatusCode::BAD_REQUEST,
            Self::InvalidCredentials { .. } => StatusCode::BAD_REQUEST,
            Self::AuthResponseMalformed { .. } => StatusCode::SERVICE_UNAVAILABLE,
            Self::UpstreamTransport { .. } => StatusCode::SERVICE_UNAVAILABLE,
            Self::InvalidCatalogFormat { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            Self::ProxyUpstreamTimeout => StatusCode::GATEWAY_TIMEOUT,
            Self::ProxyUpstreamHttp { status } => *status,
            Self::ProxyUnsupportedContentType { .. } => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            Self::ProxyFailure { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}
