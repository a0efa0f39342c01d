//! HTTP response mapping for application errors
//!
//! Every [`AppError`] surfaces as its documented status code with a JSON
//! body carrying a short error label and the human-readable detail.

use axum::Json;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use tracing::warn;

use crate::errors::AppError;

/// JSON error body returned for every failed request
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub details: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        warn!("Request failed with {}: {}", status, self);

        let body = ErrorResponse {
            error: self.label().to_string(),
            details: self.to_string(),
            timestamp: chrono::Utc::now(),
        };

        (status, Json(body)).into_response()
    }
}
