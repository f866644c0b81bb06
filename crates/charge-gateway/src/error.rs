//! Error types for the charge gateway client.

use thiserror::Error;

/// Errors that can occur when talking to the charge service.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Non-success response from the charge service.
    #[error("charge service returned {status}: {body}")]
    Status { status: u16, body: String },

    /// Response body did not match the expected shape.
    #[error("malformed charge service response: {0}")]
    Malformed(String),
}
