//! Error types for the donation provider client.

use thiserror::Error;

/// Errors that can occur when talking to a donation provider.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Non-success response from the provider.
    #[error("provider returned {status}: {body}")]
    Status { status: u16, body: String },

    /// Response body did not match the expected shape.
    #[error("malformed provider response: {0}")]
    Malformed(String),
}
