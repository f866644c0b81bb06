//! Error types for the alerts web server.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use charge_gateway::GatewayError;
use database::DatabaseError;
use donation_provider::ProviderError;
use thiserror::Error;

use crate::host::HostError;

/// Errors surfaced to HTTP callers.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Referenced record is absent.
    #[error("{0}")]
    NotFound(String),

    /// Caller's wallet does not own the resource.
    #[error("{0}")]
    Forbidden(String),

    /// Invalid request (state mismatch, unpaid charge, bad fields).
    #[error("{0}")]
    BadRequest(String),

    /// Missing or unresolvable API key.
    #[error("{0}")]
    Unauthorized(String),

    /// Charge service call failed.
    #[error("Charge service error: {0}")]
    Gateway(#[from] GatewayError),

    /// Donation provider call failed.
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    /// Host application call failed.
    #[error("Host application error: {0}")]
    Host(#[from] HostError),

    /// Database error.
    #[error("Database error: {0}")]
    Database(DatabaseError),

    /// Broken internal invariant.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<DatabaseError> for ApiError {
    fn from(err: DatabaseError) -> Self {
        match err {
            DatabaseError::NotFound { entity, id } => {
                ApiError::NotFound(format!("{entity} not found: {id}"))
            }
            other => ApiError::Database(other),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Gateway(err) => {
                tracing::error!("Charge service error: {}", err);
                StatusCode::BAD_GATEWAY
            }
            ApiError::Provider(err) => {
                tracing::error!("Provider error: {}", err);
                StatusCode::BAD_GATEWAY
            }
            ApiError::Host(err) => {
                tracing::error!("Host application error: {}", err);
                StatusCode::BAD_GATEWAY
            }
            ApiError::Database(err) => {
                tracing::error!("Database error: {}", err);
                StatusCode::INTERNAL_SERVER_ERROR
            }
            ApiError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        let body = serde_json::json!({
            "error": self.to_string()
        });

        (status, Json(body)).into_response()
    }
}

/// Result type for API handlers.
pub type Result<T> = std::result::Result<T, ApiError>;
