//! API key resolution against the host application.
//!
//! Callers present an `X-API-KEY` header holding one of their wallet's
//! keys. The host application resolves the key to a wallet; admin
//! endpoints additionally require the key to be the wallet's admin key.

use axum::http::HeaderMap;

use crate::error::ApiError;
use crate::host::Wallet;
use crate::state::AppState;

/// Access level required by an endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyLevel {
    /// Full access; the wallet's admin key is required.
    Admin,
    /// Read/invoice access; either key is accepted.
    Invoice,
}

/// Resolve the caller's wallet from the `X-API-KEY` header.
pub async fn require_key(
    state: &AppState,
    headers: &HeaderMap,
    level: KeyLevel,
) -> Result<Wallet, ApiError> {
    let key = headers
        .get("X-API-KEY")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ApiError::Unauthorized("Missing X-API-KEY header.".to_string()))?;

    let wallet = state
        .host
        .wallet_by_key(key)
        .await?
        .ok_or_else(|| ApiError::Unauthorized("Invalid API key.".to_string()))?;

    if level == KeyLevel::Admin && key != wallet.adminkey {
        return Err(ApiError::Unauthorized(
            "Admin key required.".to_string(),
        ));
    }

    Ok(wallet)
}
