//! Client for the host application's identity and rate API.
//!
//! The host application owns wallets and users; this extension only
//! holds foreign-key references and resolves them over the host's REST
//! API. The host also exposes the BTC fiat exchange rate used to
//! convert donation amounts.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

/// A wallet owned by the host application.
#[derive(Debug, Clone, Deserialize)]
pub struct Wallet {
    /// Wallet identifier.
    pub id: String,
    /// Owning user id.
    pub user: String,
    /// Admin API key (full access).
    pub adminkey: String,
    /// Invoice API key (read/invoice access).
    pub inkey: String,
}

/// A user of the host application and the wallets they own.
#[derive(Debug, Clone, Deserialize)]
pub struct HostUser {
    /// User identifier.
    pub id: String,
    /// Ids of all wallets owned by this user.
    pub wallet_ids: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct PriceResponse {
    price: f64,
}

/// Errors that can occur when talking to the host application.
#[derive(Debug, Error)]
pub enum HostError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Non-success response from the host application.
    #[error("host application returned {status}: {body}")]
    Status { status: u16, body: String },

    /// Response body did not match the expected shape.
    #[error("malformed host application response: {0}")]
    Malformed(String),
}

/// Lookups against the host application.
#[async_trait]
pub trait HostApi: Send + Sync {
    /// Resolve a wallet by id. Returns `None` if the wallet is unknown.
    async fn wallet(&self, wallet_id: &str) -> Result<Option<Wallet>, HostError>;

    /// Resolve a wallet by one of its API keys (admin or invoice).
    async fn wallet_by_key(&self, api_key: &str) -> Result<Option<Wallet>, HostError>;

    /// Resolve a user and their wallet ids.
    async fn user(&self, user_id: &str) -> Result<Option<HostUser>, HostError>;

    /// Current BTC price in the given fiat currency.
    async fn btc_price(&self, currency: &str) -> Result<f64, HostError>;
}

/// HTTP implementation of [`HostApi`].
#[derive(Debug, Clone)]
pub struct HostClient {
    http: Client,
    base_url: String,
}

impl HostClient {
    /// Create a client for the host application's API at `base_url`.
    pub fn new(base_url: &str) -> Result<Self, HostError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn fetch_optional<T: for<'de> Deserialize<'de>>(
        &self,
        url: String,
    ) -> Result<Option<T>, HostError> {
        debug!(url = %url, "Host API lookup");

        let response = self.http.get(&url).send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(HostError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let value = response
            .json()
            .await
            .map_err(|e| HostError::Malformed(e.to_string()))?;

        Ok(Some(value))
    }
}

#[async_trait]
impl HostApi for HostClient {
    async fn wallet(&self, wallet_id: &str) -> Result<Option<Wallet>, HostError> {
        self.fetch_optional(format!("{}/wallet/{}", self.base_url, wallet_id))
            .await
    }

    async fn wallet_by_key(&self, api_key: &str) -> Result<Option<Wallet>, HostError> {
        self.fetch_optional(format!("{}/wallet?api_key={}", self.base_url, api_key))
            .await
    }

    async fn user(&self, user_id: &str) -> Result<Option<HostUser>, HostError> {
        self.fetch_optional(format!("{}/user/{}", self.base_url, user_id))
            .await
    }

    async fn btc_price(&self, currency: &str) -> Result<f64, HostError> {
        let url = format!("{}/rate/{}", self.base_url, currency);
        let price: Option<PriceResponse> = self.fetch_optional(url).await?;

        price
            .map(|p| p.price)
            .ok_or_else(|| HostError::Malformed(format!("no rate for currency {currency}")))
    }
}
