//! Client for posting donations to third-party provider APIs.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, info};

use crate::error::ProviderError;

/// Default Streamlabs API base URL.
pub const STREAMLABS_API_URL: &str = "https://streamlabs.com/api/v1.0";

/// Identifier sent alongside every posted donation.
const DONATION_IDENTIFIER: &str = "StreamAlerts";

/// Streamlabs field limits.
const MAX_NAME_LEN: usize = 25;
const MAX_MESSAGE_LEN: usize = 255;

/// Supported provider names.
///
/// `StreamElements` is a reserved slot: persisted services may carry
/// the name, but posting to it is not implemented yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    Streamlabs,
    StreamElements,
}

impl Provider {
    /// Parse a persisted service name. Unknown names return `None`.
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "Streamlabs" => Some(Self::Streamlabs),
            "StreamElements" => Some(Self::StreamElements),
            _ => None,
        }
    }
}

/// A donation ready to be forwarded to a provider.
#[derive(Debug, Clone)]
pub struct DonationPost {
    /// Donor display name.
    pub name: String,
    /// Donation message.
    pub message: String,
    /// Fiat amount.
    pub amount: f64,
    /// Three-letter currency code.
    pub currency: String,
}

/// Result of a posting attempt.
#[derive(Debug, Clone)]
pub enum PostOutcome {
    /// The provider accepted the donation; raw provider response.
    Posted(serde_json::Value),
    /// The service names a reserved provider with no implementation.
    NotYetSupported,
    /// The service names a provider this client knows nothing about.
    Unsupported(String),
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

/// Outbound operations against a donation provider.
#[async_trait]
pub trait DonationProvider: Send + Sync {
    /// Forward a donation to the provider behind `servicename`,
    /// authenticated with `token`.
    async fn post_donation(
        &self,
        servicename: &str,
        token: &str,
        post: &DonationPost,
    ) -> Result<PostOutcome, ProviderError>;

    /// Exchange an OAuth authorization code for an access token.
    async fn exchange_code(
        &self,
        client_id: &str,
        client_secret: &str,
        code: &str,
        redirect_uri: &str,
    ) -> Result<String, ProviderError>;

    /// Build the provider's authorization URL for the approve/decline
    /// page, embedding `state` as the anti-forgery token.
    fn authorize_url(&self, client_id: &str, redirect_uri: &str, state: &str) -> String;
}

/// HTTP implementation of [`DonationProvider`] against the Streamlabs
/// API.
#[derive(Debug, Clone)]
pub struct StreamlabsClient {
    http: Client,
    base_url: String,
}

impl StreamlabsClient {
    /// Create a client against the production Streamlabs API.
    pub fn new() -> Result<Self, ProviderError> {
        Self::with_base_url(STREAMLABS_API_URL)
    }

    /// Create a client against a custom API base URL.
    pub fn with_base_url(base_url: &str) -> Result<Self, ProviderError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl DonationProvider for StreamlabsClient {
    async fn post_donation(
        &self,
        servicename: &str,
        token: &str,
        post: &DonationPost,
    ) -> Result<PostOutcome, ProviderError> {
        match Provider::parse(servicename) {
            Some(Provider::Streamlabs) => {}
            Some(Provider::StreamElements) => return Ok(PostOutcome::NotYetSupported),
            None => return Ok(PostOutcome::Unsupported(servicename.to_string())),
        }

        let url = format!("{}/donations", self.base_url);
        let form = [
            ("name", truncate_chars(&post.name, MAX_NAME_LEN)),
            ("message", truncate_chars(&post.message, MAX_MESSAGE_LEN)),
            ("identifier", DONATION_IDENTIFIER.to_string()),
            ("amount", post.amount.to_string()),
            ("currency", post.currency.to_uppercase()),
            ("access_token", token.to_string()),
        ];

        debug!(url = %url, amount = post.amount, "Posting donation to Streamlabs");

        let response = self.http.post(&url).form(&form).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| ProviderError::Malformed(e.to_string()))?;

        info!("Donation posted to Streamlabs");
        Ok(PostOutcome::Posted(body))
    }

    async fn exchange_code(
        &self,
        client_id: &str,
        client_secret: &str,
        code: &str,
        redirect_uri: &str,
    ) -> Result<String, ProviderError> {
        let url = format!("{}/token", self.base_url);
        let form = [
            ("grant_type", "authorization_code"),
            ("code", code),
            ("client_id", client_id),
            ("client_secret", client_secret),
            ("redirect_uri", redirect_uri),
        ];

        debug!(url = %url, "Exchanging authorization code");

        let response = self.http.post(&url).form(&form).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::Malformed(e.to_string()))?;

        info!("Authorization code exchanged for access token");
        Ok(token.access_token)
    }

    fn authorize_url(&self, client_id: &str, redirect_uri: &str, state: &str) -> String {
        format!(
            "{}/authorize/?response_type=code&client_id={}&redirect_uri={}&scope=donations.create&state={}",
            self.base_url, client_id, redirect_uri, state
        )
    }
}

/// Truncate a string to at most `max` characters, respecting char
/// boundaries.
fn truncate_chars(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}
