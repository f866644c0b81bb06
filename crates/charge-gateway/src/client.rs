//! HTTP client for the charge service.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::GatewayError;

/// Request body for creating a charge.
///
/// The charge service issues an invoice that can be settled against
/// either a hosted wallet or an on-chain wallet, and calls `webhook`
/// back once it is paid.
#[derive(Debug, Clone, Serialize)]
pub struct CreateCharge {
    /// Amount in satoshis.
    pub amount: i64,
    /// URL the payer is sent to after completing the charge.
    pub completelink: String,
    /// Label for the completion link.
    pub completelinktext: String,
    /// Webhook called by the charge service once the charge is paid.
    pub webhook: String,
    /// Free-text description shown on the charge page.
    pub description: String,
    /// Expiry in minutes.
    pub time: u32,
    /// Hosted wallet to credit.
    pub lnbitswallet: String,
    /// Optional on-chain wallet to credit.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub onchainwallet: Option<String>,
    /// Owning user of the wallet.
    pub user: String,
}

/// Paid-status snapshot of a charge.
#[derive(Debug, Clone, Deserialize)]
pub struct ChargeStatus {
    pub id: String,
    pub paid: bool,
}

#[derive(Debug, Deserialize)]
struct CreatedCharge {
    id: String,
}

/// Operations against the external charge service.
///
/// Every call carries an API key scoped to the owning wallet; the
/// gateway enforces authorization, this client only transports the key.
#[async_trait]
pub trait ChargeGateway: Send + Sync {
    /// Create a charge and return its id.
    async fn create_charge(&self, spec: &CreateCharge, api_key: &str)
        -> Result<String, GatewayError>;

    /// Fetch the paid status of a charge.
    async fn get_charge_status(&self, charge_id: &str, api_key: &str)
        -> Result<ChargeStatus, GatewayError>;

    /// Delete a charge.
    async fn delete_charge(&self, charge_id: &str, api_key: &str) -> Result<(), GatewayError>;
}

/// HTTP implementation of [`ChargeGateway`].
#[derive(Debug, Clone)]
pub struct ChargeGatewayClient {
    http: Client,
    base_url: String,
}

impl ChargeGatewayClient {
    /// Create a client for the charge service at `base_url`
    /// (e.g. `http://127.0.0.1:5000/satspay/api/v1`).
    pub fn new(base_url: &str) -> Result<Self, GatewayError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn charge_url(&self, charge_id: &str) -> String {
        format!("{}/charge/{}", self.base_url, charge_id)
    }
}

#[async_trait]
impl ChargeGateway for ChargeGatewayClient {
    async fn create_charge(
        &self,
        spec: &CreateCharge,
        api_key: &str,
    ) -> Result<String, GatewayError> {
        let url = format!("{}/charge", self.base_url);
        debug!(url = %url, amount = spec.amount, "Creating charge");

        let response = self
            .http
            .post(&url)
            .header("X-API-KEY", api_key)
            .json(spec)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GatewayError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let created: CreatedCharge = response
            .json()
            .await
            .map_err(|e| GatewayError::Malformed(e.to_string()))?;

        info!(charge_id = %created.id, "Charge created");
        Ok(created.id)
    }

    async fn get_charge_status(
        &self,
        charge_id: &str,
        api_key: &str,
    ) -> Result<ChargeStatus, GatewayError> {
        let url = self.charge_url(charge_id);
        debug!(url = %url, "Fetching charge status");

        let response = self
            .http
            .get(&url)
            .header("X-API-KEY", api_key)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GatewayError::Status {
                status: status.as_u16(),
                body,
            });
        }

        response
            .json()
            .await
            .map_err(|e| GatewayError::Malformed(e.to_string()))
    }

    async fn delete_charge(&self, charge_id: &str, api_key: &str) -> Result<(), GatewayError> {
        let url = self.charge_url(charge_id);
        debug!(url = %url, "Deleting charge");

        let response = self
            .http
            .delete(&url)
            .header("X-API-KEY", api_key)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GatewayError::Status {
                status: status.as_u16(),
                body,
            });
        }

        Ok(())
    }
}
