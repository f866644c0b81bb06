//! Application state shared across handlers.

use std::sync::Arc;

use charge_gateway::ChargeGateway;
use database::Database;
use donation_provider::DonationProvider;

use crate::host::HostApi;

/// Settings handlers need at request time.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Public base URL of this deployment.
    pub public_url: String,
    /// Path prefix of the charge service's public payment pages.
    pub charge_page_base: String,
}

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Database connection.
    pub db: Database,
    /// Charge service client.
    pub gateway: Arc<dyn ChargeGateway>,
    /// Donation provider client.
    pub provider: Arc<dyn DonationProvider>,
    /// Host application client.
    pub host: Arc<dyn HostApi>,
    /// Request-time settings.
    pub settings: Arc<Settings>,
}

impl AppState {
    /// Create new application state.
    pub fn new(
        db: Database,
        gateway: Arc<dyn ChargeGateway>,
        provider: Arc<dyn DonationProvider>,
        host: Arc<dyn HostApi>,
        settings: Settings,
    ) -> Self {
        Self {
            db,
            gateway,
            provider,
            host,
            settings: Arc::new(settings),
        }
    }

    /// Webhook URL the charge service calls once a charge is paid.
    pub fn webhook_url(&self) -> String {
        format!(
            "{}/streamalerts/api/v1/postdonation",
            self.settings.public_url
        )
    }

    /// OAuth redirect URI for a service's authorization callback.
    pub fn auth_redirect_uri(&self, service_id: &str) -> String {
        format!(
            "{}/streamalerts/api/v1/authenticate/{}",
            self.settings.public_url, service_id
        )
    }
}
