//! Configuration loaded from environment variables.

use std::env;
use std::net::SocketAddr;

/// Alerts web server configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Server bind address.
    pub addr: SocketAddr,
    /// SQLite database URL.
    pub database_url: String,
    /// Public base URL of this deployment, used to build webhook and
    /// OAuth redirect URIs (e.g. `https://pay.example.com`).
    pub public_url: String,
    /// Base URL of the host application's API (wallets, users, rates).
    pub host_api_url: String,
    /// Base URL of the charge service API.
    pub charge_api_url: String,
    /// Path prefix of the charge service's public payment pages.
    pub charge_page_base: String,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// | Variable | Description | Default |
    /// |----------|-------------|---------|
    /// | `ALERTS_ADDR` | Server bind address | `127.0.0.1:8791` |
    /// | `SQLITE_PATH` | SQLite database URL | `sqlite:streamalerts.db?mode=rwc` |
    /// | `PUBLIC_URL` | Public base URL of this deployment | (required) |
    /// | `HOST_API_URL` | Host application API base URL | `http://127.0.0.1:5000/api/v1` |
    /// | `CHARGE_API_URL` | Charge service API base URL | `http://127.0.0.1:5000/satspay/api/v1` |
    /// | `CHARGE_PAGE_BASE` | Charge payment page path prefix | `/satspay` |
    pub fn from_env() -> Result<Self, ConfigError> {
        let addr = env::var("ALERTS_ADDR")
            .unwrap_or_else(|_| "127.0.0.1:8791".to_string())
            .parse()
            .map_err(|_| ConfigError::InvalidAddr)?;

        let database_url = env::var("SQLITE_PATH")
            .unwrap_or_else(|_| "sqlite:streamalerts.db?mode=rwc".to_string());

        let public_url = env::var("PUBLIC_URL")
            .map_err(|_| ConfigError::MissingPublicUrl)?
            .trim_end_matches('/')
            .to_string();

        let host_api_url = env::var("HOST_API_URL")
            .unwrap_or_else(|_| "http://127.0.0.1:5000/api/v1".to_string());

        let charge_api_url = env::var("CHARGE_API_URL")
            .unwrap_or_else(|_| "http://127.0.0.1:5000/satspay/api/v1".to_string());

        let charge_page_base = env::var("CHARGE_PAGE_BASE")
            .unwrap_or_else(|_| "/satspay".to_string());

        Ok(Self {
            addr,
            database_url,
            public_url,
            host_api_url,
            charge_api_url,
            charge_page_base,
        })
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid ALERTS_ADDR format")]
    InvalidAddr,

    #[error("PUBLIC_URL environment variable is required")]
    MissingPublicUrl,
}
