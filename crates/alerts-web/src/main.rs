//! Web server for the stream alerts donation integration.
//!
//! Streamers register a third-party donation service, viewers donate
//! through a hosted page backed by an external charge service, and
//! paid charges are forwarded to the provider via webhook.

mod auth;
mod config;
mod error;
mod host;
mod routes;
mod state;

use std::sync::Arc;

use axum::Router;
use charge_gateway::ChargeGatewayClient;
use database::Database;
use donation_provider::StreamlabsClient;
use tracing::info;

use crate::config::Config;
use crate::host::HostClient;
use crate::state::{AppState, Settings};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt::init();

    // Load configuration
    let config = Config::from_env()?;
    info!(addr = %config.addr, "Starting alerts web server");

    // Connect to database
    let db = Database::connect(&config.database_url).await?;
    db.migrate().await?;

    // Outbound clients
    let gateway = Arc::new(ChargeGatewayClient::new(&config.charge_api_url)?);
    let provider = Arc::new(StreamlabsClient::new()?);
    let host = Arc::new(HostClient::new(&config.host_api_url)?);

    // Build application state
    let settings = Settings {
        public_url: config.public_url.clone(),
        charge_page_base: config.charge_page_base.clone(),
    };
    let state = AppState::new(db, gateway, provider, host, settings);

    // Build router
    let app = Router::new()
        .nest("/streamalerts", routes::router())
        .with_state(state);

    // Start server
    info!(addr = %config.addr, "Alerts web server listening");
    let listener = tokio::net::TcpListener::bind(config.addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
