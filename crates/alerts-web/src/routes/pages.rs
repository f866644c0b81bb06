//! Server-rendered pages.

use askama::Template;
use axum::extract::{Path, Query, State};
use serde::Deserialize;

use database::service;

use crate::error::Result;
use crate::state::AppState;

/// Settings page template.
#[derive(Template)]
#[template(path = "index.html")]
pub struct IndexTemplate {
    pub usr: String,
}

/// Public donation form template.
#[derive(Template)]
#[template(path = "display.html")]
pub struct DonationPageTemplate {
    pub twitchuser: String,
    pub service: String,
}

#[derive(Debug, Deserialize)]
pub struct IndexQuery {
    #[serde(default)]
    pub usr: String,
}

/// Render the extension's settings page.
pub async fn index(Query(query): Query<IndexQuery>) -> IndexTemplate {
    IndexTemplate { usr: query.usr }
}

/// Render the donation form for the service behind a state hash.
///
/// The page is addressed by state rather than id so a typo'd id cannot
/// land on a neighboring streamer's page.
pub async fn donation_page(
    State(state): State<AppState>,
    Path(service_state): Path<String>,
) -> Result<DonationPageTemplate> {
    let svc = service::get_service_by_state(state.db.pool(), &service_state).await?;

    Ok(DonationPageTemplate {
        twitchuser: svc.twitchuser,
        service: svc.id,
    })
}
