//! Route handlers for the stream alerts extension.

pub mod donations;
pub mod pages;
pub mod services;

use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post, put};
use axum::Router;

use crate::state::AppState;

/// Build the router with all routes. Mounted under `/streamalerts`.
pub fn router() -> Router<AppState> {
    Router::new()
        // HTML pages
        .route("/", get(pages::index))
        .route("/:state", get(pages::donation_page))
        // Service registration and provider auth
        .route(
            "/api/v1/services",
            post(services::create_service).get(services::list_services),
        )
        .route(
            "/api/v1/services/:service_id",
            put(services::update_service).delete(services::delete_service),
        )
        .route("/api/v1/getaccess/:service_id", get(services::get_access))
        .route(
            "/api/v1/authenticate/:service_id",
            get(services::authenticate),
        )
        // Donation lifecycle
        .route(
            "/api/v1/donations",
            post(donations::create_donation).get(donations::list_donations),
        )
        .route(
            "/api/v1/donations/:donation_id",
            put(donations::update_donation).delete(donations::delete_donation),
        )
        .route("/api/v1/postdonation", post(donations::post_donation))
}

/// A 302 redirect to `location`.
pub(crate) fn found(location: &str) -> impl IntoResponse {
    (StatusCode::FOUND, [(header::LOCATION, location.to_string())])
}

#[cfg(test)]
mod tests;
