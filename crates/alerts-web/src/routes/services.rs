//! Service registration and authentication routes.
//!
//! A service is registered with `authenticated = false`, then walked
//! through the provider's OAuth-style handshake: `get_access` redirects
//! the streamer to the provider's approve page, and `authenticate`
//! receives the callback, exchanges the code for a token and stores it
//! exactly once.

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use tracing::{info, warn};
use uuid::Uuid;

use database::models::Service;
use database::{service, DatabaseError};

use crate::auth::{require_key, KeyLevel};
use crate::error::{ApiError, Result};
use crate::routes::found;
use crate::state::AppState;

/// Mutable service fields, used for both creation and full replace.
#[derive(Debug, Deserialize)]
pub struct CreateServiceData {
    pub twitchuser: String,
    pub client_id: String,
    pub client_secret: String,
    pub wallet: String,
    pub servicename: String,
    #[serde(default)]
    pub onchain: Option<String>,
}

/// Replace every mutable field of a service. The id, state hash,
/// token and authenticated flag are not caller-writable.
fn apply_service_patch(svc: &mut Service, data: CreateServiceData) {
    svc.twitchuser = data.twitchuser;
    svc.client_id = data.client_id;
    svc.client_secret = data.client_secret;
    svc.wallet = data.wallet;
    svc.servicename = data.servicename;
    svc.onchain = data.onchain;
}

/// Create a service, which holds data about how/where to post donations.
pub async fn create_service(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(data): Json<CreateServiceData>,
) -> Result<Json<Service>> {
    require_key(&state, &headers, KeyLevel::Admin).await?;

    let svc = Service {
        id: Uuid::new_v4().simple().to_string(),
        state: Uuid::new_v4().simple().to_string(),
        twitchuser: data.twitchuser,
        client_id: data.client_id,
        client_secret: data.client_secret,
        wallet: data.wallet,
        servicename: data.servicename,
        authenticated: false,
        onchain: data.onchain,
        token: None,
    };
    service::create_service(state.db.pool(), &svc).await?;

    info!(service = %svc.id, wallet = %svc.wallet, "Service registered");
    Ok(Json(svc))
}

/// Redirect to the provider's approve/decline page for the service.
pub async fn get_access(
    State(state): State<AppState>,
    Path(service_id): Path<String>,
) -> Result<impl IntoResponse> {
    let svc = match service::get_service(state.db.pool(), &service_id).await {
        Ok(svc) => svc,
        Err(DatabaseError::NotFound { .. }) => {
            return Err(ApiError::BadRequest("Service does not exist!".to_string()));
        }
        Err(err) => return Err(err.into()),
    };

    let redirect_uri = state.auth_redirect_uri(&svc.id);
    let url = state
        .provider
        .authorize_url(&svc.client_id, &redirect_uri, &svc.state);

    Ok(found(&url))
}

/// Query parameters of the provider's authorization callback.
#[derive(Debug, Deserialize)]
pub struct AuthCallback {
    pub code: String,
    pub state: String,
}

/// Endpoint visited via redirect during provider authentication.
///
/// The `state` query parameter must match the service's state hash,
/// otherwise the callback is rejected before any token exchange.
pub async fn authenticate(
    State(state): State<AppState>,
    Path(service_id): Path<String>,
    Query(query): Query<AuthCallback>,
) -> Result<impl IntoResponse> {
    let svc = service::get_service(state.db.pool(), &service_id).await?;

    if svc.state != query.state {
        return Err(ApiError::BadRequest("State doesn't match!".to_string()));
    }

    let redirect_uri = state.auth_redirect_uri(&svc.id);
    let token = state
        .provider
        .exchange_code(&svc.client_id, &svc.client_secret, &query.code, &redirect_uri)
        .await?;

    let wallet = state.host.wallet(&svc.wallet).await?.ok_or_else(|| {
        ApiError::Internal(format!(
            "wallet {} missing for service {}",
            svc.wallet, svc.id
        ))
    })?;

    // First successful authorization wins; later exchanges must not
    // overwrite the stored token.
    let wrote = service::set_service_token(state.db.pool(), &svc.id, &token).await?;
    if !wrote {
        return Err(ApiError::BadRequest(
            "Service already authenticated!".to_string(),
        ));
    }

    info!(service = %svc.id, "Service authenticated");
    Ok(found(&format!("/streamalerts/?usr={}", wallet.user)))
}

/// Return all services across every wallet of the authenticated user.
pub async fn list_services(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Vec<Service>>> {
    let wallet = require_key(&state, &headers, KeyLevel::Invoice).await?;

    let wallet_ids = state
        .host
        .user(&wallet.user)
        .await?
        .map(|u| u.wallet_ids)
        .unwrap_or_default();

    let mut services = Vec::new();
    for wallet_id in &wallet_ids {
        services.extend(service::get_services_by_wallet(state.db.pool(), wallet_id).await?);
    }

    Ok(Json(services))
}

/// Replace a service's fields with the data given in the request.
pub async fn update_service(
    State(state): State<AppState>,
    Path(service_id): Path<String>,
    headers: HeaderMap,
    Json(data): Json<CreateServiceData>,
) -> Result<Json<Service>> {
    let wallet = require_key(&state, &headers, KeyLevel::Admin).await?;

    let mut svc = service::get_service(state.db.pool(), &service_id).await?;
    if svc.wallet != wallet.id {
        return Err(ApiError::Forbidden("Not your service.".to_string()));
    }

    apply_service_patch(&mut svc, data);
    service::update_service(state.db.pool(), &svc).await?;

    Ok(Json(svc))
}

/// Delete a service, its donations, and their external charges.
pub async fn delete_service(
    State(state): State<AppState>,
    Path(service_id): Path<String>,
    headers: HeaderMap,
) -> Result<StatusCode> {
    let wallet = require_key(&state, &headers, KeyLevel::Admin).await?;

    let svc = service::get_service(state.db.pool(), &service_id).await?;
    if svc.wallet != wallet.id {
        return Err(ApiError::Forbidden(
            "Not authorized to delete this service!".to_string(),
        ));
    }

    let donation_ids = service::delete_service(state.db.pool(), &svc.id).await?;
    for donation_id in &donation_ids {
        // Remote charge deletion is best-effort; the rows are already
        // gone and the charge expires on its own.
        if let Err(err) = state
            .gateway
            .delete_charge(donation_id, &wallet.adminkey)
            .await
        {
            warn!(charge = %donation_id, error = %err, "Failed to delete charge for removed donation");
        }
    }

    info!(service = %svc.id, donations = donation_ids.len(), "Service deleted");
    Ok(StatusCode::NO_CONTENT)
}
