//! Donation lifecycle routes.
//!
//! A donation is created together with an external charge and shares
//! its id. The charge service calls `post_donation` back once the
//! charge is paid; only then is the donation forwarded to the
//! third-party provider and marked posted.

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use serde::Deserialize;
use serde_json::json;
use tracing::{info, warn};

use charge_gateway::CreateCharge;
use database::models::Donation;
use database::{donation, service};
use donation_provider::{DonationPost, PostOutcome};

use crate::auth::{require_key, KeyLevel};
use crate::error::{ApiError, Result};
use crate::state::AppState;

/// Charge expiry in minutes.
const CHARGE_EXPIRY_MINUTES: u32 = 1440;

fn default_name() -> String {
    "Anonymous".to_string()
}

fn default_cur_code() -> String {
    "USD".to_string()
}

/// Donation form fields, used for both creation and full replace.
#[derive(Debug, Deserialize)]
pub struct CreateDonationData {
    #[serde(default = "default_name")]
    pub name: String,
    pub sats: i64,
    pub service: String,
    #[serde(default)]
    pub message: String,
    #[serde(default = "default_cur_code")]
    pub cur_code: String,
}

/// Replace every donor-editable field of a donation. The id, wallet,
/// converted amount and posted flag are not caller-writable.
fn apply_donation_patch(don: &mut Donation, data: CreateDonationData) {
    don.name = data.name;
    don.sats = data.sats;
    don.service = data.service;
    don.message = data.message;
    don.cur_code = data.cur_code;
}

/// Take data from the donation form, create a charge and return the
/// charge page to redirect the donor to.
pub async fn create_donation(
    State(state): State<AppState>,
    Json(data): Json<CreateDonationData>,
) -> Result<Json<serde_json::Value>> {
    if data.sats < 1 {
        return Err(ApiError::BadRequest("sats must be at least 1".to_string()));
    }

    let svc = service::get_service(state.db.pool(), &data.service).await?;
    let wallet = state
        .host
        .wallet(&svc.wallet)
        .await?
        .ok_or_else(|| ApiError::NotFound("Wallet not found!".to_string()))?;

    let price = state.host.btc_price(&data.cur_code).await?;
    let amount = data.sats as f64 * 1e-8 * price;

    let spec = CreateCharge {
        amount: data.sats,
        completelink: format!("https://twitch.tv/{}", svc.twitchuser),
        completelinktext: "Back to Stream!".to_string(),
        webhook: state.webhook_url(),
        description: format!(
            "{} sats donation from {} to {}",
            data.sats, data.name, svc.twitchuser
        ),
        time: CHARGE_EXPIRY_MINUTES,
        lnbitswallet: svc.wallet.clone(),
        onchainwallet: svc.onchain.clone(),
        user: wallet.user.clone(),
    };

    // The donation row is only written after the charge exists, so a
    // gateway failure leaves nothing behind.
    let charge_id = state.gateway.create_charge(&spec, &wallet.inkey).await?;

    let don = Donation {
        id: charge_id,
        wallet: svc.wallet.clone(),
        name: data.name,
        message: data.message,
        cur_code: data.cur_code,
        sats: data.sats,
        amount,
        service: svc.id.clone(),
        posted: false,
    };
    donation::create_donation(state.db.pool(), &don).await?;

    info!(donation = %don.id, sats = don.sats, service = %svc.id, "Donation created");
    Ok(Json(json!({
        "redirect_url": format!("{}/{}", state.settings.charge_page_base, don.id)
    })))
}

/// Webhook body from the charge service.
#[derive(Debug, Deserialize)]
pub struct ValidateDonationData {
    pub id: String,
}

/// Post a paid donation to its provider.
///
/// This endpoint acts as a webhook for the charge service. Redelivery
/// of the webhook is the retry mechanism: a provider failure leaves
/// `posted` untouched, while a redelivery after success is answered
/// with an "already posted" no-op.
pub async fn post_donation(
    State(state): State<AppState>,
    Json(data): Json<ValidateDonationData>,
) -> Result<Json<serde_json::Value>> {
    let don = donation::get_donation(state.db.pool(), &data.id).await?;

    let wallet = state.host.wallet(&don.wallet).await?.ok_or_else(|| {
        ApiError::Internal(format!(
            "wallet {} missing for donation {}",
            don.wallet, don.id
        ))
    })?;

    let charge = state
        .gateway
        .get_charge_status(&don.id, &wallet.inkey)
        .await?;
    if !charge.paid {
        return Err(ApiError::BadRequest("Not a paid charge!".to_string()));
    }

    if don.posted {
        return Ok(Json(json!({
            "message": "Donation has already been posted!"
        })));
    }

    let svc = service::get_service(state.db.pool(), &don.service)
        .await
        .map_err(|err| {
            ApiError::Internal(format!("service missing for donation {}: {err}", don.id))
        })?;

    let token = svc
        .token
        .as_deref()
        .ok_or_else(|| ApiError::BadRequest("Service not authenticated!".to_string()))?;

    let post = DonationPost {
        name: don.name.clone(),
        message: don.message.clone(),
        amount: don.amount,
        currency: don.cur_code.clone(),
    };

    match state
        .provider
        .post_donation(&svc.servicename, token, &post)
        .await?
    {
        PostOutcome::Posted(response) => {
            // A concurrent delivery may have won the conditional write.
            if !donation::mark_donation_posted(state.db.pool(), &don.id).await? {
                return Ok(Json(json!({
                    "message": "Donation has already been posted!"
                })));
            }
            info!(donation = %don.id, "Donation posted");
            Ok(Json(response))
        }
        PostOutcome::NotYetSupported => Ok(Json(json!({
            "message": "StreamElements not yet supported!"
        }))),
        PostOutcome::Unsupported(name) => Ok(Json(json!({
            "message": format!("Unsupported servicename: {name}")
        }))),
    }
}

/// Return all donations across every wallet of the authenticated user.
pub async fn list_donations(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Vec<Donation>>> {
    let wallet = require_key(&state, &headers, KeyLevel::Invoice).await?;

    let wallet_ids = state
        .host
        .user(&wallet.user)
        .await?
        .map(|u| u.wallet_ids)
        .unwrap_or_default();

    let mut donations = Vec::new();
    for wallet_id in &wallet_ids {
        donations.extend(donation::get_donations_by_wallet(state.db.pool(), wallet_id).await?);
    }

    Ok(Json(donations))
}

/// Replace a donation's fields with the data given in the request.
pub async fn update_donation(
    State(state): State<AppState>,
    Path(donation_id): Path<String>,
    headers: HeaderMap,
    Json(data): Json<CreateDonationData>,
) -> Result<Json<Donation>> {
    let wallet = require_key(&state, &headers, KeyLevel::Admin).await?;

    let mut don = donation::get_donation(state.db.pool(), &donation_id).await?;
    if don.wallet != wallet.id {
        return Err(ApiError::Forbidden("Not your donation.".to_string()));
    }

    apply_donation_patch(&mut don, data);
    donation::update_donation(state.db.pool(), &don).await?;

    Ok(Json(don))
}

/// Delete a donation and its external charge.
pub async fn delete_donation(
    State(state): State<AppState>,
    Path(donation_id): Path<String>,
    headers: HeaderMap,
) -> Result<StatusCode> {
    let wallet = require_key(&state, &headers, KeyLevel::Admin).await?;

    let don = donation::get_donation(state.db.pool(), &donation_id).await?;
    if don.wallet != wallet.id {
        return Err(ApiError::Forbidden(
            "Not authorized to delete this donation!".to_string(),
        ));
    }

    donation::delete_donation(state.db.pool(), &don.id).await?;
    if let Err(err) = state.gateway.delete_charge(&don.id, &wallet.adminkey).await {
        warn!(charge = %don.id, error = %err, "Failed to delete charge for removed donation");
    }

    info!(donation = %don.id, "Donation deleted");
    Ok(StatusCode::NO_CONTENT)
}
