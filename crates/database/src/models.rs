//! Database models.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A registered integration between a wallet and a third-party
/// donation provider.
///
/// The donation page for a service is reached through its `state` hash
/// instead of the id, so a typo'd id cannot land on a neighboring
/// streamer's page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Service {
    /// Opaque unique identifier.
    pub id: String,
    /// Random hash used as the public lookup key and as the OAuth
    /// anti-forgery token.
    pub state: String,
    /// The Twitch streamer's username.
    pub twitchuser: String,
    /// Provider client id for the OAuth handshake.
    pub client_id: String,
    /// Secret corresponding to the client id.
    pub client_secret: String,
    /// Owning wallet identifier.
    pub wallet: String,
    /// Provider name. Currently "Streamlabs"; "StreamElements" is
    /// reserved but unimplemented.
    pub servicename: String,
    /// Whether an access token has been acquired yet. Once true,
    /// `token` is never overwritten.
    pub authenticated: bool,
    /// Optional on-chain wallet identifier.
    pub onchain: Option<String>,
    /// Provider access token, set at most once.
    pub token: Option<String>,
}

/// One donor's pledge to a streamer, tied to a service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Donation {
    /// Always equals the id of the external charge created for this
    /// donation.
    pub id: String,
    /// Owning wallet identifier, denormalized from the service.
    pub wallet: String,
    /// Name of the donor.
    pub name: String,
    /// Donation message.
    pub message: String,
    /// Three-letter currency code.
    pub cur_code: String,
    /// Requested amount in satoshis.
    pub sats: i64,
    /// The donation amount after fiat conversion.
    pub amount: f64,
    /// The id of the parent service.
    pub service: String,
    /// Whether the donation has been posted to the provider.
    pub posted: bool,
}
