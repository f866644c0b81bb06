//! Client for third-party donation APIs.
//!
//! Streamlabs is the only provider with a live implementation;
//! StreamElements is a reserved service name that yields a
//! "not yet supported" outcome instead of an outbound call. Donor
//! fields are truncated to provider limits before transmission.

mod client;
mod error;

pub use client::{
    DonationPost, DonationProvider, PostOutcome, Provider, StreamlabsClient, STREAMLABS_API_URL,
};
pub use error::ProviderError;
