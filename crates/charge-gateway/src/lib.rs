//! HTTP client for the external charge service.
//!
//! A charge is a payable invoice managed entirely by the charge
//! service; this crate only creates charges, polls their paid status
//! and deletes them. The charge id doubles as the donation id in the
//! persistence layer.

mod client;
mod error;

pub use client::{ChargeGateway, ChargeGatewayClient, ChargeStatus, CreateCharge};
pub use error::GatewayError;
