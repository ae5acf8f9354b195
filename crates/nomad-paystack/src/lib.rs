//! # nomad-paystack
//!
//! Payment gateway collaborator for the Nomad membership core, backed by the
//! Paystack REST API.
//!
//! - `POST /transaction/initialize`: start checkout for a plan
//! - `GET /transaction/verify/:reference`: confirm a payment
//! - webhooks signed with HMAC-SHA512 (`x-paystack-signature`)

pub mod client;
pub mod config;
pub mod error;
pub mod types;
pub mod webhook;

pub use client::{is_valid_reference, PaymentGateway, PaystackClient};
pub use config::PaystackOptions;
pub use error::PaystackError;
pub use types::*;
