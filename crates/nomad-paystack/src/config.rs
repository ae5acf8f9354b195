//! Paystack configuration.

use std::fmt;

use nomad_core::env::var_non_empty;
use serde::{Deserialize, Serialize};

use crate::error::PaystackError;

/// Gateway configuration. Built once at process start and injected.
#[derive(Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaystackOptions {
    /// Secret key, sent as a bearer token and used to sign webhooks.
    pub secret_key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_key: Option<String>,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Where the gateway sends the customer after checkout.
    #[serde(default = "default_callback_url")]
    pub callback_url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Total attempts for transaction lookups (at least 1).
    #[serde(default = "default_verify_attempts")]
    pub verify_attempts: u32,
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,
}

fn default_base_url() -> String { "https://api.paystack.co".to_string() }
fn default_callback_url() -> String { "https://workspace-nomad.vercel.app/payment-success".to_string() }
fn default_timeout_secs() -> u64 { 15 }
fn default_verify_attempts() -> u32 { 3 }
fn default_retry_backoff_ms() -> u64 { 250 }

impl PaystackOptions {
    pub fn new(secret_key: impl Into<String>) -> Self {
        Self {
            secret_key: secret_key.into(),
            public_key: None,
            base_url: default_base_url(),
            callback_url: default_callback_url(),
            timeout_secs: default_timeout_secs(),
            verify_attempts: default_verify_attempts(),
            retry_backoff_ms: default_retry_backoff_ms(),
        }
    }

    /// Read `PAYSTACK_SECRET_KEY` (required), `PAYSTACK_PUBLIC_KEY`,
    /// `PAYSTACK_BASE_URL` and `PAYMENT_CALLBACK_URL`.
    pub fn from_env() -> Result<Self, PaystackError> {
        let secret = var_non_empty("PAYSTACK_SECRET_KEY").ok_or(PaystackError::MissingSecretKey)?;
        let mut opts = Self::new(secret);
        opts.public_key = var_non_empty("PAYSTACK_PUBLIC_KEY");
        if let Some(url) = var_non_empty("PAYSTACK_BASE_URL") {
            opts.base_url = url;
        }
        if let Some(url) = var_non_empty("PAYMENT_CALLBACK_URL") {
            opts.callback_url = url;
        }
        Ok(opts)
    }

    /// Join an API path onto the base URL.
    pub fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}

impl fmt::Debug for PaystackOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PaystackOptions")
            .field("secret_key", &"<redacted>")
            .field("public_key", &self.public_key)
            .field("base_url", &self.base_url)
            .field("callback_url", &self.callback_url)
            .field("timeout_secs", &self.timeout_secs)
            .field("verify_attempts", &self.verify_attempts)
            .field("retry_backoff_ms", &self.retry_backoff_ms)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_join() {
        let mut opts = PaystackOptions::new("sk_test");
        assert_eq!(opts.endpoint("/transaction/initialize"), "https://api.paystack.co/transaction/initialize");
        opts.base_url = "http://localhost:9000/".into();
        assert_eq!(opts.endpoint("transaction/verify/abc"), "http://localhost:9000/transaction/verify/abc");
    }

    #[test]
    fn test_debug_redacts_secret() {
        let opts = PaystackOptions::new("sk_live_very_secret");
        let rendered = format!("{opts:?}");
        assert!(!rendered.contains("sk_live_very_secret"));
        assert!(rendered.contains("<redacted>"));
    }

    #[test]
    fn test_deserialize_defaults() {
        let opts: PaystackOptions =
            serde_json::from_value(serde_json::json!({ "secretKey": "sk_test" })).unwrap();
        assert_eq!(opts.base_url, "https://api.paystack.co");
        assert_eq!(opts.verify_attempts, 3);
        assert_eq!(opts.timeout_secs, 15);
    }
}
