//! Payment gateway collaborator and its Paystack HTTP implementation.

use std::time::Duration;

use async_trait::async_trait;

use crate::config::PaystackOptions;
use crate::error::PaystackError;
use crate::types::{Envelope, GatewayTransaction, InitializeTransactionRequest, InitializedTransaction};

/// What the core needs from a payment gateway.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Create a transaction and return where to send the customer.
    async fn initialize_transaction(
        &self,
        request: &InitializeTransactionRequest,
    ) -> Result<InitializedTransaction, PaystackError>;

    /// Look up a transaction by reference. Safe to repeat.
    async fn get_transaction(&self, reference: &str) -> Result<GatewayTransaction, PaystackError>;
}

/// References are interpolated into the request path, so only a
/// conservative character set is accepted.
pub fn is_valid_reference(reference: &str) -> bool {
    !reference.is_empty()
        && reference.len() <= 100
        && reference
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '='))
}

/// Paystack REST client over `reqwest`.
#[derive(Debug, Clone)]
pub struct PaystackClient {
    http: reqwest::Client,
    options: PaystackOptions,
}

impl PaystackClient {
    pub fn new(options: PaystackOptions) -> Result<Self, PaystackError> {
        if options.secret_key.trim().is_empty() {
            return Err(PaystackError::MissingSecretKey);
        }
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(options.timeout_secs))
            .build()
            .map_err(|e| PaystackError::Network(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { http, options })
    }

    pub fn options(&self) -> &PaystackOptions {
        &self.options
    }

    async fn read_envelope(response: reqwest::Response) -> Result<Envelope, PaystackError> {
        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|e| PaystackError::Network(format!("failed to read response body: {e}")))?;
        if !status.is_success() {
            // Paystack puts a human-readable reason in the envelope even on errors.
            let message = Envelope::parse(&body)
                .map(|env| env.message)
                .unwrap_or_else(|_| String::from_utf8_lossy(&body).chars().take(200).collect());
            return Err(PaystackError::Status { status: status.as_u16(), message });
        }
        Envelope::parse(&body)
    }

    async fn verify_once(&self, reference: &str) -> Result<GatewayTransaction, PaystackError> {
        let response = self
            .http
            .get(self.options.endpoint(&format!("transaction/verify/{reference}")))
            .bearer_auth(&self.options.secret_key)
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| PaystackError::Network(format!("verify request failed: {e}")))?;
        let data = Self::read_envelope(response).await?.into_data()?;
        let transaction = GatewayTransaction::from_raw(&data)?;
        if transaction.reference != reference {
            return Err(PaystackError::InvalidPayload(format!(
                "gateway returned reference {} for {}",
                transaction.reference, reference
            )));
        }
        Ok(transaction)
    }
}

#[async_trait]
impl PaymentGateway for PaystackClient {
    async fn initialize_transaction(
        &self,
        request: &InitializeTransactionRequest,
    ) -> Result<InitializedTransaction, PaystackError> {
        let response = self
            .http
            .post(self.options.endpoint("transaction/initialize"))
            .bearer_auth(&self.options.secret_key)
            .json(request)
            .send()
            .await
            .map_err(|e| PaystackError::Network(format!("initialize request failed: {e}")))?;
        let data = Self::read_envelope(response).await?.into_data()?;
        let initialized = InitializedTransaction::from_raw(&data)?;
        tracing::info!(reference = %initialized.reference, amount = request.amount, "paystack transaction initialized");
        Ok(initialized)
    }

    /// Retries transient failures with linear backoff. Initialization is never
    /// retried, since a second call would create a second transaction.
    async fn get_transaction(&self, reference: &str) -> Result<GatewayTransaction, PaystackError> {
        if !is_valid_reference(reference) {
            return Err(PaystackError::InvalidPayload(format!("malformed reference: {reference}")));
        }
        let attempts = self.options.verify_attempts.max(1);
        let mut attempt = 1;
        loop {
            match self.verify_once(reference).await {
                Ok(t) => return Ok(t),
                Err(e) if e.is_retryable() && attempt < attempts => {
                    tracing::warn!(reference, attempt, error = %e, "paystack verify failed, retrying");
                    tokio::time::sleep(Duration::from_millis(self.options.retry_backoff_ms * u64::from(attempt))).await;
                    attempt += 1;
                }
                Err(e) => {
                    tracing::error!(reference, attempt, error = %e, "paystack verify failed");
                    return Err(e);
                }
            }
        }
    }
}
