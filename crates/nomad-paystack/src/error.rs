//! Paystack error codes.

use nomad_core::error::{ApiError, ErrorCode, NomadError};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PaystackError {
    #[error("NETWORK_ERROR: {0}")]
    Network(String),

    #[error("HTTP_STATUS: gateway returned {status}: {message}")]
    Status { status: u16, message: String },

    #[error("PARSE_ERROR: {0}")]
    Parse(String),

    /// The gateway answered but reported `status: false`.
    #[error("REQUEST_REJECTED: {0}")]
    Rejected(String),

    /// A field the core depends on is missing or malformed.
    #[error("INVALID_PAYLOAD: {0}")]
    InvalidPayload(String),

    #[error("WEBHOOK_SIGNATURE_INVALID: Webhook signature verification failed")]
    WebhookSignatureInvalid,

    #[error("MISSING_SECRET_KEY: Paystack secret key is not configured")]
    MissingSecretKey,
}

impl PaystackError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::Network(_) => "NETWORK_ERROR",
            Self::Status { .. } => "HTTP_STATUS",
            Self::Parse(_) => "PARSE_ERROR",
            Self::Rejected(_) => "REQUEST_REJECTED",
            Self::InvalidPayload(_) => "INVALID_PAYLOAD",
            Self::WebhookSignatureInvalid => "WEBHOOK_SIGNATURE_INVALID",
            Self::MissingSecretKey => "MISSING_SECRET_KEY",
        }
    }

    /// Transient failures worth another attempt on an idempotent call.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Network(_) => true,
            Self::Status { status, .. } => *status >= 500 || *status == 429,
            _ => false,
        }
    }
}

impl From<PaystackError> for NomadError {
    fn from(e: PaystackError) -> Self {
        match e {
            PaystackError::WebhookSignatureInvalid => {
                NomadError::Api(ApiError::new(ErrorCode::WebhookSignatureInvalid))
            }
            PaystackError::InvalidPayload(detail) => NomadError::Api(ApiError::with_message(
                ErrorCode::InvalidInput,
                format!("Gateway payload rejected: {detail}"),
            )),
            PaystackError::MissingSecretKey => NomadError::Config(e.to_string()),
            other => NomadError::Gateway(other.to_string()),
        }
    }
}
