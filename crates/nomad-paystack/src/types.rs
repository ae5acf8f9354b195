//! Paystack wire types and defensive parsing of gateway responses.
//!
//! Everything the gateway returns is untrusted. Parsing accepts the shapes
//! Paystack is known to send and reports anything else as a typed error.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::PaystackError;

/// Transaction status as reported by the gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionStatus {
    Success,
    Failed,
    Abandoned,
    Pending,
    Ongoing,
    Reversed,
    /// Any status this client does not know about.
    Other(String),
}

impl TransactionStatus {
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "success" => Self::Success,
            "failed" => Self::Failed,
            "abandoned" => Self::Abandoned,
            "pending" => Self::Pending,
            "ongoing" => Self::Ongoing,
            "reversed" => Self::Reversed,
            other => Self::Other(other.to_string()),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }
}

/// Opaque metadata attached at initialization so verification can recover
/// the buyer and the plan without gateway-side plan configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionMetadata {
    #[serde(rename = "user_id", skip_serializing_if = "Option::is_none")]
    pub principal_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plan_id: Option<String>,
    #[serde(rename = "user_email", skip_serializing_if = "Option::is_none")]
    pub principal_email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plan_name: Option<String>,
}

impl TransactionMetadata {
    /// Parse metadata that may be an object, a JSON-encoded string, or absent.
    /// Ids may arrive as strings or numbers.
    pub fn from_raw(raw: Option<&Value>) -> Self {
        let owned;
        let obj = match raw {
            Some(Value::Object(map)) => map,
            Some(Value::String(s)) if !s.trim().is_empty() => {
                owned = serde_json::from_str::<Value>(s).unwrap_or(Value::Null);
                match owned.as_object() {
                    Some(map) => map,
                    None => return Self::default(),
                }
            }
            _ => return Self::default(),
        };
        let field = |key: &str| -> Option<String> {
            match obj.get(key)? {
                Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
                Value::Number(n) => Some(n.to_string()),
                _ => None,
            }
        };
        Self {
            principal_id: field("user_id"),
            plan_id: field("plan_id"),
            principal_email: field("user_email"),
            plan_name: field("plan_name"),
        }
    }
}

/// Body for `POST /transaction/initialize`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InitializeTransactionRequest {
    pub email: String,
    /// Amount in minor units (kobo).
    pub amount: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub callback_url: Option<String>,
    pub metadata: TransactionMetadata,
    /// Gateway plan code, when the plan has one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plan: Option<String>,
}

/// The `data` block of a successful initialize call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InitializedTransaction {
    pub authorization_url: String,
    #[serde(default)]
    pub access_code: Option<String>,
    pub reference: String,
}

impl InitializedTransaction {
    pub fn from_raw(data: &Value) -> Result<Self, PaystackError> {
        let text = |key: &str| data.get(key).and_then(Value::as_str).map(str::to_string);
        let authorization_url = text("authorization_url")
            .ok_or_else(|| PaystackError::InvalidPayload("data.authorization_url missing".into()))?;
        let reference = text("reference")
            .ok_or_else(|| PaystackError::InvalidPayload("data.reference missing".into()))?;
        Ok(Self {
            authorization_url,
            access_code: text("access_code"),
            reference,
        })
    }
}

/// A verified transaction, reduced to the fields reconciliation relies on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayTransaction {
    pub reference: String,
    pub status: TransactionStatus,
    /// Lowercased customer email.
    pub customer_email: String,
    pub amount: Option<i64>,
    pub metadata: TransactionMetadata,
    /// Gateway plan code, from either a string or a `{plan_code}` object.
    pub plan_code: Option<String>,
    pub paid_at: Option<DateTime<Utc>>,
}

impl GatewayTransaction {
    /// Parse the `data` block of `GET /transaction/verify/:reference`.
    pub fn from_raw(data: &Value) -> Result<Self, PaystackError> {
        if !data.is_object() {
            return Err(PaystackError::InvalidPayload("data is not an object".into()));
        }
        let reference = data
            .get("reference")
            .and_then(Value::as_str)
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| PaystackError::InvalidPayload("data.reference missing".into()))?
            .to_string();
        let status = data
            .get("status")
            .and_then(Value::as_str)
            .map(TransactionStatus::parse)
            .ok_or_else(|| PaystackError::InvalidPayload("data.status missing".into()))?;
        let customer_email = data
            .get("customer")
            .and_then(|c| c.get("email"))
            .and_then(Value::as_str)
            .map(|e| e.trim().to_lowercase())
            .filter(|e| !e.is_empty())
            .ok_or_else(|| PaystackError::InvalidPayload("data.customer.email missing".into()))?;
        let plan_code = match data.get("plan") {
            Some(Value::String(code)) if !code.trim().is_empty() => Some(code.trim().to_string()),
            Some(Value::Object(plan)) => plan
                .get("plan_code")
                .and_then(Value::as_str)
                .filter(|s| !s.trim().is_empty())
                .map(str::to_string),
            _ => None,
        };
        let paid_at = data
            .get("paid_at")
            .or_else(|| data.get("paidAt"))
            .and_then(Value::as_str)
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|d| d.with_timezone(&Utc));

        Ok(Self {
            reference,
            status,
            customer_email,
            amount: data.get("amount").and_then(Value::as_i64),
            metadata: TransactionMetadata::from_raw(data.get("metadata")),
            plan_code,
            paid_at,
        })
    }
}

/// The `{status, message, data}` envelope every Paystack response uses.
#[derive(Debug, Clone, Deserialize)]
pub struct Envelope {
    pub status: bool,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub data: Value,
}

impl Envelope {
    pub fn parse(body: &[u8]) -> Result<Self, PaystackError> {
        serde_json::from_slice(body).map_err(|e| PaystackError::Parse(e.to_string()))
    }

    /// The data block, or `Rejected` when the gateway said `status: false`.
    pub fn into_data(self) -> Result<Value, PaystackError> {
        if self.status {
            Ok(self.data)
        } else {
            Err(PaystackError::Rejected(if self.message.is_empty() {
                "request rejected".to_string()
            } else {
                self.message
            }))
        }
    }
}

/// A webhook delivery.
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookEvent {
    pub event: String,
    #[serde(default)]
    pub data: Value,
}

impl WebhookEvent {
    /// The transaction reference carried by charge events.
    pub fn reference(&self) -> Option<&str> {
        self.data
            .get("reference")
            .and_then(Value::as_str)
            .filter(|s| !s.trim().is_empty())
    }
}
