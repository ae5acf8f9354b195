//! Paystack webhook signature verification and event parsing.
//!
//! Paystack signs the raw request body with HMAC-SHA512 keyed by the secret
//! key and sends the hex digest in the `x-paystack-signature` header.

use hmac::{Hmac, Mac};
use sha2::Sha512;
use subtle::ConstantTimeEq;

use crate::error::PaystackError;
use crate::types::WebhookEvent;

type HmacSha512 = Hmac<Sha512>;

/// Header carrying the signature.
pub const SIGNATURE_HEADER: &str = "x-paystack-signature";

/// Events that lead to an entitlement change.
pub const SUPPORTED_EVENTS: &[&str] = &["charge.success"];

pub fn is_supported_event(event_type: &str) -> bool {
    SUPPORTED_EVENTS.contains(&event_type)
}

/// Hex HMAC-SHA512 of `payload` under `secret`.
pub fn sign_payload(payload: &[u8], secret: &str) -> Result<String, PaystackError> {
    let mut mac = HmacSha512::new_from_slice(secret.as_bytes())
        .map_err(|_| PaystackError::WebhookSignatureInvalid)?;
    mac.update(payload);
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Verify a webhook signature in constant time.
pub fn verify_webhook_signature(
    payload: &[u8],
    signature: &str,
    secret: &str,
) -> Result<(), PaystackError> {
    if secret.is_empty() {
        return Err(PaystackError::MissingSecretKey);
    }
    let expected = sign_payload(payload, secret)?;
    let provided = signature.trim().to_ascii_lowercase();
    if expected.as_bytes().ct_eq(provided.as_bytes()).into() {
        Ok(())
    } else {
        Err(PaystackError::WebhookSignatureInvalid)
    }
}

/// Verify and parse a webhook delivery.
pub fn parse_webhook(
    payload: &[u8],
    signature: &str,
    secret: &str,
) -> Result<WebhookEvent, PaystackError> {
    verify_webhook_signature(payload, signature, secret)?;
    serde_json::from_slice(payload).map_err(|e| PaystackError::Parse(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "sk_test_webhook";

    #[test]
    fn test_valid_signature() {
        let payload = br#"{"event":"charge.success","data":{"reference":"ref-1"}}"#;
        let sig = sign_payload(payload, SECRET).unwrap();
        assert_eq!(sig.len(), 128);
        assert!(verify_webhook_signature(payload, &sig, SECRET).is_ok());
        assert!(verify_webhook_signature(payload, &sig.to_uppercase(), SECRET).is_ok());

        let event = parse_webhook(payload, &sig, SECRET).unwrap();
        assert_eq!(event.event, "charge.success");
        assert_eq!(event.reference(), Some("ref-1"));
    }

    #[test]
    fn test_tampered_payload_rejected() {
        let sig = sign_payload(b"{\"amount\":100}", SECRET).unwrap();
        let err = verify_webhook_signature(b"{\"amount\":999}", &sig, SECRET).unwrap_err();
        assert_eq!(err, PaystackError::WebhookSignatureInvalid);
    }

    #[test]
    fn test_wrong_secret_and_garbage_rejected() {
        let payload = b"{}";
        let sig = sign_payload(payload, "other").unwrap();
        assert!(verify_webhook_signature(payload, &sig, SECRET).is_err());
        assert!(verify_webhook_signature(payload, "deadbeef", SECRET).is_err());
        assert_eq!(
            verify_webhook_signature(payload, &sig, "").unwrap_err(),
            PaystackError::MissingSecretKey
        );
    }

    #[test]
    fn test_supported_events() {
        assert!(is_supported_event("charge.success"));
        assert!(!is_supported_event("transfer.success"));
    }
}
