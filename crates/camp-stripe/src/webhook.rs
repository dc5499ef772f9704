//! # Stripe Webhook Handling
//!
//! Signature verification and parsing for `payment_intent.*` events.
//! Events only feed reconciliation logging; the finalize call is still the
//! one path that commits a registration.

use camp_core::{PaymentError, PaymentEvent, PaymentEventType, PaymentResult};
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;
use tracing::debug;

type HmacSha256 = Hmac<Sha256>;

/// Maximum age of a signed webhook, in seconds
pub const SIGNATURE_TOLERANCE_SECS: i64 = 300;

/// Events to enable on the Stripe webhook endpoint
pub const REQUIRED_WEBHOOK_EVENTS: &[&str] = &[
    "payment_intent.succeeded",
    "payment_intent.payment_failed",
    "payment_intent.canceled",
];

/// Parsed `Stripe-Signature` header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureHeader {
    pub timestamp: i64,
    pub signatures: Vec<String>,
}

pub fn parse_signature_header(header: &str) -> PaymentResult<SignatureHeader> {
    let mut timestamp = None;
    let mut signatures = Vec::new();

    for part in header.split(',') {
        let Some((key, value)) = part.trim().split_once('=') else {
            continue;
        };
        match key {
            "t" => timestamp = value.parse().ok(),
            "v1" => signatures.push(value.to_string()),
            _ => {}
        }
    }

    let timestamp = timestamp.ok_or_else(|| {
        PaymentError::WebhookVerificationFailed("Missing timestamp in signature".to_string())
    })?;

    if signatures.is_empty() {
        return Err(PaymentError::WebhookVerificationFailed(
            "No v1 signature found".to_string(),
        ));
    }

    Ok(SignatureHeader {
        timestamp,
        signatures,
    })
}

pub fn compute_hmac_sha256(secret: &str, message: &[u8]) -> PaymentResult<String> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| PaymentError::Configuration(format!("Invalid webhook secret: {}", e)))?;
    mac.update(message);
    Ok(hex::encode(mac.finalize().into_bytes()))
}

pub fn constant_time_compare(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.bytes()
        .zip(b.bytes())
        .fold(0, |acc, (x, y)| acc | (x ^ y))
        == 0
}

fn signed_payload(timestamp: i64, payload: &[u8]) -> Vec<u8> {
    let mut message = format!("{}.", timestamp).into_bytes();
    message.extend_from_slice(payload);
    message
}

/// Build a `Stripe-Signature` header value for `payload`
pub fn sign_payload(secret: &str, timestamp: i64, payload: &[u8]) -> PaymentResult<String> {
    let signature = compute_hmac_sha256(secret, &signed_payload(timestamp, payload))?;
    Ok(format!("t={},v1={}", timestamp, signature))
}

/// Check `header` against `payload` as of `now`
pub fn verify_signature(
    secret: &str,
    payload: &[u8],
    header: &str,
    now: DateTime<Utc>,
) -> PaymentResult<()> {
    let parsed = parse_signature_header(header)?;

    if (now.timestamp() - parsed.timestamp).abs() > SIGNATURE_TOLERANCE_SECS {
        return Err(PaymentError::WebhookVerificationFailed(
            "Timestamp outside tolerance".to_string(),
        ));
    }

    let expected = compute_hmac_sha256(secret, &signed_payload(parsed.timestamp, payload))?;
    if parsed
        .signatures
        .iter()
        .any(|sig| constant_time_compare(sig, &expected))
    {
        Ok(())
    } else {
        Err(PaymentError::WebhookVerificationFailed(
            "Signature mismatch".to_string(),
        ))
    }
}

#[derive(Debug, Deserialize)]
struct StripeWebhookEvent {
    id: String,
    #[serde(rename = "type")]
    event_type: String,
    created: i64,
    data: StripeEventData,
}

#[derive(Debug, Deserialize)]
struct StripeEventData {
    object: serde_json::Map<String, serde_json::Value>,
}

/// Parse an already verified event body
pub fn parse_event(payload: &[u8]) -> PaymentResult<PaymentEvent> {
    let event: StripeWebhookEvent = serde_json::from_slice(payload).map_err(|e| {
        PaymentError::WebhookParseError(format!("Failed to parse webhook: {}", e))
    })?;

    debug!(event_type = %event.event_type, "Parsed Stripe webhook");

    let event_type = match event.event_type.as_str() {
        "payment_intent.succeeded" => PaymentEventType::IntentSucceeded,
        "payment_intent.payment_failed" => PaymentEventType::IntentFailed,
        "payment_intent.canceled" => PaymentEventType::IntentCanceled,
        other => PaymentEventType::Unknown(other.to_string()),
    };

    let object = &event.data.object;
    let is_intent = object.get("object").and_then(|v| v.as_str()) == Some("payment_intent");
    let intent_id = if is_intent {
        object.get("id").and_then(|v| v.as_str()).map(String::from)
    } else {
        object
            .get("payment_intent")
            .and_then(|v| v.as_str())
            .map(String::from)
    };
    let amount = object.get("amount").and_then(|v| v.as_i64());

    Ok(PaymentEvent {
        event_id: event.id,
        event_type,
        provider: "stripe".to_string(),
        intent_id,
        amount,
        timestamp: DateTime::from_timestamp(event.created, 0).unwrap_or_else(Utc::now),
    })
}
