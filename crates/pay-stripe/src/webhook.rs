//! # Stripe Webhook Verification
//!
//! Stripe signs every webhook delivery with the endpoint's signing secret:
//!
//! ```text
//! Stripe-Signature: t=1700000000,v1=<hex hmac-sha256 of "{t}.{payload}">
//! ```
//!
//! Verification checks the timestamp against a tolerance window, recomputes
//! the HMAC and compares it in constant time, then parses the event envelope.

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use pay_core::{GatewayError, GatewayResult, WebhookEvent, WebhookEventKind};
use serde::Deserialize;
use sha2::Sha256;
use tracing::debug;

type HmacSha256 = Hmac<Sha256>;

/// Maximum accepted age (and clock skew) of a signature, in seconds
pub const DEFAULT_TOLERANCE_SECS: i64 = 300;

/// Parsed `Stripe-Signature` header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureHeader {
    pub timestamp: i64,
    pub signatures: Vec<String>,
}

pub fn parse_signature_header(header: &str) -> GatewayResult<SignatureHeader> {
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
        GatewayError::WebhookVerificationFailed("Missing timestamp in signature".to_string())
    })?;

    if signatures.is_empty() {
        return Err(GatewayError::WebhookVerificationFailed(
            "No v1 signature found".to_string(),
        ));
    }

    Ok(SignatureHeader {
        timestamp,
        signatures,
    })
}

/// Hex HMAC-SHA256 of `"{timestamp}.{payload}"`.
pub fn compute_signature(secret: &str, timestamp: i64, payload: &[u8]) -> GatewayResult<String> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| GatewayError::WebhookVerificationFailed(e.to_string()))?;
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload);
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Build a valid `Stripe-Signature` header value for `payload`.
pub fn signature_header(secret: &str, timestamp: i64, payload: &[u8]) -> GatewayResult<String> {
    Ok(format!(
        "t={},v1={}",
        timestamp,
        compute_signature(secret, timestamp, payload)?
    ))
}

fn constant_time_compare(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.bytes()
        .zip(b.bytes())
        .fold(0, |acc, (x, y)| acc | (x ^ y))
        == 0
}

/// Check `header` against `payload` as of `now` (unix seconds).
pub fn verify_signature(
    payload: &[u8],
    header: &str,
    secret: &str,
    now: i64,
) -> GatewayResult<()> {
    if secret.is_empty() {
        return Err(GatewayError::WebhookVerificationFailed(
            "No webhook secret configured".to_string(),
        ));
    }

    let parsed = parse_signature_header(header)?;

    if (now - parsed.timestamp).abs() > DEFAULT_TOLERANCE_SECS {
        return Err(GatewayError::WebhookVerificationFailed(
            "Timestamp outside tolerance".to_string(),
        ));
    }

    let expected = compute_signature(secret, parsed.timestamp, payload)?;
    let valid = parsed
        .signatures
        .iter()
        .any(|sig| constant_time_compare(sig, &expected));

    if !valid {
        return Err(GatewayError::WebhookVerificationFailed(
            "Signature mismatch".to_string(),
        ));
    }
    Ok(())
}

#[derive(Debug, Deserialize)]
struct StripeEventEnvelope {
    id: String,
    #[serde(rename = "type")]
    event_type: String,
    created: i64,
    data: StripeEventData,
}

#[derive(Debug, Deserialize)]
struct StripeEventData {
    object: serde_json::Value,
}

/// Parse a verified payload into a [`WebhookEvent`].
pub fn parse_event(payload: &[u8]) -> GatewayResult<WebhookEvent> {
    let envelope: StripeEventEnvelope = serde_json::from_slice(payload)
        .map_err(|e| GatewayError::WebhookParse(format!("Failed to parse webhook: {}", e)))?;

    debug!(event_id = %envelope.id, event_type = %envelope.event_type, "Verified Stripe webhook");

    Ok(WebhookEvent {
        id: envelope.id,
        kind: WebhookEventKind::from(envelope.event_type.as_str()),
        object: envelope.data.object,
        created: DateTime::from_timestamp(envelope.created, 0).unwrap_or_else(Utc::now),
    })
}
