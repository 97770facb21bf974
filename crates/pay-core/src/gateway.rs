//! # Payment Gateway Trait
//!
//! Contract for the external payment provider the orchestrator talks to.
//! Implementations: Stripe (`pay-stripe`), scripted fakes in tests.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    PaymentGateway (trait)                   │
//! │  ├── create_intent()                                        │
//! │  ├── get_intent()                                           │
//! │  ├── create_refund()                                        │
//! │  ├── verify_webhook()                                       │
//! │  └── provider_name()                                        │
//! └─────────────────────────────────────────────────────────────┘
//! ```

use crate::money::Currency;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

/// Failures reported by a gateway client
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Network/HTTP error communicating with provider
    #[error("Network error: {0}")]
    Network(String),

    /// Provider rejected the request
    #[error("Provider error [{provider}]: {message}")]
    Provider { provider: String, message: String },

    /// Reference is not shaped like a provider id
    #[error("Invalid provider reference: {0:?}")]
    InvalidReference(String),

    /// Response body could not be decoded
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Webhook signature verification failed
    #[error("Webhook verification failed: {0}")]
    WebhookVerificationFailed(String),

    /// Webhook payload parsing error
    #[error("Webhook parse error: {0}")]
    WebhookParse(String),
}

pub type GatewayResult<T> = Result<T, GatewayError>;

/// Provider-side status of a payment intent
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IntentStatus {
    RequiresPaymentMethod,
    RequiresConfirmation,
    RequiresAction,
    RequiresCapture,
    Processing,
    Succeeded,
    Canceled,
    /// Anything the provider adds later
    Unknown(String),
}

impl IntentStatus {
    pub fn as_str(&self) -> &str {
        match self {
            IntentStatus::RequiresPaymentMethod => "requires_payment_method",
            IntentStatus::RequiresConfirmation => "requires_confirmation",
            IntentStatus::RequiresAction => "requires_action",
            IntentStatus::RequiresCapture => "requires_capture",
            IntentStatus::Processing => "processing",
            IntentStatus::Succeeded => "succeeded",
            IntentStatus::Canceled => "canceled",
            IntentStatus::Unknown(other) => other,
        }
    }
}

impl From<&str> for IntentStatus {
    fn from(s: &str) -> Self {
        match s {
            "requires_payment_method" => IntentStatus::RequiresPaymentMethod,
            "requires_confirmation" => IntentStatus::RequiresConfirmation,
            "requires_action" => IntentStatus::RequiresAction,
            "requires_capture" => IntentStatus::RequiresCapture,
            "processing" => IntentStatus::Processing,
            "succeeded" => IntentStatus::Succeeded,
            "canceled" => IntentStatus::Canceled,
            other => IntentStatus::Unknown(other.to_string()),
        }
    }
}

/// Parameters for creating a payment intent
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntentRequest {
    /// Amount in minor units (cents)
    pub amount_minor: i64,
    pub currency: Currency,
    pub metadata: HashMap<String, String>,
    /// Same value for a retry of the same intent, so the provider can
    /// collapse duplicates
    pub idempotency_key: String,
}

/// A freshly created intent
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedIntent {
    pub reference: String,
    /// Secret the client uses to complete payment on the provider side
    pub client_secret: Option<String>,
}

/// Live view of an intent fetched from the provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayIntent {
    pub reference: String,
    pub status: IntentStatus,
}

/// Result of a refund request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayRefund {
    pub id: String,
    pub status: String,
}

/// Webhook event types the orchestrator reacts to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WebhookEventKind {
    PaymentIntentSucceeded,
    PaymentIntentFailed,
    PaymentIntentCanceled,
    ChargeRefunded,
    /// Unknown event (passthrough)
    Other(String),
}

impl WebhookEventKind {
    pub fn as_str(&self) -> &str {
        match self {
            WebhookEventKind::PaymentIntentSucceeded => "payment_intent.succeeded",
            WebhookEventKind::PaymentIntentFailed => "payment_intent.payment_failed",
            WebhookEventKind::PaymentIntentCanceled => "payment_intent.canceled",
            WebhookEventKind::ChargeRefunded => "charge.refunded",
            WebhookEventKind::Other(other) => other,
        }
    }
}

impl From<&str> for WebhookEventKind {
    fn from(s: &str) -> Self {
        match s {
            "payment_intent.succeeded" => WebhookEventKind::PaymentIntentSucceeded,
            "payment_intent.payment_failed" => WebhookEventKind::PaymentIntentFailed,
            "payment_intent.canceled" => WebhookEventKind::PaymentIntentCanceled,
            "charge.refunded" => WebhookEventKind::ChargeRefunded,
            other => WebhookEventKind::Other(other.to_string()),
        }
    }
}

/// A signature-verified webhook event
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookEvent {
    /// Event ID from provider
    pub id: String,

    pub kind: WebhookEventKind,

    /// The event's embedded `data.object`
    pub object: serde_json::Value,

    pub created: DateTime<Utc>,
}

/// Client for the external payment provider.
///
/// Calls are never retried here; retry policy belongs to the caller.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Create a payment intent for the given amount.
    async fn create_intent(&self, request: &IntentRequest) -> GatewayResult<CreatedIntent>;

    /// Fetch the live state of an intent by its reference.
    async fn get_intent(&self, reference: &str) -> GatewayResult<GatewayIntent>;

    /// Refund the full amount captured for an intent.
    async fn create_refund(&self, reference: &str) -> GatewayResult<GatewayRefund>;

    /// Verify a webhook signature against `secret` and parse the event.
    fn verify_webhook(
        &self,
        payload: &[u8],
        signature: &str,
        secret: &str,
    ) -> GatewayResult<WebhookEvent>;

    /// Get the provider name (stored on every payment).
    fn provider_name(&self) -> &'static str;
}

/// Type alias for a shared gateway (dynamic dispatch)
pub type SharedGateway = Arc<dyn PaymentGateway>;
