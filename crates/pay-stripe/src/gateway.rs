//! # Stripe Payment Intents
//!
//! [`PaymentGateway`] implementation over the Stripe REST API:
//! `payment_intents` for create/fetch and `refunds` for full refunds.

use crate::config::StripeConfig;
use crate::webhook;
use async_trait::async_trait;
use chrono::Utc;
use pay_core::{
    CreatedIntent, GatewayError, GatewayIntent, GatewayRefund, GatewayResult, IntentRequest,
    IntentStatus, PaymentGateway, WebhookEvent,
};
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{debug, error, info, instrument};

const PROVIDER: &str = "stripe";

/// Stripe client for payment intents and refunds
pub struct StripeGateway {
    config: StripeConfig,
    client: Client,
}

impl StripeGateway {
    /// Create a new Stripe gateway
    pub fn new(config: StripeConfig) -> GatewayResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| GatewayError::Network(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { config, client })
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .header("Authorization", self.config.auth_header())
            .header("Stripe-Version", &self.config.api_version)
    }

    async fn post_form<T: DeserializeOwned>(
        &self,
        path: &str,
        form: &[(String, String)],
        idempotency_key: &str,
    ) -> GatewayResult<T> {
        let request = self
            .authorized(self.client.post(self.config.endpoint(path)))
            .header("Idempotency-Key", idempotency_key)
            .form(form);
        Self::send(request).await
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> GatewayResult<T> {
        let request = self.authorized(self.client.get(self.config.endpoint(path)));
        Self::send(request).await
    }

    async fn send<T: DeserializeOwned>(request: RequestBuilder) -> GatewayResult<T> {
        let response = request
            .send()
            .await
            .map_err(|e| GatewayError::Network(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| GatewayError::Network(e.to_string()))?;

        if !status.is_success() {
            error!("Stripe API error: status={}, body={}", status, body);

            let message = match serde_json::from_str::<StripeErrorResponse>(&body) {
                Ok(error_response) => error_response.error.message,
                Err(_) => format!("HTTP {}: {}", status, body),
            };
            return Err(GatewayError::Provider {
                provider: PROVIDER.to_string(),
                message,
            });
        }

        serde_json::from_str(&body).map_err(|e| {
            GatewayError::Serialization(format!("Failed to parse Stripe response: {}", e))
        })
    }

    /// Stripe ids are `[A-Za-z0-9_]`; anything else never reaches the URL.
    fn intent_path(reference: &str) -> GatewayResult<String> {
        let valid = !reference.is_empty()
            && reference
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_');
        if !valid {
            return Err(GatewayError::InvalidReference(reference.to_string()));
        }
        Ok(format!("payment_intents/{}", reference))
    }

    fn intent_form(request: &IntentRequest) -> Vec<(String, String)> {
        let mut form = vec![
            ("amount".to_string(), request.amount_minor.to_string()),
            (
                "currency".to_string(),
                request.currency.as_str().to_lowercase(),
            ),
            (
                "automatic_payment_methods[enabled]".to_string(),
                "true".to_string(),
            ),
        ];

        // Sorted so the encoded body is stable.
        let metadata: BTreeMap<_, _> = request.metadata.iter().collect();
        for (key, value) in metadata {
            form.push((format!("metadata[{}]", key), value.clone()));
        }
        form
    }
}

#[async_trait]
impl PaymentGateway for StripeGateway {
    #[instrument(skip(self, request), fields(amount = request.amount_minor, currency = %request.currency))]
    async fn create_intent(&self, request: &IntentRequest) -> GatewayResult<CreatedIntent> {
        let form = Self::intent_form(request);
        let intent: StripePaymentIntent = self
            .post_form("payment_intents", &form, &request.idempotency_key)
            .await?;

        info!(intent_id = %intent.id, status = %intent.status, "Created Stripe payment intent");

        Ok(CreatedIntent {
            reference: intent.id,
            client_secret: intent.client_secret,
        })
    }

    #[instrument(skip(self))]
    async fn get_intent(&self, reference: &str) -> GatewayResult<GatewayIntent> {
        let intent: StripePaymentIntent = self.get(&Self::intent_path(reference)?).await?;

        debug!(intent_id = %intent.id, status = %intent.status, "Fetched Stripe payment intent");

        Ok(GatewayIntent {
            status: IntentStatus::from(intent.status.as_str()),
            reference: intent.id,
        })
    }

    #[instrument(skip(self))]
    async fn create_refund(&self, reference: &str) -> GatewayResult<GatewayRefund> {
        Self::intent_path(reference)?;
        let form = vec![("payment_intent".to_string(), reference.to_string())];
        let refund: StripeRefund = self
            .post_form("refunds", &form, &format!("refund:{}", reference))
            .await?;

        info!(refund_id = %refund.id, intent_id = %reference, "Created Stripe refund");

        Ok(GatewayRefund {
            id: refund.id,
            status: refund.status.unwrap_or_default(),
        })
    }

    #[instrument(skip(self, payload, signature, secret))]
    fn verify_webhook(
        &self,
        payload: &[u8],
        signature: &str,
        secret: &str,
    ) -> GatewayResult<WebhookEvent> {
        webhook::verify_signature(payload, signature, secret, Utc::now().timestamp())?;
        webhook::parse_event(payload)
    }

    fn provider_name(&self) -> &'static str {
        PROVIDER
    }
}

// =============================================================================
// Stripe API Types
// =============================================================================

#[derive(Debug, Deserialize)]
struct StripePaymentIntent {
    id: String,
    status: String,
    #[serde(default)]
    client_secret: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StripeRefund {
    id: String,
    #[serde(default)]
    status: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StripeErrorResponse {
    error: StripeError,
}

#[derive(Debug, Deserialize)]
struct StripeError {
    message: String,
}
