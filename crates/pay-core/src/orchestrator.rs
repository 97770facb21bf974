//! # Payment Orchestrator
//!
//! Drives a payment through its lifecycle against the gateway while keeping
//! the local `Payment` and `Order` rows in agreement:
//!
//! | Operation        | Gateway call      | Local writes (one transaction)        |
//! |------------------|-------------------|---------------------------------------|
//! | `create_payment` | create intent     | insert payment (`created`)            |
//! | `confirm_payment`| fetch intent      | payment status, order status (mapped) |
//! | `refund_payment` | create refund     | payment `refunded`, order `cancelled` |
//! | `handle_webhook` | verify signature  | payment status by reference           |
//!
//! Gateway calls always happen before a transaction is opened, and nothing is
//! retried here. The orchestrator does not log; it only returns typed errors.

use crate::error::{ErrorCode, PaymentError, PaymentResult};
use crate::gateway::{IntentRequest, SharedGateway, WebhookEvent, WebhookEventKind};
use crate::money::{decimal_to_minor_units, parse_amount, Currency};
use crate::order::Payment;
use crate::status::{
    order_status_for, payment_status_for_event, payment_status_for_intent, OrderStatus,
    PaymentStatus,
};
use crate::store::{SharedStore, StoreError, StoreTransaction};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

/// Input for [`PaymentOperations::create_payment`]
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CreatePaymentRequest {
    pub order_id: String,
    pub user_id: String,
    pub currency: String,
}

impl CreatePaymentRequest {
    pub fn new(
        order_id: impl Into<String>,
        user_id: impl Into<String>,
        currency: impl Into<String>,
    ) -> Self {
        Self {
            order_id: order_id.into(),
            user_id: user_id.into(),
            currency: currency.into(),
        }
    }

    fn validate(&self) -> PaymentResult<Currency> {
        if self.order_id.is_empty() {
            return Err(PaymentError::invalid_request("order_id is required"));
        }
        if self.user_id.is_empty() {
            return Err(PaymentError::invalid_request("user_id is required"));
        }
        if self.currency.is_empty() {
            return Err(PaymentError::invalid_request("currency is required"));
        }
        self.currency.parse()
    }
}

/// What the caller needs to finish paying on the gateway side
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CreatedPayment {
    pub payment_id: String,
    pub provider_reference: String,
    pub client_secret: String,
}

/// What a webhook did to local state
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum WebhookOutcome {
    /// Payment moved to (or re-asserted) `status`
    Applied {
        reference: String,
        status: PaymentStatus,
    },
    /// Transition refused; the payment keeps `status`
    Unchanged {
        reference: String,
        status: PaymentStatus,
    },
    /// No local payment carries this reference
    Unmatched { reference: String },
    /// Event type we do not act on
    Ignored { event_type: String },
}

/// Selection for [`PaymentOperations::list_payments`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PaymentFilter {
    pub user_id: Option<String>,
    pub status: Option<PaymentStatus>,
}

impl PaymentFilter {
    pub fn for_user(user_id: impl Into<String>) -> Self {
        Self {
            user_id: Some(user_id.into()),
            status: None,
        }
    }

    pub fn with_status(mut self, status: PaymentStatus) -> Self {
        self.status = Some(status);
        self
    }
}

/// The operations exposed to callers.
#[async_trait]
pub trait PaymentOperations: Send + Sync {
    /// Create a gateway intent for a pending order and record the payment.
    async fn create_payment(&self, request: CreatePaymentRequest)
        -> PaymentResult<CreatedPayment>;

    /// Pull the live intent status from the gateway and apply it locally.
    async fn confirm_payment(&self, order_id: &str, user_id: &str)
        -> PaymentResult<PaymentStatus>;

    /// Refund a succeeded payment and cancel its order.
    async fn refund_payment(&self, order_id: &str, user_id: &str) -> PaymentResult<()>;

    /// Verify and apply an inbound gateway notification.
    async fn handle_webhook(
        &self,
        payload: &[u8],
        signature: &str,
        secret: &str,
    ) -> PaymentResult<WebhookOutcome>;

    /// List payments matching `filter`.
    async fn list_payments(&self, filter: &PaymentFilter) -> PaymentResult<Vec<Payment>>;
}

/// Type alias for a shared operations handle (dynamic dispatch)
pub type SharedOperations = Arc<dyn PaymentOperations>;

/// The payment lifecycle orchestrator.
pub struct PaymentOrchestrator {
    store: SharedStore,
    gateway: SharedGateway,
}

impl PaymentOrchestrator {
    pub fn new(store: SharedStore, gateway: SharedGateway) -> Self {
        Self { store, gateway }
    }

    async fn begin(&self) -> PaymentResult<Box<dyn StoreTransaction>> {
        self.store.begin().await.map_err(|e| {
            PaymentError::new(ErrorCode::TransactionError, "could not open transaction")
                .with_source(e)
        })
    }

    async fn commit(tx: Box<dyn StoreTransaction>) -> PaymentResult<()> {
        tx.commit().await.map_err(|e| {
            PaymentError::new(ErrorCode::CommitError, "could not commit transaction")
                .with_source(e)
        })
    }

    /// Load the payment for an order and check it belongs to `user_id`.
    async fn owned_payment(&self, order_id: &str, user_id: &str) -> PaymentResult<Payment> {
        if order_id.is_empty() {
            return Err(PaymentError::new(ErrorCode::MissingOrderId, "order id is required"));
        }
        if user_id.is_empty() {
            return Err(PaymentError::new(ErrorCode::MissingUserId, "user id is required"));
        }

        let payment = self
            .store
            .payment_by_order_id(order_id)
            .await
            .map_err(PaymentError::database)?
            .ok_or_else(|| PaymentError::new(ErrorCode::PaymentNotFound, "payment not found"))?;

        if !payment.belongs_to(user_id) {
            return Err(PaymentError::unauthorized());
        }
        Ok(payment)
    }

    /// Move a payment to `target` inside `tx`, updating the order when the
    /// sub-map says so. Returns the status the payment ends up in.
    async fn apply_status(
        tx: &mut dyn StoreTransaction,
        payment: &Payment,
        target: PaymentStatus,
    ) -> PaymentResult<PaymentStatus> {
        if !payment.status.accepts(target) {
            return Ok(payment.status);
        }

        tx.update_payment_status(&payment.id, target)
            .await
            .map_err(PaymentError::database)?;

        if let Some(order_status) = order_status_for(target) {
            tx.update_order_status(&payment.order_id, order_status)
                .await
                .map_err(PaymentError::database)?;
        }
        Ok(target)
    }

    async fn reconcile_event(
        tx: &mut dyn StoreTransaction,
        event: &WebhookEvent,
    ) -> PaymentResult<WebhookOutcome> {
        let Some(target) = payment_status_for_event(&event.kind) else {
            return Ok(WebhookOutcome::Ignored {
                event_type: event.kind.as_str().to_string(),
            });
        };

        let reference = match event.kind {
            WebhookEventKind::ChargeRefunded => charge_intent_reference(&event.object)?,
            _ => intent_reference(&event.object)?,
        };

        let current = tx
            .payment_by_provider_reference(&reference)
            .await
            .map_err(PaymentError::database)?;

        let payment = match current {
            Some(payment) => payment,
            None if event.kind == WebhookEventKind::PaymentIntentSucceeded => {
                return Err(PaymentError::new(
                    ErrorCode::PaymentNotFound,
                    "payment not found",
                ));
            }
            None => return Ok(WebhookOutcome::Unmatched { reference }),
        };

        if !payment.status.accepts(target) {
            return Ok(WebhookOutcome::Unchanged {
                reference,
                status: payment.status,
            });
        }

        tx.update_payment_status_by_reference(&reference, target)
            .await
            .map_err(PaymentError::database)?;

        if event.kind == WebhookEventKind::PaymentIntentSucceeded {
            if let Some(order_status) = order_status_for(target) {
                tx.update_order_status(&payment.order_id, order_status)
                    .await
                    .map_err(PaymentError::database)?;
            }
        }

        Ok(WebhookOutcome::Applied {
            reference,
            status: target,
        })
    }
}

#[async_trait]
impl PaymentOperations for PaymentOrchestrator {
    async fn create_payment(
        &self,
        request: CreatePaymentRequest,
    ) -> PaymentResult<CreatedPayment> {
        let currency = request.validate()?;

        let order = self
            .store
            .order_by_id(&request.order_id)
            .await
            .map_err(PaymentError::database)?
            .ok_or_else(|| PaymentError::new(ErrorCode::OrderNotFound, "order not found"))?;

        if order.user_id != request.user_id {
            return Err(PaymentError::new(
                ErrorCode::Unauthorized,
                "order does not belong to this user",
            ));
        }

        if order.status != OrderStatus::Pending {
            return Err(PaymentError::new(
                ErrorCode::InvalidOrderStatus,
                format!("order is {}, expected pending", order.status),
            ));
        }

        // Lookup errors count as "no payment yet". The storage uniqueness
        // constraint on order_id still rejects a duplicate at insert time.
        if let Ok(Some(existing)) = self.store.payment_by_order_id(&order.id).await {
            if !existing.id.is_empty() {
                return Err(PaymentError::new(
                    ErrorCode::PaymentExists,
                    "a payment already exists for this order",
                ));
            }
        }

        let amount = parse_amount(&order.total)?;
        let amount_minor = decimal_to_minor_units(amount)?;

        let intent = self
            .gateway
            .create_intent(&IntentRequest {
                amount_minor,
                currency,
                metadata: HashMap::from([
                    ("order_id".to_string(), order.id.clone()),
                    ("user_id".to_string(), order.user_id.clone()),
                ]),
                idempotency_key: format!("intent:{}:{}:{}", order.id, amount_minor, currency),
            })
            .await
            .map_err(PaymentError::gateway)?;

        let client_secret = intent
            .client_secret
            .filter(|secret| !secret.is_empty())
            .ok_or_else(|| {
                PaymentError::new(ErrorCode::GatewayError, "gateway returned no client secret")
            })?;

        let payment = Payment::new(
            &order,
            amount,
            currency,
            self.gateway.provider_name(),
            intent.reference.clone(),
        );

        // From here on a failure leaves the gateway intent orphaned; it is
        // never confirmed and expires on the provider side.
        let mut tx = self.begin().await?;
        tx.insert_payment(&payment).await.map_err(|e| match e {
            StoreError::Conflict(_) => PaymentError::new(
                ErrorCode::PaymentExists,
                "a payment already exists for this order",
            )
            .with_source(e),
            other => PaymentError::database(other),
        })?;
        Self::commit(tx).await?;

        Ok(CreatedPayment {
            payment_id: payment.id,
            provider_reference: intent.reference,
            client_secret,
        })
    }

    async fn confirm_payment(
        &self,
        order_id: &str,
        user_id: &str,
    ) -> PaymentResult<PaymentStatus> {
        let payment = self.owned_payment(order_id, user_id).await?;
        let reference = payment
            .reference()
            .ok_or_else(|| {
                PaymentError::new(ErrorCode::InvalidPayment, "payment has no provider reference")
            })?
            .to_string();

        let intent = self
            .gateway
            .get_intent(&reference)
            .await
            .map_err(PaymentError::gateway)?;
        let target = payment_status_for_intent(&intent.status);

        let mut tx = self.begin().await?;
        // Re-read under the transaction so the guard sees the latest status.
        let current = tx
            .payment_by_order_id(order_id)
            .await
            .map_err(PaymentError::database)?
            .unwrap_or(payment);
        let status = Self::apply_status(tx.as_mut(), &current, target).await?;
        Self::commit(tx).await?;

        Ok(status)
    }

    async fn refund_payment(&self, order_id: &str, user_id: &str) -> PaymentResult<()> {
        let payment = self.owned_payment(order_id, user_id).await?;

        if payment.status != PaymentStatus::Succeeded {
            return Err(PaymentError::new(
                ErrorCode::InvalidStatus,
                format!("payment is {}, only succeeded payments can be refunded", payment.status),
            ));
        }

        let reference = payment.reference().ok_or_else(|| {
            PaymentError::new(ErrorCode::InvalidPayment, "payment has no provider reference")
        })?;

        self.gateway
            .create_refund(reference)
            .await
            .map_err(PaymentError::gateway)?;

        let mut tx = self.begin().await?;
        tx.update_payment_status(&payment.id, PaymentStatus::Refunded)
            .await
            .map_err(PaymentError::database)?;
        tx.update_order_status(&payment.order_id, OrderStatus::Cancelled)
            .await
            .map_err(PaymentError::database)?;
        Self::commit(tx).await
    }

    async fn handle_webhook(
        &self,
        payload: &[u8],
        signature: &str,
        secret: &str,
    ) -> PaymentResult<WebhookOutcome> {
        if signature.is_empty() {
            return Err(PaymentError::new(ErrorCode::WebhookError, "missing webhook signature"));
        }

        let event = self
            .gateway
            .verify_webhook(payload, signature, secret)
            .map_err(PaymentError::webhook)?;

        let mut tx = self.begin().await?;
        let outcome = Self::reconcile_event(tx.as_mut(), &event).await?;
        Self::commit(tx).await?;

        Ok(outcome)
    }

    async fn list_payments(&self, filter: &PaymentFilter) -> PaymentResult<Vec<Payment>> {
        let payments = match (filter.user_id.as_deref(), filter.status) {
            (Some(""), _) => {
                return Err(PaymentError::new(ErrorCode::MissingUserId, "user id is required"));
            }
            (Some(user_id), status) => {
                let mut payments = self
                    .store
                    .payments_by_user_id(user_id)
                    .await
                    .map_err(PaymentError::database)?;
                if let Some(status) = status {
                    payments.retain(|p| p.status == status);
                }
                payments
            }
            (None, Some(status)) => self
                .store
                .payments_by_status(status)
                .await
                .map_err(PaymentError::database)?,
            (None, None) => self
                .store
                .all_payments()
                .await
                .map_err(PaymentError::database)?,
        };
        Ok(payments)
    }
}

/// `id` of an embedded payment intent.
fn intent_reference(object: &serde_json::Value) -> PaymentResult<String> {
    #[derive(Deserialize)]
    struct IntentObject {
        id: String,
    }

    let intent: IntentObject = serde_json::from_value(object.clone()).map_err(|e| {
        PaymentError::new(ErrorCode::WebhookError, "malformed payment intent in webhook")
            .with_source(e)
    })?;
    non_empty_reference(intent.id)
}

/// Payment-intent reference nested in an embedded charge. Providers send it
/// either as a bare id or as an expanded object.
fn charge_intent_reference(object: &serde_json::Value) -> PaymentResult<String> {
    let reference = match object.get("payment_intent") {
        Some(serde_json::Value::String(id)) => Some(id.clone()),
        Some(serde_json::Value::Object(expanded)) => expanded
            .get("id")
            .and_then(|v| v.as_str())
            .map(String::from),
        _ => None,
    };

    reference.map(non_empty_reference).unwrap_or_else(|| {
        Err(PaymentError::new(
            ErrorCode::WebhookError,
            "charge in webhook carries no payment intent",
        ))
    })
}

fn non_empty_reference(reference: String) -> PaymentResult<String> {
    if reference.is_empty() {
        return Err(PaymentError::new(
            ErrorCode::WebhookError,
            "webhook object has an empty id",
        ));
    }
    Ok(reference)
}
