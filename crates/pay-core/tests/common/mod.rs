#![allow(dead_code)]

use async_trait::async_trait;
use chrono::Utc;
use pay_core::{
    CreatedIntent, GatewayError, GatewayIntent, GatewayRefund, GatewayResult, InMemoryStore,
    IntentRequest, IntentStatus, Order, Payment, PaymentGateway, PaymentOrchestrator,
    PaymentStatus, PaymentStore, StoreError, StoreResult, StoreTransaction, WebhookEvent,
    WebhookEventKind,
};
use pay_core::{OrderStatus, SharedGateway, SharedStore};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

pub const VALID_SIGNATURE: &str = "t=1,v1=valid";

// ─────────────────────────────────────────────────────────────────────────────
// Store wrapper
// ─────────────────────────────────────────────────────────────────────────────

/// Switches for injecting store failures.
#[derive(Debug, Default)]
pub struct Faults {
    pub begin: AtomicBool,
    pub commit: AtomicBool,
    pub insert: AtomicBool,
    pub order_update: AtomicBool,
    pub payment_lookup: AtomicBool,
}

/// What reached the store.
#[derive(Debug, Default)]
pub struct Counters {
    pub begins: AtomicUsize,
    pub writes: AtomicUsize,
    pub commits: AtomicUsize,
}

impl Counters {
    pub fn begins(&self) -> usize {
        self.begins.load(Ordering::SeqCst)
    }

    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn commits(&self) -> usize {
        self.commits.load(Ordering::SeqCst)
    }
}

fn injected(what: &str) -> StoreError {
    StoreError::backend(format!("injected {what} failure"))
}

/// `InMemoryStore` that counts transactional activity and fails on demand.
#[derive(Clone, Default)]
pub struct RecordingStore {
    pub inner: InMemoryStore,
    pub faults: Arc<Faults>,
    pub counters: Arc<Counters>,
}

#[async_trait]
impl PaymentStore for RecordingStore {
    async fn order_by_id(&self, order_id: &str) -> StoreResult<Option<Order>> {
        self.inner.order_by_id(order_id).await
    }

    async fn payment_by_order_id(&self, order_id: &str) -> StoreResult<Option<Payment>> {
        if self.faults.payment_lookup.load(Ordering::SeqCst) {
            return Err(injected("lookup"));
        }
        self.inner.payment_by_order_id(order_id).await
    }

    async fn payment_by_provider_reference(
        &self,
        reference: &str,
    ) -> StoreResult<Option<Payment>> {
        self.inner.payment_by_provider_reference(reference).await
    }

    async fn payments_by_user_id(&self, user_id: &str) -> StoreResult<Vec<Payment>> {
        self.inner.payments_by_user_id(user_id).await
    }

    async fn all_payments(&self) -> StoreResult<Vec<Payment>> {
        self.inner.all_payments().await
    }

    async fn payments_by_status(&self, status: PaymentStatus) -> StoreResult<Vec<Payment>> {
        self.inner.payments_by_status(status).await
    }

    async fn begin(&self) -> StoreResult<Box<dyn StoreTransaction>> {
        self.counters.begins.fetch_add(1, Ordering::SeqCst);
        if self.faults.begin.load(Ordering::SeqCst) {
            return Err(injected("begin"));
        }
        let inner = self.inner.begin().await?;
        Ok(Box::new(RecordingTransaction {
            inner,
            faults: self.faults.clone(),
            counters: self.counters.clone(),
        }))
    }
}

struct RecordingTransaction {
    inner: Box<dyn StoreTransaction>,
    faults: Arc<Faults>,
    counters: Arc<Counters>,
}

impl RecordingTransaction {
    fn wrote(&self) {
        self.counters.writes.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl StoreTransaction for RecordingTransaction {
    async fn order_by_id(&mut self, order_id: &str) -> StoreResult<Option<Order>> {
        self.inner.order_by_id(order_id).await
    }

    async fn payment_by_order_id(&mut self, order_id: &str) -> StoreResult<Option<Payment>> {
        self.inner.payment_by_order_id(order_id).await
    }

    async fn payment_by_provider_reference(
        &mut self,
        reference: &str,
    ) -> StoreResult<Option<Payment>> {
        self.inner.payment_by_provider_reference(reference).await
    }

    async fn insert_payment(&mut self, payment: &Payment) -> StoreResult<()> {
        self.wrote();
        if self.faults.insert.load(Ordering::SeqCst) {
            return Err(injected("insert"));
        }
        self.inner.insert_payment(payment).await
    }

    async fn update_payment_status(
        &mut self,
        payment_id: &str,
        status: PaymentStatus,
    ) -> StoreResult<u64> {
        self.wrote();
        self.inner.update_payment_status(payment_id, status).await
    }

    async fn update_payment_status_by_reference(
        &mut self,
        reference: &str,
        status: PaymentStatus,
    ) -> StoreResult<u64> {
        self.wrote();
        self.inner
            .update_payment_status_by_reference(reference, status)
            .await
    }

    async fn update_order_status(
        &mut self,
        order_id: &str,
        status: OrderStatus,
    ) -> StoreResult<u64> {
        self.wrote();
        if self.faults.order_update.load(Ordering::SeqCst) {
            return Err(injected("order update"));
        }
        self.inner.update_order_status(order_id, status).await
    }

    async fn commit(self: Box<Self>) -> StoreResult<()> {
        if self.faults.commit.load(Ordering::SeqCst) {
            return Err(injected("commit"));
        }
        self.counters.commits.fetch_add(1, Ordering::SeqCst);
        self.inner.commit().await
    }

    async fn rollback(self: Box<Self>) -> StoreResult<()> {
        self.inner.rollback().await
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Gateway fake
// ─────────────────────────────────────────────────────────────────────────────

/// Scripted gateway. Intents are numbered `pi_test_1`, `pi_test_2`, ...
///
/// `verify_webhook` accepts only [`VALID_SIGNATURE`] and parses the payload as
/// a Stripe-shaped event envelope.
pub struct FakeGateway {
    pub intent_status: Mutex<IntentStatus>,
    pub client_secret: Mutex<Option<String>>,
    pub fail_create: AtomicBool,
    pub fail_get: AtomicBool,
    pub fail_refund: AtomicBool,
    pub created: Mutex<Vec<IntentRequest>>,
    pub refunded: Mutex<Vec<String>>,
    next_id: AtomicUsize,
}

impl Default for FakeGateway {
    fn default() -> Self {
        Self {
            intent_status: Mutex::new(IntentStatus::RequiresPaymentMethod),
            client_secret: Mutex::new(Some("secret_test".to_string())),
            fail_create: AtomicBool::new(false),
            fail_get: AtomicBool::new(false),
            fail_refund: AtomicBool::new(false),
            created: Mutex::new(Vec::new()),
            refunded: Mutex::new(Vec::new()),
            next_id: AtomicUsize::new(1),
        }
    }
}

impl FakeGateway {
    pub fn set_intent_status(&self, status: IntentStatus) {
        *self.intent_status.lock().unwrap() = status;
    }

    pub fn created_count(&self) -> usize {
        self.created.lock().unwrap().len()
    }

    pub fn refund_count(&self) -> usize {
        self.refunded.lock().unwrap().len()
    }

    fn unavailable() -> GatewayError {
        GatewayError::Provider {
            provider: "fake".to_string(),
            message: "scripted failure".to_string(),
        }
    }
}

#[async_trait]
impl PaymentGateway for FakeGateway {
    async fn create_intent(&self, request: &IntentRequest) -> GatewayResult<CreatedIntent> {
        if self.fail_create.load(Ordering::SeqCst) {
            return Err(Self::unavailable());
        }
        self.created.lock().unwrap().push(request.clone());
        let n = self.next_id.fetch_add(1, Ordering::SeqCst);
        Ok(CreatedIntent {
            reference: format!("pi_test_{n}"),
            client_secret: self.client_secret.lock().unwrap().clone(),
        })
    }

    async fn get_intent(&self, reference: &str) -> GatewayResult<GatewayIntent> {
        if self.fail_get.load(Ordering::SeqCst) {
            return Err(GatewayError::Network("connection reset".to_string()));
        }
        Ok(GatewayIntent {
            reference: reference.to_string(),
            status: self.intent_status.lock().unwrap().clone(),
        })
    }

    async fn create_refund(&self, reference: &str) -> GatewayResult<GatewayRefund> {
        if self.fail_refund.load(Ordering::SeqCst) {
            return Err(Self::unavailable());
        }
        self.refunded.lock().unwrap().push(reference.to_string());
        Ok(GatewayRefund {
            id: format!("re_{reference}"),
            status: "succeeded".to_string(),
        })
    }

    fn verify_webhook(
        &self,
        payload: &[u8],
        signature: &str,
        _secret: &str,
    ) -> GatewayResult<WebhookEvent> {
        if signature != VALID_SIGNATURE {
            return Err(GatewayError::WebhookVerificationFailed(
                "signature mismatch".to_string(),
            ));
        }

        let value: serde_json::Value = serde_json::from_slice(payload)
            .map_err(|e| GatewayError::WebhookParse(e.to_string()))?;
        let kind = value["type"]
            .as_str()
            .ok_or_else(|| GatewayError::WebhookParse("missing type".to_string()))?;

        Ok(WebhookEvent {
            id: value["id"].as_str().unwrap_or("evt_test").to_string(),
            kind: WebhookEventKind::from(kind),
            object: value["data"]["object"].clone(),
            created: Utc::now(),
        })
    }

    fn provider_name(&self) -> &'static str {
        "fake"
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Fixtures
// ─────────────────────────────────────────────────────────────────────────────

pub struct Harness {
    pub store: RecordingStore,
    pub gateway: Arc<FakeGateway>,
    pub orchestrator: PaymentOrchestrator,
}

impl Harness {
    pub fn new() -> Self {
        let store = RecordingStore::default();
        let gateway = Arc::new(FakeGateway::default());
        let orchestrator = PaymentOrchestrator::new(
            Arc::new(store.clone()) as SharedStore,
            gateway.clone() as SharedGateway,
        );
        Self {
            store,
            gateway,
            orchestrator,
        }
    }

    pub async fn seed_order(&self, id: &str, user_id: &str, total: &str) -> Order {
        let order = Order::new(id, user_id, total);
        self.store.inner.insert_order(order.clone()).await;
        order
    }

    /// Seed an order plus a payment in `status` carrying `reference`.
    pub async fn seed_payment(
        &self,
        order_id: &str,
        user_id: &str,
        reference: &str,
        status: PaymentStatus,
    ) -> Payment {
        let order = self.seed_order(order_id, user_id, "25.00").await;
        let payment = Payment::new(
            &order,
            rust_decimal::Decimal::new(2500, 2),
            pay_core::Currency::USD,
            "fake",
            reference,
        )
        .with_status(status);
        self.store
            .inner
            .insert_payment(payment.clone())
            .await
            .unwrap();
        payment
    }

    pub async fn order_status(&self, order_id: &str) -> OrderStatus {
        self.store
            .inner
            .order_by_id(order_id)
            .await
            .unwrap()
            .unwrap()
            .status
    }

    pub async fn payment_status(&self, order_id: &str) -> PaymentStatus {
        self.store
            .inner
            .payment_by_order_id(order_id)
            .await
            .unwrap()
            .unwrap()
            .status
    }
}

/// Stripe-shaped event envelope for `payment_intent.*` events.
pub fn intent_event(event_type: &str, reference: &str) -> Vec<u8> {
    serde_json::json!({
        "id": "evt_1",
        "type": event_type,
        "created": 1_700_000_000,
        "data": { "object": { "id": reference, "object": "payment_intent" } }
    })
    .to_string()
    .into_bytes()
}

/// Stripe-shaped `charge.refunded` envelope.
pub fn refund_event(reference: &str) -> Vec<u8> {
    serde_json::json!({
        "id": "evt_2",
        "type": "charge.refunded",
        "created": 1_700_000_000,
        "data": { "object": { "id": "ch_1", "object": "charge", "payment_intent": reference } }
    })
    .to_string()
    .into_bytes()
}
