//! # In-Memory Store
//!
//! A [`PaymentStore`] kept entirely in process memory. Useful for tests and
//! local development where persistence is not required.
//!
//! A transaction holds the store lock for its whole lifetime and works on a
//! private copy of the tables; commit publishes the copy, drop discards it.
//! That makes transactions serializable and all-or-nothing.

use crate::order::{Order, Payment};
use crate::status::{OrderStatus, PaymentStatus};
use crate::store::{PaymentStore, StoreError, StoreResult, StoreTransaction};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

#[derive(Debug, Default, Clone)]
struct Tables {
    orders: HashMap<String, Order>,
    /// Keyed by payment id
    payments: HashMap<String, Payment>,
}

impl Tables {
    fn payment_by_order_id(&self, order_id: &str) -> Option<&Payment> {
        self.payments.values().find(|p| p.order_id == order_id)
    }

    fn payment_by_reference(&self, reference: &str) -> Option<&Payment> {
        self.payments
            .values()
            .find(|p| p.provider_reference.as_deref() == Some(reference))
    }

    fn insert_payment(&mut self, payment: &Payment) -> StoreResult<()> {
        if self.payments.contains_key(&payment.id) {
            return Err(StoreError::Conflict(format!("payment {}", payment.id)));
        }
        if self.payment_by_order_id(&payment.order_id).is_some() {
            return Err(StoreError::Conflict(format!(
                "payment for order {}",
                payment.order_id
            )));
        }
        self.payments.insert(payment.id.clone(), payment.clone());
        Ok(())
    }

    fn set_payment_status<F>(&mut self, matches: F, status: PaymentStatus) -> u64
    where
        F: Fn(&Payment) -> bool,
    {
        let now = Utc::now();
        let mut touched = 0;
        for payment in self.payments.values_mut().filter(|p| matches(p)) {
            payment.status = status;
            payment.updated_at = now;
            touched += 1;
        }
        touched
    }

    fn set_order_status(&mut self, order_id: &str, status: OrderStatus) -> u64 {
        match self.orders.get_mut(order_id) {
            Some(order) => {
                order.status = status;
                order.updated_at = Utc::now();
                1
            }
            None => 0,
        }
    }

    fn newest_first<'a>(payments: impl Iterator<Item = &'a Payment>) -> Vec<Payment> {
        let mut out: Vec<Payment> = payments.cloned().collect();
        out.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| a.id.cmp(&b.id))
        });
        out
    }
}

/// A thread-safe in-memory store for orders and payments.
#[derive(Debug, Default, Clone)]
pub struct InMemoryStore {
    tables: Arc<Mutex<Tables>>,
}

impl InMemoryStore {
    /// Creates a new, empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace an order (orders are owned elsewhere; this seeds them).
    pub async fn insert_order(&self, order: Order) {
        let mut tables = self.tables.lock().await;
        tables.orders.insert(order.id.clone(), order);
    }

    /// Seed a payment, enforcing the one-payment-per-order rule.
    pub async fn insert_payment(&self, payment: Payment) -> StoreResult<()> {
        let mut tables = self.tables.lock().await;
        tables.insert_payment(&payment)
    }
}

#[async_trait]
impl PaymentStore for InMemoryStore {
    async fn order_by_id(&self, order_id: &str) -> StoreResult<Option<Order>> {
        let tables = self.tables.lock().await;
        Ok(tables.orders.get(order_id).cloned())
    }

    async fn payment_by_order_id(&self, order_id: &str) -> StoreResult<Option<Payment>> {
        let tables = self.tables.lock().await;
        Ok(tables.payment_by_order_id(order_id).cloned())
    }

    async fn payment_by_provider_reference(
        &self,
        reference: &str,
    ) -> StoreResult<Option<Payment>> {
        let tables = self.tables.lock().await;
        Ok(tables.payment_by_reference(reference).cloned())
    }

    async fn payments_by_user_id(&self, user_id: &str) -> StoreResult<Vec<Payment>> {
        let tables = self.tables.lock().await;
        Ok(Tables::newest_first(
            tables.payments.values().filter(|p| p.user_id == user_id),
        ))
    }

    async fn all_payments(&self) -> StoreResult<Vec<Payment>> {
        let tables = self.tables.lock().await;
        Ok(Tables::newest_first(tables.payments.values()))
    }

    async fn payments_by_status(&self, status: PaymentStatus) -> StoreResult<Vec<Payment>> {
        let tables = self.tables.lock().await;
        Ok(Tables::newest_first(
            tables.payments.values().filter(|p| p.status == status),
        ))
    }

    async fn begin(&self) -> StoreResult<Box<dyn StoreTransaction>> {
        let guard = self.tables.clone().lock_owned().await;
        let working = guard.clone();
        Ok(Box::new(InMemoryTransaction { guard, working }))
    }
}

/// An open transaction on an [`InMemoryStore`].
pub struct InMemoryTransaction {
    guard: OwnedMutexGuard<Tables>,
    working: Tables,
}

#[async_trait]
impl StoreTransaction for InMemoryTransaction {
    async fn order_by_id(&mut self, order_id: &str) -> StoreResult<Option<Order>> {
        Ok(self.working.orders.get(order_id).cloned())
    }

    async fn payment_by_order_id(&mut self, order_id: &str) -> StoreResult<Option<Payment>> {
        Ok(self.working.payment_by_order_id(order_id).cloned())
    }

    async fn payment_by_provider_reference(
        &mut self,
        reference: &str,
    ) -> StoreResult<Option<Payment>> {
        Ok(self.working.payment_by_reference(reference).cloned())
    }

    async fn insert_payment(&mut self, payment: &Payment) -> StoreResult<()> {
        self.working.insert_payment(payment)
    }

    async fn update_payment_status(
        &mut self,
        payment_id: &str,
        status: PaymentStatus,
    ) -> StoreResult<u64> {
        Ok(self.working.set_payment_status(|p| p.id == payment_id, status))
    }

    async fn update_payment_status_by_reference(
        &mut self,
        reference: &str,
        status: PaymentStatus,
    ) -> StoreResult<u64> {
        Ok(self
            .working
            .set_payment_status(|p| p.provider_reference.as_deref() == Some(reference), status))
    }

    async fn update_order_status(
        &mut self,
        order_id: &str,
        status: OrderStatus,
    ) -> StoreResult<u64> {
        Ok(self.working.set_order_status(order_id, status))
    }

    async fn commit(self: Box<Self>) -> StoreResult<()> {
        let InMemoryTransaction { mut guard, working } = *self;
        *guard = working;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> StoreResult<()> {
        Ok(())
    }
}
