//! # Datastore Gateway
//!
//! Persistence contract for orders and payments. Point lookups and listings
//! run directly against the store; every mutation goes through a
//! [`StoreTransaction`] so that payment and order status change together.
//!
//! Dropping a transaction without committing it rolls it back, which is the
//! rollback that fires on every early-return path in the orchestrator.

use crate::order::{Order, Payment};
use crate::status::{OrderStatus, PaymentStatus};
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

/// Failures reported by a store implementation
#[derive(Debug, Error)]
pub enum StoreError {
    /// A uniqueness constraint rejected the write
    #[error("record already exists: {0}")]
    Conflict(String),

    /// A stored row could not be decoded
    #[error("corrupt record: {0}")]
    Corrupt(String),

    /// Driver or connection failure
    #[error("storage backend: {0}")]
    Backend(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl StoreError {
    pub fn backend(err: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        StoreError::Backend(err.into())
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Non-transactional queries plus the entry point for transactions.
#[async_trait]
pub trait PaymentStore: Send + Sync {
    async fn order_by_id(&self, order_id: &str) -> StoreResult<Option<Order>>;

    async fn payment_by_order_id(&self, order_id: &str) -> StoreResult<Option<Payment>>;

    async fn payment_by_provider_reference(&self, reference: &str)
        -> StoreResult<Option<Payment>>;

    /// Payments owned by a user, newest first.
    async fn payments_by_user_id(&self, user_id: &str) -> StoreResult<Vec<Payment>>;

    /// Every payment, newest first.
    async fn all_payments(&self) -> StoreResult<Vec<Payment>>;

    /// Payments currently in `status`, newest first.
    async fn payments_by_status(&self, status: PaymentStatus) -> StoreResult<Vec<Payment>>;

    /// Open a transaction.
    async fn begin(&self) -> StoreResult<Box<dyn StoreTransaction>>;
}

/// The query set rebound to an open transaction.
///
/// Update methods return the number of rows they touched.
#[async_trait]
pub trait StoreTransaction: Send {
    async fn order_by_id(&mut self, order_id: &str) -> StoreResult<Option<Order>>;

    async fn payment_by_order_id(&mut self, order_id: &str) -> StoreResult<Option<Payment>>;

    async fn payment_by_provider_reference(
        &mut self,
        reference: &str,
    ) -> StoreResult<Option<Payment>>;

    /// Insert a payment; a payment for the same order id is a `Conflict`.
    async fn insert_payment(&mut self, payment: &Payment) -> StoreResult<()>;

    async fn update_payment_status(
        &mut self,
        payment_id: &str,
        status: PaymentStatus,
    ) -> StoreResult<u64>;

    async fn update_payment_status_by_reference(
        &mut self,
        reference: &str,
        status: PaymentStatus,
    ) -> StoreResult<u64>;

    async fn update_order_status(&mut self, order_id: &str, status: OrderStatus)
        -> StoreResult<u64>;

    async fn commit(self: Box<Self>) -> StoreResult<()>;

    async fn rollback(self: Box<Self>) -> StoreResult<()>;
}

/// Type alias for a shared store (dynamic dispatch)
pub type SharedStore = Arc<dyn PaymentStore>;
