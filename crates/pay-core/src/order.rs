//! # Order and Payment Records
//!
//! The two persisted records the orchestrator keeps consistent. Orders are
//! owned by order management; the orchestrator only reads them and writes
//! their status. Payments are created once per order and never deleted.

use crate::money::Currency;
use crate::status::{OrderStatus, PaymentStatus};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A purchasable transaction owned by a user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: String,

    pub user_id: String,

    /// Decimal string as stored by order management; parsed only when a
    /// payment is created.
    pub total: String,

    pub status: OrderStatus,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// Create a pending order
    pub fn new(
        id: impl Into<String>,
        user_id: impl Into<String>,
        total: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            user_id: user_id.into(),
            total: total.into(),
            status: OrderStatus::Pending,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_status(mut self, status: OrderStatus) -> Self {
        self.status = status;
        self
    }
}

/// One attempt to collect funds for an order through the gateway
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payment {
    pub id: String,

    pub order_id: String,

    pub user_id: String,

    pub amount: Decimal,

    pub currency: Currency,

    pub status: PaymentStatus,

    /// Gateway integration name (e.g. "stripe")
    pub provider: String,

    /// Gateway-side identifier of the payment intent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider_reference: Option<String>,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,
}

impl Payment {
    /// Build a fresh `created` payment with a generated id.
    pub fn new(
        order: &Order,
        amount: Decimal,
        currency: Currency,
        provider: impl Into<String>,
        provider_reference: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            order_id: order.id.clone(),
            user_id: order.user_id.clone(),
            amount,
            currency,
            status: PaymentStatus::Created,
            provider: provider.into(),
            provider_reference: Some(provider_reference.into()),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_status(mut self, status: PaymentStatus) -> Self {
        self.status = status;
        self
    }

    pub fn belongs_to(&self, user_id: &str) -> bool {
        self.user_id == user_id
    }

    /// The stored reference, if present and non-empty.
    pub fn reference(&self) -> Option<&str> {
        self.provider_reference
            .as_deref()
            .filter(|reference| !reference.is_empty())
    }
}
