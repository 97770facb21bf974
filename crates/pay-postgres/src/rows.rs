//! Row types and their conversion into domain records.
//!
//! Statuses and currencies are stored as text; a value that no longer parses
//! surfaces as `StoreError::Corrupt` instead of being silently defaulted.

use chrono::{DateTime, Utc};
use pay_core::{Currency, Order, OrderStatus, Payment, PaymentStatus, StoreError};
use rust_decimal::Decimal;

pub(crate) const ORDER_COLUMNS: &str = "id, user_id, total, status, created_at, updated_at";

pub(crate) const PAYMENT_COLUMNS: &str = "id, order_id, user_id, amount, currency, status, \
     provider, provider_reference, created_at, updated_at";

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct OrderRow {
    pub id: String,
    pub user_id: String,
    pub total: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<OrderRow> for Order {
    type Error = StoreError;

    fn try_from(row: OrderRow) -> Result<Self, Self::Error> {
        let status = OrderStatus::try_from(row.status.as_str())
            .map_err(|e| StoreError::Corrupt(format!("order {}: {}", row.id, e)))?;

        Ok(Order {
            id: row.id,
            user_id: row.user_id,
            total: row.total,
            status,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct PaymentRow {
    pub id: String,
    pub order_id: String,
    pub user_id: String,
    pub amount: Decimal,
    pub currency: String,
    pub status: String,
    pub provider: String,
    pub provider_reference: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<PaymentRow> for Payment {
    type Error = StoreError;

    fn try_from(row: PaymentRow) -> Result<Self, Self::Error> {
        let status = PaymentStatus::try_from(row.status.as_str())
            .map_err(|e| StoreError::Corrupt(format!("payment {}: {}", row.id, e)))?;
        let currency: Currency = row
            .currency
            .parse()
            .map_err(|e| StoreError::Corrupt(format!("payment {}: {}", row.id, e)))?;

        Ok(Payment {
            id: row.id,
            order_id: row.order_id,
            user_id: row.user_id,
            amount: row.amount,
            currency,
            status,
            provider: row.provider,
            provider_reference: row.provider_reference,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

pub(crate) fn into_payments(rows: Vec<PaymentRow>) -> Result<Vec<Payment>, StoreError> {
    rows.into_iter().map(Payment::try_from).collect()
}
