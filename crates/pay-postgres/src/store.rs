//! # PostgreSQL Store
//!
//! `PaymentStore` over a `sqlx::PgPool`. Reads inside a transaction take
//! `FOR UPDATE` row locks so a status check and the write that follows it
//! cannot interleave with another transaction on the same payment.

use crate::rows::{into_payments, OrderRow, PaymentRow, ORDER_COLUMNS, PAYMENT_COLUMNS};
use async_trait::async_trait;
use pay_core::{
    Order, OrderStatus, Payment, PaymentStatus, PaymentStore, StoreError, StoreResult,
    StoreTransaction,
};
use sqlx::postgres::{PgPoolOptions, Postgres};
use sqlx::{PgExecutor, PgPool, Transaction};
use std::time::Duration;
use tracing::{debug, info};

/// Map a driver error, turning unique violations into `Conflict`.
fn db_error(err: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(db) = &err {
        if db.is_unique_violation() {
            return StoreError::Conflict(db.message().to_string());
        }
    }
    StoreError::backend(err)
}

async fn fetch_order<'e>(
    executor: impl PgExecutor<'e>,
    order_id: &str,
) -> StoreResult<Option<Order>> {
    let sql = format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1");
    sqlx::query_as::<_, OrderRow>(&sql)
        .bind(order_id)
        .fetch_optional(executor)
        .await
        .map_err(db_error)?
        .map(Order::try_from)
        .transpose()
}

/// Single payment where `column = value`, optionally row-locked.
async fn fetch_payment<'e>(
    executor: impl PgExecutor<'e>,
    column: &'static str,
    value: &str,
    for_update: bool,
) -> StoreResult<Option<Payment>> {
    let lock = if for_update { " FOR UPDATE" } else { "" };
    let sql = format!("SELECT {PAYMENT_COLUMNS} FROM payments WHERE {column} = $1 LIMIT 1{lock}");
    sqlx::query_as::<_, PaymentRow>(&sql)
        .bind(value)
        .fetch_optional(executor)
        .await
        .map_err(db_error)?
        .map(Payment::try_from)
        .transpose()
}

/// PostgreSQL-backed payment store
#[derive(Debug, Clone)]
pub struct PgPaymentStore {
    pool: PgPool,
}

impl PgPaymentStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connect eagerly (fails if the database is unreachable).
    pub async fn connect(database_url: &str) -> StoreResult<Self> {
        let pool = Self::pool_options()
            .connect(database_url)
            .await
            .map_err(db_error)?;
        Ok(Self::new(pool))
    }

    /// Build a pool that connects on first use. Only the URL is validated here.
    pub fn connect_lazy(database_url: &str) -> StoreResult<Self> {
        let pool = Self::pool_options()
            .connect_lazy(database_url)
            .map_err(db_error)?;
        Ok(Self::new(pool))
    }

    fn pool_options() -> PgPoolOptions {
        PgPoolOptions::new()
            .max_connections(20)
            .acquire_timeout(Duration::from_secs(3))
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Run the embedded migrations.
    pub async fn migrate(&self) -> StoreResult<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(StoreError::backend)?;
        info!("Database migrations applied");
        Ok(())
    }

    /// Insert an order row. Orders normally come from order management; this
    /// exists for seeding and tests.
    pub async fn insert_order(&self, order: &Order) -> StoreResult<()> {
        sqlx::query(
            "INSERT INTO orders (id, user_id, total, status, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(&order.id)
        .bind(&order.user_id)
        .bind(&order.total)
        .bind(order.status.as_str())
        .bind(order.created_at)
        .bind(order.updated_at)
        .execute(&self.pool)
        .await
        .map_err(db_error)?;
        Ok(())
    }

    async fn list_payments(&self, filter: Option<(&'static str, &str)>) -> StoreResult<Vec<Payment>> {
        let rows = match filter {
            Some((column, value)) => {
                let sql = format!(
                    "SELECT {PAYMENT_COLUMNS} FROM payments WHERE {column} = $1 \
                     ORDER BY created_at DESC, id"
                );
                sqlx::query_as::<_, PaymentRow>(&sql)
                    .bind(value)
                    .fetch_all(&self.pool)
                    .await
            }
            None => {
                let sql = format!("SELECT {PAYMENT_COLUMNS} FROM payments ORDER BY created_at DESC, id");
                sqlx::query_as::<_, PaymentRow>(&sql)
                    .fetch_all(&self.pool)
                    .await
            }
        }
        .map_err(db_error)?;

        into_payments(rows)
    }
}

#[async_trait]
impl PaymentStore for PgPaymentStore {
    async fn order_by_id(&self, order_id: &str) -> StoreResult<Option<Order>> {
        fetch_order(&self.pool, order_id).await
    }

    async fn payment_by_order_id(&self, order_id: &str) -> StoreResult<Option<Payment>> {
        fetch_payment(&self.pool, "order_id", order_id, false).await
    }

    async fn payment_by_provider_reference(
        &self,
        reference: &str,
    ) -> StoreResult<Option<Payment>> {
        fetch_payment(&self.pool, "provider_reference", reference, false).await
    }

    async fn payments_by_user_id(&self, user_id: &str) -> StoreResult<Vec<Payment>> {
        self.list_payments(Some(("user_id", user_id))).await
    }

    async fn all_payments(&self) -> StoreResult<Vec<Payment>> {
        self.list_payments(None).await
    }

    async fn payments_by_status(&self, status: PaymentStatus) -> StoreResult<Vec<Payment>> {
        self.list_payments(Some(("status", status.as_str()))).await
    }

    async fn begin(&self) -> StoreResult<Box<dyn StoreTransaction>> {
        let tx = self.pool.begin().await.map_err(db_error)?;
        Ok(Box::new(PgTransaction { tx }))
    }
}

/// An open PostgreSQL transaction. Dropping it without `commit` rolls back.
pub struct PgTransaction {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl StoreTransaction for PgTransaction {
    async fn order_by_id(&mut self, order_id: &str) -> StoreResult<Option<Order>> {
        fetch_order(&mut *self.tx, order_id).await
    }

    async fn payment_by_order_id(&mut self, order_id: &str) -> StoreResult<Option<Payment>> {
        fetch_payment(&mut *self.tx, "order_id", order_id, true).await
    }

    async fn payment_by_provider_reference(
        &mut self,
        reference: &str,
    ) -> StoreResult<Option<Payment>> {
        fetch_payment(&mut *self.tx, "provider_reference", reference, true).await
    }

    async fn insert_payment(&mut self, payment: &Payment) -> StoreResult<()> {
        sqlx::query(
            "INSERT INTO payments (id, order_id, user_id, amount, currency, status, provider, \
             provider_reference, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)",
        )
        .bind(&payment.id)
        .bind(&payment.order_id)
        .bind(&payment.user_id)
        .bind(payment.amount)
        .bind(payment.currency.as_str())
        .bind(payment.status.as_str())
        .bind(&payment.provider)
        .bind(&payment.provider_reference)
        .bind(payment.created_at)
        .bind(payment.updated_at)
        .execute(&mut *self.tx)
        .await
        .map_err(db_error)?;

        debug!(payment_id = %payment.id, order_id = %payment.order_id, "Inserted payment");
        Ok(())
    }

    async fn update_payment_status(
        &mut self,
        payment_id: &str,
        status: PaymentStatus,
    ) -> StoreResult<u64> {
        let result = sqlx::query("UPDATE payments SET status = $2, updated_at = now() WHERE id = $1")
            .bind(payment_id)
            .bind(status.as_str())
            .execute(&mut *self.tx)
            .await
            .map_err(db_error)?;
        Ok(result.rows_affected())
    }

    async fn update_payment_status_by_reference(
        &mut self,
        reference: &str,
        status: PaymentStatus,
    ) -> StoreResult<u64> {
        let result = sqlx::query(
            "UPDATE payments SET status = $2, updated_at = now() WHERE provider_reference = $1",
        )
        .bind(reference)
        .bind(status.as_str())
        .execute(&mut *self.tx)
        .await
        .map_err(db_error)?;
        Ok(result.rows_affected())
    }

    async fn update_order_status(
        &mut self,
        order_id: &str,
        status: OrderStatus,
    ) -> StoreResult<u64> {
        let result = sqlx::query("UPDATE orders SET status = $2, updated_at = now() WHERE id = $1")
            .bind(order_id)
            .bind(status.as_str())
            .execute(&mut *self.tx)
            .await
            .map_err(db_error)?;
        Ok(result.rows_affected())
    }

    async fn commit(self: Box<Self>) -> StoreResult<()> {
        self.tx.commit().await.map_err(db_error)
    }

    async fn rollback(self: Box<Self>) -> StoreResult<()> {
        self.tx.rollback().await.map_err(db_error)
    }
}
