//! # pay-postgres
//!
//! PostgreSQL implementation of the `pay-core` store contract.
//!
//! ```rust,ignore
//! use pay_postgres::PgPaymentStore;
//!
//! let store = PgPaymentStore::connect(&database_url).await?;
//! store.migrate().await?;
//! ```
//!
//! Schema lives in `migrations/`: `orders`, and `payments` with a unique
//! `order_id` (one payment per order) and an index on `provider_reference`
//! for webhook lookups.

mod rows;
pub mod store;

pub use store::{PgPaymentStore, PgTransaction};
