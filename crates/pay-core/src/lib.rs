//! # pay-core
//!
//! Core types and traits for the storefront payment orchestrator.
//!
//! This crate provides:
//! - `Currency` and minor-unit conversion for gateway amounts
//! - `Order`, `Payment` and their closed status enums
//! - `PaymentStore` / `StoreTransaction` for persistence, plus `InMemoryStore`
//! - `PaymentGateway` for the external payment provider
//! - `PaymentOrchestrator`, which keeps orders, payments and the gateway in step
//! - `PaymentError` for typed error handling
//!
//! ## Example
//!
//! ```rust,ignore
//! use pay_core::{CreatePaymentRequest, InMemoryStore, PaymentOperations, PaymentOrchestrator};
//! use std::sync::Arc;
//!
//! let orchestrator = PaymentOrchestrator::new(Arc::new(InMemoryStore::new()), gateway);
//!
//! // Create an intent for a pending order
//! let created = orchestrator
//!     .create_payment(CreatePaymentRequest::new("order-1", "user-1", "USD"))
//!     .await?;
//!
//! // Hand created.client_secret to the browser, then later:
//! let status = orchestrator.confirm_payment("order-1", "user-1").await?;
//! ```

pub mod error;
pub mod gateway;
pub mod memory;
pub mod money;
pub mod orchestrator;
pub mod order;
pub mod status;
pub mod store;

// Re-exports for convenience
pub use error::{BoxError, ErrorCode, PaymentError, PaymentResult};
pub use gateway::{
    CreatedIntent, GatewayError, GatewayIntent, GatewayRefund, GatewayResult, IntentRequest,
    IntentStatus, PaymentGateway, SharedGateway, WebhookEvent, WebhookEventKind,
};
pub use memory::InMemoryStore;
pub use money::{decimal_to_minor_units, is_supported_currency, parse_amount, to_minor_units, Currency};
pub use orchestrator::{
    CreatePaymentRequest, CreatedPayment, PaymentFilter, PaymentOperations, PaymentOrchestrator,
    SharedOperations, WebhookOutcome,
};
pub use order::{Order, Payment};
pub use status::{OrderStatus, PaymentStatus, UnknownStatus};
pub use store::{PaymentStore, SharedStore, StoreError, StoreResult, StoreTransaction};
