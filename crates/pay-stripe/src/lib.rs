//! # pay-stripe
//!
//! Stripe payment gateway for the storefront payment orchestrator.
//!
//! - **StripeGateway** - Payment Intents and Refunds APIs
//!   - Form-encoded requests with a fresh idempotency key per POST
//!   - Stripe error bodies surfaced as provider errors
//! - **webhook** - `Stripe-Signature` verification (HMAC-SHA256, 5 minute tolerance)
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use pay_stripe::{StripeConfig, StripeGateway};
//! use pay_core::{PaymentOrchestrator, SharedGateway};
//! use std::sync::Arc;
//!
//! let gateway = StripeGateway::new(StripeConfig::from_env()?)?;
//! let orchestrator = PaymentOrchestrator::new(store, Arc::new(gateway) as SharedGateway);
//! ```

pub mod config;
pub mod gateway;
pub mod webhook;

// Re-exports
pub use config::{StripeConfig, StripeConfigError};
pub use gateway::StripeGateway;
pub use webhook::{signature_header, verify_signature};
