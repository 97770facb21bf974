//! # pay-api
//!
//! HTTP API layer for storefront payments.
//!
//! This crate provides:
//! - Axum-based HTTP server
//! - REST endpoints for creating, confirming, refunding and listing payments
//! - The Stripe webhook endpoint
//! - The error policy that decides what a failed request tells the caller
//!
//! ## Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | GET | `/health` | Health check |
//! | POST | `/api/v1/payments` | Create payment |
//! | GET | `/api/v1/payments` | List the caller's payments |
//! | POST | `/api/v1/payments/{order_id}/confirm` | Confirm payment |
//! | POST | `/api/v1/payments/{order_id}/refund` | Refund payment |
//! | POST | `/webhook/stripe` | Stripe webhook |

pub mod errors;
pub mod handlers;
pub mod routes;
pub mod service;
pub mod state;

pub use errors::{error_policy, ApiError, ErrorPolicy, StatusClass};
pub use routes::create_router;
pub use service::{PaymentService, PaymentServiceAccessor, ServiceConfig, UnconfiguredPayments};
pub use state::{AppConfig, AppState};
