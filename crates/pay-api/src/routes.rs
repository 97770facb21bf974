//! # Routes
//!
//! Axum router configuration for the payment API.

use crate::handlers;
use crate::state::AppState;
use axum::{
    http::{header, HeaderName, Method},
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

/// Create the main application router
///
/// Routes:
/// - `GET  /health`
/// - `POST /api/v1/payments` - start a payment for an order
/// - `GET  /api/v1/payments?status=` - the caller's payments
/// - `POST /api/v1/payments/{order_id}/confirm`
/// - `POST /api/v1/payments/{order_id}/refund`
/// - `POST /webhook/stripe` - Stripe webhook handler
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([
            header::CONTENT_TYPE,
            HeaderName::from_static(handlers::USER_ID_HEADER),
        ]);

    let payment_routes = Router::new()
        .route(
            "/payments",
            post(handlers::create_payment).get(handlers::list_payments),
        )
        .route("/payments/{order_id}/confirm", post(handlers::confirm_payment))
        .route("/payments/{order_id}/refund", post(handlers::refund_payment));

    // Raw body; signature is checked over the exact bytes
    let webhook_routes = Router::new().route("/stripe", post(handlers::stripe_webhook));

    Router::new()
        .route("/health", get(handlers::health))
        .route("/", get(handlers::health))
        .nest("/api/v1", payment_routes.layer(cors))
        .nest("/webhook", webhook_routes)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
