//! # Request Handlers
//!
//! Axum request handlers for the payment API. The caller is identified by
//! the `x-user-id` header set by the upstream auth layer.

use crate::errors::ApiError;
use crate::state::AppState;
use axum::{
    body::Bytes,
    extract::{FromRequestParts, Path, Query, State},
    http::{request::Parts, HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use pay_core::{
    CreatePaymentRequest, CreatedPayment, ErrorCode, Payment, PaymentError, PaymentFilter,
    PaymentStatus, WebhookOutcome,
};
use serde::{Deserialize, Serialize};
use tracing::instrument;

pub const USER_ID_HEADER: &str = "x-user-id";
pub const SIGNATURE_HEADER: &str = "stripe-signature";

type ApiResult<T> = Result<T, ApiError>;

// =============================================================================
// Request/Response Types
// =============================================================================

/// Authenticated caller, from the `x-user-id` header
#[derive(Debug, Clone)]
pub struct CallerId(pub String);

impl<S: Send + Sync> FromRequestParts<S> for CallerId {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .headers
            .get(USER_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(|v| CallerId(v.to_string()))
            .ok_or_else(|| {
                ApiError(PaymentError::new(
                    ErrorCode::MissingUserId,
                    "x-user-id header is required",
                ))
            })
    }
}

/// Create payment request body
#[derive(Debug, Deserialize)]
pub struct CreatePaymentBody {
    #[serde(default)]
    pub order_id: String,
    #[serde(default)]
    pub currency: String,
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub status: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub status: PaymentStatus,
}

#[derive(Debug, Serialize)]
pub struct PaymentList {
    pub payments: Vec<Payment>,
    pub count: usize,
}

/// Acknowledgement sent back to the gateway. The outcome is nested because
/// its own variants carry a `status` field.
#[derive(Debug, Serialize)]
pub struct WebhookAck {
    pub status: &'static str,
    pub event: WebhookOutcome,
}

// =============================================================================
// Handlers
// =============================================================================

/// Health check endpoint
pub async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "storefront-payments",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// Start a payment for one of the caller's orders
#[instrument(skip(state, body), fields(order_id = %body.order_id))]
pub async fn create_payment(
    State(state): State<AppState>,
    CallerId(user_id): CallerId,
    Json(body): Json<CreatePaymentBody>,
) -> ApiResult<(StatusCode, Json<CreatedPayment>)> {
    let request = CreatePaymentRequest::new(body.order_id, user_id, body.currency);
    let created = state.payments.create_payment(request).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// Sync the payment with the gateway's view of its intent
#[instrument(skip(state))]
pub async fn confirm_payment(
    State(state): State<AppState>,
    CallerId(user_id): CallerId,
    Path(order_id): Path<String>,
) -> ApiResult<Json<StatusResponse>> {
    let status = state.payments.confirm_payment(&order_id, &user_id).await?;
    Ok(Json(StatusResponse { status }))
}

#[instrument(skip(state))]
pub async fn refund_payment(
    State(state): State<AppState>,
    CallerId(user_id): CallerId,
    Path(order_id): Path<String>,
) -> ApiResult<Json<StatusResponse>> {
    state.payments.refund_payment(&order_id, &user_id).await?;
    Ok(Json(StatusResponse {
        status: PaymentStatus::Refunded,
    }))
}

/// The caller's payments, newest first, optionally filtered by `?status=`
#[instrument(skip(state))]
pub async fn list_payments(
    State(state): State<AppState>,
    CallerId(user_id): CallerId,
    Query(query): Query<ListQuery>,
) -> ApiResult<Json<PaymentList>> {
    let mut filter = PaymentFilter::for_user(user_id);
    if let Some(status) = query.status.as_deref().filter(|s| !s.is_empty()) {
        let status = PaymentStatus::try_from(status)
            .map_err(|e| PaymentError::invalid_request(e.to_string()))?;
        filter = filter.with_status(status);
    }

    let payments = state.payments.list_payments(&filter).await?;
    Ok(Json(PaymentList {
        count: payments.len(),
        payments,
    }))
}

/// Handle Stripe webhook
#[instrument(skip(state, headers, body), fields(bytes = body.len()))]
pub async fn stripe_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<Json<WebhookAck>> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();

    let outcome = state.payments.handle_webhook(&body, signature).await?;
    Ok(Json(WebhookAck {
        status: "received",
        event: outcome,
    }))
}
