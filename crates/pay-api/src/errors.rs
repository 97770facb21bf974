//! # Error Policy
//!
//! Table-driven mapping from orchestrator [`ErrorCode`]s to HTTP responses.
//! Each code gets a status class and decides whether the caller sees the
//! error's own message or a fixed generic one. Raw datastore and gateway
//! causes never reach the response body; they are logged by the service.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use pay_core::{ErrorCode, PaymentError};
use serde::Serialize;
use thiserror::Error;

/// Coarse response class for an error code
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusClass {
    BadRequest,
    Forbidden,
    NotFound,
    Internal,
}

/// What the caller is told
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Exposure {
    /// The error's own message
    Message,
    /// A fixed message; the real one stays in the logs
    Generic(&'static str),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ErrorPolicy {
    pub class: StatusClass,
    pub status: StatusCode,
    pub expose: Exposure,
}

const fn policy(class: StatusClass, status: StatusCode, expose: Exposure) -> ErrorPolicy {
    ErrorPolicy {
        class,
        status,
        expose,
    }
}

const BAD_REQUEST: ErrorPolicy =
    policy(StatusClass::BadRequest, StatusCode::BAD_REQUEST, Exposure::Message);
const FORBIDDEN: ErrorPolicy =
    policy(StatusClass::Forbidden, StatusCode::FORBIDDEN, Exposure::Message);
const NOT_FOUND: ErrorPolicy = policy(
    StatusClass::NotFound,
    StatusCode::NOT_FOUND,
    Exposure::Generic("not found"),
);
const STORAGE: ErrorPolicy = policy(
    StatusClass::Internal,
    StatusCode::INTERNAL_SERVER_ERROR,
    Exposure::Generic("please try again later"),
);
const GATEWAY: ErrorPolicy = policy(
    StatusClass::Internal,
    StatusCode::BAD_GATEWAY,
    Exposure::Generic("payment service error"),
);
const UNAVAILABLE: ErrorPolicy = policy(
    StatusClass::Internal,
    StatusCode::SERVICE_UNAVAILABLE,
    Exposure::Generic("payment service unavailable"),
);

/// Fallback for anything the table does not list
pub const DEFAULT_POLICY: ErrorPolicy = policy(
    StatusClass::Internal,
    StatusCode::INTERNAL_SERVER_ERROR,
    Exposure::Generic("internal error"),
);

static POLICIES: &[(ErrorCode, ErrorPolicy)] = &[
    (ErrorCode::InvalidRequest, BAD_REQUEST),
    (ErrorCode::InvalidCurrency, BAD_REQUEST),
    (ErrorCode::MissingOrderId, BAD_REQUEST),
    (ErrorCode::MissingUserId, BAD_REQUEST),
    (ErrorCode::InvalidOrderStatus, BAD_REQUEST),
    (ErrorCode::InvalidStatus, BAD_REQUEST),
    (ErrorCode::InvalidAmount, BAD_REQUEST),
    (ErrorCode::InvalidPayment, BAD_REQUEST),
    (ErrorCode::PaymentExists, BAD_REQUEST),
    (ErrorCode::Unauthorized, FORBIDDEN),
    (ErrorCode::OrderNotFound, NOT_FOUND),
    (ErrorCode::PaymentNotFound, NOT_FOUND),
    (ErrorCode::DatabaseError, STORAGE),
    (ErrorCode::TransactionError, STORAGE),
    (ErrorCode::CommitError, STORAGE),
    (ErrorCode::GatewayError, GATEWAY),
    (ErrorCode::WebhookError, GATEWAY),
    (ErrorCode::NotConfigured, UNAVAILABLE),
];

/// Look up the table entry for `code`, if there is one.
pub fn lookup_policy(code: ErrorCode) -> Option<ErrorPolicy> {
    POLICIES
        .iter()
        .find(|(candidate, _)| *candidate == code)
        .map(|(_, policy)| *policy)
}

/// Policy for `code`, falling back to [`DEFAULT_POLICY`].
pub fn error_policy(code: ErrorCode) -> ErrorPolicy {
    lookup_policy(code).unwrap_or(DEFAULT_POLICY)
}

/// Error response body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error_code: &'static str,
    pub message: String,
}

/// Newtype so a [`PaymentError`] can be returned from handlers
#[derive(Debug, Error)]
#[error(transparent)]
pub struct ApiError(#[from] pub PaymentError);

impl ApiError {
    pub fn code(&self) -> ErrorCode {
        self.0.code()
    }

    fn body(&self) -> (StatusCode, ErrorResponse) {
        let code = self.0.code();
        let Some(policy) = lookup_policy(code) else {
            return (
                DEFAULT_POLICY.status,
                ErrorResponse {
                    error_code: "internal_error",
                    message: "internal error".to_string(),
                },
            );
        };

        let message = match policy.expose {
            Exposure::Message => self.0.message().to_string(),
            Exposure::Generic(text) => text.to_string(),
        };
        (
            policy.status,
            ErrorResponse {
                error_code: code.as_str(),
                message,
            },
        )
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = self.body();
        (status, Json(body)).into_response()
    }
}
