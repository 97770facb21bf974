//! # Payment Error Types
//!
//! Typed error handling for the payment orchestrator.
//! Every operation returns `Result<T, PaymentError>`: a stable [`ErrorCode`],
//! a human-readable message, and the lower-level cause when there is one.

use std::fmt;
use thiserror::Error;

/// Boxed lower-level cause carried by a [`PaymentError`].
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Stable classification of orchestrator failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    // Client input
    InvalidRequest,
    InvalidCurrency,
    MissingOrderId,
    MissingUserId,

    // Authorization / state
    Unauthorized,
    InvalidOrderStatus,
    InvalidStatus,
    InvalidAmount,
    InvalidPayment,
    PaymentExists,

    // Not found
    OrderNotFound,
    PaymentNotFound,

    // Infrastructure
    DatabaseError,
    TransactionError,
    CommitError,

    // Gateway
    GatewayError,
    WebhookError,

    /// The service was started without the configuration it needs.
    NotConfigured,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::InvalidRequest => "invalid_request",
            ErrorCode::InvalidCurrency => "invalid_currency",
            ErrorCode::MissingOrderId => "missing_order_id",
            ErrorCode::MissingUserId => "missing_user_id",
            ErrorCode::Unauthorized => "unauthorized",
            ErrorCode::InvalidOrderStatus => "invalid_order_status",
            ErrorCode::InvalidStatus => "invalid_status",
            ErrorCode::InvalidAmount => "invalid_amount",
            ErrorCode::InvalidPayment => "invalid_payment",
            ErrorCode::PaymentExists => "payment_exists",
            ErrorCode::OrderNotFound => "order_not_found",
            ErrorCode::PaymentNotFound => "payment_not_found",
            ErrorCode::DatabaseError => "database_error",
            ErrorCode::TransactionError => "transaction_error",
            ErrorCode::CommitError => "commit_error",
            ErrorCode::GatewayError => "gateway_error",
            ErrorCode::WebhookError => "webhook_error",
            ErrorCode::NotConfigured => "not_configured",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Core error type for all orchestrator operations
#[derive(Debug, Error)]
#[error("{message}")]
pub struct PaymentError {
    code: ErrorCode,
    message: String,
    #[source]
    source: Option<BoxError>,
}

impl PaymentError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            source: None,
        }
    }

    /// Attach the lower-level cause.
    pub fn with_source(mut self, source: impl Into<BoxError>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn code(&self) -> ErrorCode {
        self.code
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn cause(&self) -> Option<&(dyn std::error::Error + Send + Sync + 'static)> {
        self.source.as_deref()
    }

    /// Message followed by every cause in the chain, for logs only.
    pub fn detailed(&self) -> String {
        let mut out = format!("[{}] {}", self.code, self.message);
        let mut next: Option<&(dyn std::error::Error + 'static)> = std::error::Error::source(self);
        while let Some(err) = next {
            out.push_str(": ");
            out.push_str(&err.to_string());
            next = err.source();
        }
        out
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidRequest, message)
    }

    pub fn unauthorized() -> Self {
        Self::new(ErrorCode::Unauthorized, "payment does not belong to this user")
    }

    pub fn database(source: impl Into<BoxError>) -> Self {
        Self::new(ErrorCode::DatabaseError, "datastore operation failed").with_source(source)
    }

    pub fn gateway(source: impl Into<BoxError>) -> Self {
        Self::new(ErrorCode::GatewayError, "payment gateway request failed").with_source(source)
    }

    pub fn webhook(source: impl Into<BoxError>) -> Self {
        Self::new(ErrorCode::WebhookError, "webhook rejected").with_source(source)
    }
}

/// Result type alias for orchestrator operations
pub type PaymentResult<T> = Result<T, PaymentError>;
