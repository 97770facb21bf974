//! # Status State Machine
//!
//! Closed status enums for orders and payments, plus the tables that map
//! gateway-side intent statuses and webhook events onto them.
//!
//! ```text
//!  created ──▶ pending ──▶ succeeded ──▶ refunded
//!     │           │
//!     └───────────┴──▶ failed | cancelled
//! ```
//!
//! Only `succeeded` and `refunded` payments move the order; a failed or
//! cancelled attempt leaves the order open for another attempt.

use crate::gateway::{IntentStatus, WebhookEventKind};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Status of a local payment record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Created,
    Pending,
    Succeeded,
    Failed,
    Cancelled,
    Refunded,
}

impl PaymentStatus {
    pub const ALL: [PaymentStatus; 6] = [
        PaymentStatus::Created,
        PaymentStatus::Pending,
        PaymentStatus::Succeeded,
        PaymentStatus::Failed,
        PaymentStatus::Cancelled,
        PaymentStatus::Refunded,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Created => "created",
            PaymentStatus::Pending => "pending",
            PaymentStatus::Succeeded => "succeeded",
            PaymentStatus::Failed => "failed",
            PaymentStatus::Cancelled => "cancelled",
            PaymentStatus::Refunded => "refunded",
        }
    }

    /// Whether a payment currently in `self` may be moved to `next`.
    ///
    /// Refunded is absorbing and a succeeded payment can only be refunded, so
    /// a late or replayed notification never drags a settled payment back.
    /// Re-applying the current status is always accepted.
    pub fn accepts(&self, next: PaymentStatus) -> bool {
        match self {
            PaymentStatus::Refunded => next == PaymentStatus::Refunded,
            PaymentStatus::Succeeded => {
                matches!(next, PaymentStatus::Succeeded | PaymentStatus::Refunded)
            }
            _ => true,
        }
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for PaymentStatus {
    type Error = UnknownStatus;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        PaymentStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| UnknownStatus(s.to_string()))
    }
}

/// Status of an order, as far as payments are concerned
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    Paid,
    Cancelled,
    Refunded,
}

impl OrderStatus {
    pub const ALL: [OrderStatus; 4] = [
        OrderStatus::Pending,
        OrderStatus::Paid,
        OrderStatus::Cancelled,
        OrderStatus::Refunded,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Paid => "paid",
            OrderStatus::Cancelled => "cancelled",
            OrderStatus::Refunded => "refunded",
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for OrderStatus {
    type Error = UnknownStatus;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        OrderStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| UnknownStatus(s.to_string()))
    }
}

/// A status string read from storage that matches no known variant.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown status: {0}")]
pub struct UnknownStatus(pub String);

/// Map a gateway intent status onto the local payment status.
pub fn payment_status_for_intent(status: &IntentStatus) -> PaymentStatus {
    match status {
        IntentStatus::Succeeded => PaymentStatus::Succeeded,
        IntentStatus::Canceled => PaymentStatus::Cancelled,
        IntentStatus::RequiresPaymentMethod
        | IntentStatus::RequiresConfirmation
        | IntentStatus::RequiresAction
        | IntentStatus::RequiresCapture
        | IntentStatus::Processing => PaymentStatus::Pending,
        IntentStatus::Unknown(_) => PaymentStatus::Failed,
    }
}

/// Payment status a webhook event drives, or `None` for events we ignore.
pub fn payment_status_for_event(kind: &WebhookEventKind) -> Option<PaymentStatus> {
    match kind {
        WebhookEventKind::PaymentIntentSucceeded => Some(PaymentStatus::Succeeded),
        WebhookEventKind::PaymentIntentFailed => Some(PaymentStatus::Failed),
        WebhookEventKind::PaymentIntentCanceled => Some(PaymentStatus::Cancelled),
        WebhookEventKind::ChargeRefunded => Some(PaymentStatus::Refunded),
        WebhookEventKind::Other(_) => None,
    }
}

/// Order status that follows a payment status. Everything outside this
/// sub-map leaves the order untouched.
pub fn order_status_for(status: PaymentStatus) -> Option<OrderStatus> {
    match status {
        PaymentStatus::Succeeded => Some(OrderStatus::Paid),
        PaymentStatus::Refunded => Some(OrderStatus::Refunded),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_intent_status_mapping() {
        assert_eq!(
            payment_status_for_intent(&IntentStatus::Succeeded),
            PaymentStatus::Succeeded
        );
        assert_eq!(
            payment_status_for_intent(&IntentStatus::Canceled),
            PaymentStatus::Cancelled
        );
        for pending in [
            IntentStatus::RequiresPaymentMethod,
            IntentStatus::RequiresConfirmation,
            IntentStatus::RequiresAction,
            IntentStatus::RequiresCapture,
            IntentStatus::Processing,
        ] {
            assert_eq!(payment_status_for_intent(&pending), PaymentStatus::Pending);
        }
        assert_eq!(
            payment_status_for_intent(&IntentStatus::Unknown("on_hold".into())),
            PaymentStatus::Failed
        );
    }

    #[test]
    fn test_order_sub_map() {
        assert_eq!(order_status_for(PaymentStatus::Succeeded), Some(OrderStatus::Paid));
        assert_eq!(order_status_for(PaymentStatus::Refunded), Some(OrderStatus::Refunded));
        assert_eq!(order_status_for(PaymentStatus::Failed), None);
        assert_eq!(order_status_for(PaymentStatus::Cancelled), None);
        assert_eq!(order_status_for(PaymentStatus::Pending), None);
        assert_eq!(order_status_for(PaymentStatus::Created), None);
    }

    #[test]
    fn test_event_mapping() {
        assert_eq!(
            payment_status_for_event(&WebhookEventKind::ChargeRefunded),
            Some(PaymentStatus::Refunded)
        );
        assert_eq!(
            payment_status_for_event(&WebhookEventKind::Other("customer.created".into())),
            None
        );
    }

    #[test]
    fn test_guard() {
        assert!(PaymentStatus::Created.accepts(PaymentStatus::Succeeded));
        assert!(PaymentStatus::Failed.accepts(PaymentStatus::Succeeded));
        assert!(PaymentStatus::Succeeded.accepts(PaymentStatus::Refunded));
        assert!(!PaymentStatus::Succeeded.accepts(PaymentStatus::Failed));
        assert!(!PaymentStatus::Refunded.accepts(PaymentStatus::Succeeded));
        assert!(PaymentStatus::Refunded.accepts(PaymentStatus::Refunded));
    }

    #[test]
    fn test_status_strings() {
        assert_eq!(PaymentStatus::try_from("cancelled"), Ok(PaymentStatus::Cancelled));
        assert_eq!(OrderStatus::try_from("paid"), Ok(OrderStatus::Paid));
        assert!(PaymentStatus::try_from("canceled").is_err());
    }
}
