mod common;

use common::*;
use pay_core::{ErrorCode, OrderStatus, PaymentOperations, PaymentStatus, WebhookOutcome};
use std::sync::atomic::Ordering;

const SECRET: &str = "whsec_test";

// ── 1. succeeded_event_settles_payment_and_order ───────────────────────────

#[tokio::test]
async fn succeeded_event_settles_payment_and_order() {
    let h = Harness::new();
    h.seed_payment("order-1", "user-1", "pi_1", PaymentStatus::Pending)
        .await;

    let outcome = h
        .orchestrator
        .handle_webhook(
            &intent_event("payment_intent.succeeded", "pi_1"),
            VALID_SIGNATURE,
            SECRET,
        )
        .await
        .unwrap();

    assert_eq!(
        outcome,
        WebhookOutcome::Applied {
            reference: "pi_1".into(),
            status: PaymentStatus::Succeeded
        }
    );
    assert_eq!(h.payment_status("order-1").await, PaymentStatus::Succeeded);
    assert_eq!(h.order_status("order-1").await, OrderStatus::Paid);
}

// ── 2. replayed_event_is_idempotent ────────────────────────────────────────

#[tokio::test]
async fn replayed_event_is_idempotent() {
    let h = Harness::new();
    h.seed_payment("order-1", "user-1", "pi_1", PaymentStatus::Pending)
        .await;
    let payload = intent_event("payment_intent.succeeded", "pi_1");

    h.orchestrator
        .handle_webhook(&payload, VALID_SIGNATURE, SECRET)
        .await
        .unwrap();
    let after_first = (h.payment_status("order-1").await, h.order_status("order-1").await);

    h.orchestrator
        .handle_webhook(&payload, VALID_SIGNATURE, SECRET)
        .await
        .unwrap();
    let after_second = (h.payment_status("order-1").await, h.order_status("order-1").await);

    assert_eq!(after_first, after_second);
    assert_eq!(after_second, (PaymentStatus::Succeeded, OrderStatus::Paid));
}

// ── 3. bad_signature_touches_nothing ───────────────────────────────────────

#[tokio::test]
async fn bad_signature_touches_nothing() {
    let h = Harness::new();
    h.seed_payment("order-1", "user-1", "pi_1", PaymentStatus::Pending)
        .await;
    let payload = intent_event("payment_intent.succeeded", "pi_1");

    for signature in ["", "t=1,v1=forged"] {
        let err = h
            .orchestrator
            .handle_webhook(&payload, signature, SECRET)
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::WebhookError);
    }

    assert_eq!(h.store.counters.begins(), 0);
    assert_eq!(h.store.counters.writes(), 0);
    assert_eq!(h.payment_status("order-1").await, PaymentStatus::Pending);
}

// ── 4. failure_and_cancel_events_leave_order_alone ─────────────────────────

#[tokio::test]
async fn failure_and_cancel_events_leave_order_alone() {
    for (event_type, expected) in [
        ("payment_intent.payment_failed", PaymentStatus::Failed),
        ("payment_intent.canceled", PaymentStatus::Cancelled),
    ] {
        let h = Harness::new();
        h.seed_payment("order-1", "user-1", "pi_1", PaymentStatus::Pending)
            .await;

        let outcome = h
            .orchestrator
            .handle_webhook(&intent_event(event_type, "pi_1"), VALID_SIGNATURE, SECRET)
            .await
            .unwrap();

        assert_eq!(
            outcome,
            WebhookOutcome::Applied {
                reference: "pi_1".into(),
                status: expected
            }
        );
        assert_eq!(h.payment_status("order-1").await, expected);
        assert_eq!(h.order_status("order-1").await, OrderStatus::Pending);
    }
}

// ── 5. charge_refunded_sets_refunded ───────────────────────────────────────

#[tokio::test]
async fn charge_refunded_sets_refunded() {
    let h = Harness::new();
    h.seed_payment("order-1", "user-1", "pi_1", PaymentStatus::Succeeded)
        .await;

    let outcome = h
        .orchestrator
        .handle_webhook(&refund_event("pi_1"), VALID_SIGNATURE, SECRET)
        .await
        .unwrap();

    assert_eq!(
        outcome,
        WebhookOutcome::Applied {
            reference: "pi_1".into(),
            status: PaymentStatus::Refunded
        }
    );
    assert_eq!(h.payment_status("order-1").await, PaymentStatus::Refunded);
    assert_eq!(h.order_status("order-1").await, OrderStatus::Pending);
}

// ── 6. late_failure_does_not_regress_success ───────────────────────────────

#[tokio::test]
async fn late_failure_does_not_regress_success() {
    let h = Harness::new();
    h.seed_payment("order-1", "user-1", "pi_1", PaymentStatus::Succeeded)
        .await;

    let outcome = h
        .orchestrator
        .handle_webhook(
            &intent_event("payment_intent.payment_failed", "pi_1"),
            VALID_SIGNATURE,
            SECRET,
        )
        .await
        .unwrap();

    assert_eq!(
        outcome,
        WebhookOutcome::Unchanged {
            reference: "pi_1".into(),
            status: PaymentStatus::Succeeded
        }
    );
    assert_eq!(h.store.counters.writes(), 0);
    assert_eq!(h.payment_status("order-1").await, PaymentStatus::Succeeded);
}

// ── 7. unknown_reference ───────────────────────────────────────────────────

#[tokio::test]
async fn succeeded_for_unknown_reference_is_not_found() {
    let h = Harness::new();

    let err = h
        .orchestrator
        .handle_webhook(
            &intent_event("payment_intent.succeeded", "pi_ghost"),
            VALID_SIGNATURE,
            SECRET,
        )
        .await
        .unwrap_err();

    assert_eq!(err.code(), ErrorCode::PaymentNotFound);
    assert_eq!(h.store.counters.commits(), 0);
}

#[tokio::test]
async fn failed_for_unknown_reference_is_unmatched() {
    let h = Harness::new();

    let outcome = h
        .orchestrator
        .handle_webhook(
            &intent_event("payment_intent.payment_failed", "pi_ghost"),
            VALID_SIGNATURE,
            SECRET,
        )
        .await
        .unwrap();

    assert_eq!(
        outcome,
        WebhookOutcome::Unmatched {
            reference: "pi_ghost".into()
        }
    );
    assert_eq!(h.store.counters.writes(), 0);
    assert_eq!(h.store.counters.commits(), 1);
}

// ── 8. unrelated_event_is_ignored_but_committed ────────────────────────────

#[tokio::test]
async fn unrelated_event_is_ignored_but_committed() {
    let h = Harness::new();

    let outcome = h
        .orchestrator
        .handle_webhook(
            &intent_event("customer.created", "cus_1"),
            VALID_SIGNATURE,
            SECRET,
        )
        .await
        .unwrap();

    assert_eq!(
        outcome,
        WebhookOutcome::Ignored {
            event_type: "customer.created".into()
        }
    );
    assert_eq!(h.store.counters.begins(), 1);
    assert_eq!(h.store.counters.commits(), 1);
    assert_eq!(h.store.counters.writes(), 0);
}

// ── 9. malformed_object_is_webhook_error ───────────────────────────────────

#[tokio::test]
async fn malformed_object_is_webhook_error() {
    let h = Harness::new();
    let payload = serde_json::json!({
        "id": "evt_bad",
        "type": "payment_intent.succeeded",
        "data": { "object": { "object": "payment_intent" } }
    })
    .to_string();

    let err = h
        .orchestrator
        .handle_webhook(payload.as_bytes(), VALID_SIGNATURE, SECRET)
        .await
        .unwrap_err();

    assert_eq!(err.code(), ErrorCode::WebhookError);
    assert_eq!(h.store.counters.commits(), 0);
}

// ── 10. transaction_failures ───────────────────────────────────────────────

#[tokio::test]
async fn begin_failure_is_transaction_error() {
    let h = Harness::new();
    h.store.faults.begin.store(true, Ordering::SeqCst);

    let err = h
        .orchestrator
        .handle_webhook(
            &intent_event("payment_intent.succeeded", "pi_1"),
            VALID_SIGNATURE,
            SECRET,
        )
        .await
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::TransactionError);
}

#[tokio::test]
async fn order_update_failure_rolls_back_webhook() {
    let h = Harness::new();
    h.seed_payment("order-1", "user-1", "pi_1", PaymentStatus::Pending)
        .await;
    h.store.faults.order_update.store(true, Ordering::SeqCst);

    let err = h
        .orchestrator
        .handle_webhook(
            &intent_event("payment_intent.succeeded", "pi_1"),
            VALID_SIGNATURE,
            SECRET,
        )
        .await
        .unwrap_err();

    assert_eq!(err.code(), ErrorCode::DatabaseError);
    assert_eq!(h.payment_status("order-1").await, PaymentStatus::Pending);
    assert_eq!(h.order_status("order-1").await, OrderStatus::Pending);
}
