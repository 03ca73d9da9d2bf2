use super::*;
use crate::gateway::{GatewayError, IntentStatus};
use shared::order::{CancelRequest, ConfirmOutcome, ConfirmPaymentRequest};

fn reason(text: &str) -> CancelRequest {
    CancelRequest {
        reason: Some(text.to_string()),
    }
}

/// Place an online order and complete its payment
async fn place_paid(h: &Harness, items: Vec<OrderItemInput>) -> String {
    let order_id = place_online(h, items).await.order_id;
    let intent_id = intent_of(h, &order_id).await;
    h.gateway.set_status(&intent_id, IntentStatus::Succeeded);
    let resp = h
        .engine
        .confirm_payment(
            &customer(),
            ConfirmPaymentRequest {
                order_id: order_id.clone(),
                payment_intent_id: intent_id,
            },
        )
        .await
        .unwrap();
    assert_eq!(resp.status, ConfirmOutcome::Confirmed);
    order_id
}

// ========================================================================
// Who may cancel
// ========================================================================

#[tokio::test]
async fn test_owner_cancel_restores_stock() {
    let mut h = harness().await;
    let order_id = place_cod(&h, vec![item(THALI, 2), item(BIRYANI, 1)]).await.order_id;
    assert_eq!(h.store.stock_of(THALI), Some(8));
    assert_eq!(h.store.stock_of(BIRYANI), Some(0));

    let order = h
        .engine
        .cancel_order(&customer(), &order_id, reason("Missed the train"))
        .await
        .unwrap();

    assert_eq!(order.status, OrderStatus::Cancelled);
    assert_eq!(order.cancellation_reason.as_deref(), Some("Missed the train"));
    assert_eq!(order.status_history.last().unwrap().by, "u-1");
    assert_eq!(h.store.stock_of(THALI), Some(10));
    assert_eq!(h.store.stock_of(BIRYANI), Some(1));

    wait_for_event(&mut h.events, OrderEventKind::Cancelled, &order_id).await;
}

#[tokio::test]
async fn test_default_reason() {
    let h = harness().await;
    let order_id = place_cod(&h, vec![item(CHAI, 1)]).await.order_id;
    let order = h
        .engine
        .cancel_order(&customer(), &order_id, CancelRequest::default())
        .await
        .unwrap();
    assert_eq!(
        order.cancellation_reason.as_deref(),
        Some("Cancelled by customer")
    );
}

#[tokio::test]
async fn test_other_user_cannot_cancel() {
    let h = harness().await;
    let order_id = place_cod(&h, vec![item(THALI, 1)]).await.order_id;

    let err = h
        .engine
        .cancel_order(&other_customer(), &order_id, CancelRequest::default())
        .await
        .unwrap_err();
    assert!(matches!(err, OrderError::PermissionDenied(_)));
    assert_eq!(order_of(&h, &order_id).await.status, OrderStatus::Confirmed);
    assert_eq!(h.store.stock_of(THALI), Some(9));
}

#[tokio::test]
async fn test_kitchen_cannot_use_customer_cancel() {
    let h = harness().await;
    let order_id = place_cod(&h, vec![item(THALI, 1)]).await.order_id;
    let err = h
        .engine
        .cancel_order(&kitchen(), &order_id, CancelRequest::default())
        .await
        .unwrap_err();
    assert!(matches!(err, OrderError::PermissionDenied(_)));
}

#[tokio::test]
async fn test_admin_can_cancel() {
    let h = harness().await;
    let order_id = place_cod(&h, vec![item(THALI, 1)]).await.order_id;
    let order = h
        .engine
        .cancel_order(&admin(), &order_id, CancelRequest::default())
        .await
        .unwrap();
    assert_eq!(order.status, OrderStatus::Cancelled);
    assert_eq!(order.cancellation_reason.as_deref(), Some("Cancelled by staff"));
}

// ========================================================================
// Too late to cancel
// ========================================================================

#[tokio::test]
async fn test_out_for_delivery_not_cancellable() {
    let h = harness().await;
    let order_id = place_cod(&h, vec![item(THALI, 1)]).await.order_id;
    advance_to(&h, &order_id, OrderStatus::OutForDelivery).await;

    let err = h
        .engine
        .cancel_order(&customer(), &order_id, CancelRequest::default())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        OrderError::NotCancellable(OrderStatus::OutForDelivery)
    ));
    assert_eq!(h.store.stock_of(THALI), Some(9));
}

#[tokio::test]
async fn test_delivered_and_cancelled_not_cancellable() {
    let h = harness().await;
    let delivered = place_cod(&h, vec![item(CHAI, 1)]).await.order_id;
    advance_to(&h, &delivered, OrderStatus::Delivered).await;
    let err = h
        .engine
        .cancel_order(&admin(), &delivered, CancelRequest::default())
        .await
        .unwrap_err();
    assert!(matches!(err, OrderError::NotCancellable(OrderStatus::Delivered)));

    let cancelled = place_cod(&h, vec![item(THALI, 1)]).await.order_id;
    h.engine
        .cancel_order(&customer(), &cancelled, CancelRequest::default())
        .await
        .unwrap();
    let err = h
        .engine
        .cancel_order(&customer(), &cancelled, CancelRequest::default())
        .await
        .unwrap_err();
    assert!(matches!(err, OrderError::NotCancellable(OrderStatus::Cancelled)));
    // Stock came back exactly once
    assert_eq!(h.store.stock_of(THALI), Some(10));
}

// ========================================================================
// Payment compensation
// ========================================================================

#[tokio::test]
async fn test_pending_online_cancel_cancels_intent() {
    let h = harness().await;
    let order_id = place_online(&h, vec![item(THALI, 1)]).await.order_id;
    let intent_id = intent_of(&h, &order_id).await;

    let order = h
        .engine
        .cancel_order(&customer(), &order_id, CancelRequest::default())
        .await
        .unwrap();

    assert_eq!(order.payment.status, PaymentStatus::Pending);
    assert_eq!(h.gateway.cancelled(), vec![intent_id.clone()]);
    assert_eq!(
        h.gateway.intent(&intent_id).unwrap().status,
        IntentStatus::Canceled
    );
    assert!(h.gateway.refunds().is_empty());
}

#[tokio::test]
async fn test_paid_cancel_refunds_once() {
    let h = harness().await;
    let order_id = place_paid(&h, vec![item(THALI, 1)]).await;
    let intent_id = intent_of(&h, &order_id).await;

    let order = h
        .engine
        .cancel_order(&customer(), &order_id, CancelRequest::default())
        .await
        .unwrap();
    assert_eq!(order.payment.status, PaymentStatus::Refunded);
    assert!(order.payment.refund_id.is_some());
    assert!(order.payment.refunded_at.is_some());

    let _ = h
        .engine
        .cancel_order(&customer(), &order_id, CancelRequest::default())
        .await
        .unwrap_err();

    let refunds = h.gateway.refunds();
    assert_eq!(refunds.len(), 1);
    assert_eq!(refunds[0].0, intent_id);
}

#[tokio::test]
async fn test_refund_failure_still_cancels() {
    let mut h = harness().await;
    let order_id = place_paid(&h, vec![item(THALI, 2)]).await;
    h.gateway.fail_refund_with(Some(GatewayError::Upstream {
        status: 500,
        message: "refund service down".to_string(),
    }));

    let order = h
        .engine
        .cancel_order(&customer(), &order_id, CancelRequest::default())
        .await
        .unwrap();

    assert_eq!(order.status, OrderStatus::Cancelled);
    assert_eq!(order.payment.status, PaymentStatus::RefundFailed);
    assert!(order.payment.refund_error.is_some());
    assert_eq!(h.store.stock_of(THALI), Some(10));

    wait_for_event(&mut h.events, OrderEventKind::RefundFailed, &order_id).await;
}
