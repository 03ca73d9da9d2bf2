use super::*;
use shared::order::{GeoPoint, RateOrderRequest};

fn assign(agent_id: &str) -> AssignRequest {
    AssignRequest {
        agent_id: agent_id.to_string(),
    }
}

fn rate(rating: u8) -> RateOrderRequest {
    RateOrderRequest {
        rating,
        review: Some("Hot and on time".to_string()),
    }
}

// ========================================================================
// Happy path
// ========================================================================

#[tokio::test]
async fn test_full_lifecycle() {
    let mut h = harness().await;
    let order_id = place_cod(&h, vec![item(THALI, 1)]).await.order_id;

    advance_to(&h, &order_id, OrderStatus::Delivered).await;

    let order = order_of(&h, &order_id).await;
    assert_eq!(order.status, OrderStatus::Delivered);
    let history: Vec<_> = order.status_history.iter().map(|e| e.status).collect();
    assert_eq!(
        history,
        vec![
            OrderStatus::Pending,
            OrderStatus::Confirmed,
            OrderStatus::Preparing,
            OrderStatus::ReadyForPickup,
            OrderStatus::OutForDelivery,
            OrderStatus::Delivered,
        ]
    );
    assert_eq!(order.status_history[2].by, "kitchen-1");
    assert_eq!(order.status_history[5].by, "agent-7");

    wait_for_event(&mut h.events, OrderEventKind::Delivered, &order_id).await;
}

#[tokio::test]
async fn test_cod_marked_paid_on_delivery() {
    let h = harness().await;
    let order_id = place_cod(&h, vec![item(CHAI, 1)]).await.order_id;

    advance_to(&h, &order_id, OrderStatus::OutForDelivery).await;
    assert_eq!(
        order_of(&h, &order_id).await.payment.status,
        PaymentStatus::Pending
    );

    advance_to_delivered(&h, &order_id).await;
    let order = order_of(&h, &order_id).await;
    assert_eq!(order.payment.status, PaymentStatus::Completed);
    assert!(order.payment.paid_at.is_some());
}

async fn advance_to_delivered(h: &Harness, order_id: &str) {
    h.engine
        .update_status(&agent("agent-7"), order_id, status_request("DELIVERED"))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_lenient_status_spelling() {
    let h = harness().await;
    let order_id = place_cod(&h, vec![item(CHAI, 1)]).await.order_id;

    let order = h
        .engine
        .update_status(&kitchen(), &order_id, status_request("preparing"))
        .await
        .unwrap();
    assert_eq!(order.status, OrderStatus::Preparing);

    let order = h
        .engine
        .update_status(&kitchen(), &order_id, status_request("Ready for pickup"))
        .await
        .unwrap();
    assert_eq!(order.status, OrderStatus::ReadyForPickup);
}

// ========================================================================
// Illegal moves
// ========================================================================

#[tokio::test]
async fn test_illegal_transition_rejected() {
    let h = harness().await;
    let order_id = place_cod(&h, vec![item(CHAI, 1)]).await.order_id;

    let err = h
        .engine
        .update_status(&kitchen(), &order_id, status_request("DELIVERED"))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        OrderError::InvalidTransition {
            from: OrderStatus::Confirmed,
            to: OrderStatus::Delivered,
            ..
        }
    ));
    assert_eq!(order_of(&h, &order_id).await.status, OrderStatus::Confirmed);
}

#[tokio::test]
async fn test_unknown_status_rejected() {
    let h = harness().await;
    let order_id = place_cod(&h, vec![item(CHAI, 1)]).await.order_id;
    let err = h
        .engine
        .update_status(&kitchen(), &order_id, status_request("SHIPPED"))
        .await
        .unwrap_err();
    assert!(matches!(err, OrderError::Validation { ref field, .. } if field == "status"));
}

#[tokio::test]
async fn test_customer_cannot_update_status() {
    let h = harness().await;
    let order_id = place_cod(&h, vec![item(CHAI, 1)]).await.order_id;
    let err = h
        .engine
        .update_status(&customer(), &order_id, status_request("PREPARING"))
        .await
        .unwrap_err();
    assert!(matches!(err, OrderError::PermissionDenied(_)));
}

#[tokio::test]
async fn test_missing_order() {
    let h = harness().await;
    let err = h
        .engine
        .update_status(&kitchen(), "nope", status_request("PREPARING"))
        .await
        .unwrap_err();
    assert!(matches!(err, OrderError::OrderNotFound(_)));
}

#[tokio::test]
async fn test_invalid_driver_location() {
    let h = harness().await;
    let order_id = place_cod(&h, vec![item(CHAI, 1)]).await.order_id;
    advance_to(&h, &order_id, OrderStatus::OutForDelivery).await;

    let mut req = status_request("DELIVERED");
    req.driver_location = Some(GeoPoint {
        lat: 91.0,
        lng: 72.8,
    });
    let err = h
        .engine
        .update_status(&agent("agent-7"), &order_id, req)
        .await
        .unwrap_err();
    assert!(matches!(err, OrderError::Validation { ref field, .. } if field == "driver_location"));
}

// ========================================================================
// Assignment
// ========================================================================

#[tokio::test]
async fn test_assign_requires_ready_for_pickup() {
    let h = harness().await;
    let order_id = place_cod(&h, vec![item(CHAI, 1)]).await.order_id;
    advance_to(&h, &order_id, OrderStatus::Preparing).await;

    let err = h
        .engine
        .assign_order(&admin(), &order_id, assign("agent-7"))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        OrderError::InvalidTransition {
            from: OrderStatus::Preparing,
            to: OrderStatus::OutForDelivery,
            ..
        }
    ));
    assert!(order_of(&h, &order_id).await.assigned_driver.is_none());
}

#[tokio::test]
async fn test_assign_sets_driver_and_eta() {
    let mut h = harness().await;
    let order_id = place_cod(&h, vec![item(CHAI, 1)]).await.order_id;
    advance_to(&h, &order_id, OrderStatus::ReadyForPickup).await;

    let before = now_millis();
    let order = h
        .engine
        .assign_order(&admin(), &order_id, assign("agent-9"))
        .await
        .unwrap();
    let after = now_millis();

    assert_eq!(order.status, OrderStatus::OutForDelivery);
    assert_eq!(order.assigned_driver.as_deref(), Some("agent-9"));
    let eta = order.estimated_delivery_at.unwrap();
    assert!(eta >= before + 45 * MINUTE_MS && eta <= after + 45 * MINUTE_MS);

    wait_for_event(&mut h.events, OrderEventKind::Assigned, &order_id).await;
}

#[tokio::test]
async fn test_assign_permissions_and_agent_id() {
    let h = harness().await;
    let order_id = place_cod(&h, vec![item(CHAI, 1)]).await.order_id;
    advance_to(&h, &order_id, OrderStatus::ReadyForPickup).await;

    let err = h
        .engine
        .assign_order(&agent("agent-7"), &order_id, assign("agent-7"))
        .await
        .unwrap_err();
    assert!(matches!(err, OrderError::PermissionDenied(_)));

    let err = h
        .engine
        .assign_order(&kitchen(), &order_id, assign("  "))
        .await
        .unwrap_err();
    assert!(matches!(err, OrderError::Validation { ref field, .. } if field == "agent_id"));
}

#[tokio::test]
async fn test_other_agent_cannot_deliver() {
    let h = harness().await;
    let order_id = place_cod(&h, vec![item(CHAI, 1)]).await.order_id;
    advance_to(&h, &order_id, OrderStatus::OutForDelivery).await;

    let err = h
        .engine
        .update_status(&agent("agent-8"), &order_id, status_request("DELIVERED"))
        .await
        .unwrap_err();
    assert!(matches!(err, OrderError::PermissionDenied(_)));
    assert_eq!(
        order_of(&h, &order_id).await.status,
        OrderStatus::OutForDelivery
    );
}

// ========================================================================
// Staff cancellation
// ========================================================================

#[tokio::test]
async fn test_staff_cancel_restores_stock() {
    let h = harness().await;
    let order_id = place_cod(&h, vec![item(THALI, 4)]).await.order_id;
    assert_eq!(h.store.stock_of(THALI), Some(6));

    let mut req = status_request("CANCELLED");
    req.note = Some("Out of gas".to_string());
    let order = h.engine.update_status(&kitchen(), &order_id, req).await.unwrap();

    assert_eq!(order.status, OrderStatus::Cancelled);
    assert_eq!(order.cancellation_reason.as_deref(), Some("Out of gas"));
    assert_eq!(h.store.stock_of(THALI), Some(10));
}

// ========================================================================
// Rating
// ========================================================================

#[tokio::test]
async fn test_rate_delivered_order_once() {
    let h = harness().await;
    let order_id = place_cod(&h, vec![item(CHAI, 1)]).await.order_id;
    advance_to(&h, &order_id, OrderStatus::Delivered).await;

    let order = h.engine.rate_order(&customer(), &order_id, rate(5)).await.unwrap();
    assert_eq!(order.rating, Some(5));
    assert_eq!(order.review.as_deref(), Some("Hot and on time"));

    let err = h
        .engine
        .rate_order(&customer(), &order_id, rate(4))
        .await
        .unwrap_err();
    assert!(matches!(err, OrderError::AlreadyRated));
}

#[tokio::test]
async fn test_rating_rules() {
    let h = harness().await;
    let order_id = place_cod(&h, vec![item(CHAI, 1)]).await.order_id;

    let err = h
        .engine
        .rate_order(&customer(), &order_id, rate(3))
        .await
        .unwrap_err();
    assert!(matches!(err, OrderError::NotRateable(OrderStatus::Confirmed)));

    let err = h
        .engine
        .rate_order(&customer(), &order_id, rate(6))
        .await
        .unwrap_err();
    assert!(matches!(err, OrderError::Validation { ref field, .. } if field == "rating"));

    advance_to(&h, &order_id, OrderStatus::Delivered).await;
    let err = h
        .engine
        .rate_order(&other_customer(), &order_id, rate(1))
        .await
        .unwrap_err();
    assert!(matches!(err, OrderError::PermissionDenied(_)));
}
