use super::*;
use crate::gateway::{GatewayError, IntentStatus};
use futures::future::join_all;

// ========================================================================
// Pricing and payment setup
// ========================================================================

#[tokio::test]
async fn test_first10_scenario_totals() {
    let h = harness().await;
    let mut req = home_request(vec![item(THALI, 2), item(CHAI, 1)], "COD");
    req.coupon_code = Some("FIRST10".to_string());

    let resp = h.engine.create_order(&customer(), req).await.unwrap();
    assert_eq!(resp.total_cents, 272);

    let order = order_of(&h, &resp.order_id).await;
    assert_eq!(order.totals.subtotal_cents, 250);
    assert_eq!(order.totals.discount_cents, 10);
    assert_eq!(order.totals.tax_cents, 12);
    assert_eq!(order.totals.delivery_cents, 20);
    assert_eq!(order.totals.final_cents, 272);
    assert_eq!(order.totals.coupon_code.as_deref(), Some("FIRST10"));
}

#[tokio::test]
async fn test_cod_order_is_confirmed_without_intent() {
    let h = harness().await;
    let resp = place_cod(&h, vec![item(CHAI, 1)]).await;

    assert_eq!(resp.status, OrderStatus::Confirmed);
    assert!(resp.client_secret.is_none());
    assert!(!resp.replayed);
    assert_eq!(h.gateway.intent_count(), 0);

    let order = order_of(&h, &resp.order_id).await;
    assert!(order.payment.gateway_id.is_none());
    assert_eq!(order.payment.status, PaymentStatus::Pending);
    let history: Vec<_> = order.status_history.iter().map(|e| e.status).collect();
    assert_eq!(history, vec![OrderStatus::Pending, OrderStatus::Confirmed]);
}

#[tokio::test]
async fn test_online_order_creates_intent_for_final_amount() {
    let h = harness().await;
    let resp = place_online(&h, vec![item(THALI, 1)]).await;

    assert_eq!(resp.status, OrderStatus::Pending);
    assert!(resp.client_secret.is_some());

    let intent_id = intent_of(&h, &resp.order_id).await;
    let intent = h.gateway.intent(&intent_id).unwrap();
    assert_eq!(intent.amount_cents, resp.total_cents);
    assert_eq!(intent.status, IntentStatus::RequiresPaymentMethod);
}

#[tokio::test]
async fn test_selected_options_add_to_unit_price() {
    let h = harness().await;
    let mut line = item(THALI, 2);
    line.selected_options = vec!["Extra roti".to_string()];
    let resp = place_cod(&h, vec![line]).await;

    let order = order_of(&h, &resp.order_id).await;
    assert_eq!(order.items[0].price_cents, 115);
    assert_eq!(order.totals.subtotal_cents, 230);
}

#[tokio::test]
async fn test_unknown_option_rejected() {
    let h = harness().await;
    let mut line = item(THALI, 1);
    line.selected_options = vec!["Gold leaf".to_string()];
    let err = h
        .engine
        .create_order(&customer(), home_request(vec![line], "COD"))
        .await
        .unwrap_err();
    assert!(matches!(err, OrderError::Validation { ref field, .. } if field == "items[0].selected_options"));
    assert_eq!(h.store.stock_of(THALI), Some(10));
}

#[tokio::test]
async fn test_price_overflow_rejected() {
    let h = harness().await;
    h.store
        .upsert_product(&Product {
            id: 900,
            restaurant_id: RESTAURANT,
            name: "Gold Leaf Platter".to_string(),
            price_cents: i64::MAX / 2,
            stock: None,
            available: true,
            is_active: true,
            options: vec![ProductOption {
                name: "Extra gold".to_string(),
                price_cents: i64::MAX / 2 + 10,
            }],
        })
        .await
        .unwrap();

    let err = h
        .engine
        .create_order(&customer(), home_request(vec![item(900, 3)], "COD"))
        .await
        .unwrap_err();
    assert!(matches!(err, OrderError::Validation { ref field, .. } if field == "items"));

    let mut with_option = item(900, 1);
    with_option.selected_options = vec!["Extra gold".to_string()];
    let err = h
        .engine
        .create_order(&customer(), home_request(vec![with_option], "COD"))
        .await
        .unwrap_err();
    assert!(
        matches!(err, OrderError::Validation { ref field, .. } if field == "items[0].selected_options")
    );
    assert_eq!(h.store.order_count(), 0);
}

// ========================================================================
// Stock
// ========================================================================

#[tokio::test]
async fn test_stock_decremented_on_create() {
    let h = harness().await;
    place_cod(&h, vec![item(THALI, 3), item(CHAI, 5)]).await;
    assert_eq!(h.store.stock_of(THALI), Some(7));
    // Unlimited stays unlimited
    assert_eq!(h.store.stock_of(CHAI), None);
}

#[tokio::test]
async fn test_insufficient_stock_writes_nothing() {
    let h = harness().await;
    let err = h
        .engine
        .create_order(
            &customer(),
            home_request(vec![item(THALI, 2), item(BIRYANI, 2)], "COD"),
        )
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        OrderError::OutOfStock {
            product_id: BIRYANI,
            requested: 2
        }
    ));
    assert_eq!(h.store.stock_of(THALI), Some(10));
    assert_eq!(h.store.stock_of(BIRYANI), Some(1));
    assert_eq!(h.store.order_count(), 0);
}

#[tokio::test]
async fn test_split_lines_count_against_same_stock() {
    let h = harness().await;
    let err = h
        .engine
        .create_order(
            &customer(),
            home_request(vec![item(BIRYANI, 1), item(BIRYANI, 1)], "COD"),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, OrderError::OutOfStock { product_id: BIRYANI, .. }));
}

#[tokio::test]
async fn test_concurrent_checkouts_never_oversell() {
    let h = harness().await;
    // THALI has 10 units; 25 buyers want 1 each
    let attempts = (0..25).map(|i| {
        let principal = Principal::new(format!("buyer-{i}"), Role::Customer);
        let engine = &h.engine;
        async move {
            engine
                .create_order(&principal, home_request(vec![item(THALI, 1)], "COD"))
                .await
        }
    });
    let results = join_all(attempts).await;

    let created = results.iter().filter(|r| r.is_ok()).count();
    let out_of_stock = results
        .iter()
        .filter(|r| matches!(r, Err(OrderError::OutOfStock { .. })))
        .count();
    assert_eq!(created, 10);
    assert_eq!(out_of_stock, 15);
    assert_eq!(h.store.stock_of(THALI), Some(0));
}

#[tokio::test]
async fn test_unavailable_and_unknown_products() {
    let h = harness().await;
    let err = h
        .engine
        .create_order(&customer(), home_request(vec![item(SAMOSA, 1)], "COD"))
        .await
        .unwrap_err();
    assert!(matches!(err, OrderError::ProductUnavailable(SAMOSA)));

    let err = h
        .engine
        .create_order(&customer(), home_request(vec![item(999, 1)], "COD"))
        .await
        .unwrap_err();
    assert!(matches!(err, OrderError::ProductNotFound(999)));
}

// ========================================================================
// Idempotency
// ========================================================================

#[tokio::test]
async fn test_idempotent_replay_returns_same_order() {
    let h = harness().await;
    let mut req = home_request(vec![item(THALI, 2)], "UPI");
    req.idempotency_key = Some("checkout-abc".to_string());

    let first = h.engine.create_order(&customer(), req.clone()).await.unwrap();
    let second = h.engine.create_order(&customer(), req).await.unwrap();

    assert_eq!(first.order_id, second.order_id);
    assert_eq!(first.order_number, second.order_number);
    assert!(second.replayed);
    assert_eq!(second.client_secret, first.client_secret);
    assert_eq!(h.store.order_count(), 1);
    assert_eq!(h.store.stock_of(THALI), Some(8));
    assert_eq!(h.gateway.intent_count(), 1);
}

#[tokio::test]
async fn test_concurrent_duplicates_create_one_order() {
    let h = harness().await;
    let attempts = (0..5).map(|_| {
        let mut req = home_request(vec![item(THALI, 1)], "CARD");
        req.idempotency_key = Some("double-tap".to_string());
        let engine = &h.engine;
        async move { engine.create_order(&customer(), req).await }
    });
    let results: Vec<_> = join_all(attempts)
        .await
        .into_iter()
        .map(Result::unwrap)
        .collect();

    let ids: std::collections::HashSet<_> = results.iter().map(|r| r.order_id.clone()).collect();
    assert_eq!(ids.len(), 1);
    assert_eq!(h.store.order_count(), 1);
    assert_eq!(h.store.stock_of(THALI), Some(9));
}

#[tokio::test]
async fn test_key_owned_by_another_user_conflicts() {
    let h = harness().await;
    let mut req = home_request(vec![item(CHAI, 1)], "COD");
    req.idempotency_key = Some("shared-key".to_string());
    h.engine.create_order(&customer(), req.clone()).await.unwrap();

    let err = h
        .engine
        .create_order(&other_customer(), req)
        .await
        .unwrap_err();
    assert!(matches!(err, OrderError::DuplicateIdempotencyKey));
}

// ========================================================================
// Gateway failures
// ========================================================================

#[tokio::test]
async fn test_gateway_failure_creates_nothing() {
    let h = harness().await;
    h.gateway.fail_create_with(Some(GatewayError::Timeout));

    let err = h
        .engine
        .create_order(&customer(), home_request(vec![item(THALI, 1)], "WALLET"))
        .await
        .unwrap_err();
    assert!(matches!(err, OrderError::Gateway(ref e) if e.is_retryable()));
    assert_eq!(h.store.order_count(), 0);
    assert_eq!(h.store.stock_of(THALI), Some(10));
}

#[tokio::test]
async fn test_sold_out_rejected_before_intent_created() {
    let h = harness().await;
    h.store.adjust_stock(BIRYANI, -1).await.unwrap();

    let err = h
        .engine
        .create_order(&customer(), home_request(vec![item(BIRYANI, 1)], "UPI"))
        .await
        .unwrap_err();
    assert!(matches!(err, OrderError::OutOfStock { .. }));
    assert_eq!(h.gateway.intent_count(), 0);
}

// ========================================================================
// Train readiness
// ========================================================================

#[tokio::test]
async fn test_train_order_gets_readiness() {
    let h = harness().await;
    let resp = h
        .engine
        .create_order(
            &customer(),
            train_request(vec![item(THALI, 1)], TRAIN_NO, "vadodara"),
        )
        .await
        .unwrap();

    let order = order_of(&h, &resp.order_id).await;
    let schedule = order.schedule.unwrap();
    assert_eq!(schedule.station, STATION);
    assert_eq!(schedule.station_index, 1);
    assert_eq!(schedule.scheduled_arrival, h.arrival);
    assert_eq!(schedule.expected_ready_at, h.arrival - 28 * 60_000);
    assert_eq!(order.totals.delivery_cents, 30);
}

#[tokio::test]
async fn test_unknown_train_degrades_gracefully() {
    let h = harness().await;
    let resp = h
        .engine
        .create_order(
            &customer(),
            train_request(vec![item(THALI, 1)], "00000", STATION),
        )
        .await
        .unwrap();
    let order = order_of(&h, &resp.order_id).await;
    assert_eq!(order.status, OrderStatus::Confirmed);
    assert!(order.schedule.is_none());
}

// ========================================================================
// Events
// ========================================================================

#[tokio::test]
async fn test_created_event_emitted() {
    let mut h = harness().await;
    let resp = place_cod(&h, vec![item(CHAI, 2)]).await;
    let event = wait_for_event(&mut h.events, OrderEventKind::Created, &resp.order_id).await;
    assert_eq!(event.status, OrderStatus::Confirmed);
    assert_eq!(event.user_id, "u-1");
}
