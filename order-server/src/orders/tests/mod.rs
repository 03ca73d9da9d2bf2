use super::*;
use crate::auth::{Principal, Role};
use crate::db::memory::MemoryStore;
use crate::events::{BroadcastSink, EventQueueConfig, OrderEvent};
use crate::gateway::fake::FakeGateway;
use shared::models::{Product, ProductOption, Restaurant, Stop, TrainSchedule};
use shared::order::{
    AssignRequest, CreateOrderRequest, CreateOrderResponse, DeliveryInfoInput, OrderItemInput,
    OrderStatus, PaymentStatus, UpdateStatusRequest,
};
use shared::util::now_millis;
use std::time::Duration;
use tokio::sync::broadcast;

mod test_cancel;
mod test_checkout;
mod test_transitions;

pub(super) const WEBHOOK_SECRET: &str = "whsec_engine_tests";

pub(super) const RESTAURANT: i64 = 1;
/// 100, stock 10
pub(super) const THALI: i64 = 101;
/// 50, unlimited
pub(super) const CHAI: i64 = 102;
/// 80, stock 1
pub(super) const BIRYANI: i64 = 103;
/// Switched off by the kitchen
pub(super) const SAMOSA: i64 = 104;

pub(super) const TRAIN_NO: &str = "12951";
pub(super) const STATION: &str = "Vadodara";

const MINUTE_MS: i64 = 60_000;

pub(super) struct Harness {
    pub engine: OrderEngine,
    pub store: Arc<MemoryStore>,
    pub gateway: Arc<FakeGateway>,
    pub events: broadcast::Receiver<OrderEvent>,
    /// Arrival of the test train at `STATION`
    pub arrival: i64,
}

// ========================================================================
// Setup
// ========================================================================

pub(super) async fn harness() -> Harness {
    let store = Arc::new(MemoryStore::new());
    seed_catalog(&store).await;
    let arrival = now_millis() + 120 * MINUTE_MS;
    seed_schedule(&store, arrival).await;

    let gateway = Arc::new(FakeGateway::new(WEBHOOK_SECRET));
    let sink = Arc::new(BroadcastSink::new(256));
    let events = sink.subscribe();
    let (emitter, _handle) = EventEmitter::start(
        vec![sink],
        EventQueueConfig {
            capacity: 256,
            settle: Duration::from_millis(1),
        },
    );

    let engine = OrderEngine::new(
        Stores::from_backend(store.clone()),
        gateway.clone(),
        emitter,
        PricingPolicy::new(
            500,
            DeliveryFees {
                train: 30,
                home: 20,
                station: 10,
            },
        ),
        EngineSettings::default(),
    );

    Harness {
        engine,
        store,
        gateway,
        events,
        arrival,
    }
}

async fn seed_catalog(store: &MemoryStore) {
    store
        .upsert_restaurant(&Restaurant {
            id: RESTAURANT,
            name: "Station Kitchen".to_string(),
            station_name: STATION.to_string(),
            is_active: true,
        })
        .await
        .unwrap();

    let product = |id: i64, name: &str, price: i64, stock: Option<u32>, available: bool| Product {
        id,
        restaurant_id: RESTAURANT,
        name: name.to_string(),
        price_cents: price,
        stock,
        available,
        is_active: true,
        options: vec![],
    };
    let mut thali = product(THALI, "Veg Thali", 100, Some(10), true);
    thali.options = vec![ProductOption {
        name: "Extra roti".to_string(),
        price_cents: 15,
    }];
    for p in [
        thali,
        product(CHAI, "Masala Chai", 50, None, true),
        product(BIRYANI, "Biryani", 80, Some(1), true),
        product(SAMOSA, "Samosa", 20, Some(50), false),
    ] {
        store.upsert_product(&p).await.unwrap();
    }
}

async fn seed_schedule(store: &MemoryStore, arrival: i64) {
    let schedule = TrainSchedule {
        train_no: TRAIN_NO.to_string(),
        date: crate::readiness::service_date(now_millis()),
        stops: vec![
            Stop {
                station: "Mumbai Central".to_string(),
                arrival: arrival - 240 * MINUTE_MS,
                departure: arrival - 230 * MINUTE_MS,
            },
            Stop {
                station: STATION.to_string(),
                arrival,
                departure: arrival + 5 * MINUTE_MS,
            },
            Stop {
                station: "Ahmedabad".to_string(),
                arrival: arrival + 90 * MINUTE_MS,
                departure: arrival + 100 * MINUTE_MS,
            },
        ],
    };
    store.upsert_schedule(&schedule).await.unwrap();
}

// ========================================================================
// Principals
// ========================================================================

pub(super) fn customer() -> Principal {
    Principal::new("u-1", Role::Customer)
}

pub(super) fn other_customer() -> Principal {
    Principal::new("u-2", Role::Customer)
}

pub(super) fn admin() -> Principal {
    Principal::new("admin-1", Role::Admin)
}

pub(super) fn kitchen() -> Principal {
    Principal::new("kitchen-1", Role::Restaurant)
}

pub(super) fn agent(id: &str) -> Principal {
    Principal::new(id, Role::Delivery)
}

// ========================================================================
// Requests
// ========================================================================

pub(super) fn item(product_id: i64, qty: i64) -> OrderItemInput {
    OrderItemInput {
        product_id,
        qty,
        note: None,
        selected_options: vec![],
    }
}

pub(super) fn home_request(items: Vec<OrderItemInput>, method: &str) -> CreateOrderRequest {
    CreateOrderRequest {
        items,
        delivery_info: DeliveryInfoInput {
            kind: "home".to_string(),
            address: Some("12 MG Road, Vadodara".to_string()),
            ..Default::default()
        },
        payment_method: method.to_string(),
        coupon_code: None,
        special_instructions: None,
        idempotency_key: None,
    }
}

pub(super) fn train_request(
    items: Vec<OrderItemInput>,
    train_no: &str,
    station: &str,
) -> CreateOrderRequest {
    CreateOrderRequest {
        items,
        delivery_info: DeliveryInfoInput {
            kind: "train".to_string(),
            train_no: Some(train_no.to_string()),
            coach: Some("B2".to_string()),
            seat: Some("34".to_string()),
            station_name: Some(station.to_string()),
            address: None,
        },
        payment_method: "COD".to_string(),
        coupon_code: None,
        special_instructions: None,
        idempotency_key: None,
    }
}

pub(super) fn status_request(status: &str) -> UpdateStatusRequest {
    UpdateStatusRequest {
        status: status.to_string(),
        note: None,
        driver_location: None,
    }
}

// ========================================================================
// Flows
// ========================================================================

pub(super) async fn place_cod(h: &Harness, items: Vec<OrderItemInput>) -> CreateOrderResponse {
    h.engine
        .create_order(&customer(), home_request(items, "COD"))
        .await
        .unwrap()
}

pub(super) async fn place_online(h: &Harness, items: Vec<OrderItemInput>) -> CreateOrderResponse {
    h.engine
        .create_order(&customer(), home_request(items, "UPI"))
        .await
        .unwrap()
}

pub(super) async fn order_of(h: &Harness, order_id: &str) -> Order {
    h.engine.get_order(&admin(), order_id).await.unwrap()
}

pub(super) async fn intent_of(h: &Harness, order_id: &str) -> String {
    order_of(h, order_id).await.payment.gateway_id.unwrap()
}

/// Drive a confirmed order to `target` through the kitchen and an agent
pub(super) async fn advance_to(h: &Harness, order_id: &str, target: OrderStatus) {
    let steps = [
        OrderStatus::Preparing,
        OrderStatus::ReadyForPickup,
        OrderStatus::OutForDelivery,
        OrderStatus::Delivered,
    ];
    for step in steps {
        match step {
            OrderStatus::OutForDelivery => {
                h.engine
                    .assign_order(
                        &kitchen(),
                        order_id,
                        AssignRequest {
                            agent_id: "agent-7".to_string(),
                        },
                    )
                    .await
                    .unwrap();
            }
            OrderStatus::Delivered => {
                h.engine
                    .update_status(&agent("agent-7"), order_id, status_request("DELIVERED"))
                    .await
                    .unwrap();
            }
            _ => {
                h.engine
                    .update_status(&kitchen(), order_id, status_request(step.as_str()))
                    .await
                    .unwrap();
            }
        }
        if step == target {
            return;
        }
    }
}

/// Collect event kinds until `kind` shows up for `order_id`
pub(super) async fn wait_for_event(
    rx: &mut broadcast::Receiver<OrderEvent>,
    kind: OrderEventKind,
    order_id: &str,
) -> OrderEvent {
    tokio::time::timeout(Duration::from_secs(2), async {
        loop {
            let event = rx.recv().await.unwrap();
            if event.kind == kind && event.order_id == order_id {
                return event;
            }
        }
    })
    .await
    .unwrap_or_else(|_| panic!("no {} event for {order_id}", kind.name()))
}

/// Let the dispatcher drain, then count matching events
pub(super) async fn count_events(
    rx: &mut broadcast::Receiver<OrderEvent>,
    kind: OrderEventKind,
    order_id: &str,
) -> usize {
    tokio::time::sleep(Duration::from_millis(200)).await;
    let mut count = 0;
    while let Ok(event) = rx.try_recv() {
        if event.kind == kind && event.order_id == order_id {
            count += 1;
        }
    }
    count
}
