//! Order lifecycle events
//!
//! ```text
//! OrderEngine ── try_send ──► mpsc queue ──► dispatcher ──► EventSink (log)
//!                                                     └──► EventSink (broadcast)
//! ```
//!
//! Emitting never blocks and never fails the operation that emitted. Delivery
//! to sinks is at-least-once with bounded retries, in no guaranteed order.

pub mod queue;

pub use queue::{EventEmitter, EventQueueConfig};

use async_trait::async_trait;
use serde::Serialize;
use shared::order::{Order, OrderStatus};
use tokio::sync::broadcast;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum OrderEventKind {
    #[serde(rename = "order.created")]
    Created,
    #[serde(rename = "order.status_changed")]
    StatusChanged,
    #[serde(rename = "order.assigned")]
    Assigned,
    #[serde(rename = "order.out_for_delivery")]
    OutForDelivery,
    #[serde(rename = "order.delivered")]
    Delivered,
    #[serde(rename = "order.cancelled")]
    Cancelled,
    #[serde(rename = "order.payment_completed")]
    PaymentCompleted,
    #[serde(rename = "order.payment_failed")]
    PaymentFailed,
    #[serde(rename = "order.refund_failed")]
    RefundFailed,
}

impl OrderEventKind {
    pub const fn name(&self) -> &'static str {
        match self {
            OrderEventKind::Created => "order.created",
            OrderEventKind::StatusChanged => "order.status_changed",
            OrderEventKind::Assigned => "order.assigned",
            OrderEventKind::OutForDelivery => "order.out_for_delivery",
            OrderEventKind::Delivered => "order.delivered",
            OrderEventKind::Cancelled => "order.cancelled",
            OrderEventKind::PaymentCompleted => "order.payment_completed",
            OrderEventKind::PaymentFailed => "order.payment_failed",
            OrderEventKind::RefundFailed => "order.refund_failed",
        }
    }

    /// Event announcing that an order reached `status`
    pub fn for_status(status: OrderStatus) -> Self {
        match status {
            OrderStatus::OutForDelivery => OrderEventKind::OutForDelivery,
            OrderStatus::Delivered => OrderEventKind::Delivered,
            OrderStatus::Cancelled => OrderEventKind::Cancelled,
            _ => OrderEventKind::StatusChanged,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrderEvent {
    pub event_id: String,
    pub kind: OrderEventKind,
    pub order_id: String,
    pub order_number: String,
    pub user_id: String,
    pub status: OrderStatus,
    pub occurred_at: i64,
}

impl OrderEvent {
    pub fn from_order(kind: OrderEventKind, order: &Order) -> Self {
        Self {
            event_id: uuid::Uuid::new_v4().to_string(),
            kind,
            order_id: order.id.clone(),
            order_number: order.order_number.clone(),
            user_id: order.user_id.clone(),
            status: order.status,
            occurred_at: shared::util::now_millis(),
        }
    }
}

/// Downstream consumer of order events
#[async_trait]
pub trait EventSink: Send + Sync {
    fn name(&self) -> &'static str;

    async fn deliver(&self, event: &OrderEvent) -> Result<(), BoxError>;
}

/// Writes every event to the tracing log
pub struct LogSink;

#[async_trait]
impl EventSink for LogSink {
    fn name(&self) -> &'static str {
        "log"
    }

    async fn deliver(&self, event: &OrderEvent) -> Result<(), BoxError> {
        tracing::info!(
            event = event.kind.name(),
            order_id = %event.order_id,
            order_number = %event.order_number,
            status = %event.status,
            "Order event"
        );
        Ok(())
    }
}

/// Fans events out to in-process subscribers (notifiers, tests)
pub struct BroadcastSink {
    tx: broadcast::Sender<OrderEvent>,
}

impl BroadcastSink {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<OrderEvent> {
        self.tx.subscribe()
    }
}

#[async_trait]
impl EventSink for BroadcastSink {
    fn name(&self) -> &'static str {
        "broadcast"
    }

    async fn deliver(&self, event: &OrderEvent) -> Result<(), BoxError> {
        // No subscribers is not a failure
        let _ = self.tx.send(event.clone());
        Ok(())
    }
}
