//! Fire-and-forget event queue
//!
//! [`EventEmitter::emit`] pushes onto a bounded mpsc channel with `try_send`;
//! a full or closed queue drops the event with a warning. The dispatcher
//! task waits a short settle delay per event, then hands it to every sink
//! with bounded retries.

use futures::future::join_all;
use shared::order::Order;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::{EventSink, OrderEvent, OrderEventKind};

const MAX_ATTEMPTS: u32 = 3;
const RETRY_BACKOFF: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Copy)]
pub struct EventQueueConfig {
    pub capacity: usize,
    /// Delay between enqueue and first delivery attempt
    pub settle: Duration,
}

impl Default for EventQueueConfig {
    fn default() -> Self {
        Self {
            capacity: 1024,
            settle: Duration::from_millis(50),
        }
    }
}

#[derive(Clone)]
pub struct EventEmitter {
    tx: mpsc::Sender<OrderEvent>,
}

impl EventEmitter {
    /// Create the emitter and spawn its dispatcher. The dispatcher stops
    /// once every emitter clone is dropped.
    pub fn start(
        sinks: Vec<Arc<dyn EventSink>>,
        config: EventQueueConfig,
    ) -> (Self, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(config.capacity.max(1));
        let handle = tokio::spawn(run_dispatcher(rx, sinks, config.settle));
        (Self { tx }, handle)
    }

    pub fn emit(&self, kind: OrderEventKind, order: &Order) {
        let event = OrderEvent::from_order(kind, order);
        match self.tx.try_send(event) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(event)) => {
                tracing::warn!(
                    event = event.kind.name(),
                    order_id = %event.order_id,
                    "Event queue full, event dropped"
                );
            }
            Err(mpsc::error::TrySendError::Closed(event)) => {
                tracing::warn!(
                    event = event.kind.name(),
                    order_id = %event.order_id,
                    "Event queue closed, event dropped"
                );
            }
        }
    }
}

async fn run_dispatcher(
    mut rx: mpsc::Receiver<OrderEvent>,
    sinks: Vec<Arc<dyn EventSink>>,
    settle: Duration,
) {
    tracing::info!(sinks = sinks.len(), "Event dispatcher started");
    let sinks: Arc<[Arc<dyn EventSink>]> = sinks.into();

    while let Some(event) = rx.recv().await {
        let sinks = Arc::clone(&sinks);
        tokio::spawn(async move {
            tokio::time::sleep(settle).await;
            // Sinks retry independently of each other
            join_all(sinks.iter().map(|sink| deliver_with_retry(sink.as_ref(), &event))).await;
        });
    }

    tracing::info!("Event queue closed, dispatcher stopping");
}

async fn deliver_with_retry(sink: &dyn EventSink, event: &OrderEvent) {
    for attempt in 1..=MAX_ATTEMPTS {
        match sink.deliver(event).await {
            Ok(()) => return,
            Err(e) if attempt < MAX_ATTEMPTS => {
                tracing::debug!(
                    sink = sink.name(),
                    event = event.kind.name(),
                    attempt,
                    error = %e,
                    "Event delivery failed, retrying"
                );
                tokio::time::sleep(RETRY_BACKOFF * attempt).await;
            }
            Err(e) => {
                tracing::error!(
                    sink = sink.name(),
                    event = event.kind.name(),
                    order_id = %event.order_id,
                    error = %e,
                    "Event delivery failed, giving up"
                );
            }
        }
    }
}
