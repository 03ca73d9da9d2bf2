//! Order lifecycle engine
//!
//! [`OrderEngine`] owns every state change of an order. Operations are
//! split by concern:
//! - `checkout`: validate, reserve stock, price, set up payment, persist
//! - `transitions`: status updates, agent assignment, rating
//! - `payment`: webhook reconciliation and client-side confirmation
//! - `cancel`: cancellation with stock restoration and refund
//! - `queries`: get, list, tracking view
//! - `catalog`: admin upserts of restaurants, products and timetables
//!
//! Every mutation of a stored order goes through [`OrderStore::modify`], so
//! legality checks and writes happen under the same lock.

pub mod cancel;
pub mod catalog;
pub mod checkout;
pub mod error;
pub mod payment;
pub mod pricing;
pub mod queries;
pub mod transitions;
mod validation;

#[cfg(test)]
mod tests;

pub use error::OrderError;
pub use pricing::{DeliveryFees, PricingPolicy};

use std::sync::Arc;

use crate::db::{CatalogStore, OrderStore, ScheduleProvider, Stores};
use crate::events::{EventEmitter, OrderEventKind};
use crate::gateway::PaymentGateway;
use crate::readiness::ReadinessCalculator;
use shared::order::Order;

/// Delivery estimate set when an agent picks up the order
pub const DELIVERY_ETA_MINUTES: i64 = 45;

/// Actor recorded in the status history for gateway-driven changes
pub const SYSTEM_ACTOR: &str = "system";

#[derive(Debug, Clone)]
pub struct EngineSettings {
    /// ISO currency code for payment intents
    pub currency: String,
    pub prep_minutes: u32,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            currency: "inr".to_string(),
            prep_minutes: 20,
        }
    }
}

pub struct OrderEngine {
    catalog: Arc<dyn CatalogStore>,
    schedules: Arc<dyn ScheduleProvider>,
    orders: Arc<dyn OrderStore>,
    readiness: ReadinessCalculator,
    gateway: Arc<dyn PaymentGateway>,
    events: EventEmitter,
    pricing: PricingPolicy,
    settings: EngineSettings,
}

impl std::fmt::Debug for OrderEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrderEngine")
            .field("pricing", &self.pricing)
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl OrderEngine {
    pub fn new(
        stores: Stores,
        gateway: Arc<dyn PaymentGateway>,
        events: EventEmitter,
        pricing: PricingPolicy,
        settings: EngineSettings,
    ) -> Self {
        Self {
            readiness: ReadinessCalculator::new(stores.schedules.clone(), settings.prep_minutes),
            catalog: stores.catalog,
            schedules: stores.schedules,
            orders: stores.orders,
            gateway,
            events,
            pricing,
            settings,
        }
    }

    pub fn pricing(&self) -> &PricingPolicy {
        &self.pricing
    }

    fn emit(&self, kind: OrderEventKind, order: &Order) {
        self.events.emit(kind, order);
    }
}
