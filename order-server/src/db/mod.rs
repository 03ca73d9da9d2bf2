//! Persistence seams
//!
//! The engine talks to three traits: [`CatalogStore`], [`ScheduleProvider`]
//! and [`OrderStore`]. Two backends implement all of them:
//! [`postgres::PgStore`] (sqlx) and [`memory::MemoryStore`].
//!
//! Every write that needs to be atomic is a single trait call so that each
//! backend can use its own transaction primitive:
//! - [`OrderStore::insert_reserving_stock`]: conditional stock decrements
//!   and the order insert commit together, and the idempotency key is
//!   unique at the storage layer.
//! - [`OrderStore::modify`]: locked read-modify-write of one order.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use chrono::NaiveDate;
use shared::models::{Product, Restaurant, TrainSchedule};
use shared::order::{Order, OrderStatus};
use std::sync::Arc;
use thiserror::Error;

use crate::orders::error::OrderError;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Product not found: {0}")]
    ProductNotFound(i64),

    #[error("Stock of product {0} cannot go below zero")]
    StockUnderflow(i64),

    #[error("Idempotency key {0} conflicted but no order holds it")]
    IdempotencyRace(String),
}

/// Units of one product taken from stock at checkout
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StockReservation {
    pub product_id: i64,
    pub qty: u32,
}

/// Result of [`OrderStore::insert_reserving_stock`]
#[derive(Debug)]
pub enum CreateOutcome {
    Created,
    /// The idempotency key is already held by this order. Nothing was written.
    Duplicate(Box<Order>),
    /// A conditional decrement failed. Nothing was written.
    OutOfStock { product_id: i64 },
}

/// Result of [`OrderStore::modify`]
#[derive(Debug)]
pub struct Modified {
    pub order: Order,
    /// False when the mutation chose to leave the order untouched
    pub changed: bool,
}

/// In-place change applied under the order's lock. Returns `Ok(true)` to
/// persist, `Ok(false)` to keep the stored order as is.
pub type Mutation<'a> = Box<dyn FnOnce(&mut Order) -> Result<bool, OrderError> + Send + 'a>;

#[derive(Debug, Clone, Default)]
pub struct OrderFilter {
    pub user_id: Option<String>,
    pub status: Option<OrderStatus>,
    pub limit: u32,
    pub offset: u32,
}

#[async_trait]
pub trait CatalogStore: Send + Sync {
    async fn find_products_by_ids(&self, ids: &[i64]) -> Result<Vec<Product>, StoreError>;

    /// Add `delta` units to a product's stock. No-op for unlimited stock.
    async fn adjust_stock(&self, product_id: i64, delta: i64) -> Result<(), StoreError>;

    async fn upsert_product(&self, product: &Product) -> Result<(), StoreError>;

    async fn find_restaurant(&self, id: i64) -> Result<Option<Restaurant>, StoreError>;

    async fn upsert_restaurant(&self, restaurant: &Restaurant) -> Result<(), StoreError>;
}

#[async_trait]
pub trait ScheduleProvider: Send + Sync {
    async fn find_schedule(
        &self,
        train_no: &str,
        date: NaiveDate,
    ) -> Result<Option<TrainSchedule>, StoreError>;

    /// Insert or replace the timetable for `(train_no, date)`
    async fn upsert_schedule(&self, schedule: &TrainSchedule) -> Result<(), StoreError>;
}

#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Reserve stock for every line and insert the order, all or nothing.
    async fn insert_reserving_stock(
        &self,
        order: &Order,
        reservations: &[StockReservation],
    ) -> Result<CreateOutcome, StoreError>;

    async fn find_by_id(&self, id: &str) -> Result<Option<Order>, StoreError>;

    async fn find_by_idempotency_key(&self, key: &str) -> Result<Option<Order>, StoreError>;

    async fn find_by_gateway_id(&self, gateway_id: &str) -> Result<Option<Order>, StoreError>;

    /// Newest first, plus the total number of matches
    async fn list(&self, filter: &OrderFilter) -> Result<(Vec<Order>, u64), StoreError>;

    /// Atomically load, mutate and save one order
    async fn modify(&self, id: &str, mutation: Mutation<'_>) -> Result<Modified, OrderError>;
}

/// The three store handles the engine needs
#[derive(Clone)]
pub struct Stores {
    pub catalog: Arc<dyn CatalogStore>,
    pub schedules: Arc<dyn ScheduleProvider>,
    pub orders: Arc<dyn OrderStore>,
}

impl Stores {
    /// Use one backend for all three roles
    pub fn from_backend<S>(backend: Arc<S>) -> Self
    where
        S: CatalogStore + ScheduleProvider + OrderStore + 'static,
    {
        Self {
            catalog: backend.clone(),
            schedules: backend.clone(),
            orders: backend,
        }
    }
}

/// Merge lines for the same product so each product is decremented once.
/// Sorted by product id so concurrent checkouts lock rows in the same order.
pub fn aggregate_reservations(lines: impl IntoIterator<Item = (i64, u32)>) -> Vec<StockReservation> {
    let mut merged: std::collections::BTreeMap<i64, u32> = std::collections::BTreeMap::new();
    for (product_id, qty) in lines {
        let entry = merged.entry(product_id).or_default();
        *entry = entry.saturating_add(qty);
    }
    merged
        .into_iter()
        .map(|(product_id, qty)| StockReservation { product_id, qty })
        .collect()
}
