//! Process-local backend
//!
//! One `parking_lot` mutex guards the whole dataset, which makes the
//! multi-step writes (`insert_reserving_stock`, `modify`) trivially atomic.
//! Used by the test suite and by single-instance development runs.

use async_trait::async_trait;
use chrono::NaiveDate;
use parking_lot::Mutex;
use shared::models::{Product, Restaurant, TrainSchedule};
use shared::order::Order;
use std::collections::HashMap;

use super::{
    CatalogStore, CreateOutcome, Modified, Mutation, OrderFilter, OrderStore, ScheduleProvider,
    StockReservation, StoreError,
};
use crate::orders::error::OrderError;

#[derive(Default)]
struct Inner {
    restaurants: HashMap<i64, Restaurant>,
    products: HashMap<i64, Product>,
    schedules: HashMap<(String, NaiveDate), TrainSchedule>,
    orders: HashMap<String, Order>,
    /// idempotency key -> order id
    idempotency: HashMap<String, String>,
    /// gateway intent id -> order id
    gateway_ids: HashMap<String, String>,
}

#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current stock of a product (`None` if unknown or unlimited)
    pub fn stock_of(&self, product_id: i64) -> Option<u32> {
        self.inner
            .lock()
            .products
            .get(&product_id)
            .and_then(|p| p.stock)
    }

    pub fn order_count(&self) -> usize {
        self.inner.lock().orders.len()
    }
}

#[async_trait]
impl CatalogStore for MemoryStore {
    async fn find_products_by_ids(&self, ids: &[i64]) -> Result<Vec<Product>, StoreError> {
        let inner = self.inner.lock();
        Ok(ids
            .iter()
            .filter_map(|id| inner.products.get(id).cloned())
            .collect())
    }

    async fn adjust_stock(&self, product_id: i64, delta: i64) -> Result<(), StoreError> {
        let mut inner = self.inner.lock();
        let product = inner
            .products
            .get_mut(&product_id)
            .ok_or(StoreError::ProductNotFound(product_id))?;
        if let Some(stock) = product.stock {
            let next = i64::from(stock) + delta;
            if next < 0 {
                return Err(StoreError::StockUnderflow(product_id));
            }
            product.stock = Some(u32::try_from(next).unwrap_or(u32::MAX));
        }
        Ok(())
    }

    async fn upsert_product(&self, product: &Product) -> Result<(), StoreError> {
        self.inner
            .lock()
            .products
            .insert(product.id, product.clone());
        Ok(())
    }

    async fn find_restaurant(&self, id: i64) -> Result<Option<Restaurant>, StoreError> {
        Ok(self.inner.lock().restaurants.get(&id).cloned())
    }

    async fn upsert_restaurant(&self, restaurant: &Restaurant) -> Result<(), StoreError> {
        self.inner
            .lock()
            .restaurants
            .insert(restaurant.id, restaurant.clone());
        Ok(())
    }
}

#[async_trait]
impl ScheduleProvider for MemoryStore {
    async fn find_schedule(
        &self,
        train_no: &str,
        date: NaiveDate,
    ) -> Result<Option<TrainSchedule>, StoreError> {
        Ok(self
            .inner
            .lock()
            .schedules
            .get(&(train_no.to_string(), date))
            .cloned())
    }

    async fn upsert_schedule(&self, schedule: &TrainSchedule) -> Result<(), StoreError> {
        self.inner.lock().schedules.insert(
            (schedule.train_no.clone(), schedule.date),
            schedule.clone(),
        );
        Ok(())
    }
}

#[async_trait]
impl OrderStore for MemoryStore {
    async fn insert_reserving_stock(
        &self,
        order: &Order,
        reservations: &[StockReservation],
    ) -> Result<CreateOutcome, StoreError> {
        let mut inner = self.inner.lock();

        if let Some(key) = &order.idempotency_key
            && let Some(existing) = inner
                .idempotency
                .get(key)
                .and_then(|id| inner.orders.get(id))
        {
            return Ok(CreateOutcome::Duplicate(Box::new(existing.clone())));
        }

        // Check every line before touching anything
        for r in reservations {
            let enough = inner
                .products
                .get(&r.product_id)
                .is_some_and(|p| p.has_stock_for(r.qty));
            if !enough {
                return Ok(CreateOutcome::OutOfStock {
                    product_id: r.product_id,
                });
            }
        }
        for r in reservations {
            if let Some(product) = inner.products.get_mut(&r.product_id)
                && let Some(stock) = product.stock.as_mut()
            {
                *stock -= r.qty;
            }
        }

        if let Some(key) = &order.idempotency_key {
            inner.idempotency.insert(key.clone(), order.id.clone());
        }
        if let Some(gateway_id) = &order.payment.gateway_id {
            inner.gateway_ids.insert(gateway_id.clone(), order.id.clone());
        }
        inner.orders.insert(order.id.clone(), order.clone());
        Ok(CreateOutcome::Created)
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<Order>, StoreError> {
        Ok(self.inner.lock().orders.get(id).cloned())
    }

    async fn find_by_idempotency_key(&self, key: &str) -> Result<Option<Order>, StoreError> {
        let inner = self.inner.lock();
        Ok(inner
            .idempotency
            .get(key)
            .and_then(|id| inner.orders.get(id))
            .cloned())
    }

    async fn find_by_gateway_id(&self, gateway_id: &str) -> Result<Option<Order>, StoreError> {
        let inner = self.inner.lock();
        Ok(inner
            .gateway_ids
            .get(gateway_id)
            .and_then(|id| inner.orders.get(id))
            .cloned())
    }

    async fn list(&self, filter: &OrderFilter) -> Result<(Vec<Order>, u64), StoreError> {
        let inner = self.inner.lock();
        let mut matched: Vec<&Order> = inner
            .orders
            .values()
            .filter(|o| filter.user_id.as_ref().is_none_or(|u| &o.user_id == u))
            .filter(|o| filter.status.is_none_or(|s| o.status == s))
            .collect();
        matched.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| b.id.cmp(&a.id)));

        let total = matched.len() as u64;
        let page = matched
            .into_iter()
            .skip(filter.offset as usize)
            .take(filter.limit as usize)
            .cloned()
            .collect();
        Ok((page, total))
    }

    async fn modify(&self, id: &str, mutation: Mutation<'_>) -> Result<Modified, OrderError> {
        let mut inner = self.inner.lock();
        let stored = inner
            .orders
            .get(id)
            .ok_or_else(|| OrderError::OrderNotFound(id.to_string()))?;

        // Work on a copy so a failed mutation leaves the stored order intact
        let mut order = stored.clone();
        if !mutation(&mut order)? {
            return Ok(Modified {
                order,
                changed: false,
            });
        }

        if let Some(gateway_id) = &order.payment.gateway_id {
            inner.gateway_ids.insert(gateway_id.clone(), order.id.clone());
        }
        inner.orders.insert(order.id.clone(), order.clone());
        Ok(Modified {
            order,
            changed: true,
        })
    }
}
