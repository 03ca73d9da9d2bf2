//! PostgreSQL backend
//!
//! Orders are stored as a JSONB document plus the columns that queries and
//! constraints need (`status`, `gateway_id`, unique `idempotency_key`).

use async_trait::async_trait;
use chrono::NaiveDate;
use shared::models::{Product, ProductOption, Restaurant, Stop, TrainSchedule};
use shared::order::Order;
use sqlx::PgPool;
use sqlx::types::Json;

use super::{
    CatalogStore, CreateOutcome, Modified, Mutation, OrderFilter, OrderStore, ScheduleProvider,
    StockReservation, StoreError,
};
use crate::orders::error::OrderError;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Connect and apply pending migrations
    pub async fn connect(database_url: &str) -> Result<Self, BoxError> {
        let pool = PgPool::connect(database_url).await?;
        sqlx::migrate!("./migrations").run(&pool).await?;
        Ok(Self { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct ProductRow {
    id: i64,
    restaurant_id: i64,
    name: String,
    price_cents: i64,
    stock: Option<i64>,
    available: bool,
    is_active: bool,
    options: Json<Vec<ProductOption>>,
}

impl From<ProductRow> for Product {
    fn from(row: ProductRow) -> Self {
        Self {
            id: row.id,
            restaurant_id: row.restaurant_id,
            name: row.name,
            price_cents: row.price_cents,
            // CHECK (stock >= 0) keeps this non-negative
            stock: row.stock.map(|s| u32::try_from(s.max(0)).unwrap_or(u32::MAX)),
            available: row.available,
            is_active: row.is_active,
            options: row.options.0,
        }
    }
}

#[derive(sqlx::FromRow)]
struct RestaurantRow {
    id: i64,
    name: String,
    station_name: String,
    is_active: bool,
}

fn db_err(e: sqlx::Error) -> OrderError {
    OrderError::Storage(StoreError::Database(e))
}

#[async_trait]
impl CatalogStore for PgStore {
    async fn find_products_by_ids(&self, ids: &[i64]) -> Result<Vec<Product>, StoreError> {
        let rows = sqlx::query_as::<_, ProductRow>(
            "SELECT id, restaurant_id, name, price_cents, stock, available, is_active, options
             FROM products WHERE id = ANY($1)",
        )
        .bind(ids)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Product::from).collect())
    }

    async fn adjust_stock(&self, product_id: i64, delta: i64) -> Result<(), StoreError> {
        let result = sqlx::query(
            "UPDATE products SET stock = stock + $1
             WHERE id = $2 AND (stock IS NULL OR stock + $1 >= 0)",
        )
        .bind(delta)
        .bind(product_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            let exists: Option<(i64,)> = sqlx::query_as("SELECT id FROM products WHERE id = $1")
                .bind(product_id)
                .fetch_optional(&self.pool)
                .await?;
            return Err(match exists {
                Some(_) => StoreError::StockUnderflow(product_id),
                None => StoreError::ProductNotFound(product_id),
            });
        }
        Ok(())
    }

    async fn upsert_product(&self, product: &Product) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO products (id, restaurant_id, name, price_cents, stock, available, is_active, options)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (id) DO UPDATE SET
                restaurant_id = EXCLUDED.restaurant_id,
                name = EXCLUDED.name,
                price_cents = EXCLUDED.price_cents,
                stock = EXCLUDED.stock,
                available = EXCLUDED.available,
                is_active = EXCLUDED.is_active,
                options = EXCLUDED.options
            "#,
        )
        .bind(product.id)
        .bind(product.restaurant_id)
        .bind(&product.name)
        .bind(product.price_cents)
        .bind(product.stock.map(i64::from))
        .bind(product.available)
        .bind(product.is_active)
        .bind(Json(&product.options))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn find_restaurant(&self, id: i64) -> Result<Option<Restaurant>, StoreError> {
        let row = sqlx::query_as::<_, RestaurantRow>(
            "SELECT id, name, station_name, is_active FROM restaurants WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|r| Restaurant {
            id: r.id,
            name: r.name,
            station_name: r.station_name,
            is_active: r.is_active,
        }))
    }

    async fn upsert_restaurant(&self, restaurant: &Restaurant) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO restaurants (id, name, station_name, is_active)
             VALUES ($1, $2, $3, $4)
             ON CONFLICT (id) DO UPDATE SET
                name = EXCLUDED.name,
                station_name = EXCLUDED.station_name,
                is_active = EXCLUDED.is_active",
        )
        .bind(restaurant.id)
        .bind(&restaurant.name)
        .bind(&restaurant.station_name)
        .bind(restaurant.is_active)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl ScheduleProvider for PgStore {
    async fn find_schedule(
        &self,
        train_no: &str,
        date: NaiveDate,
    ) -> Result<Option<TrainSchedule>, StoreError> {
        let row: Option<(Json<Vec<Stop>>,)> = sqlx::query_as(
            "SELECT stops FROM train_schedules WHERE train_no = $1 AND service_date = $2",
        )
        .bind(train_no)
        .bind(date)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|(stops,)| TrainSchedule {
            train_no: train_no.to_string(),
            date,
            stops: stops.0,
        }))
    }

    async fn upsert_schedule(&self, schedule: &TrainSchedule) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO train_schedules (train_no, service_date, stops)
             VALUES ($1, $2, $3)
             ON CONFLICT (train_no, service_date) DO UPDATE SET stops = EXCLUDED.stops",
        )
        .bind(&schedule.train_no)
        .bind(schedule.date)
        .bind(Json(&schedule.stops))
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl OrderStore for PgStore {
    async fn insert_reserving_stock(
        &self,
        order: &Order,
        reservations: &[StockReservation],
    ) -> Result<CreateOutcome, StoreError> {
        let mut tx = self.pool.begin().await?;

        for r in reservations {
            // Conditional decrement: never below zero, unlimited stays NULL
            let result = sqlx::query(
                "UPDATE products SET stock = stock - $1
                 WHERE id = $2 AND (stock IS NULL OR stock >= $1)",
            )
            .bind(i64::from(r.qty))
            .bind(r.product_id)
            .execute(&mut *tx)
            .await?;
            if result.rows_affected() == 0 {
                tx.rollback().await?;
                return Ok(CreateOutcome::OutOfStock {
                    product_id: r.product_id,
                });
            }
        }

        let inserted = sqlx::query(
            r#"
            INSERT INTO orders (id, order_number, user_id, status, payment_status, gateway_id,
                                idempotency_key, created_at, updated_at, document)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            ON CONFLICT (idempotency_key) DO NOTHING
            "#,
        )
        .bind(&order.id)
        .bind(&order.order_number)
        .bind(&order.user_id)
        .bind(order.status.as_str())
        .bind(order.payment.status.as_str())
        .bind(&order.payment.gateway_id)
        .bind(&order.idempotency_key)
        .bind(order.created_at)
        .bind(order.updated_at)
        .bind(Json(order))
        .execute(&mut *tx)
        .await?;

        if inserted.rows_affected() == 0 {
            tx.rollback().await?;
            let key = order.idempotency_key.clone().unwrap_or_default();
            let existing = self
                .find_by_idempotency_key(&key)
                .await?
                .ok_or(StoreError::IdempotencyRace(key))?;
            return Ok(CreateOutcome::Duplicate(Box::new(existing)));
        }

        tx.commit().await?;
        Ok(CreateOutcome::Created)
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<Order>, StoreError> {
        let row: Option<(Json<Order>,)> =
            sqlx::query_as("SELECT document FROM orders WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.map(|(doc,)| doc.0))
    }

    async fn find_by_idempotency_key(&self, key: &str) -> Result<Option<Order>, StoreError> {
        let row: Option<(Json<Order>,)> =
            sqlx::query_as("SELECT document FROM orders WHERE idempotency_key = $1")
                .bind(key)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.map(|(doc,)| doc.0))
    }

    async fn find_by_gateway_id(&self, gateway_id: &str) -> Result<Option<Order>, StoreError> {
        let row: Option<(Json<Order>,)> =
            sqlx::query_as("SELECT document FROM orders WHERE gateway_id = $1")
                .bind(gateway_id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.map(|(doc,)| doc.0))
    }

    async fn list(&self, filter: &OrderFilter) -> Result<(Vec<Order>, u64), StoreError> {
        let status = filter.status.map(|s| s.as_str());

        let (total,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM orders
             WHERE ($1::TEXT IS NULL OR user_id = $1)
               AND ($2::TEXT IS NULL OR status = $2)",
        )
        .bind(&filter.user_id)
        .bind(status)
        .fetch_one(&self.pool)
        .await?;

        let rows: Vec<(Json<Order>,)> = sqlx::query_as(
            "SELECT document FROM orders
             WHERE ($1::TEXT IS NULL OR user_id = $1)
               AND ($2::TEXT IS NULL OR status = $2)
             ORDER BY created_at DESC, id DESC
             LIMIT $3 OFFSET $4",
        )
        .bind(&filter.user_id)
        .bind(status)
        .bind(i64::from(filter.limit))
        .bind(i64::from(filter.offset))
        .fetch_all(&self.pool)
        .await?;

        Ok((
            rows.into_iter().map(|(doc,)| doc.0).collect(),
            u64::try_from(total).unwrap_or_default(),
        ))
    }

    async fn modify(&self, id: &str, mutation: Mutation<'_>) -> Result<Modified, OrderError> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;

        let row: Option<(Json<Order>,)> =
            sqlx::query_as("SELECT document FROM orders WHERE id = $1 FOR UPDATE")
                .bind(id)
                .fetch_optional(&mut *tx)
                .await
                .map_err(db_err)?;
        let Some((Json(mut order),)) = row else {
            return Err(OrderError::OrderNotFound(id.to_string()));
        };

        // Dropping the transaction on error rolls back and releases the row lock
        if !mutation(&mut order)? {
            tx.commit().await.map_err(db_err)?;
            return Ok(Modified {
                order,
                changed: false,
            });
        }

        sqlx::query(
            "UPDATE orders SET status = $1, payment_status = $2, gateway_id = $3,
                               updated_at = $4, document = $5
             WHERE id = $6",
        )
        .bind(order.status.as_str())
        .bind(order.payment.status.as_str())
        .bind(&order.payment.gateway_id)
        .bind(order.updated_at)
        .bind(Json(&order))
        .bind(id)
        .execute(&mut *tx)
        .await
        .map_err(db_err)?;
        tx.commit().await.map_err(db_err)?;

        Ok(Modified {
            order,
            changed: true,
        })
    }
}
