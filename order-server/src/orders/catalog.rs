//! Admin maintenance of restaurants, products and timetables

use shared::error::ErrorCode;
use shared::models::{Product, ProductUpsert, Restaurant, RestaurantUpsert, TrainSchedule};
use shared::util::snowflake_id;

use super::OrderEngine;
use super::error::OrderError;
use super::validation::{MAX_PRICE_CENTS, optional_text};
use crate::auth::Principal;

fn require_admin(principal: &Principal) -> Result<(), OrderError> {
    if principal.is_admin() {
        Ok(())
    } else {
        Err(OrderError::PermissionDenied(
            "Admin role required".to_string(),
        ))
    }
}

impl OrderEngine {
    pub async fn upsert_restaurant(
        &self,
        principal: &Principal,
        req: RestaurantUpsert,
    ) -> Result<Restaurant, OrderError> {
        require_admin(principal)?;
        let name = optional_text(Some(&req.name)).ok_or_else(|| {
            OrderError::invalid(ErrorCode::RequiredField, "name", "name is required")
        })?;
        let station_name = optional_text(Some(&req.station_name)).ok_or_else(|| {
            OrderError::invalid(
                ErrorCode::RequiredField,
                "station_name",
                "station_name is required",
            )
        })?;

        let restaurant = Restaurant {
            id: req.id.unwrap_or_else(snowflake_id),
            name,
            station_name,
            is_active: req.is_active,
        };
        self.catalog.upsert_restaurant(&restaurant).await?;
        tracing::info!(restaurant_id = restaurant.id, "Restaurant saved");
        Ok(restaurant)
    }

    pub async fn upsert_product(
        &self,
        principal: &Principal,
        req: ProductUpsert,
    ) -> Result<Product, OrderError> {
        require_admin(principal)?;
        let name = optional_text(Some(&req.name)).ok_or_else(|| {
            OrderError::invalid(ErrorCode::RequiredField, "name", "name is required")
        })?;
        let price_range = 0..=MAX_PRICE_CENTS;
        if !price_range.contains(&req.price_cents) {
            return Err(OrderError::invalid(
                ErrorCode::ProductInvalidPrice,
                "price_cents",
                format!("price_cents must be between 0 and {MAX_PRICE_CENTS}"),
            ));
        }
        if let Some(i) = req
            .options
            .iter()
            .position(|o| !price_range.contains(&o.price_cents))
        {
            return Err(OrderError::invalid(
                ErrorCode::ProductInvalidPrice,
                format!("options[{i}].price_cents"),
                format!("option price must be between 0 and {MAX_PRICE_CENTS}"),
            ));
        }
        if self.catalog.find_restaurant(req.restaurant_id).await?.is_none() {
            return Err(OrderError::RestaurantNotFound(req.restaurant_id));
        }

        let product = Product {
            id: req.id.unwrap_or_else(snowflake_id),
            restaurant_id: req.restaurant_id,
            name,
            price_cents: req.price_cents,
            stock: req.stock,
            available: req.available,
            is_active: req.is_active,
            options: req.options,
        };
        self.catalog.upsert_product(&product).await?;
        tracing::info!(product_id = product.id, stock = ?product.stock, "Product saved");
        Ok(product)
    }

    pub async fn upsert_schedule(
        &self,
        principal: &Principal,
        schedule: TrainSchedule,
    ) -> Result<TrainSchedule, OrderError> {
        require_admin(principal)?;
        schedule
            .validate()
            .map_err(|msg| OrderError::invalid(ErrorCode::ScheduleInvalid, "stops", msg))?;
        self.schedules.upsert_schedule(&schedule).await?;
        tracing::info!(
            train_no = %schedule.train_no,
            date = %schedule.date,
            stops = schedule.stops.len(),
            "Train schedule saved"
        );
        Ok(schedule)
    }
}
