//! Admin catalog and timetable maintenance

use axum::{Extension, Json, extract::State};
use shared::error::ApiResponse;
use shared::models::{Product, ProductUpsert, Restaurant, RestaurantUpsert, TrainSchedule};

use super::ApiResult;
use crate::auth::Principal;
use crate::state::AppState;

/// PUT /api/admin/restaurants
pub async fn upsert_restaurant(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Json(req): Json<RestaurantUpsert>,
) -> ApiResult<Restaurant> {
    let restaurant = state.engine.upsert_restaurant(&principal, req).await?;
    Ok(ApiResponse::success(restaurant))
}

/// PUT /api/admin/products
pub async fn upsert_product(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Json(req): Json<ProductUpsert>,
) -> ApiResult<Product> {
    let product = state.engine.upsert_product(&principal, req).await?;
    Ok(ApiResponse::success(product))
}

/// PUT /api/admin/schedules
pub async fn upsert_schedule(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Json(schedule): Json<TrainSchedule>,
) -> ApiResult<TrainSchedule> {
    let schedule = state.engine.upsert_schedule(&principal, schedule).await?;
    Ok(ApiResponse::success(schedule))
}
