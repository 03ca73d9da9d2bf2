//! Order endpoints: checkout, list, detail, tracking and lifecycle changes

use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
};
use shared::error::{ApiResponse, AppError};
use shared::order::{
    AssignRequest, CancelRequest, CreateOrderRequest, CreateOrderResponse, Order, OrderPage,
    OrdersQuery, RateOrderRequest, TrackingView, UpdateStatusRequest,
};

use super::ApiResult;
use crate::auth::Principal;
use crate::state::AppState;

const IDEMPOTENCY_HEADER: &str = "idempotency-key";

/// POST /api/orders
///
/// The idempotency key may come in the body or the `Idempotency-Key`
/// header; the body wins when both are present. A replayed request answers
/// 200 instead of 201.
pub async fn create_order(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    headers: HeaderMap,
    Json(mut req): Json<CreateOrderRequest>,
) -> Result<(StatusCode, ApiResponse<CreateOrderResponse>), AppError> {
    if req.idempotency_key.is_none()
        && let Some(key) = headers
            .get(IDEMPOTENCY_HEADER)
            .and_then(|v| v.to_str().ok())
    {
        req.idempotency_key = Some(key.to_string());
    }

    let resp = state.engine.create_order(&principal, req).await?;
    let status = if resp.replayed {
        StatusCode::OK
    } else {
        StatusCode::CREATED
    };
    Ok((status, ApiResponse::success(resp)))
}

/// GET /api/orders?status=&page=&per_page=
pub async fn list_orders(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Query(query): Query<OrdersQuery>,
) -> ApiResult<OrderPage> {
    let page = state.engine.list_orders(&principal, query).await?;
    Ok(ApiResponse::success(page))
}

/// GET /api/orders/{id}
pub async fn get_order(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<String>,
) -> ApiResult<Order> {
    let order = state.engine.get_order(&principal, &id).await?;
    Ok(ApiResponse::success(order))
}

/// GET /api/orders/{id}/track
pub async fn track_order(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<String>,
) -> ApiResult<TrackingView> {
    let view = state.engine.track_order(&principal, &id).await?;
    Ok(ApiResponse::success(view))
}

/// PATCH /api/orders/{id}/status
pub async fn update_status(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<String>,
    Json(req): Json<UpdateStatusRequest>,
) -> ApiResult<Order> {
    let order = state.engine.update_status(&principal, &id, req).await?;
    Ok(ApiResponse::success(order))
}

/// POST /api/orders/{id}/assign
pub async fn assign_order(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<String>,
    Json(req): Json<AssignRequest>,
) -> ApiResult<Order> {
    let order = state.engine.assign_order(&principal, &id, req).await?;
    Ok(ApiResponse::success(order))
}

/// POST /api/orders/{id}/cancel
pub async fn cancel_order(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<String>,
    body: Option<Json<CancelRequest>>,
) -> ApiResult<Order> {
    let req = body.map(|Json(req)| req).unwrap_or_default();
    let order = state.engine.cancel_order(&principal, &id, req).await?;
    Ok(ApiResponse::success(order))
}

/// POST /api/orders/{id}/rating
pub async fn rate_order(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<String>,
    Json(req): Json<RateOrderRequest>,
) -> ApiResult<Order> {
    let order = state.engine.rate_order(&principal, &id, req).await?;
    Ok(ApiResponse::success(order))
}
