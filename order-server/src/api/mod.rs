//! HTTP routes for the order server

pub mod admin;
pub mod health;
pub mod orders;
pub mod payments;

use axum::routing::{get, patch, post, put};
use axum::{Router, middleware};
use shared::error::{ApiResponse, AppError};
use tower::ServiceBuilder;
use tower::limit::ConcurrencyLimitLayer;
use tower_http::trace::TraceLayer;

use crate::auth::jwt::auth_middleware;
use crate::auth::rate_limit::checkout_rate_limit;
use crate::state::AppState;

pub type ApiResult<T> = Result<ApiResponse<T>, AppError>;

/// In-flight requests per route; the rest wait for a slot
const MAX_IN_FLIGHT: usize = 1024;

/// Create the combined router
pub fn create_router(state: AppState) -> Router {
    // Checkout is throttled per client; listing is not
    let checkout = post(orders::create_order).layer(middleware::from_fn_with_state(
        state.clone(),
        checkout_rate_limit,
    ));

    // Bearer token required
    let authenticated = Router::new()
        .route("/api/orders", get(orders::list_orders).merge(checkout))
        .route("/api/orders/{id}", get(orders::get_order))
        .route("/api/orders/{id}/track", get(orders::track_order))
        .route("/api/orders/{id}/status", patch(orders::update_status))
        .route("/api/orders/{id}/assign", post(orders::assign_order))
        .route("/api/orders/{id}/cancel", post(orders::cancel_order))
        .route("/api/orders/{id}/rating", post(orders::rate_order))
        .route("/api/payments/confirm", post(payments::confirm_payment))
        .route("/api/admin/restaurants", put(admin::upsert_restaurant))
        .route("/api/admin/products", put(admin::upsert_product))
        .route("/api/admin/schedules", put(admin::upsert_schedule))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    // Gateway webhook (signature-verified, raw body)
    let webhook = Router::new().route("/api/payments/webhook", post(payments::handle_webhook));

    Router::new()
        .route("/health", get(health::health_check))
        .merge(webhook)
        .merge(authenticated)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(ConcurrencyLimitLayer::new(MAX_IN_FLIGHT)),
        )
        .with_state(state)
}
