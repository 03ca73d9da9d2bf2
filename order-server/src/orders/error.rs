//! Order engine errors
//!
//! Domain failures stay typed inside the engine and become an [`AppError`]
//! only at the HTTP boundary.

use shared::error::{AppError, ErrorCode};
use shared::order::OrderStatus;
use thiserror::Error;

use crate::db::StoreError;
use crate::gateway::{GatewayError, WebhookError};

#[derive(Debug, Error)]
pub enum OrderError {
    #[error("{message}")]
    Validation {
        code: ErrorCode,
        field: String,
        message: String,
    },

    #[error("{0}")]
    PermissionDenied(String),

    #[error("Order not found: {0}")]
    OrderNotFound(String),

    #[error("Product not found: {0}")]
    ProductNotFound(i64),

    #[error("Restaurant not found: {0}")]
    RestaurantNotFound(i64),

    #[error("Product {0} is not available")]
    ProductUnavailable(i64),

    #[error("Insufficient stock for product {product_id} (requested {requested})")]
    OutOfStock { product_id: i64, requested: u32 },

    #[error("Cannot move order {order_id} from {from} to {to}")]
    InvalidTransition {
        order_id: String,
        from: OrderStatus,
        to: OrderStatus,
    },

    #[error("Order cannot be cancelled in status {0}")]
    NotCancellable(OrderStatus),

    #[error("Idempotency key is already used by another order")]
    DuplicateIdempotencyKey,

    #[error("Payment amount mismatch: expected {expected}, gateway reports {actual}")]
    AmountMismatch { expected: i64, actual: i64 },

    #[error("Payment intent does not belong to this order")]
    IntentMismatch,

    #[error("Only delivered orders can be rated (status {0})")]
    NotRateable(OrderStatus),

    #[error("Order has already been rated")]
    AlreadyRated,

    #[error("Payment gateway error: {0}")]
    Gateway(#[from] GatewayError),

    #[error("Webhook rejected: {0}")]
    Webhook(#[from] WebhookError),

    #[error("Storage error: {0}")]
    Storage(#[from] StoreError),
}

impl OrderError {
    pub fn invalid(code: ErrorCode, field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            code,
            field: field.into(),
            message: message.into(),
        }
    }
}

impl From<OrderError> for AppError {
    fn from(err: OrderError) -> Self {
        let message = err.to_string();
        match err {
            OrderError::Validation { code, field, .. } => {
                AppError::invalid_field(code, field, message)
            }
            OrderError::PermissionDenied(_) => AppError::permission_denied(message),
            OrderError::OrderNotFound(id) => {
                AppError::with_message(ErrorCode::OrderNotFound, message).with_detail("order_id", id)
            }
            OrderError::ProductNotFound(id) => {
                AppError::with_message(ErrorCode::ProductNotFound, message)
                    .with_detail("product_id", id)
            }
            OrderError::RestaurantNotFound(id) => {
                AppError::with_message(ErrorCode::RestaurantNotFound, message)
                    .with_detail("restaurant_id", id)
            }
            OrderError::ProductUnavailable(id) => {
                AppError::with_message(ErrorCode::ProductUnavailable, message)
                    .with_detail("product_id", id)
            }
            OrderError::OutOfStock {
                product_id,
                requested,
            } => AppError::conflict(ErrorCode::ProductOutOfStock, message)
                .with_detail("product_id", product_id)
                .with_detail("requested", requested),
            OrderError::InvalidTransition { from, to, .. } => {
                AppError::conflict(ErrorCode::InvalidStatusTransition, message)
                    .with_detail("from", from.as_str())
                    .with_detail("to", to.as_str())
            }
            OrderError::NotCancellable(status) => {
                AppError::conflict(ErrorCode::OrderNotCancellable, message)
                    .with_detail("status", status.as_str())
            }
            OrderError::DuplicateIdempotencyKey => {
                AppError::conflict(ErrorCode::DuplicateIdempotencyKey, message)
            }
            OrderError::AmountMismatch { expected, actual } => {
                AppError::conflict(ErrorCode::PaymentAmountMismatch, message)
                    .with_detail("expected", expected)
                    .with_detail("actual", actual)
            }
            OrderError::IntentMismatch => {
                AppError::conflict(ErrorCode::PaymentIntentMismatch, message)
            }
            OrderError::NotRateable(status) => {
                AppError::conflict(ErrorCode::OrderNotRateable, message)
                    .with_detail("status", status.as_str())
            }
            OrderError::AlreadyRated => AppError::conflict(ErrorCode::OrderAlreadyRated, message),
            OrderError::Gateway(e) => {
                tracing::warn!(error = %e, retryable = e.is_retryable(), "Payment gateway call failed");
                let code = if e.is_retryable() {
                    ErrorCode::PaymentGatewayUnavailable
                } else {
                    ErrorCode::PaymentGatewayRejected
                };
                AppError::with_message(code, message)
            }
            OrderError::Webhook(_) => {
                AppError::with_message(ErrorCode::WebhookSignatureInvalid, message)
            }
            OrderError::Storage(StoreError::IdempotencyRace(_)) => {
                AppError::conflict(ErrorCode::ConcurrentModification, message)
            }
            OrderError::Storage(e) => {
                tracing::error!(error = %e, "Order storage failure");
                AppError::new(ErrorCode::DatabaseError)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::StatusCode;

    #[test]
    fn test_taxonomy_to_http_status() {
        let cases: Vec<(OrderError, StatusCode)> = vec![
            (
                OrderError::invalid(ErrorCode::InvalidQuantity, "items[0].qty", "too many"),
                StatusCode::BAD_REQUEST,
            ),
            (OrderError::OrderNotFound("o-1".into()), StatusCode::NOT_FOUND),
            (OrderError::ProductNotFound(7), StatusCode::NOT_FOUND),
            (
                OrderError::PermissionDenied("not yours".into()),
                StatusCode::FORBIDDEN,
            ),
            (
                OrderError::NotCancellable(OrderStatus::Delivered),
                StatusCode::CONFLICT,
            ),
            (
                OrderError::OutOfStock {
                    product_id: 1,
                    requested: 3,
                },
                StatusCode::CONFLICT,
            ),
            (
                OrderError::Gateway(GatewayError::Timeout),
                StatusCode::SERVICE_UNAVAILABLE,
            ),
            (
                OrderError::Gateway(GatewayError::Upstream {
                    status: 402,
                    message: "card declined".into(),
                }),
                StatusCode::BAD_GATEWAY,
            ),
            (
                OrderError::Webhook(WebhookError::SignatureMismatch),
                StatusCode::BAD_REQUEST,
            ),
            (
                OrderError::Storage(StoreError::IdempotencyRace("k".into())),
                StatusCode::CONFLICT,
            ),
            (
                OrderError::Storage(StoreError::StockUnderflow(1)),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, expected) in cases {
            let label = format!("{err:?}");
            assert_eq!(AppError::from(err).http_status(), expected, "{label}");
        }
    }

    #[test]
    fn test_validation_carries_field() {
        let app: AppError =
            OrderError::invalid(ErrorCode::InvalidDeliveryInfo, "delivery_info.seat", "missing")
                .into();
        assert_eq!(app.code, ErrorCode::InvalidDeliveryInfo);
        let details = app.details.unwrap();
        assert_eq!(details["field"], "delivery_info.seat");
    }

    #[test]
    fn test_transition_details() {
        let app: AppError = OrderError::InvalidTransition {
            order_id: "o-1".into(),
            from: OrderStatus::Pending,
            to: OrderStatus::Delivered,
        }
        .into();
        let details = app.details.unwrap();
        assert_eq!(details["from"], "PENDING");
        assert_eq!(details["to"], "DELIVERED");
    }

    #[test]
    fn test_storage_details_not_exposed() {
        let app: AppError = OrderError::Storage(StoreError::ProductNotFound(42)).into();
        assert_eq!(app.code, ErrorCode::DatabaseError);
        assert!(!app.message.contains("42"));
    }
}
