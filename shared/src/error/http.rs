//! HTTP status code mapping for error codes

use super::codes::ErrorCode;
use http::StatusCode;

impl ErrorCode {
    /// Get the appropriate HTTP status code for this error code
    pub fn http_status(&self) -> StatusCode {
        match self {
            Self::Success => StatusCode::OK,

            Self::NotFound
            | Self::OrderNotFound
            | Self::ProductNotFound
            | Self::RestaurantNotFound
            | Self::ScheduleNotFound => StatusCode::NOT_FOUND,

            Self::AlreadyExists
            | Self::InvalidStatusTransition
            | Self::OrderNotCancellable
            | Self::DuplicateIdempotencyKey
            | Self::ConcurrentModification
            | Self::OrderNotRateable
            | Self::OrderAlreadyRated
            | Self::ProductOutOfStock
            | Self::ProductUnavailable
            | Self::PaymentAmountMismatch
            | Self::PaymentIntentMismatch
            | Self::PaymentAlreadyRefunded => StatusCode::CONFLICT,

            Self::NotAuthenticated | Self::TokenExpired | Self::TokenInvalid => {
                StatusCode::UNAUTHORIZED
            }

            Self::PermissionDenied | Self::RoleRequired | Self::AdminRequired => {
                StatusCode::FORBIDDEN
            }

            Self::TooManyRequests => StatusCode::TOO_MANY_REQUESTS,

            // Transient, client can retry
            Self::PaymentGatewayUnavailable | Self::NetworkError | Self::TimeoutError => {
                StatusCode::SERVICE_UNAVAILABLE
            }

            Self::PaymentGatewayRejected => StatusCode::BAD_GATEWAY,

            Self::InternalError | Self::DatabaseError | Self::ConfigError => {
                StatusCode::INTERNAL_SERVER_ERROR
            }

            // Validation and business rule errors
            _ => StatusCode::BAD_REQUEST,
        }
    }
}
