//! Error codes shared by the order server and its clients
//!
//! Codes are grouped by range (see the module docs of [`crate::error`]).
//! The numeric value is part of the wire contract: never renumber a variant.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Unified error code enum, serialized as its `u16` value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u16", try_from = "u16")]
#[repr(u16)]
pub enum ErrorCode {
    // ==================== 0xxx: General ====================
    /// Operation completed successfully
    Success = 0,
    /// Unknown error
    Unknown = 1,
    /// Validation failed
    ValidationFailed = 2,
    /// Resource not found
    NotFound = 3,
    /// Resource already exists
    AlreadyExists = 4,
    /// Invalid request
    InvalidRequest = 5,
    /// Required field missing
    RequiredField = 7,
    /// Value out of range
    ValueOutOfRange = 8,
    /// Too many requests from this client
    TooManyRequests = 9,

    // ==================== 1xxx: Auth ====================
    /// Caller is not authenticated
    NotAuthenticated = 1001,
    /// Token has expired
    TokenExpired = 1003,
    /// Token is invalid
    TokenInvalid = 1004,

    // ==================== 2xxx: Permission ====================
    /// Permission denied
    PermissionDenied = 2001,
    /// Specific role required
    RoleRequired = 2002,
    /// Admin role required
    AdminRequired = 2003,

    // ==================== 3xxx: Schedule ====================
    /// No timetable for the train on the requested date
    ScheduleNotFound = 3001,
    /// The station is not a stop of the train
    StationNotOnRoute = 3002,
    /// Timetable payload is malformed
    ScheduleInvalid = 3003,

    // ==================== 4xxx: Order ====================
    /// Order not found
    OrderNotFound = 4001,
    /// Order has no items
    OrderEmpty = 4002,
    /// Item quantity outside the accepted range
    InvalidQuantity = 4003,
    /// Delivery details missing or malformed
    InvalidDeliveryInfo = 4004,
    /// Status change not allowed from the current status
    InvalidStatusTransition = 4005,
    /// Order can no longer be cancelled
    OrderNotCancellable = 4006,
    /// Idempotency key already used by another order
    DuplicateIdempotencyKey = 4007,
    /// Order was modified concurrently
    ConcurrentModification = 4008,
    /// Order is not in a state that accepts a rating
    OrderNotRateable = 4009,
    /// Order has already been rated
    OrderAlreadyRated = 4010,

    // ==================== 5xxx: Payment ====================
    /// Payment processing failed
    PaymentFailed = 5001,
    /// Invalid payment method
    PaymentInvalidMethod = 5003,
    /// Payment has already been refunded
    PaymentAlreadyRefunded = 5004,
    /// Charged amount differs from the order total
    PaymentAmountMismatch = 5010,
    /// Payment intent does not belong to the order
    PaymentIntentMismatch = 5011,
    /// Payment gateway unreachable or failing, retry later
    PaymentGatewayUnavailable = 5012,
    /// Payment gateway rejected the request
    PaymentGatewayRejected = 5013,
    /// Webhook signature missing or invalid
    WebhookSignatureInvalid = 5014,

    // ==================== 6xxx: Product ====================
    /// Product not found
    ProductNotFound = 6001,
    /// Product has invalid price
    ProductInvalidPrice = 6002,
    /// Product is out of stock
    ProductOutOfStock = 6003,
    /// Product is disabled or unavailable
    ProductUnavailable = 6004,
    /// Selected option does not exist on the product
    ProductOptionNotFound = 6005,
    /// Restaurant not found
    RestaurantNotFound = 6101,

    // ==================== 7xxx: Delivery ====================
    /// Delivery agent identity missing
    DriverRequired = 7001,
    /// Driver location outside valid coordinates
    InvalidDriverLocation = 7002,

    // ==================== 9xxx: System ====================
    /// Internal server error
    InternalError = 9001,
    /// Database error
    DatabaseError = 9002,
    /// Network error
    NetworkError = 9003,
    /// Operation timeout
    TimeoutError = 9004,
    /// Configuration error
    ConfigError = 9005,
}

impl ErrorCode {
    /// Get the numeric code value
    #[inline]
    pub const fn code(&self) -> u16 {
        *self as u16
    }

    /// Check if this is a success code
    #[inline]
    pub const fn is_success(&self) -> bool {
        matches!(self, ErrorCode::Success)
    }

    /// Whether a client may retry the same request unchanged
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            ErrorCode::PaymentGatewayUnavailable
                | ErrorCode::NetworkError
                | ErrorCode::TimeoutError
                | ErrorCode::ConcurrentModification
                | ErrorCode::TooManyRequests
        )
    }

    /// Developer-facing English message for this error code
    pub const fn message(&self) -> &'static str {
        match self {
            // General
            ErrorCode::Success => "Operation completed successfully",
            ErrorCode::Unknown => "An unknown error occurred",
            ErrorCode::ValidationFailed => "Validation failed",
            ErrorCode::NotFound => "Resource not found",
            ErrorCode::AlreadyExists => "Resource already exists",
            ErrorCode::InvalidRequest => "Invalid request",
            ErrorCode::RequiredField => "Required field is missing",
            ErrorCode::ValueOutOfRange => "Value is out of range",
            ErrorCode::TooManyRequests => "Too many requests, try again later",

            // Auth
            ErrorCode::NotAuthenticated => "User is not authenticated",
            ErrorCode::TokenExpired => "Authentication token has expired",
            ErrorCode::TokenInvalid => "Authentication token is invalid",

            // Permission
            ErrorCode::PermissionDenied => "Permission denied",
            ErrorCode::RoleRequired => "Specific role is required",
            ErrorCode::AdminRequired => "Administrator role is required",

            // Schedule
            ErrorCode::ScheduleNotFound => "Train schedule not found",
            ErrorCode::StationNotOnRoute => "Station is not on the train's route",
            ErrorCode::ScheduleInvalid => "Train schedule is invalid",

            // Order
            ErrorCode::OrderNotFound => "Order not found",
            ErrorCode::OrderEmpty => "Order is empty",
            ErrorCode::InvalidQuantity => "Quantity must be between 1 and 99",
            ErrorCode::InvalidDeliveryInfo => "Delivery information is incomplete",
            ErrorCode::InvalidStatusTransition => "Status transition not allowed",
            ErrorCode::OrderNotCancellable => "Order can no longer be cancelled",
            ErrorCode::DuplicateIdempotencyKey => "Idempotency key already used",
            ErrorCode::ConcurrentModification => "Order was modified concurrently",
            ErrorCode::OrderNotRateable => "Only delivered orders can be rated",
            ErrorCode::OrderAlreadyRated => "Order has already been rated",

            // Payment
            ErrorCode::PaymentFailed => "Payment processing failed",
            ErrorCode::PaymentInvalidMethod => "Invalid payment method",
            ErrorCode::PaymentAlreadyRefunded => "Payment has already been refunded",
            ErrorCode::PaymentAmountMismatch => "Paid amount does not match order total",
            ErrorCode::PaymentIntentMismatch => "Payment intent does not match order",
            ErrorCode::PaymentGatewayUnavailable => "Payment gateway unavailable",
            ErrorCode::PaymentGatewayRejected => "Payment gateway rejected the request",
            ErrorCode::WebhookSignatureInvalid => "Webhook signature is invalid",

            // Product
            ErrorCode::ProductNotFound => "Product not found",
            ErrorCode::ProductInvalidPrice => "Product has invalid price",
            ErrorCode::ProductOutOfStock => "Product is out of stock",
            ErrorCode::ProductUnavailable => "Product is not available",
            ErrorCode::ProductOptionNotFound => "Product option not found",
            ErrorCode::RestaurantNotFound => "Restaurant not found",

            // Delivery
            ErrorCode::DriverRequired => "Delivery agent is required",
            ErrorCode::InvalidDriverLocation => "Driver location is invalid",

            // System
            ErrorCode::InternalError => "Internal server error",
            ErrorCode::DatabaseError => "Database error",
            ErrorCode::NetworkError => "Network error",
            ErrorCode::TimeoutError => "Operation timed out",
            ErrorCode::ConfigError => "Configuration error",
        }
    }
}

impl From<ErrorCode> for u16 {
    #[inline]
    fn from(code: ErrorCode) -> Self {
        code.code()
    }
}

/// Error when converting from an invalid u16 to ErrorCode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidErrorCode(pub u16);

impl fmt::Display for InvalidErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid error code: {}", self.0)
    }
}

impl std::error::Error for InvalidErrorCode {}

impl TryFrom<u16> for ErrorCode {
    type Error = InvalidErrorCode;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        let code = match value {
            0 => ErrorCode::Success,
            1 => ErrorCode::Unknown,
            2 => ErrorCode::ValidationFailed,
            3 => ErrorCode::NotFound,
            4 => ErrorCode::AlreadyExists,
            5 => ErrorCode::InvalidRequest,
            7 => ErrorCode::RequiredField,
            8 => ErrorCode::ValueOutOfRange,
            9 => ErrorCode::TooManyRequests,

            1001 => ErrorCode::NotAuthenticated,
            1003 => ErrorCode::TokenExpired,
            1004 => ErrorCode::TokenInvalid,

            2001 => ErrorCode::PermissionDenied,
            2002 => ErrorCode::RoleRequired,
            2003 => ErrorCode::AdminRequired,

            3001 => ErrorCode::ScheduleNotFound,
            3002 => ErrorCode::StationNotOnRoute,
            3003 => ErrorCode::ScheduleInvalid,

            4001 => ErrorCode::OrderNotFound,
            4002 => ErrorCode::OrderEmpty,
            4003 => ErrorCode::InvalidQuantity,
            4004 => ErrorCode::InvalidDeliveryInfo,
            4005 => ErrorCode::InvalidStatusTransition,
            4006 => ErrorCode::OrderNotCancellable,
            4007 => ErrorCode::DuplicateIdempotencyKey,
            4008 => ErrorCode::ConcurrentModification,
            4009 => ErrorCode::OrderNotRateable,
            4010 => ErrorCode::OrderAlreadyRated,

            5001 => ErrorCode::PaymentFailed,
            5003 => ErrorCode::PaymentInvalidMethod,
            5004 => ErrorCode::PaymentAlreadyRefunded,
            5010 => ErrorCode::PaymentAmountMismatch,
            5011 => ErrorCode::PaymentIntentMismatch,
            5012 => ErrorCode::PaymentGatewayUnavailable,
            5013 => ErrorCode::PaymentGatewayRejected,
            5014 => ErrorCode::WebhookSignatureInvalid,

            6001 => ErrorCode::ProductNotFound,
            6002 => ErrorCode::ProductInvalidPrice,
            6003 => ErrorCode::ProductOutOfStock,
            6004 => ErrorCode::ProductUnavailable,
            6005 => ErrorCode::ProductOptionNotFound,
            6101 => ErrorCode::RestaurantNotFound,

            7001 => ErrorCode::DriverRequired,
            7002 => ErrorCode::InvalidDriverLocation,

            9001 => ErrorCode::InternalError,
            9002 => ErrorCode::DatabaseError,
            9003 => ErrorCode::NetworkError,
            9004 => ErrorCode::TimeoutError,
            9005 => ErrorCode::ConfigError,

            _ => return Err(InvalidErrorCode(value)),
        };
        Ok(code)
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: &[ErrorCode] = &[
        ErrorCode::Success,
        ErrorCode::ValidationFailed,
        ErrorCode::TooManyRequests,
        ErrorCode::NotAuthenticated,
        ErrorCode::PermissionDenied,
        ErrorCode::ScheduleNotFound,
        ErrorCode::OrderNotFound,
        ErrorCode::InvalidStatusTransition,
        ErrorCode::DuplicateIdempotencyKey,
        ErrorCode::PaymentAmountMismatch,
        ErrorCode::WebhookSignatureInvalid,
        ErrorCode::ProductOutOfStock,
        ErrorCode::RestaurantNotFound,
        ErrorCode::DriverRequired,
        ErrorCode::DatabaseError,
    ];

    #[test]
    fn test_error_code_values() {
        assert_eq!(ErrorCode::Success.code(), 0);
        assert_eq!(ErrorCode::ValidationFailed.code(), 2);
        assert_eq!(ErrorCode::OrderNotFound.code(), 4001);
        assert_eq!(ErrorCode::PaymentGatewayUnavailable.code(), 5012);
        assert_eq!(ErrorCode::ProductOutOfStock.code(), 6003);
        assert_eq!(ErrorCode::InternalError.code(), 9001);
    }

    #[test]
    fn test_try_from_matches_code() {
        for code in ALL {
            assert_eq!(ErrorCode::try_from(code.code()), Ok(*code));
        }
    }

    #[test]
    fn test_try_from_invalid() {
        assert_eq!(ErrorCode::try_from(6), Err(InvalidErrorCode(6)));
        assert_eq!(ErrorCode::try_from(65535), Err(InvalidErrorCode(65535)));
    }

    #[test]
    fn test_serialize_as_number() {
        let json = serde_json::to_string(&ErrorCode::OrderNotCancellable).unwrap();
        assert_eq!(json, "4006");

        let code: ErrorCode = serde_json::from_str("5014").unwrap();
        assert_eq!(code, ErrorCode::WebhookSignatureInvalid);

        assert!(serde_json::from_str::<ErrorCode>("4999").is_err());
    }

    #[test]
    fn test_retryable() {
        assert!(ErrorCode::PaymentGatewayUnavailable.is_retryable());
        assert!(ErrorCode::ConcurrentModification.is_retryable());
        assert!(!ErrorCode::PaymentGatewayRejected.is_retryable());
        assert!(!ErrorCode::ValidationFailed.is_retryable());
    }

    #[test]
    fn test_display_and_message() {
        assert_eq!(ErrorCode::OrderNotFound.to_string(), "4001");
        assert_eq!(ErrorCode::OrderNotFound.message(), "Order not found");
        assert_eq!(InvalidErrorCode(42).to_string(), "invalid error code: 42");
    }
}
