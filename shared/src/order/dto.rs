//! Request / response bodies of the order API
//!
//! Inputs are deliberately loose (strings, signed integers) so that the
//! server can answer malformed values with a field-level validation error
//! instead of a generic deserialization failure.

use super::status::OrderStatus;
use super::types::{GeoPoint, Order, ScheduleInfo, StatusHistoryEntry};
use serde::{Deserialize, Serialize};

// ============================================================================
// Checkout
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderItemInput {
    #[serde(default)]
    pub product_id: i64,
    #[serde(default)]
    pub qty: i64,
    pub note: Option<String>,
    #[serde(default)]
    pub selected_options: Vec<String>,
}

/// Raw delivery details; converted to `DeliveryInfo` during validation
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeliveryInfoInput {
    #[serde(rename = "type", default)]
    pub kind: String,
    pub train_no: Option<String>,
    pub coach: Option<String>,
    pub seat: Option<String>,
    pub station_name: Option<String>,
    pub address: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateOrderRequest {
    #[serde(default)]
    pub items: Vec<OrderItemInput>,
    #[serde(default)]
    pub delivery_info: DeliveryInfoInput,
    #[serde(default)]
    pub payment_method: String,
    pub coupon_code: Option<String>,
    pub special_instructions: Option<String>,
    pub idempotency_key: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateOrderResponse {
    pub order_id: String,
    pub order_number: String,
    pub total_cents: i64,
    pub status: OrderStatus,
    /// Present for online payments still awaiting completion
    pub client_secret: Option<String>,
    /// True when an earlier order with the same idempotency key was returned
    #[serde(default)]
    pub replayed: bool,
}

// ============================================================================
// Lifecycle
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: String,
    pub note: Option<String>,
    pub driver_location: Option<GeoPoint>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssignRequest {
    #[serde(default)]
    pub agent_id: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CancelRequest {
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateOrderRequest {
    pub rating: u8,
    pub review: Option<String>,
}

// ============================================================================
// Payment
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfirmPaymentRequest {
    pub order_id: String,
    pub payment_intent_id: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfirmOutcome {
    /// This call completed the payment
    Confirmed,
    /// Payment was already completed (webhook or earlier call)
    AlreadyConfirmed,
    /// Gateway reports the intent has not succeeded yet
    NotSucceeded,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfirmPaymentResponse {
    pub status: ConfirmOutcome,
    pub order: Order,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebhookAck {
    pub received: bool,
}

// ============================================================================
// Queries
// ============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OrdersQuery {
    pub status: Option<String>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderPage {
    pub items: Vec<Order>,
    pub total: u64,
    pub page: u32,
    pub per_page: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopProgress {
    Passed,
    Current,
    Upcoming,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackedStop {
    pub station: String,
    pub arrival: i64,
    pub departure: i64,
    pub progress: StopProgress,
    /// The stop where this order is handed over
    pub is_delivery_stop: bool,
}

/// Read-only tracking view
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackingView {
    pub order_id: String,
    pub order_number: String,
    pub status: OrderStatus,
    pub status_label: String,
    pub assigned_driver: Option<String>,
    pub driver_location: Option<GeoPoint>,
    pub estimated_delivery_at: Option<i64>,
    pub expected_ready_at: Option<i64>,
    pub schedule: Option<ScheduleInfo>,
    pub stops: Vec<TrackedStop>,
    pub history: Vec<StatusHistoryEntry>,
}
