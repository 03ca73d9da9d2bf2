//! Order aggregate and its value types

use super::status::OrderStatus;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

// ============================================================================
// Payment
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentMethod {
    /// Cash on delivery
    Cod,
    Upi,
    Card,
    Wallet,
}

impl PaymentMethod {
    /// Online methods go through a gateway payment intent
    pub fn is_online(self) -> bool {
        !matches!(self, PaymentMethod::Cod)
    }

    pub const fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Cod => "COD",
            PaymentMethod::Upi => "UPI",
            PaymentMethod::Card => "CARD",
            PaymentMethod::Wallet => "WALLET",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown payment method: {0}")]
pub struct ParsePaymentMethodError(pub String);

impl FromStr for PaymentMethod {
    type Err = ParsePaymentMethodError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "COD" => Ok(PaymentMethod::Cod),
            "UPI" => Ok(PaymentMethod::Upi),
            "CARD" => Ok(PaymentMethod::Card),
            "WALLET" => Ok(PaymentMethod::Wallet),
            _ => Err(ParsePaymentMethodError(s.to_string())),
        }
    }
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    Pending,
    Completed,
    Failed,
    Refunded,
    RefundFailed,
}

impl PaymentStatus {
    pub const fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "PENDING",
            PaymentStatus::Completed => "COMPLETED",
            PaymentStatus::Failed => "FAILED",
            PaymentStatus::Refunded => "REFUNDED",
            PaymentStatus::RefundFailed => "REFUND_FAILED",
        }
    }

    /// Money was captured; later gateway outcomes no longer apply
    pub const fn is_settled(&self) -> bool {
        matches!(
            self,
            PaymentStatus::Completed | PaymentStatus::Refunded | PaymentStatus::RefundFailed
        )
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentInfo {
    pub method: PaymentMethod,
    pub status: PaymentStatus,
    /// Gateway payment intent id (online methods only)
    pub gateway_id: Option<String>,
    pub paid_at: Option<i64>,
    pub refund_id: Option<String>,
    pub refunded_at: Option<i64>,
    /// Gateway error text when a refund could not be issued
    pub refund_error: Option<String>,
}

impl PaymentInfo {
    pub fn new(method: PaymentMethod) -> Self {
        Self {
            method,
            status: PaymentStatus::Pending,
            gateway_id: None,
            paid_at: None,
            refund_id: None,
            refunded_at: None,
            refund_error: None,
        }
    }
}

// ============================================================================
// Delivery
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryType {
    Train,
    Station,
    Home,
}

impl DeliveryType {
    pub const fn as_str(&self) -> &'static str {
        match self {
            DeliveryType::Train => "train",
            DeliveryType::Station => "station",
            DeliveryType::Home => "home",
        }
    }
}

/// Where the order is handed over, with the fields each kind requires
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum DeliveryInfo {
    /// Delivered to a seat on a train halting at `station_name`
    Train {
        train_no: String,
        coach: String,
        seat: String,
        station_name: String,
    },
    /// Collected at the station
    Station { station_name: String },
    Home { address: String },
}

impl DeliveryInfo {
    pub fn delivery_type(&self) -> DeliveryType {
        match self {
            DeliveryInfo::Train { .. } => DeliveryType::Train,
            DeliveryInfo::Station { .. } => DeliveryType::Station,
            DeliveryInfo::Home { .. } => DeliveryType::Home,
        }
    }

    pub fn station_name(&self) -> Option<&str> {
        match self {
            DeliveryInfo::Train { station_name, .. } | DeliveryInfo::Station { station_name } => {
                Some(station_name)
            }
            DeliveryInfo::Home { .. } => None,
        }
    }
}

/// Driver GPS position
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

impl GeoPoint {
    pub fn is_valid(&self) -> bool {
        (-90.0..=90.0).contains(&self.lat) && (-180.0..=180.0).contains(&self.lng)
    }
}

// ============================================================================
// Items, totals, schedule
// ============================================================================

/// Item snapshot taken at checkout. Never recomputed from the live product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItem {
    pub product_id: i64,
    pub name: String,
    pub qty: u32,
    /// Unit price including selected options
    pub price_cents: i64,
    pub restaurant_id: i64,
    pub note: Option<String>,
    #[serde(default)]
    pub selected_options: Vec<String>,
}

impl OrderItem {
    /// `None` on overflow
    pub fn line_total_cents(&self) -> Option<i64> {
        self.price_cents.checked_mul(i64::from(self.qty))
    }
}

/// Money breakdown, fixed at creation (minor units)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderTotals {
    pub subtotal_cents: i64,
    pub tax_cents: i64,
    pub delivery_cents: i64,
    pub discount_cents: i64,
    /// Applied coupon, if any was recognized
    pub coupon_code: Option<String>,
    pub final_cents: i64,
}

/// Train timing captured at checkout for train deliveries
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleInfo {
    pub train_no: String,
    /// Service date of the timetable the times were taken from
    pub service_date: NaiveDate,
    pub station: String,
    pub station_index: u32,
    pub scheduled_arrival: i64,
    pub scheduled_depart: i64,
    /// When the food has to be ready at the kitchen
    pub expected_ready_at: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusHistoryEntry {
    pub status: OrderStatus,
    pub at: i64,
    /// Actor id (user, agent or `system`)
    pub by: String,
    pub note: Option<String>,
}

// ============================================================================
// Order aggregate
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: String,
    pub order_number: String,
    pub user_id: String,
    pub items: Vec<OrderItem>,
    pub delivery_info: DeliveryInfo,
    pub totals: OrderTotals,
    pub payment: PaymentInfo,
    pub status: OrderStatus,
    pub schedule: Option<ScheduleInfo>,
    #[serde(default)]
    pub status_history: Vec<StatusHistoryEntry>,
    pub idempotency_key: Option<String>,
    pub special_instructions: Option<String>,
    pub assigned_driver: Option<String>,
    pub estimated_delivery_at: Option<i64>,
    pub driver_location: Option<GeoPoint>,
    pub cancellation_reason: Option<String>,
    pub rating: Option<u8>,
    pub review: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Order {
    pub fn is_owned_by(&self, user_id: &str) -> bool {
        self.user_id == user_id
    }

    /// Move to `status` and record it in the history. Legality is the
    /// caller's responsibility.
    pub fn record_status(
        &mut self,
        status: OrderStatus,
        by: impl Into<String>,
        note: Option<String>,
        at: i64,
    ) {
        self.status = status;
        self.updated_at = at;
        self.status_history.push(StatusHistoryEntry {
            status,
            at,
            by: by.into(),
            note,
        });
    }

    /// Quantities to give back to stock when the order is voided
    pub fn stock_lines(&self) -> impl Iterator<Item = (i64, u32)> + '_ {
        self.items.iter().map(|item| (item.product_id, item.qty))
    }
}
