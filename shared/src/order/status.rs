//! Order lifecycle status and the transition table

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Canonical order status. Display names are a presentation concern only,
/// see [`OrderStatus::display_label`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    Pending,
    Confirmed,
    Preparing,
    ReadyForPickup,
    OutForDelivery,
    Delivered,
    Cancelled,
    Rejected,
    Returned,
    FailedPayment,
}

impl OrderStatus {
    pub const ALL: [OrderStatus; 10] = [
        OrderStatus::Pending,
        OrderStatus::Confirmed,
        OrderStatus::Preparing,
        OrderStatus::ReadyForPickup,
        OrderStatus::OutForDelivery,
        OrderStatus::Delivered,
        OrderStatus::Cancelled,
        OrderStatus::Rejected,
        OrderStatus::Returned,
        OrderStatus::FailedPayment,
    ];

    /// Statuses reachable in one step from `self`
    pub const fn allowed_transitions(self) -> &'static [OrderStatus] {
        use OrderStatus::*;
        match self {
            Pending => &[Confirmed, Cancelled, FailedPayment],
            Confirmed => &[Preparing, Cancelled],
            Preparing => &[ReadyForPickup, Cancelled],
            ReadyForPickup => &[OutForDelivery, Cancelled],
            OutForDelivery => &[Delivered],
            Delivered => &[Returned],
            Cancelled | Rejected | Returned => &[],
            FailedPayment => &[Confirmed, Cancelled],
        }
    }

    pub fn can_transition_to(self, next: OrderStatus) -> bool {
        self.allowed_transitions().contains(&next)
    }

    pub fn is_terminal(self) -> bool {
        self.allowed_transitions().is_empty()
    }

    /// Customer/admin cancellation. Out-for-delivery is explicitly too late.
    pub fn is_cancellable(self) -> bool {
        !matches!(
            self,
            OrderStatus::Delivered
                | OrderStatus::Cancelled
                | OrderStatus::Rejected
                | OrderStatus::OutForDelivery
        ) && self.can_transition_to(OrderStatus::Cancelled)
    }

    pub const fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "PENDING",
            OrderStatus::Confirmed => "CONFIRMED",
            OrderStatus::Preparing => "PREPARING",
            OrderStatus::ReadyForPickup => "READY_FOR_PICKUP",
            OrderStatus::OutForDelivery => "OUT_FOR_DELIVERY",
            OrderStatus::Delivered => "DELIVERED",
            OrderStatus::Cancelled => "CANCELLED",
            OrderStatus::Rejected => "REJECTED",
            OrderStatus::Returned => "RETURNED",
            OrderStatus::FailedPayment => "FAILED_PAYMENT",
        }
    }

    /// Label shown to customers in tracking screens
    pub const fn display_label(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "Awaiting payment",
            OrderStatus::Confirmed => "Order confirmed",
            OrderStatus::Preparing => "Being prepared",
            OrderStatus::ReadyForPickup => "Ready for pickup",
            OrderStatus::OutForDelivery => "On the way",
            OrderStatus::Delivered => "Delivered",
            OrderStatus::Cancelled => "Cancelled",
            OrderStatus::Rejected => "Rejected by restaurant",
            OrderStatus::Returned => "Returned",
            OrderStatus::FailedPayment => "Payment failed",
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown order status: {0}")]
pub struct ParseStatusError(pub String);

impl FromStr for OrderStatus {
    type Err = ParseStatusError;

    /// Accepts the canonical spelling in any case, with `-` or spaces in
    /// place of underscores (`"Ready for pickup"`, `"out-for-delivery"`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_uppercase().replace(['-', ' '], "_");
        OrderStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == normalized)
            .ok_or_else(|| ParseStatusError(s.to_string()))
    }
}
