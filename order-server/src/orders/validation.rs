//! Structural checks on checkout input
//!
//! Runs before any storage access. Each failure names the offending field.

use shared::error::ErrorCode;
use shared::order::{CreateOrderRequest, DeliveryInfo, DeliveryInfoInput, PaymentMethod};

use super::error::OrderError;

pub const MAX_QTY: i64 = 99;
pub const MAX_LINES: usize = 50;
pub const MAX_NOTE_LEN: usize = 200;
pub const MAX_INSTRUCTIONS_LEN: usize = 500;
pub const MAX_IDEMPOTENCY_KEY_LEN: usize = 128;
pub const MAX_REVIEW_LEN: usize = 1_000;
/// Upper bound for a product or option price (minor units)
pub const MAX_PRICE_CENTS: i64 = 10_000_000;

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct CheckoutLine {
    pub product_id: i64,
    pub qty: u32,
    pub note: Option<String>,
    pub selected_options: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ValidatedCheckout {
    pub lines: Vec<CheckoutLine>,
    pub delivery: DeliveryInfo,
    pub method: PaymentMethod,
    pub coupon_code: Option<String>,
    pub special_instructions: Option<String>,
}

pub(crate) fn validate_checkout(req: &CreateOrderRequest) -> Result<ValidatedCheckout, OrderError> {
    if req.items.is_empty() {
        return Err(OrderError::invalid(
            ErrorCode::OrderEmpty,
            "items",
            "Order must contain at least one item",
        ));
    }
    if req.items.len() > MAX_LINES {
        return Err(OrderError::invalid(
            ErrorCode::ValueOutOfRange,
            "items",
            format!("Order may contain at most {MAX_LINES} lines"),
        ));
    }

    let mut lines = Vec::with_capacity(req.items.len());
    for (i, item) in req.items.iter().enumerate() {
        if item.product_id <= 0 {
            return Err(OrderError::invalid(
                ErrorCode::RequiredField,
                format!("items[{i}].product_id"),
                "product_id is required",
            ));
        }
        if !(1..=MAX_QTY).contains(&item.qty) {
            return Err(OrderError::invalid(
                ErrorCode::InvalidQuantity,
                format!("items[{i}].qty"),
                format!("Quantity must be between 1 and {MAX_QTY}"),
            ));
        }
        let note = optional_text(item.note.as_deref());
        if note.as_ref().is_some_and(|n| n.chars().count() > MAX_NOTE_LEN) {
            return Err(OrderError::invalid(
                ErrorCode::ValueOutOfRange,
                format!("items[{i}].note"),
                format!("Note must be at most {MAX_NOTE_LEN} characters"),
            ));
        }
        lines.push(CheckoutLine {
            product_id: item.product_id,
            // Range-checked above
            qty: item.qty as u32,
            note,
            selected_options: item.selected_options.clone(),
        });
    }

    let delivery = validate_delivery(&req.delivery_info)?;

    let method: PaymentMethod = req.payment_method.parse().map_err(|_| {
        OrderError::invalid(
            ErrorCode::PaymentInvalidMethod,
            "payment_method",
            "payment_method must be one of COD, UPI, CARD, WALLET",
        )
    })?;

    let special_instructions = optional_text(req.special_instructions.as_deref());
    if special_instructions
        .as_ref()
        .is_some_and(|s| s.chars().count() > MAX_INSTRUCTIONS_LEN)
    {
        return Err(OrderError::invalid(
            ErrorCode::ValueOutOfRange,
            "special_instructions",
            format!("Special instructions must be at most {MAX_INSTRUCTIONS_LEN} characters"),
        ));
    }

    Ok(ValidatedCheckout {
        lines,
        delivery,
        method,
        coupon_code: optional_text(req.coupon_code.as_deref()),
        special_instructions,
    })
}

fn validate_delivery(input: &DeliveryInfoInput) -> Result<DeliveryInfo, OrderError> {
    let required = |value: &Option<String>, field: &str| -> Result<String, OrderError> {
        optional_text(value.as_deref()).ok_or_else(|| {
            OrderError::invalid(
                ErrorCode::InvalidDeliveryInfo,
                format!("delivery_info.{field}"),
                format!("{field} is required for {} delivery", input.kind.trim()),
            )
        })
    };

    match input.kind.trim().to_ascii_lowercase().as_str() {
        "train" => Ok(DeliveryInfo::Train {
            train_no: required(&input.train_no, "train_no")?,
            coach: required(&input.coach, "coach")?,
            seat: required(&input.seat, "seat")?,
            station_name: required(&input.station_name, "station_name")?,
        }),
        "station" => Ok(DeliveryInfo::Station {
            station_name: required(&input.station_name, "station_name")?,
        }),
        "home" => Ok(DeliveryInfo::Home {
            address: required(&input.address, "address")?,
        }),
        _ => Err(OrderError::invalid(
            ErrorCode::InvalidDeliveryInfo,
            "delivery_info.type",
            "delivery type must be one of train, station, home",
        )),
    }
}

/// Normalized idempotency key; blank means none
pub(crate) fn idempotency_key(raw: Option<&str>) -> Result<Option<String>, OrderError> {
    let key = optional_text(raw);
    if key
        .as_ref()
        .is_some_and(|k| k.len() > MAX_IDEMPOTENCY_KEY_LEN)
    {
        return Err(OrderError::invalid(
            ErrorCode::ValueOutOfRange,
            "idempotency_key",
            format!("idempotency_key must be at most {MAX_IDEMPOTENCY_KEY_LEN} bytes"),
        ));
    }
    Ok(key)
}

/// Trimmed text, `None` when absent or blank
pub(crate) fn optional_text(raw: Option<&str>) -> Option<String> {
    raw.map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
}
