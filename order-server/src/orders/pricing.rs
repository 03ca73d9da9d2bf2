//! Checkout pricing: delivery fee, coupon discount, tax
//!
//! All amounts are integer minor units. Percentages are basis points and
//! evaluated with `rust_decimal`, rounding half away from zero.

use rust_decimal::prelude::*;
use shared::order::{DeliveryType, OrderTotals};

const BASIS_POINTS: i64 = 10_000;

/// Flat delivery fee per delivery type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeliveryFees {
    pub train: i64,
    pub home: i64,
    pub station: i64,
}

impl DeliveryFees {
    pub fn for_type(&self, delivery_type: DeliveryType) -> i64 {
        match delivery_type {
            DeliveryType::Train => self.train,
            DeliveryType::Home => self.home,
            DeliveryType::Station => self.station,
        }
    }
}

/// Percentage coupon with an absolute cap
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CouponRule {
    pub code: &'static str,
    pub percent_bp: u32,
    pub cap_cents: i64,
    /// Restricts the coupon to one delivery type
    pub only_for: Option<DeliveryType>,
}

/// Fixed coupon rule set
pub const COUPONS: &[CouponRule] = &[
    CouponRule {
        code: "FIRST10",
        percent_bp: 1_000,
        cap_cents: 10,
        only_for: None,
    },
    CouponRule {
        code: "SAVE20",
        percent_bp: 2_000,
        cap_cents: 50,
        only_for: None,
    },
    CouponRule {
        code: "TRAINFEAST",
        percent_bp: 1_500,
        cap_cents: 40,
        only_for: Some(DeliveryType::Train),
    },
];

#[derive(Debug, Clone)]
pub struct PricingPolicy {
    tax_rate_bp: u32,
    fees: DeliveryFees,
    coupons: &'static [CouponRule],
}

impl PricingPolicy {
    pub fn new(tax_rate_bp: u32, fees: DeliveryFees) -> Self {
        Self {
            tax_rate_bp,
            fees,
            coupons: COUPONS,
        }
    }

    /// Look up a coupon. Unknown codes, and codes restricted to another
    /// delivery type, yield `None`.
    pub fn find_coupon(&self, code: &str, delivery_type: DeliveryType) -> Option<&CouponRule> {
        let code = code.trim();
        self.coupons
            .iter()
            .find(|rule| rule.code.eq_ignore_ascii_case(code))
            .filter(|rule| rule.only_for.is_none_or(|t| t == delivery_type))
    }

    /// Derive the order totals from the item subtotal
    pub fn totals(
        &self,
        subtotal_cents: i64,
        delivery_type: DeliveryType,
        coupon_code: Option<&str>,
    ) -> OrderTotals {
        let coupon = coupon_code
            .filter(|c| !c.trim().is_empty())
            .and_then(|code| {
                let found = self.find_coupon(code, delivery_type);
                if found.is_none() {
                    tracing::debug!(coupon = code, "Ignoring unknown coupon code");
                }
                found
            });

        let discount_cents = coupon
            .map(|rule| {
                percent_of(subtotal_cents, rule.percent_bp)
                    .min(rule.cap_cents)
                    .min(subtotal_cents)
            })
            .unwrap_or(0);

        let tax_cents = percent_of(subtotal_cents - discount_cents, self.tax_rate_bp);
        let delivery_cents = self.fees.for_type(delivery_type);

        OrderTotals {
            subtotal_cents,
            tax_cents,
            delivery_cents,
            discount_cents,
            coupon_code: coupon.map(|rule| rule.code.to_string()),
            final_cents: subtotal_cents - discount_cents + tax_cents + delivery_cents,
        }
    }
}

fn percent_of(amount_cents: i64, bp: u32) -> i64 {
    (Decimal::from(amount_cents) * Decimal::from(bp) / Decimal::from(BASIS_POINTS))
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .to_i64()
        .unwrap_or_default()
}
