//! Checkout arithmetic: discount, tax, change and loyalty points.
//!
//! All amounts are whole kyat. Tax is rounded half up.

use crate::model::Kyat;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Discount value of one loyalty point.
pub const POINT_VALUE_KYAT: Kyat = 10;
/// Spend needed to earn one loyalty point.
pub const KYAT_PER_EARNED_POINT: Kyat = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PricingError {
    NegativeSubtotal(Kyat),
    NegativeDiscount(Kyat),
    DiscountExceedsSubtotal { discount: Kyat, subtotal: Kyat },
    TaxRateOutOfRange(u32),
    InsufficientPayment { total: Kyat, paid: Kyat },
}

impl Display for PricingError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NegativeSubtotal(value) => write!(f, "subtotal must not be negative: {value}"),
            Self::NegativeDiscount(value) => write!(f, "discount must not be negative: {value}"),
            Self::DiscountExceedsSubtotal { discount, subtotal } => {
                write!(f, "discount {discount} exceeds subtotal {subtotal}")
            }
            Self::TaxRateOutOfRange(bps) => write!(f, "tax rate {bps} bps is outside 0..=10000"),
            Self::InsufficientPayment { total, paid } => {
                write!(f, "paid {paid} is less than total {total}")
            }
        }
    }
}

impl Error for PricingError {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CheckoutTotals {
    pub subtotal: Kyat,
    pub discount: Kyat,
    pub after_discount: Kyat,
    pub tax: Kyat,
    pub total: Kyat,
}

impl CheckoutTotals {
    pub fn compute(
        subtotal: Kyat,
        discount: Kyat,
        tax_rate_bps: u32,
    ) -> Result<Self, PricingError> {
        if subtotal < 0 {
            return Err(PricingError::NegativeSubtotal(subtotal));
        }
        if discount < 0 {
            return Err(PricingError::NegativeDiscount(discount));
        }
        if discount > subtotal {
            return Err(PricingError::DiscountExceedsSubtotal { discount, subtotal });
        }
        if tax_rate_bps > 10_000 {
            return Err(PricingError::TaxRateOutOfRange(tax_rate_bps));
        }

        let after_discount = subtotal - discount;
        let tax = (after_discount * i64::from(tax_rate_bps) + 5_000) / 10_000;
        Ok(Self {
            subtotal,
            discount,
            after_discount,
            tax,
            total: after_discount + tax,
        })
    }
}

pub fn change_due(total: Kyat, paid: Kyat) -> Result<Kyat, PricingError> {
    if paid < total {
        return Err(PricingError::InsufficientPayment { total, paid });
    }
    Ok(paid - total)
}

/// Largest discount a customer's points can cover on this subtotal.
pub fn redeemable_discount(points: i64, subtotal: Kyat) -> Kyat {
    (points.max(0) * POINT_VALUE_KYAT).min(subtotal.max(0))
}

/// Points movement caused by one sale.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoyaltyAdjustment {
    pub points_before: i64,
    pub spent: i64,
    pub earned: i64,
    pub balance_after: i64,
}

impl LoyaltyAdjustment {
    /// The discount is paid from points first, up to the balance.
    pub fn for_sale(points: i64, discount: Kyat, total: Kyat) -> Self {
        let points_before = points.max(0);
        let covered = discount.max(0).min(points_before * POINT_VALUE_KYAT);
        let spent = covered / POINT_VALUE_KYAT;
        let earned = total.max(0) / KYAT_PER_EARNED_POINT;
        Self {
            points_before,
            spent,
            earned,
            balance_after: (points_before - spent + earned).max(0),
        }
    }

    pub fn points_delta(&self) -> i64 {
        self.earned - self.spent
    }
}
