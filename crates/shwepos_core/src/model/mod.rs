//! Domain model for the shop's records.
//!
//! # Responsibility
//! - Define canonical data structures used by core business logic.
//! - Own per-record validation rules shared by repositories and services.
//!
//! # Invariants
//! - Every record is identified by a stable `RecordId`.
//! - Money is whole kyat (`Kyat`), timestamps are epoch milliseconds.

pub mod customer;
pub mod product;
pub mod settings;
pub mod supplier;
pub mod transaction;
pub mod user;

use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Stable identifier for every persisted record.
pub type RecordId = Uuid;

/// Whole kyat amount. Negative only for refunds.
pub type Kyat = i64;

/// Validation failures raised before a record reaches storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelValidationError {
    /// A required text field is empty after trim.
    BlankField(&'static str),
    /// A money or quantity field is below zero.
    Negative { field: &'static str, value: i64 },
    /// A supplier has no category with at least one product.
    EmptySupplierCatalog,
    /// A transaction has no lines.
    EmptyTransaction,
    /// A line subtotal does not equal `price * quantity`.
    LineSubtotalMismatch { product_code: String },
    /// A line quantity is zero or negative.
    NonPositiveQuantity { product_code: String },
    /// Tax rate outside 0..=10000 basis points.
    TaxRateOutOfRange(u32),
    /// UTC offset outside ±14 hours.
    UtcOffsetOutOfRange(i32),
}

impl Display for ModelValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BlankField(field) => write!(f, "`{field}` must not be blank"),
            Self::Negative { field, value } => {
                write!(f, "`{field}` must not be negative, got {value}")
            }
            Self::EmptySupplierCatalog => {
                write!(f, "supplier needs at least one category with a product")
            }
            Self::EmptyTransaction => write!(f, "transaction has no lines"),
            Self::LineSubtotalMismatch { product_code } => {
                write!(f, "line subtotal mismatch for `{product_code}`")
            }
            Self::NonPositiveQuantity { product_code } => {
                write!(f, "line quantity must be positive for `{product_code}`")
            }
            Self::TaxRateOutOfRange(bps) => {
                write!(f, "tax rate {bps} bps is outside 0..=10000")
            }
            Self::UtcOffsetOutOfRange(minutes) => {
                write!(f, "utc offset {minutes} minutes is outside +/-14h")
            }
        }
    }
}

impl Error for ModelValidationError {}

pub(crate) fn require_text(field: &'static str, value: &str) -> Result<(), ModelValidationError> {
    if value.trim().is_empty() {
        return Err(ModelValidationError::BlankField(field));
    }
    Ok(())
}

pub(crate) fn require_non_negative(
    field: &'static str,
    value: i64,
) -> Result<(), ModelValidationError> {
    if value < 0 {
        return Err(ModelValidationError::Negative { field, value });
    }
    Ok(())
}

/// Trims optional text and maps empty values to `None`.
pub fn normalize_optional(value: Option<String>) -> Option<String> {
    value
        .map(|text| text.trim().to_string())
        .filter(|text| !text.is_empty())
}
