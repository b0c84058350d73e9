//! Product (inventory item) model.
//!
//! # Invariants
//! - `product_code` is unique per store; `barcode` is unique when present.
//! - `quantity` (stock on hand) is never negative.
//! - `cost`, `price` and `reorder_level` are never negative.

use super::{require_non_negative, require_text, Kyat, ModelValidationError, RecordId};
use serde::{Deserialize, Serialize};

/// Stocked item sold at the POS.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: RecordId,
    pub product_code: String,
    pub barcode: Option<String>,
    pub product_name: String,
    pub category: String,
    /// Supplier name, matching `Supplier::supplier_name`.
    pub supplier: Option<String>,
    pub unit: String,
    pub cost: Kyat,
    pub price: Kyat,
    /// Stock on hand.
    pub quantity: i64,
    pub reorder_level: i64,
    pub image_url: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Input for creating a product. Blank code and missing barcode are filled in
/// by the inventory service.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewProduct {
    pub product_code: String,
    pub barcode: Option<String>,
    pub product_name: String,
    pub category: String,
    pub supplier: Option<String>,
    pub unit: String,
    pub cost: Kyat,
    pub price: Kyat,
    pub quantity: i64,
    pub reorder_level: i64,
    pub image_url: Option<String>,
}

/// Stock badge shown next to a product.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StockStatus {
    InStock,
    LowStock,
}

/// One entry of a product's price log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceChange {
    pub changed_at: i64,
    pub old_price: Kyat,
    pub new_price: Kyat,
}

impl Product {
    /// Checks field-level invariants before persistence.
    pub fn validate(&self) -> Result<(), ModelValidationError> {
        require_text("product_code", &self.product_code)?;
        require_text("product_name", &self.product_name)?;
        require_text("category", &self.category)?;
        require_text("unit", &self.unit)?;
        if let Some(barcode) = self.barcode.as_deref() {
            require_text("barcode", barcode)?;
        }
        require_non_negative("cost", self.cost)?;
        require_non_negative("price", self.price)?;
        require_non_negative("quantity", self.quantity)?;
        require_non_negative("reorder_level", self.reorder_level)?;
        Ok(())
    }

    /// Stock is at or below the reorder level.
    pub fn is_low_stock(&self) -> bool {
        self.quantity <= self.reorder_level
    }

    pub fn stock_status(&self) -> StockStatus {
        if self.is_low_stock() {
            StockStatus::LowStock
        } else {
            StockStatus::InStock
        }
    }

    /// Retail value of stock on hand.
    pub fn stock_value(&self) -> Kyat {
        self.price * self.quantity
    }
}

impl PriceChange {
    /// Signed difference, positive for a price increase.
    pub fn delta(&self) -> Kyat {
        self.new_price - self.old_price
    }
}
