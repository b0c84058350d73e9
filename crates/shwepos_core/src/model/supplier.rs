//! Supplier model and its category catalog.

use super::{require_text, ModelValidationError, RecordId};
use serde::{Deserialize, Serialize};

/// Product names a supplier offers within one category.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupplierCategory {
    pub category: String,
    pub products: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Supplier {
    pub id: RecordId,
    pub supplier_name: String,
    pub supplier_phone: String,
    pub supplier_email: Option<String>,
    pub supplier_address: Option<String>,
    pub catalog: Vec<SupplierCategory>,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewSupplier {
    pub supplier_name: String,
    pub supplier_phone: String,
    pub supplier_email: Option<String>,
    pub supplier_address: Option<String>,
    pub catalog: Vec<SupplierCategory>,
}

impl SupplierCategory {
    /// A category counts only when both its name and one product are non-blank.
    pub fn is_valid(&self) -> bool {
        !self.category.trim().is_empty()
            && self.products.iter().any(|name| !name.trim().is_empty())
    }
}

impl Supplier {
    pub fn validate(&self) -> Result<(), ModelValidationError> {
        require_text("supplier_name", &self.supplier_name)?;
        require_text("supplier_phone", &self.supplier_phone)?;
        if !self.catalog.iter().any(SupplierCategory::is_valid) {
            return Err(ModelValidationError::EmptySupplierCatalog);
        }
        Ok(())
    }

    /// Total number of product names across all categories.
    pub fn catalog_size(&self) -> usize {
        self.catalog.iter().map(|entry| entry.products.len()).sum()
    }
}

/// Trims names, drops blank products and categories left without products.
pub fn normalize_catalog(catalog: Vec<SupplierCategory>) -> Vec<SupplierCategory> {
    catalog
        .into_iter()
        .map(|entry| SupplierCategory {
            category: entry.category.trim().to_string(),
            products: entry
                .products
                .into_iter()
                .map(|name| name.trim().to_string())
                .filter(|name| !name.is_empty())
                .collect(),
        })
        .filter(SupplierCategory::is_valid)
        .collect()
}
