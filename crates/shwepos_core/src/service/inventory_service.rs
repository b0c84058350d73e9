//! Inventory use-cases: product catalog, stock queries and barcodes.
//!
//! # Responsibility
//! - Create/edit/delete products with generated codes and barcodes.
//! - Serve POS lookups (barcode scan, category grid) and inventory search.
//! - Aggregate stock statistics for the inventory screen.
//!
//! # Invariants
//! - Generated barcodes are valid EAN-13 with the in-store `200` prefix.
//! - Search terms are case-insensitive and must all match.
//! - Catalog and stock writes require `ManageInventory` on the session.

use crate::model::product::{NewProduct, PriceChange, Product};
use crate::model::user::Permission;
use crate::model::{normalize_optional, Kyat, RecordId};
use crate::repo::product_repo::{ProductListQuery, ProductRepository, SqliteProductRepository};
use crate::repo::RepoError;
use crate::service::user_service::{AccessError, Session};
use crate::service::{matches_all_terms, search_terms};
use crate::time::now_epoch_ms;
use log::info;
use rusqlite::Connection;
use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// GS1 prefix reserved for in-store numbering.
pub const BARCODE_PREFIX: &str = "200";
/// Unit used when a new product leaves it blank ("piece").
pub const DEFAULT_UNIT: &str = "ခု";
const BARCODE_ATTEMPTS: usize = 100;

#[derive(Debug)]
pub enum InventoryError {
    ProductNotFound(RecordId),
    /// No unused barcode found within the attempt limit.
    BarcodeExhausted,
    Access(AccessError),
    Repo(RepoError),
}

impl Display for InventoryError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ProductNotFound(id) => write!(f, "product not found: {id}"),
            Self::BarcodeExhausted => write!(f, "could not generate a unique barcode"),
            Self::Access(err) => write!(f, "{err}"),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for InventoryError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Access(err) => Some(err),
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for InventoryError {
    fn from(value: RepoError) -> Self {
        Self::Repo(value)
    }
}

impl From<AccessError> for InventoryError {
    fn from(value: AccessError) -> Self {
        Self::Access(value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProductSortKey {
    Name,
    Category,
    Quantity,
    Cost,
    Price,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProductSort {
    pub key: ProductSortKey,
    pub descending: bool,
}

impl ProductSort {
    pub fn ascending(key: ProductSortKey) -> Self {
        Self {
            key,
            descending: false,
        }
    }

    pub fn descending(key: ProductSortKey) -> Self {
        Self {
            key,
            descending: true,
        }
    }

    fn compare(&self, a: &Product, b: &Product) -> Ordering {
        let ordering = match self.key {
            ProductSortKey::Name => a
                .product_name
                .to_lowercase()
                .cmp(&b.product_name.to_lowercase()),
            ProductSortKey::Category => a.category.to_lowercase().cmp(&b.category.to_lowercase()),
            ProductSortKey::Quantity => a.quantity.cmp(&b.quantity),
            ProductSortKey::Cost => a.cost.cmp(&b.cost),
            ProductSortKey::Price => a.price.cmp(&b.price),
        };
        if self.descending {
            ordering.reverse()
        } else {
            ordering
        }
    }
}

/// Figures shown above the inventory table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct InventoryStats {
    pub product_count: usize,
    pub category_count: usize,
    pub low_stock_count: usize,
    /// Σ price × quantity.
    pub stock_value: Kyat,
}

pub struct InventoryService<R: ProductRepository> {
    repo: R,
}

impl<'conn> InventoryService<SqliteProductRepository<'conn>> {
    pub fn from_connection(conn: &'conn Connection) -> Self {
        Self::new(SqliteProductRepository::new(conn))
    }
}

impl<R: ProductRepository> InventoryService<R> {
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    /// Creates a product, filling in code, barcode and unit when blank.
    pub fn create_product(
        &self,
        session: &Session,
        input: NewProduct,
    ) -> Result<Product, InventoryError> {
        session.require(Permission::ManageInventory)?;
        let now = now_epoch_ms();
        let product_code = match input.product_code.trim() {
            "" => format!("PRD-{now}"),
            code => code.to_string(),
        };
        let barcode = match normalize_optional(input.barcode) {
            Some(barcode) => barcode,
            None => self.generate_unique_barcode()?,
        };
        let unit = match input.unit.trim() {
            "" => DEFAULT_UNIT.to_string(),
            unit => unit.to_string(),
        };

        let product = Product {
            id: Uuid::new_v4(),
            product_code,
            barcode: Some(barcode),
            product_name: input.product_name.trim().to_string(),
            category: input.category.trim().to_string(),
            supplier: normalize_optional(input.supplier),
            unit,
            cost: input.cost,
            price: input.price,
            quantity: input.quantity,
            reorder_level: input.reorder_level,
            image_url: normalize_optional(input.image_url),
            created_at: now,
            updated_at: now,
        };
        self.repo.create_product(&product)?;
        info!(
            "event=product_create module=inventory status=ok code={}",
            product.product_code
        );
        Ok(product)
    }

    /// Saves catalog edits; returns the logged price change, if the price moved.
    /// Stock is left as stored; use [`Self::adjust_stock`] to move it.
    pub fn update_product(
        &self,
        session: &Session,
        product: &Product,
    ) -> Result<Option<PriceChange>, InventoryError> {
        session.require(Permission::ManageInventory)?;
        let mut product = product.clone();
        product.barcode = normalize_optional(product.barcode);
        product.supplier = normalize_optional(product.supplier);
        product.image_url = normalize_optional(product.image_url);

        let change = self.repo.update_product(&product).map_err(|err| match err {
            RepoError::NotFound { .. } => InventoryError::ProductNotFound(product.id),
            other => other.into(),
        })?;
        if let Some(change) = change {
            info!(
                "event=price_change module=inventory status=ok code={} old={} new={}",
                product.product_code, change.old_price, change.new_price
            );
        }
        Ok(change)
    }

    /// Receives (`delta > 0`) or writes off (`delta < 0`) stock.
    pub fn adjust_stock(
        &self,
        session: &Session,
        id: RecordId,
        delta: i64,
    ) -> Result<i64, InventoryError> {
        session.require(Permission::ManageInventory)?;
        let quantity = self.repo.adjust_stock(id, delta).map_err(|err| match err {
            RepoError::NotFound { .. } => InventoryError::ProductNotFound(id),
            other => other.into(),
        })?;
        info!("event=stock_adjust module=inventory status=ok delta={delta} quantity={quantity}");
        Ok(quantity)
    }

    pub fn delete_product(&self, session: &Session, id: RecordId) -> Result<(), InventoryError> {
        session.require(Permission::ManageInventory)?;
        self.repo.delete_product(id).map_err(|err| match err {
            RepoError::NotFound { .. } => InventoryError::ProductNotFound(id),
            other => other.into(),
        })
    }

    pub fn get_product(&self, id: RecordId) -> Result<Option<Product>, InventoryError> {
        Ok(self.repo.get_product(id)?)
    }

    pub fn get_by_code(&self, product_code: &str) -> Result<Option<Product>, InventoryError> {
        Ok(self.repo.get_by_code(product_code)?)
    }

    /// Scanner lookup.
    pub fn find_by_barcode(&self, barcode: &str) -> Result<Option<Product>, InventoryError> {
        if barcode.trim().is_empty() {
            return Ok(None);
        }
        Ok(self.repo.get_by_barcode(barcode)?)
    }

    pub fn price_history(&self, id: RecordId) -> Result<Vec<PriceChange>, InventoryError> {
        Ok(self.repo.price_history(id)?)
    }

    pub fn list_products(&self) -> Result<Vec<Product>, InventoryError> {
        Ok(self.repo.list_products(&ProductListQuery::default())?)
    }

    /// Term search over name, code, category and barcode.
    pub fn search_products(
        &self,
        query: &str,
        sort: Option<ProductSort>,
    ) -> Result<Vec<Product>, InventoryError> {
        let terms = search_terms(query);
        let mut products: Vec<Product> = self
            .repo
            .list_products(&ProductListQuery::default())?
            .into_iter()
            .filter(|product| {
                matches_all_terms(
                    &terms,
                    &[
                        product.product_name.as_str(),
                        product.product_code.as_str(),
                        product.category.as_str(),
                        product.barcode.as_deref().unwrap_or(""),
                    ],
                )
            })
            .collect();
        if let Some(sort) = sort {
            products.sort_by(|a, b| sort.compare(a, b));
        }
        Ok(products)
    }

    pub fn low_stock(&self) -> Result<Vec<Product>, InventoryError> {
        Ok(self.repo.list_products(&ProductListQuery {
            low_stock_only: true,
            ..ProductListQuery::default()
        })?)
    }

    pub fn stats(&self) -> Result<InventoryStats, InventoryError> {
        let products = self.repo.list_products(&ProductListQuery::default())?;
        Ok(inventory_stats(&products))
    }

    /// Distinct categories, sorted.
    pub fn categories(&self) -> Result<Vec<String>, InventoryError> {
        let products = self.repo.list_products(&ProductListQuery::default())?;
        let categories: BTreeSet<String> = products
            .into_iter()
            .map(|product| product.category)
            .collect();
        Ok(categories.into_iter().collect())
    }

    /// POS grid: every product, or those of one category.
    pub fn products_for_category(
        &self,
        category: Option<&str>,
    ) -> Result<Vec<Product>, InventoryError> {
        Ok(self.repo.list_products(&ProductListQuery {
            category: category.map(str::to_string),
            ..ProductListQuery::default()
        })?)
    }

    pub fn generate_unique_barcode(&self) -> Result<String, InventoryError> {
        for _ in 0..BARCODE_ATTEMPTS {
            let candidate = random_store_barcode();
            if !self.repo.barcode_exists(&candidate)? {
                return Ok(candidate);
            }
        }
        Err(InventoryError::BarcodeExhausted)
    }
}

pub fn inventory_stats(products: &[Product]) -> InventoryStats {
    let categories: BTreeSet<&str> = products
        .iter()
        .map(|product| product.category.as_str())
        .collect();
    InventoryStats {
        product_count: products.len(),
        category_count: categories.len(),
        low_stock_count: products.iter().filter(|p| p.is_low_stock()).count(),
        stock_value: products.iter().map(Product::stock_value).sum(),
    }
}

/// EAN-13 check digit for a 12-digit body.
///
/// Odd positions (1-based) weigh 1, even positions weigh 3.
pub fn ean13_checksum(body: &str) -> Option<u32> {
    if body.len() != 12 {
        return None;
    }
    let mut sum = 0;
    for (index, ch) in body.chars().enumerate() {
        let digit = ch.to_digit(10)?;
        sum += if index % 2 == 0 { digit } else { digit * 3 };
    }
    Some((10 - sum % 10) % 10)
}

pub fn is_valid_ean13(barcode: &str) -> bool {
    if barcode.len() != 13 {
        return false;
    }
    let (body, check) = barcode.split_at(12);
    match (ean13_checksum(body), check.chars().next().and_then(|c| c.to_digit(10))) {
        (Some(expected), Some(actual)) => expected == actual,
        _ => false,
    }
}

fn random_store_barcode() -> String {
    let random_part = 100_000_000 + Uuid::new_v4().as_u128() % 900_000_000;
    let body = format!("{BARCODE_PREFIX}{random_part}");
    let check = ean13_checksum(&body).unwrap_or(0);
    format!("{body}{check}")
}
