//! Product repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Provide CRUD APIs over `products` and the `price_history` log.
//! - Keep stock guard and price logging inside the persistence boundary.
//!
//! # Invariants
//! - `update_product` appends one `price_history` row iff the price changed,
//!   in the same transaction as the product write.
//! - `update_product` never writes `quantity`. Stock moves only through
//!   `adjust_stock` and the sale and return commits.
//! - History is returned newest first.

use crate::model::product::{PriceChange, Product};
use crate::model::RecordId;
use crate::repo::{
    begin_write, map_unique_violation, parse_record_id, RepoError, RepoResult,
};
use crate::time::now_epoch_ms;
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};

const PRODUCT_SELECT_SQL: &str = "SELECT
    uuid,
    product_code,
    barcode,
    product_name,
    category,
    supplier,
    unit,
    cost,
    price,
    quantity,
    reorder_level,
    image_url,
    created_at,
    updated_at
FROM products";

/// Filter options for listing products.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProductListQuery {
    /// Exact category match.
    pub category: Option<String>,
    /// Only rows with `quantity <= reorder_level`.
    pub low_stock_only: bool,
    /// Exact supplier name match.
    pub supplier: Option<String>,
}

/// Repository interface for product CRUD and price history.
pub trait ProductRepository {
    fn create_product(&self, product: &Product) -> RepoResult<RecordId>;
    /// Persists catalog edits and returns the logged price change, if any.
    /// `product.quantity` is ignored.
    fn update_product(&self, product: &Product) -> RepoResult<Option<PriceChange>>;
    /// Adds `delta` to the stored stock and returns the new quantity.
    fn adjust_stock(&self, id: RecordId, delta: i64) -> RepoResult<i64>;
    fn get_product(&self, id: RecordId) -> RepoResult<Option<Product>>;
    fn get_by_code(&self, product_code: &str) -> RepoResult<Option<Product>>;
    fn get_by_barcode(&self, barcode: &str) -> RepoResult<Option<Product>>;
    fn list_products(&self, query: &ProductListQuery) -> RepoResult<Vec<Product>>;
    fn delete_product(&self, id: RecordId) -> RepoResult<()>;
    fn price_history(&self, id: RecordId) -> RepoResult<Vec<PriceChange>>;
    fn barcode_exists(&self, barcode: &str) -> RepoResult<bool>;
}

/// SQLite-backed product repository.
pub struct SqliteProductRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteProductRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }

    fn query_one(&self, column: &str, value: &str) -> RepoResult<Option<Product>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{PRODUCT_SELECT_SQL} WHERE {column} = ?1;"))?;
        let mut rows = stmt.query([value])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_product_row(row)?));
        }
        Ok(None)
    }
}

impl ProductRepository for SqliteProductRepository<'_> {
    fn create_product(&self, product: &Product) -> RepoResult<RecordId> {
        product.validate()?;

        self.conn
            .execute(
                "INSERT INTO products (
                    uuid,
                    product_code,
                    barcode,
                    product_name,
                    category,
                    supplier,
                    unit,
                    cost,
                    price,
                    quantity,
                    reorder_level,
                    image_url,
                    created_at,
                    updated_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14);",
                params![
                    product.id.to_string(),
                    product.product_code.as_str(),
                    product.barcode.as_deref(),
                    product.product_name.as_str(),
                    product.category.as_str(),
                    product.supplier.as_deref(),
                    product.unit.as_str(),
                    product.cost,
                    product.price,
                    product.quantity,
                    product.reorder_level,
                    product.image_url.as_deref(),
                    product.created_at,
                    product.updated_at,
                ],
            )
            .map_err(|err| {
                map_unique_violation(err, || {
                    format!(
                        "product code `{}` or barcode already exists",
                        product.product_code
                    )
                })
            })?;

        Ok(product.id)
    }

    fn update_product(&self, product: &Product) -> RepoResult<Option<PriceChange>> {
        product.validate()?;

        let tx = begin_write(self.conn)?;
        let old_price: Option<i64> = tx
            .query_row(
                "SELECT price FROM products WHERE uuid = ?1;",
                [product.id.to_string()],
                |row| row.get(0),
            )
            .optional()?;
        let Some(old_price) = old_price else {
            return Err(RepoError::not_found("product", product.id));
        };

        let now = now_epoch_ms();
        tx.execute(
            "UPDATE products
             SET
                product_code = ?1,
                barcode = ?2,
                product_name = ?3,
                category = ?4,
                supplier = ?5,
                unit = ?6,
                cost = ?7,
                price = ?8,
                reorder_level = ?9,
                image_url = ?10,
                updated_at = ?11
             WHERE uuid = ?12;",
            params![
                product.product_code.as_str(),
                product.barcode.as_deref(),
                product.product_name.as_str(),
                product.category.as_str(),
                product.supplier.as_deref(),
                product.unit.as_str(),
                product.cost,
                product.price,
                product.reorder_level,
                product.image_url.as_deref(),
                now,
                product.id.to_string(),
            ],
        )
        .map_err(|err| {
            map_unique_violation(err, || {
                format!(
                    "product code `{}` or barcode already exists",
                    product.product_code
                )
            })
        })?;

        let change = if old_price != product.price {
            tx.execute(
                "INSERT INTO price_history (product_uuid, changed_at, old_price, new_price)
                 VALUES (?1, ?2, ?3, ?4);",
                params![product.id.to_string(), now, old_price, product.price],
            )?;
            Some(PriceChange {
                changed_at: now,
                old_price,
                new_price: product.price,
            })
        } else {
            None
        };

        tx.commit()?;
        Ok(change)
    }

    fn adjust_stock(&self, id: RecordId, delta: i64) -> RepoResult<i64> {
        let tx = begin_write(self.conn)?;
        let current: Option<(String, i64)> = tx
            .query_row(
                "SELECT product_code, quantity FROM products WHERE uuid = ?1;",
                [id.to_string()],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;
        let Some((product_code, quantity)) = current else {
            return Err(RepoError::not_found("product", id));
        };

        let next = quantity.checked_add(delta).ok_or_else(|| {
            RepoError::InvalidData(format!("stock of `{product_code}` would overflow"))
        })?;
        if next < 0 {
            return Err(RepoError::InsufficientStock {
                product_code,
                requested: delta.saturating_neg(),
                available: quantity,
            });
        }

        tx.execute(
            "UPDATE products SET quantity = ?1, updated_at = ?2 WHERE uuid = ?3;",
            params![next, now_epoch_ms(), id.to_string()],
        )?;
        tx.commit()?;
        Ok(next)
    }

    fn get_product(&self, id: RecordId) -> RepoResult<Option<Product>> {
        self.query_one("uuid", &id.to_string())
    }

    fn get_by_code(&self, product_code: &str) -> RepoResult<Option<Product>> {
        self.query_one("product_code", product_code.trim())
    }

    fn get_by_barcode(&self, barcode: &str) -> RepoResult<Option<Product>> {
        self.query_one("barcode", barcode.trim())
    }

    fn list_products(&self, query: &ProductListQuery) -> RepoResult<Vec<Product>> {
        let mut sql = format!("{PRODUCT_SELECT_SQL} WHERE 1 = 1");
        let mut bind_values: Vec<Value> = Vec::new();

        if let Some(category) = query.category.as_ref() {
            sql.push_str(" AND category = ?");
            bind_values.push(Value::Text(category.clone()));
        }
        if let Some(supplier) = query.supplier.as_ref() {
            sql.push_str(" AND supplier = ?");
            bind_values.push(Value::Text(supplier.clone()));
        }
        if query.low_stock_only {
            sql.push_str(" AND quantity <= reorder_level");
        }
        sql.push_str(" ORDER BY created_at ASC, product_code ASC");

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let mut products = Vec::new();
        while let Some(row) = rows.next()? {
            products.push(parse_product_row(row)?);
        }
        Ok(products)
    }

    fn delete_product(&self, id: RecordId) -> RepoResult<()> {
        let changed = self
            .conn
            .execute("DELETE FROM products WHERE uuid = ?1;", [id.to_string()])?;
        if changed == 0 {
            return Err(RepoError::not_found("product", id));
        }
        Ok(())
    }

    fn price_history(&self, id: RecordId) -> RepoResult<Vec<PriceChange>> {
        let mut stmt = self.conn.prepare(
            "SELECT changed_at, old_price, new_price
             FROM price_history
             WHERE product_uuid = ?1
             ORDER BY changed_at DESC, id DESC;",
        )?;
        let mut rows = stmt.query([id.to_string()])?;
        let mut history = Vec::new();
        while let Some(row) = rows.next()? {
            history.push(PriceChange {
                changed_at: row.get("changed_at")?,
                old_price: row.get("old_price")?,
                new_price: row.get("new_price")?,
            });
        }
        Ok(history)
    }

    fn barcode_exists(&self, barcode: &str) -> RepoResult<bool> {
        let exists: i64 = self.conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM products WHERE barcode = ?1);",
            [barcode],
            |row| row.get(0),
        )?;
        Ok(exists == 1)
    }
}

pub(crate) fn parse_product_row(row: &Row<'_>) -> RepoResult<Product> {
    let uuid_text: String = row.get("uuid")?;
    let product = Product {
        id: parse_record_id(&uuid_text, "products.uuid")?,
        product_code: row.get("product_code")?,
        barcode: row.get("barcode")?,
        product_name: row.get("product_name")?,
        category: row.get("category")?,
        supplier: row.get("supplier")?,
        unit: row.get("unit")?,
        cost: row.get("cost")?,
        price: row.get("price")?,
        quantity: row.get("quantity")?,
        reorder_level: row.get("reorder_level")?,
        image_url: row.get("image_url")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    };
    product.validate()?;
    Ok(product)
}
