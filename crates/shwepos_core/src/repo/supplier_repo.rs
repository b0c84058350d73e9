//! Supplier repository contracts and SQLite implementation.
//!
//! # Invariants
//! - A supplier row and its `supplier_products` catalog are written in one
//!   transaction; updates replace the whole catalog.
//! - Catalog order (category, then product) is preserved via position columns.

use crate::model::supplier::{Supplier, SupplierCategory};
use crate::model::RecordId;
use crate::repo::{begin_write, parse_record_id, RepoError, RepoResult};
use crate::time::now_epoch_ms;
use rusqlite::{params, Connection, Row};

const SUPPLIER_SELECT_SQL: &str = "SELECT
    uuid,
    supplier_name,
    supplier_phone,
    supplier_email,
    supplier_address,
    created_at,
    updated_at
FROM suppliers";

pub trait SupplierRepository {
    fn create_supplier(&self, supplier: &Supplier) -> RepoResult<RecordId>;
    fn update_supplier(&self, supplier: &Supplier) -> RepoResult<()>;
    fn get_supplier(&self, id: RecordId) -> RepoResult<Option<Supplier>>;
    fn list_suppliers(&self) -> RepoResult<Vec<Supplier>>;
    fn delete_supplier(&self, id: RecordId) -> RepoResult<()>;
}

/// SQLite-backed supplier repository.
pub struct SqliteSupplierRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteSupplierRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }

    fn load_catalog(&self, supplier_uuid: &str) -> RepoResult<Vec<SupplierCategory>> {
        let mut stmt = self.conn.prepare(
            "SELECT category_position, category, product_name
             FROM supplier_products
             WHERE supplier_uuid = ?1
             ORDER BY category_position ASC, product_position ASC;",
        )?;
        let mut rows = stmt.query([supplier_uuid])?;
        let mut catalog: Vec<SupplierCategory> = Vec::new();
        let mut current_position: Option<i64> = None;
        while let Some(row) = rows.next()? {
            let position: i64 = row.get("category_position")?;
            let category: String = row.get("category")?;
            let product_name: String = row.get("product_name")?;
            if current_position == Some(position) {
                if let Some(entry) = catalog.last_mut() {
                    entry.products.push(product_name);
                    continue;
                }
            }
            current_position = Some(position);
            catalog.push(SupplierCategory {
                category,
                products: vec![product_name],
            });
        }
        Ok(catalog)
    }

    fn parse_with_catalog(&self, row: &Row<'_>) -> RepoResult<Supplier> {
        let uuid_text: String = row.get("uuid")?;
        let supplier = Supplier {
            id: parse_record_id(&uuid_text, "suppliers.uuid")?,
            supplier_name: row.get("supplier_name")?,
            supplier_phone: row.get("supplier_phone")?,
            supplier_email: row.get("supplier_email")?,
            supplier_address: row.get("supplier_address")?,
            catalog: self.load_catalog(&uuid_text)?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        };
        supplier.validate()?;
        Ok(supplier)
    }
}

impl SupplierRepository for SqliteSupplierRepository<'_> {
    fn create_supplier(&self, supplier: &Supplier) -> RepoResult<RecordId> {
        supplier.validate()?;

        let tx = begin_write(self.conn)?;
        tx.execute(
            "INSERT INTO suppliers (
                uuid,
                supplier_name,
                supplier_phone,
                supplier_email,
                supplier_address,
                created_at,
                updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7);",
            params![
                supplier.id.to_string(),
                supplier.supplier_name.as_str(),
                supplier.supplier_phone.as_str(),
                supplier.supplier_email.as_deref(),
                supplier.supplier_address.as_deref(),
                supplier.created_at,
                supplier.updated_at,
            ],
        )?;
        insert_catalog(&tx, &supplier.id.to_string(), &supplier.catalog)?;
        tx.commit()?;

        Ok(supplier.id)
    }

    fn update_supplier(&self, supplier: &Supplier) -> RepoResult<()> {
        supplier.validate()?;

        let supplier_uuid = supplier.id.to_string();
        let tx = begin_write(self.conn)?;
        let changed = tx.execute(
            "UPDATE suppliers
             SET
                supplier_name = ?1,
                supplier_phone = ?2,
                supplier_email = ?3,
                supplier_address = ?4,
                updated_at = ?5
             WHERE uuid = ?6;",
            params![
                supplier.supplier_name.as_str(),
                supplier.supplier_phone.as_str(),
                supplier.supplier_email.as_deref(),
                supplier.supplier_address.as_deref(),
                now_epoch_ms(),
                supplier_uuid.as_str(),
            ],
        )?;
        if changed == 0 {
            return Err(RepoError::not_found("supplier", supplier.id));
        }

        tx.execute(
            "DELETE FROM supplier_products WHERE supplier_uuid = ?1;",
            [supplier_uuid.as_str()],
        )?;
        insert_catalog(&tx, &supplier_uuid, &supplier.catalog)?;
        tx.commit()?;
        Ok(())
    }

    fn get_supplier(&self, id: RecordId) -> RepoResult<Option<Supplier>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{SUPPLIER_SELECT_SQL} WHERE uuid = ?1;"))?;
        let mut rows = stmt.query([id.to_string()])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(self.parse_with_catalog(row)?));
        }
        Ok(None)
    }

    fn list_suppliers(&self) -> RepoResult<Vec<Supplier>> {
        let mut stmt = self.conn.prepare(&format!(
            "{SUPPLIER_SELECT_SQL} ORDER BY supplier_name COLLATE NOCASE ASC, uuid ASC;"
        ))?;
        let mut rows = stmt.query([])?;
        let mut suppliers = Vec::new();
        while let Some(row) = rows.next()? {
            suppliers.push(self.parse_with_catalog(row)?);
        }
        Ok(suppliers)
    }

    fn delete_supplier(&self, id: RecordId) -> RepoResult<()> {
        let changed = self
            .conn
            .execute("DELETE FROM suppliers WHERE uuid = ?1;", [id.to_string()])?;
        if changed == 0 {
            return Err(RepoError::not_found("supplier", id));
        }
        Ok(())
    }
}

fn insert_catalog(
    conn: &Connection,
    supplier_uuid: &str,
    catalog: &[SupplierCategory],
) -> RepoResult<()> {
    let mut stmt = conn.prepare(
        "INSERT INTO supplier_products (
            supplier_uuid,
            category_position,
            product_position,
            category,
            product_name
        ) VALUES (?1, ?2, ?3, ?4, ?5);",
    )?;
    for (category_position, entry) in catalog.iter().enumerate() {
        for (product_position, product_name) in entry.products.iter().enumerate() {
            stmt.execute(params![
                supplier_uuid,
                category_position as i64,
                product_position as i64,
                entry.category.as_str(),
                product_name.as_str(),
            ])?;
        }
    }
    Ok(())
}
