//! Customer repository contracts and SQLite implementation.
//!
//! # Invariants
//! - `update_customer` writes profile fields only; `loyalty_points`,
//!   `total_purchases` and `last_purchase` change through the sale and return
//!   workflows in `transaction_repo`.

use crate::model::customer::Customer;
use crate::model::RecordId;
use crate::repo::{parse_record_id, RepoError, RepoResult};
use crate::time::now_epoch_ms;
use rusqlite::{params, Connection, Row};

const CUSTOMER_SELECT_SQL: &str = "SELECT
    uuid,
    customer_name,
    customer_phone,
    customer_email,
    customer_address,
    total_purchases,
    last_purchase,
    loyalty_points,
    created_at,
    updated_at
FROM customers";

pub trait CustomerRepository {
    fn create_customer(&self, customer: &Customer) -> RepoResult<RecordId>;
    fn update_customer(&self, customer: &Customer) -> RepoResult<()>;
    fn get_customer(&self, id: RecordId) -> RepoResult<Option<Customer>>;
    fn list_customers(&self) -> RepoResult<Vec<Customer>>;
    fn delete_customer(&self, id: RecordId) -> RepoResult<()>;
}

/// SQLite-backed customer repository.
pub struct SqliteCustomerRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteCustomerRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl CustomerRepository for SqliteCustomerRepository<'_> {
    fn create_customer(&self, customer: &Customer) -> RepoResult<RecordId> {
        customer.validate()?;

        self.conn.execute(
            "INSERT INTO customers (
                uuid,
                customer_name,
                customer_phone,
                customer_email,
                customer_address,
                total_purchases,
                last_purchase,
                loyalty_points,
                created_at,
                updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10);",
            params![
                customer.id.to_string(),
                customer.customer_name.as_str(),
                customer.customer_phone.as_str(),
                customer.customer_email.as_deref(),
                customer.customer_address.as_deref(),
                customer.total_purchases,
                customer.last_purchase,
                customer.loyalty_points,
                customer.created_at,
                customer.updated_at,
            ],
        )?;

        Ok(customer.id)
    }

    fn update_customer(&self, customer: &Customer) -> RepoResult<()> {
        customer.validate()?;

        let changed = self.conn.execute(
            "UPDATE customers
             SET
                customer_name = ?1,
                customer_phone = ?2,
                customer_email = ?3,
                customer_address = ?4,
                updated_at = ?5
             WHERE uuid = ?6;",
            params![
                customer.customer_name.as_str(),
                customer.customer_phone.as_str(),
                customer.customer_email.as_deref(),
                customer.customer_address.as_deref(),
                now_epoch_ms(),
                customer.id.to_string(),
            ],
        )?;

        if changed == 0 {
            return Err(RepoError::not_found("customer", customer.id));
        }
        Ok(())
    }

    fn get_customer(&self, id: RecordId) -> RepoResult<Option<Customer>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{CUSTOMER_SELECT_SQL} WHERE uuid = ?1;"))?;
        let mut rows = stmt.query([id.to_string()])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_customer_row(row)?));
        }
        Ok(None)
    }

    fn list_customers(&self) -> RepoResult<Vec<Customer>> {
        let mut stmt = self.conn.prepare(&format!(
            "{CUSTOMER_SELECT_SQL} ORDER BY created_at ASC, uuid ASC;"
        ))?;
        let mut rows = stmt.query([])?;
        let mut customers = Vec::new();
        while let Some(row) = rows.next()? {
            customers.push(parse_customer_row(row)?);
        }
        Ok(customers)
    }

    fn delete_customer(&self, id: RecordId) -> RepoResult<()> {
        let changed = self
            .conn
            .execute("DELETE FROM customers WHERE uuid = ?1;", [id.to_string()])?;
        if changed == 0 {
            return Err(RepoError::not_found("customer", id));
        }
        Ok(())
    }
}

fn parse_customer_row(row: &Row<'_>) -> RepoResult<Customer> {
    let uuid_text: String = row.get("uuid")?;
    let customer = Customer {
        id: parse_record_id(&uuid_text, "customers.uuid")?,
        customer_name: row.get("customer_name")?,
        customer_phone: row.get("customer_phone")?,
        customer_email: row.get("customer_email")?,
        customer_address: row.get("customer_address")?,
        total_purchases: row.get("total_purchases")?,
        last_purchase: row.get("last_purchase")?,
        loyalty_points: row.get("loyalty_points")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    };
    customer.validate()?;
    Ok(customer)
}
