//! Transaction repository: sale/return persistence and their side effects.
//!
//! # Responsibility
//! - Persist sales and returns together with their lines.
//! - Apply stock, loyalty and customer-total side effects atomically.
//!
//! # Invariants
//! - `commit_sale` never drives product stock below zero; a failed stock
//!   guard rolls back the whole sale.
//! - `commit_return` re-checks returnable quantities inside its transaction,
//!   so cumulative returns never exceed what was sold.
//! - `commit_sale` spends loyalty points only if the balance still holds
//!   them when the write lock is taken.
//! - Customer `total_purchases` is clamped at zero.

use crate::model::transaction::{PaymentMethod, Transaction, TransactionKind, TransactionLine};
use crate::model::RecordId;
use crate::repo::{
    begin_write, bool_to_int, int_to_bool, map_unique_violation, parse_optional_record_id,
    parse_record_id, RepoError, RepoResult,
};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use std::collections::BTreeMap;

const TRANSACTION_SELECT_SQL: &str = "SELECT
    uuid,
    kind,
    transaction_number,
    original_transaction_uuid,
    transaction_date,
    total_amount,
    paid_amount,
    change_amount,
    discount,
    tax,
    payment_method,
    cashier,
    customer_uuid,
    return_reason,
    restocked,
    created_at
FROM transactions";

/// Filter options for listing transactions. Results are newest first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransactionListQuery {
    pub kind: Option<TransactionKind>,
    pub customer_id: Option<RecordId>,
    /// Inclusive lower bound on `transaction_date` (epoch ms).
    pub from_ms: Option<i64>,
    /// Exclusive upper bound on `transaction_date` (epoch ms).
    pub until_ms: Option<i64>,
    pub limit: Option<u32>,
}

/// Stock to take out of one product when a sale commits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StockDecrement {
    pub product_id: RecordId,
    pub product_code: String,
    pub quantity: i64,
}

/// Customer side effects of one sale.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CustomerSaleUpdate {
    pub customer_id: RecordId,
    /// Points redeemed for the discount; must still be on the balance at commit.
    pub points_spent: i64,
    pub points_earned: i64,
    pub purchase_amount: i64,
}

/// Everything `commit_sale` writes in one transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaleCommit {
    pub transaction: Transaction,
    pub stock: Vec<StockDecrement>,
    pub customer: Option<CustomerSaleUpdate>,
}

pub trait TransactionRepository {
    fn commit_sale(&self, sale: &SaleCommit) -> RepoResult<()>;
    /// Persists a return; restocks when `transaction.restocked` is set.
    fn commit_return(&self, transaction: &Transaction) -> RepoResult<()>;
    fn get_transaction(&self, id: RecordId) -> RepoResult<Option<Transaction>>;
    fn get_by_number(&self, transaction_number: &str) -> RepoResult<Option<Transaction>>;
    fn list_transactions(&self, query: &TransactionListQuery) -> RepoResult<Vec<Transaction>>;
    /// Units already returned against one sale, by product code.
    fn returned_quantities(&self, original_id: RecordId) -> RepoResult<BTreeMap<String, i64>>;
}

/// SQLite-backed transaction repository.
pub struct SqliteTransactionRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteTransactionRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }

    fn query_one(&self, column: &str, value: &str) -> RepoResult<Option<Transaction>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{TRANSACTION_SELECT_SQL} WHERE {column} = ?1;"))?;
        let mut rows = stmt.query([value])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_transaction_row(self.conn, row)?));
        }
        Ok(None)
    }
}

impl TransactionRepository for SqliteTransactionRepository<'_> {
    fn commit_sale(&self, sale: &SaleCommit) -> RepoResult<()> {
        let transaction = &sale.transaction;
        if transaction.kind != TransactionKind::Sale {
            return Err(RepoError::InvalidData(
                "commit_sale only accepts sale transactions".to_string(),
            ));
        }
        transaction.validate()?;

        let tx = begin_write(self.conn)?;
        insert_transaction(&tx, transaction)?;

        for decrement in &sale.stock {
            let changed = tx.execute(
                "UPDATE products
                 SET
                    quantity = quantity - ?1,
                    updated_at = ?2
                 WHERE uuid = ?3
                   AND quantity >= ?1;",
                params![
                    decrement.quantity,
                    transaction.created_at,
                    decrement.product_id.to_string(),
                ],
            )?;
            if changed == 0 {
                let available: Option<i64> = tx
                    .query_row(
                        "SELECT quantity FROM products WHERE uuid = ?1;",
                        [decrement.product_id.to_string()],
                        |row| row.get(0),
                    )
                    .optional()?;
                return Err(match available {
                    Some(available) => RepoError::InsufficientStock {
                        product_code: decrement.product_code.clone(),
                        requested: decrement.quantity,
                        available,
                    },
                    None => RepoError::not_found("product", decrement.product_id),
                });
            }
        }

        if let Some(update) = sale.customer {
            let changed = tx.execute(
                "UPDATE customers
                 SET
                    loyalty_points = loyalty_points - ?1 + ?2,
                    total_purchases = MAX(0, total_purchases + ?3),
                    last_purchase = ?4,
                    updated_at = ?4
                 WHERE uuid = ?5
                   AND loyalty_points >= ?1;",
                params![
                    update.points_spent,
                    update.points_earned,
                    update.purchase_amount,
                    transaction.transaction_date,
                    update.customer_id.to_string(),
                ],
            )?;
            if changed == 0 {
                let available: Option<i64> = tx
                    .query_row(
                        "SELECT loyalty_points FROM customers WHERE uuid = ?1;",
                        [update.customer_id.to_string()],
                        |row| row.get(0),
                    )
                    .optional()?;
                return Err(match available {
                    Some(available) => RepoError::InsufficientPoints {
                        customer_id: update.customer_id.to_string(),
                        requested: update.points_spent,
                        available,
                    },
                    None => RepoError::not_found("customer", update.customer_id),
                });
            }
        }

        tx.commit()?;
        Ok(())
    }

    fn commit_return(&self, transaction: &Transaction) -> RepoResult<()> {
        if transaction.kind != TransactionKind::Return {
            return Err(RepoError::InvalidData(
                "commit_return only accepts return transactions".to_string(),
            ));
        }
        transaction.validate()?;
        let Some(original_id) = transaction.original_transaction_id else {
            return Err(RepoError::InvalidData(
                "return transaction must reference the original sale".to_string(),
            ));
        };

        let tx = begin_write(self.conn)?;
        let original_uuid = original_id.to_string();
        let original_kind: Option<String> = tx
            .query_row(
                "SELECT kind FROM transactions WHERE uuid = ?1;",
                [original_uuid.as_str()],
                |row| row.get(0),
            )
            .optional()?;
        match original_kind.as_deref() {
            Some("sale") => {}
            Some(_) => {
                return Err(RepoError::InvalidData(format!(
                    "transaction {original_id} is not a sale"
                )))
            }
            None => return Err(RepoError::not_found("transaction", original_id)),
        }

        let sold = load_quantities_by_code(
            &tx,
            "SELECT product_code, SUM(quantity)
             FROM transaction_lines
             WHERE transaction_uuid = ?1
             GROUP BY product_code;",
            &original_uuid,
        )?;
        let returned = load_returned_quantities(&tx, &original_uuid)?;

        for line in &transaction.lines {
            let sold_qty = sold.get(&line.product_code).copied().unwrap_or(0);
            let returned_qty = returned.get(&line.product_code).copied().unwrap_or(0);
            let remaining = sold_qty - returned_qty;
            if line.quantity > remaining {
                return Err(RepoError::ReturnExceedsSale {
                    product_code: line.product_code.clone(),
                    requested: line.quantity,
                    remaining,
                });
            }
        }

        insert_transaction(&tx, transaction)?;

        if transaction.restocked {
            for line in &transaction.lines {
                // Products deleted since the sale are skipped.
                tx.execute(
                    "UPDATE products
                     SET
                        quantity = quantity + ?1,
                        updated_at = ?2
                     WHERE product_code = ?3;",
                    params![
                        line.quantity,
                        transaction.created_at,
                        line.product_code.as_str()
                    ],
                )?;
            }
        }

        if let Some(customer_id) = transaction.customer_id {
            tx.execute(
                "UPDATE customers
                 SET
                    total_purchases = MAX(0, total_purchases + ?1),
                    updated_at = ?2
                 WHERE uuid = ?3;",
                params![
                    transaction.total_amount,
                    transaction.created_at,
                    customer_id.to_string()
                ],
            )?;
        }

        tx.commit()?;
        Ok(())
    }

    fn get_transaction(&self, id: RecordId) -> RepoResult<Option<Transaction>> {
        self.query_one("uuid", &id.to_string())
    }

    fn get_by_number(&self, transaction_number: &str) -> RepoResult<Option<Transaction>> {
        self.query_one("transaction_number", transaction_number.trim())
    }

    fn list_transactions(&self, query: &TransactionListQuery) -> RepoResult<Vec<Transaction>> {
        let mut sql = format!("{TRANSACTION_SELECT_SQL} WHERE 1 = 1");
        let mut bind_values: Vec<Value> = Vec::new();

        if let Some(kind) = query.kind {
            sql.push_str(" AND kind = ?");
            bind_values.push(Value::Text(kind.as_str().to_string()));
        }
        if let Some(customer_id) = query.customer_id {
            sql.push_str(" AND customer_uuid = ?");
            bind_values.push(Value::Text(customer_id.to_string()));
        }
        if let Some(from_ms) = query.from_ms {
            sql.push_str(" AND transaction_date >= ?");
            bind_values.push(Value::Integer(from_ms));
        }
        if let Some(until_ms) = query.until_ms {
            sql.push_str(" AND transaction_date < ?");
            bind_values.push(Value::Integer(until_ms));
        }

        sql.push_str(" ORDER BY transaction_date DESC, created_at DESC, uuid ASC");
        if let Some(limit) = query.limit {
            sql.push_str(" LIMIT ?");
            bind_values.push(Value::Integer(i64::from(limit)));
        }

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let mut transactions = Vec::new();
        while let Some(row) = rows.next()? {
            transactions.push(parse_transaction_row(self.conn, row)?);
        }
        Ok(transactions)
    }

    fn returned_quantities(&self, original_id: RecordId) -> RepoResult<BTreeMap<String, i64>> {
        load_returned_quantities(self.conn, &original_id.to_string())
    }
}

fn insert_transaction(conn: &Connection, transaction: &Transaction) -> RepoResult<()> {
    let uuid = transaction.id.to_string();
    conn.execute(
        "INSERT INTO transactions (
            uuid,
            kind,
            transaction_number,
            original_transaction_uuid,
            transaction_date,
            total_amount,
            paid_amount,
            change_amount,
            discount,
            tax,
            payment_method,
            cashier,
            customer_uuid,
            return_reason,
            restocked,
            created_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16);",
        params![
            uuid.as_str(),
            transaction.kind.as_str(),
            transaction.transaction_number.as_str(),
            transaction.original_transaction_id.map(|id| id.to_string()),
            transaction.transaction_date,
            transaction.total_amount,
            transaction.paid_amount,
            transaction.change_amount,
            transaction.discount,
            transaction.tax,
            transaction.payment_method.as_str(),
            transaction.cashier.as_str(),
            transaction.customer_id.map(|id| id.to_string()),
            transaction.return_reason.as_deref(),
            bool_to_int(transaction.restocked),
            transaction.created_at,
        ],
    )
    .map_err(|err| {
        map_unique_violation(err, || {
            format!(
                "transaction number `{}` already exists",
                transaction.transaction_number
            )
        })
    })?;

    let mut stmt = conn.prepare(
        "INSERT INTO transaction_lines (
            transaction_uuid,
            line_no,
            product_code,
            product_name,
            quantity,
            price,
            subtotal
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7);",
    )?;
    for (line_no, line) in transaction.lines.iter().enumerate() {
        stmt.execute(params![
            uuid.as_str(),
            line_no as i64,
            line.product_code.as_str(),
            line.product_name.as_str(),
            line.quantity,
            line.price,
            line.subtotal,
        ])?;
    }
    Ok(())
}

fn load_returned_quantities(
    conn: &Connection,
    original_uuid: &str,
) -> RepoResult<BTreeMap<String, i64>> {
    load_quantities_by_code(
        conn,
        "SELECT l.product_code, SUM(l.quantity)
         FROM transaction_lines l
         INNER JOIN transactions t ON t.uuid = l.transaction_uuid
         WHERE t.original_transaction_uuid = ?1
           AND t.kind = 'return'
         GROUP BY l.product_code;",
        original_uuid,
    )
}

fn load_quantities_by_code(
    conn: &Connection,
    sql: &str,
    transaction_uuid: &str,
) -> RepoResult<BTreeMap<String, i64>> {
    let mut stmt = conn.prepare(sql)?;
    let mut rows = stmt.query([transaction_uuid])?;
    let mut quantities = BTreeMap::new();
    while let Some(row) = rows.next()? {
        let code: String = row.get(0)?;
        let quantity: i64 = row.get(1)?;
        quantities.insert(code, quantity);
    }
    Ok(quantities)
}

fn load_lines(conn: &Connection, transaction_uuid: &str) -> RepoResult<Vec<TransactionLine>> {
    let mut stmt = conn.prepare(
        "SELECT product_code, product_name, quantity, price, subtotal
         FROM transaction_lines
         WHERE transaction_uuid = ?1
         ORDER BY line_no ASC;",
    )?;
    let mut rows = stmt.query([transaction_uuid])?;
    let mut lines = Vec::new();
    while let Some(row) = rows.next()? {
        lines.push(TransactionLine {
            product_code: row.get("product_code")?,
            product_name: row.get("product_name")?,
            quantity: row.get("quantity")?,
            price: row.get("price")?,
            subtotal: row.get("subtotal")?,
        });
    }
    Ok(lines)
}

fn parse_transaction_row(conn: &Connection, row: &Row<'_>) -> RepoResult<Transaction> {
    let uuid_text: String = row.get("uuid")?;

    let kind_text: String = row.get("kind")?;
    let kind = TransactionKind::parse(&kind_text).ok_or_else(|| {
        RepoError::InvalidData(format!("invalid kind `{kind_text}` in transactions.kind"))
    })?;

    let method_text: String = row.get("payment_method")?;
    let payment_method = PaymentMethod::parse(&method_text).ok_or_else(|| {
        RepoError::InvalidData(format!(
            "invalid payment method `{method_text}` in transactions.payment_method"
        ))
    })?;

    let transaction = Transaction {
        id: parse_record_id(&uuid_text, "transactions.uuid")?,
        kind,
        transaction_number: row.get("transaction_number")?,
        original_transaction_id: parse_optional_record_id(
            row.get("original_transaction_uuid")?,
            "transactions.original_transaction_uuid",
        )?,
        transaction_date: row.get("transaction_date")?,
        lines: load_lines(conn, &uuid_text)?,
        total_amount: row.get("total_amount")?,
        paid_amount: row.get("paid_amount")?,
        change_amount: row.get("change_amount")?,
        discount: row.get("discount")?,
        tax: row.get("tax")?,
        payment_method,
        cashier: row.get("cashier")?,
        customer_id: parse_optional_record_id(
            row.get("customer_uuid")?,
            "transactions.customer_uuid",
        )?,
        return_reason: row.get("return_reason")?,
        restocked: int_to_bool(row.get("restocked")?, "transactions.restocked")?,
        created_at: row.get("created_at")?,
    };
    transaction.validate()?;
    Ok(transaction)
}
