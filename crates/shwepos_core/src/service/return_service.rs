//! Return (refund) use-case against a completed sale.
//!
//! # Responsibility
//! - Validate the selection against the original sale and prior returns.
//! - Book a negative `Return` transaction; optionally restock.
//!
//! # Invariants
//! - Refund uses the unit price of the original sale line.
//! - Cumulative returned units per product never exceed the sold units.
//! - Loyalty points are left as they are.
//! - Only sessions with `ProcessReturns` may book a return; the cashier on
//!   the refund is the session's username.

use crate::model::transaction::{PaymentMethod, Transaction, TransactionKind, TransactionLine};
use crate::model::user::Permission;
use crate::model::{normalize_optional, Kyat, RecordId};
use crate::repo::transaction_repo::{SqliteTransactionRepository, TransactionRepository};
use crate::repo::RepoError;
use crate::service::checkout_service::transaction_number;
use crate::service::user_service::{AccessError, Session};
use crate::time::now_epoch_ms;
use log::{info, warn};
use rusqlite::Connection;
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReturnItem {
    pub product_code: String,
    pub quantity: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReturnRequest {
    pub original_transaction_id: RecordId,
    pub items: Vec<ReturnItem>,
    pub reason: Option<String>,
    /// Put returned units back on the shelf.
    pub restock: bool,
}

/// What is still returnable for one line of a sale.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReturnableLine {
    pub product_code: String,
    pub product_name: String,
    pub price: Kyat,
    pub sold: i64,
    pub returned: i64,
    pub remaining: i64,
}

#[derive(Debug)]
pub enum ReturnError {
    OriginalNotFound(RecordId),
    NotASale(RecordId),
    NothingToReturn,
    Access(AccessError),
    NegativeQuantity { product_code: String, quantity: i64 },
    /// Product code does not appear on the original sale.
    UnknownItem(String),
    ExceedsSold {
        product_code: String,
        requested: i64,
        remaining: i64,
    },
    Repo(RepoError),
}

impl Display for ReturnError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::OriginalNotFound(id) => write!(f, "original transaction not found: {id}"),
            Self::NotASale(id) => write!(f, "transaction {id} is not a sale"),
            Self::NothingToReturn => write!(f, "no items selected for return"),
            Self::Access(err) => write!(f, "{err}"),
            Self::NegativeQuantity {
                product_code,
                quantity,
            } => write!(f, "invalid return quantity {quantity} for `{product_code}`"),
            Self::UnknownItem(code) => write!(f, "`{code}` is not part of the original sale"),
            Self::ExceedsSold {
                product_code,
                requested,
                remaining,
            } => write!(
                f,
                "cannot return {requested} of `{product_code}`; {remaining} returnable"
            ),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for ReturnError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Access(err) => Some(err),
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for ReturnError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::ReturnExceedsSale {
                product_code,
                requested,
                remaining,
            } => Self::ExceedsSold {
                product_code,
                requested,
                remaining,
            },
            other => Self::Repo(other),
        }
    }
}

impl From<AccessError> for ReturnError {
    fn from(value: AccessError) -> Self {
        Self::Access(value)
    }
}

pub struct ReturnService<T: TransactionRepository> {
    transactions: T,
}

impl<'conn> ReturnService<SqliteTransactionRepository<'conn>> {
    pub fn from_connection(conn: &'conn Connection) -> Self {
        Self::new(SqliteTransactionRepository::new(conn))
    }
}

impl<T: TransactionRepository> ReturnService<T> {
    pub fn new(transactions: T) -> Self {
        Self { transactions }
    }

    /// Remaining returnable quantity per line of a sale.
    pub fn returnable_lines(
        &self,
        original_id: RecordId,
    ) -> Result<Vec<ReturnableLine>, ReturnError> {
        let original = self.load_sale(original_id)?;
        let returned = self.transactions.returned_quantities(original_id)?;
        Ok(returnable_from(&original, &returned))
    }

    pub fn process_return(
        &self,
        session: &Session,
        request: &ReturnRequest,
    ) -> Result<Transaction, ReturnError> {
        self.process_return_at(session, request, now_epoch_ms())
    }

    pub fn process_return_at(
        &self,
        session: &Session,
        request: &ReturnRequest,
        now_ms: i64,
    ) -> Result<Transaction, ReturnError> {
        session.require(Permission::ProcessReturns)?;

        let original = self.load_sale(request.original_transaction_id)?;
        let returned = self
            .transactions
            .returned_quantities(request.original_transaction_id)?;
        let returnable = returnable_from(&original, &returned);

        let mut requested: BTreeMap<&str, i64> = BTreeMap::new();
        for item in &request.items {
            if item.quantity < 0 {
                return Err(ReturnError::NegativeQuantity {
                    product_code: item.product_code.clone(),
                    quantity: item.quantity,
                });
            }
            if item.quantity == 0 {
                continue;
            }
            let total = requested.entry(item.product_code.as_str()).or_insert(0);
            *total = total.saturating_add(item.quantity);
        }
        if requested.is_empty() {
            return Err(ReturnError::NothingToReturn);
        }

        let mut lines = Vec::with_capacity(requested.len());
        for line in &returnable {
            let Some(&quantity) = requested.get(line.product_code.as_str()) else {
                continue;
            };
            if quantity > line.remaining {
                return Err(ReturnError::ExceedsSold {
                    product_code: line.product_code.clone(),
                    requested: quantity,
                    remaining: line.remaining,
                });
            }
            lines.push(TransactionLine::new(
                line.product_code.as_str(),
                line.product_name.as_str(),
                quantity,
                line.price,
            ));
        }
        if let Some(unknown) = requested
            .keys()
            .find(|code| !returnable.iter().any(|line| line.product_code == **code))
        {
            return Err(ReturnError::UnknownItem((*unknown).to_string()));
        }

        let refund: Kyat = lines.iter().map(|line| line.subtotal).sum();
        let transaction = Transaction {
            id: Uuid::new_v4(),
            kind: TransactionKind::Return,
            transaction_number: transaction_number("RTN", now_ms),
            original_transaction_id: Some(original.id),
            transaction_date: now_ms,
            lines,
            total_amount: -refund,
            paid_amount: -refund,
            change_amount: 0,
            discount: 0,
            tax: 0,
            payment_method: PaymentMethod::Return,
            cashier: session.user().username.clone(),
            customer_id: original.customer_id,
            return_reason: normalize_optional(request.reason.clone()),
            restocked: request.restock,
            created_at: now_ms,
        };

        if let Err(err) = self.transactions.commit_return(&transaction) {
            warn!(
                "event=process_return module=returns status=error original={} error={}",
                original.transaction_number, err
            );
            return Err(err.into());
        }

        info!(
            "event=process_return module=returns status=ok number={} original={} refund={} restocked={}",
            transaction.transaction_number,
            original.transaction_number,
            refund,
            transaction.restocked
        );
        Ok(transaction)
    }

    fn load_sale(&self, id: RecordId) -> Result<Transaction, ReturnError> {
        let transaction = self
            .transactions
            .get_transaction(id)?
            .ok_or(ReturnError::OriginalNotFound(id))?;
        if !transaction.is_sale() {
            return Err(ReturnError::NotASale(id));
        }
        Ok(transaction)
    }
}

fn returnable_from(
    original: &Transaction,
    returned: &BTreeMap<String, i64>,
) -> Vec<ReturnableLine> {
    let mut lines: Vec<ReturnableLine> = Vec::new();
    for line in &original.lines {
        if let Some(existing) = lines
            .iter_mut()
            .find(|entry| entry.product_code == line.product_code)
        {
            existing.sold += line.quantity;
            continue;
        }
        lines.push(ReturnableLine {
            product_code: line.product_code.clone(),
            product_name: line.product_name.clone(),
            price: line.price,
            sold: line.quantity,
            returned: 0,
            remaining: 0,
        });
    }
    for line in &mut lines {
        line.returned = returned.get(&line.product_code).copied().unwrap_or(0);
        line.remaining = (line.sold - line.returned).max(0);
    }
    lines
}
