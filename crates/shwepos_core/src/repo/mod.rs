//! Repository layer abstractions and persistence implementations.
//!
//! # Responsibility
//! - Define use-case oriented data access contracts per aggregate.
//! - Isolate SQLite query details from service/business orchestration.
//!
//! # Invariants
//! - Write paths call the model's `validate()` before SQL mutations.
//! - Multi-row writes (price edits, checkout, returns, catalogs) run inside a
//!   single `IMMEDIATE` transaction.
//! - Repository APIs return semantic errors (`NotFound`, `Conflict`,
//!   `InsufficientStock`) in addition to DB transport errors.

pub mod customer_repo;
pub mod product_repo;
pub mod settings_repo;
pub mod supplier_repo;
pub mod transaction_repo;
pub mod user_repo;

use crate::db::DbError;
use crate::model::{ModelValidationError, RecordId};
use rusqlite::{Connection, Transaction, TransactionBehavior};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

pub type RepoResult<T> = Result<T, RepoError>;

/// Repository error shared by every aggregate.
#[derive(Debug)]
pub enum RepoError {
    Validation(ModelValidationError),
    Db(DbError),
    NotFound {
        entity: &'static str,
        id: String,
    },
    /// Unique key already taken (product code, barcode, username, number).
    Conflict(String),
    /// Stock guard failed while committing a sale.
    InsufficientStock {
        product_code: String,
        requested: i64,
        available: i64,
    },
    /// Loyalty points spent by a sale are no longer on the customer's balance.
    InsufficientPoints {
        customer_id: String,
        requested: i64,
        available: i64,
    },
    /// Return would refund more units than the sale still has.
    ReturnExceedsSale {
        product_code: String,
        requested: i64,
        remaining: i64,
    },
    InvalidData(String),
}

impl RepoError {
    pub(crate) fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::Db(err) => write!(f, "{err}"),
            Self::NotFound { entity, id } => write!(f, "{entity} not found: {id}"),
            Self::Conflict(message) => write!(f, "conflict: {message}"),
            Self::InsufficientStock {
                product_code,
                requested,
                available,
            } => write!(
                f,
                "insufficient stock for `{product_code}`: requested {requested}, available {available}"
            ),
            Self::InsufficientPoints {
                customer_id,
                requested,
                available,
            } => write!(
                f,
                "customer {customer_id} has {available} loyalty points, sale spends {requested}"
            ),
            Self::ReturnExceedsSale {
                product_code,
                requested,
                remaining,
            } => write!(
                f,
                "cannot return {requested} of `{product_code}`; only {remaining} left on the sale"
            ),
            Self::InvalidData(message) => write!(f, "invalid persisted data: {message}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ModelValidationError> for RepoError {
    fn from(value: ModelValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Starts an `IMMEDIATE` write transaction on a shared connection borrow.
///
/// Repositories hold `&Connection` so several of them can be alive at once;
/// the write lock is still taken up front.
pub(crate) fn begin_write(conn: &Connection) -> RepoResult<Transaction<'_>> {
    Ok(Transaction::new_unchecked(
        conn,
        TransactionBehavior::Immediate,
    )?)
}

/// Maps UNIQUE/PRIMARY KEY violations to `RepoError::Conflict`.
pub(crate) fn map_unique_violation(
    err: rusqlite::Error,
    describe: impl FnOnce() -> String,
) -> RepoError {
    if let rusqlite::Error::SqliteFailure(code, _) = &err {
        if code.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
            || code.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY
        {
            return RepoError::Conflict(describe());
        }
    }
    err.into()
}

pub(crate) fn parse_record_id(value: &str, column: &str) -> RepoResult<RecordId> {
    Uuid::parse_str(value)
        .map_err(|_| RepoError::InvalidData(format!("invalid uuid value `{value}` in {column}")))
}

pub(crate) fn parse_optional_record_id(
    value: Option<String>,
    column: &str,
) -> RepoResult<Option<RecordId>> {
    value
        .map(|text| parse_record_id(&text, column))
        .transpose()
}

pub(crate) fn bool_to_int(value: bool) -> i64 {
    if value {
        1
    } else {
        0
    }
}

pub(crate) fn int_to_bool(value: i64, column: &str) -> RepoResult<bool> {
    match value {
        0 => Ok(false),
        1 => Ok(true),
        other => Err(RepoError::InvalidData(format!(
            "invalid boolean value `{other}` in {column}"
        ))),
    }
}
