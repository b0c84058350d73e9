//! Store database: connection bootstrap and schema upgrades.
//!
//! # Responsibility
//! - Open the shop's SQLite file (or an in-memory store for tests).
//! - Bring older store files up to the schema this build understands.
//!
//! # Invariants
//! - The schema version lives in `PRAGMA user_version`.
//! - A store written by a newer build is never opened, so its data cannot
//!   be rewritten by older code.
//! - An upgrade that finds sale lines, price history or supplier catalogs
//!   pointing at missing records is rolled back.

use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;

pub mod migrations;
mod open;

pub use open::{open_db, open_db_in_memory};

pub type DbResult<T> = Result<T, DbError>;

#[derive(Debug)]
pub enum DbError {
    Sqlite(rusqlite::Error),
    /// The store file could not be opened or created.
    Open {
        path: PathBuf,
        source: rusqlite::Error,
    },
    /// The store was last written by a newer ShwePOS build.
    UnsupportedSchemaVersion {
        db_version: u32,
        latest_supported: u32,
    },
    /// Rows in `table` reference records that no longer exist.
    BrokenReferences {
        table: String,
        rows: usize,
    },
}

impl Display for DbError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sqlite(err) => write!(f, "{err}"),
            Self::Open { path, source } => {
                write!(f, "cannot open store database {}: {source}", path.display())
            }
            Self::UnsupportedSchemaVersion {
                db_version,
                latest_supported,
            } => write!(
                f,
                "store database uses schema {db_version} but this ShwePOS build reads up to \
                 {latest_supported}; update the app before opening it"
            ),
            Self::BrokenReferences { table, rows } => write!(
                f,
                "store database has {rows} row(s) in `{table}` pointing at missing records"
            ),
        }
    }
}

impl Error for DbError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Sqlite(err) => Some(err),
            Self::Open { source, .. } => Some(source),
            Self::UnsupportedSchemaVersion { .. } | Self::BrokenReferences { .. } => None,
        }
    }
}

impl From<rusqlite::Error> for DbError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Sqlite(value)
    }
}
