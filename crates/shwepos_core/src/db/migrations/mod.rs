//! Ordered schema upgrades for the store database.
//!
//! Each step runs in one transaction with the `user_version` bump, and the
//! upgraded store must pass `PRAGMA foreign_key_check` before it commits.

use crate::db::{DbError, DbResult};
use log::{info, warn};
use rusqlite::Connection;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy)]
struct Migration {
    version: u32,
    name: &'static str,
    sql: &'static str,
}

const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        name: "store_tables",
        sql: include_str!("0001_init.sql"),
    },
    Migration {
        version: 2,
        name: "reporting_indexes",
        sql: include_str!("0002_reporting_indexes.sql"),
    },
];

/// Newest schema this build can read and write.
pub fn latest_version() -> u32 {
    MIGRATIONS.last().map_or(0, |migration| migration.version)
}

/// Schema version recorded in the store file.
pub fn schema_version(conn: &Connection) -> DbResult<u32> {
    Ok(conn.query_row("PRAGMA user_version;", [], |row| row.get::<_, u32>(0))?)
}

/// Upgrades the store to [`latest_version`].
///
/// Refuses stores from newer builds. Rolls back when the upgraded data
/// holds dangling references.
pub fn apply_migrations(conn: &mut Connection) -> DbResult<()> {
    let current_version = schema_version(conn)?;
    let latest = latest_version();

    if current_version > latest {
        warn!("event=db_migrate module=db status=refused db_version={current_version}");
        return Err(DbError::UnsupportedSchemaVersion {
            db_version: current_version,
            latest_supported: latest,
        });
    }
    if current_version == latest {
        return Ok(());
    }

    let tx = conn.transaction()?;
    for migration in MIGRATIONS
        .iter()
        .filter(|migration| migration.version > current_version)
    {
        tx.execute_batch(migration.sql)?;
        tx.execute_batch(&format!("PRAGMA user_version = {};", migration.version))?;
        info!(
            "event=db_migrate_step module=db status=ok version={} name={}",
            migration.version, migration.name
        );
    }
    if let Some((table, rows)) = most_broken_table(&tx)? {
        warn!("event=db_migrate module=db status=rolled_back table={table} rows={rows}");
        return Err(DbError::BrokenReferences { table, rows });
    }
    tx.commit()?;

    info!(
        "event=db_migrate module=db status=ok from_version={current_version} to_version={latest}"
    );
    Ok(())
}

/// Table with the most dangling foreign keys, if any.
fn most_broken_table(conn: &Connection) -> DbResult<Option<(String, usize)>> {
    let mut stmt = conn.prepare("PRAGMA foreign_key_check;")?;
    let tables = stmt.query_map([], |row| row.get::<_, String>(0))?;
    let mut counts: BTreeMap<String, usize> = BTreeMap::new();
    for table in tables {
        *counts.entry(table?).or_insert(0) += 1;
    }
    Ok(counts.into_iter().max_by_key(|(_, rows)| *rows))
}
