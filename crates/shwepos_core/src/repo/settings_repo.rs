//! Single-row store settings persistence.

use crate::model::settings::StoreSettings;
use crate::repo::RepoResult;
use rusqlite::{params, Connection, OptionalExtension};

pub trait SettingsRepository {
    /// Returns stored settings, or defaults when none were saved yet.
    fn load_settings(&self) -> RepoResult<StoreSettings>;
    fn save_settings(&self, settings: &StoreSettings) -> RepoResult<()>;
}

pub struct SqliteSettingsRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteSettingsRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl SettingsRepository for SqliteSettingsRepository<'_> {
    fn load_settings(&self) -> RepoResult<StoreSettings> {
        let stored = self
            .conn
            .query_row(
                "SELECT
                    store_name,
                    store_address,
                    store_phone,
                    receipt_footer,
                    tax_rate_bps,
                    utc_offset_minutes
                 FROM store_settings
                 WHERE id = 1;",
                [],
                |row| {
                    Ok(StoreSettings {
                        store_name: row.get("store_name")?,
                        store_address: row.get("store_address")?,
                        store_phone: row.get("store_phone")?,
                        receipt_footer: row.get("receipt_footer")?,
                        tax_rate_bps: row.get("tax_rate_bps")?,
                        utc_offset_minutes: row.get("utc_offset_minutes")?,
                    })
                },
            )
            .optional()?;

        let settings = stored.unwrap_or_default();
        settings.validate()?;
        Ok(settings)
    }

    fn save_settings(&self, settings: &StoreSettings) -> RepoResult<()> {
        settings.validate()?;

        self.conn.execute(
            "INSERT INTO store_settings (
                id,
                store_name,
                store_address,
                store_phone,
                receipt_footer,
                tax_rate_bps,
                utc_offset_minutes
            ) VALUES (1, ?1, ?2, ?3, ?4, ?5, ?6)
            ON CONFLICT(id) DO UPDATE SET
                store_name = excluded.store_name,
                store_address = excluded.store_address,
                store_phone = excluded.store_phone,
                receipt_footer = excluded.receipt_footer,
                tax_rate_bps = excluded.tax_rate_bps,
                utc_offset_minutes = excluded.utc_offset_minutes;",
            params![
                settings.store_name.as_str(),
                settings.store_address.as_str(),
                settings.store_phone.as_str(),
                settings.receipt_footer.as_str(),
                settings.tax_rate_bps,
                settings.utc_offset_minutes,
            ],
        )?;
        Ok(())
    }
}
