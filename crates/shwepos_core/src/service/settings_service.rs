//! Store settings use-cases.
//!
//! Anyone may load settings; saving requires `ManageSettings`.

use crate::model::settings::StoreSettings;
use crate::model::user::Permission;
use crate::repo::settings_repo::{SettingsRepository, SqliteSettingsRepository};
use crate::repo::RepoError;
use crate::service::user_service::{AccessError, Session};
use log::info;
use rusqlite::Connection;
use std::error::Error;
use std::fmt::{Display, Formatter};

#[derive(Debug)]
pub enum SettingsError {
    Access(AccessError),
    Repo(RepoError),
}

impl Display for SettingsError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Access(err) => write!(f, "{err}"),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for SettingsError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Access(err) => Some(err),
            Self::Repo(err) => Some(err),
        }
    }
}

impl From<RepoError> for SettingsError {
    fn from(value: RepoError) -> Self {
        Self::Repo(value)
    }
}

impl From<AccessError> for SettingsError {
    fn from(value: AccessError) -> Self {
        Self::Access(value)
    }
}

pub struct SettingsService<R: SettingsRepository> {
    repo: R,
}

impl<'conn> SettingsService<SqliteSettingsRepository<'conn>> {
    pub fn from_connection(conn: &'conn Connection) -> Self {
        Self::new(SqliteSettingsRepository::new(conn))
    }
}

impl<R: SettingsRepository> SettingsService<R> {
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    pub fn load(&self) -> Result<StoreSettings, SettingsError> {
        Ok(self.repo.load_settings()?)
    }

    /// Validates and persists; text fields are trimmed first.
    pub fn save(
        &self,
        session: &Session,
        settings: StoreSettings,
    ) -> Result<StoreSettings, SettingsError> {
        session.require(Permission::ManageSettings)?;
        let settings = StoreSettings {
            store_name: settings.store_name.trim().to_string(),
            store_address: settings.store_address.trim().to_string(),
            store_phone: settings.store_phone.trim().to_string(),
            receipt_footer: settings.receipt_footer.trim().to_string(),
            ..settings
        };
        self.repo.save_settings(&settings)?;
        info!(
            "event=settings_save module=settings status=ok tax_rate_bps={} utc_offset_minutes={}",
            settings.tax_rate_bps, settings.utc_offset_minutes
        );
        Ok(settings)
    }
}
