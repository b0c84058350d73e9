//! Supplier use-cases.
//!
//! # Invariants
//! - Catalogs are normalized before validation, so a supplier is saved only
//!   with at least one category holding a non-blank product.
//! - Writes require `ManageSuppliers` on the session.

use crate::model::product::Product;
use crate::model::supplier::{normalize_catalog, NewSupplier, Supplier};
use crate::model::user::Permission;
use crate::model::{normalize_optional, RecordId};
use crate::repo::supplier_repo::{SqliteSupplierRepository, SupplierRepository};
use crate::repo::RepoError;
use crate::service::user_service::{AccessError, Session};
use crate::time::now_epoch_ms;
use rusqlite::Connection;
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

#[derive(Debug)]
pub enum SupplierServiceError {
    SupplierNotFound(RecordId),
    Access(AccessError),
    Repo(RepoError),
}

impl Display for SupplierServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SupplierNotFound(id) => write!(f, "supplier not found: {id}"),
            Self::Access(err) => write!(f, "{err}"),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for SupplierServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Access(err) => Some(err),
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for SupplierServiceError {
    fn from(value: RepoError) -> Self {
        Self::Repo(value)
    }
}

impl From<AccessError> for SupplierServiceError {
    fn from(value: AccessError) -> Self {
        Self::Access(value)
    }
}

pub struct SupplierService<R: SupplierRepository> {
    repo: R,
}

impl<'conn> SupplierService<SqliteSupplierRepository<'conn>> {
    pub fn from_connection(conn: &'conn Connection) -> Self {
        Self::new(SqliteSupplierRepository::new(conn))
    }
}

impl<R: SupplierRepository> SupplierService<R> {
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    pub fn create_supplier(
        &self,
        session: &Session,
        input: NewSupplier,
    ) -> Result<Supplier, SupplierServiceError> {
        session.require(Permission::ManageSuppliers)?;
        let now = now_epoch_ms();
        let supplier = Supplier {
            id: Uuid::new_v4(),
            supplier_name: input.supplier_name.trim().to_string(),
            supplier_phone: input.supplier_phone.trim().to_string(),
            supplier_email: normalize_optional(input.supplier_email),
            supplier_address: normalize_optional(input.supplier_address),
            catalog: normalize_catalog(input.catalog),
            created_at: now,
            updated_at: now,
        };
        self.repo.create_supplier(&supplier)?;
        Ok(supplier)
    }

    pub fn update_supplier(
        &self,
        session: &Session,
        supplier: &Supplier,
    ) -> Result<Supplier, SupplierServiceError> {
        session.require(Permission::ManageSuppliers)?;
        let mut supplier = supplier.clone();
        supplier.supplier_name = supplier.supplier_name.trim().to_string();
        supplier.supplier_phone = supplier.supplier_phone.trim().to_string();
        supplier.supplier_email = normalize_optional(supplier.supplier_email);
        supplier.supplier_address = normalize_optional(supplier.supplier_address);
        supplier.catalog = normalize_catalog(supplier.catalog);

        self.repo.update_supplier(&supplier).map_err(|err| match err {
            RepoError::NotFound { .. } => SupplierServiceError::SupplierNotFound(supplier.id),
            other => other.into(),
        })?;
        self.repo
            .get_supplier(supplier.id)?
            .ok_or(SupplierServiceError::SupplierNotFound(supplier.id))
    }

    pub fn delete_supplier(
        &self,
        session: &Session,
        id: RecordId,
    ) -> Result<(), SupplierServiceError> {
        session.require(Permission::ManageSuppliers)?;
        self.repo.delete_supplier(id).map_err(|err| match err {
            RepoError::NotFound { .. } => SupplierServiceError::SupplierNotFound(id),
            other => other.into(),
        })
    }

    pub fn get_supplier(&self, id: RecordId) -> Result<Option<Supplier>, SupplierServiceError> {
        Ok(self.repo.get_supplier(id)?)
    }

    pub fn list_suppliers(&self) -> Result<Vec<Supplier>, SupplierServiceError> {
        Ok(self.repo.list_suppliers()?)
    }
}

/// Number of stocked products whose supplier field names `supplier`.
pub fn supplied_product_count(supplier: &Supplier, products: &[Product]) -> usize {
    products
        .iter()
        .filter(|product| product.supplier.as_deref() == Some(supplier.supplier_name.as_str()))
        .count()
}
