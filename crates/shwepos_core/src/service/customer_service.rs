//! Customer use-cases.
//!
//! Profile writes require `ManageCustomers` on the session.

use crate::model::customer::{Customer, NewCustomer};
use crate::model::user::Permission;
use crate::model::{normalize_optional, Kyat, RecordId};
use crate::repo::customer_repo::{CustomerRepository, SqliteCustomerRepository};
use crate::repo::RepoError;
use crate::service::user_service::{AccessError, Session};
use crate::service::{matches_all_terms, search_terms};
use crate::time::{local_date, now_epoch_ms, same_month};
use chrono::{DateTime, FixedOffset};
use rusqlite::Connection;
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

#[derive(Debug)]
pub enum CustomerServiceError {
    CustomerNotFound(RecordId),
    Access(AccessError),
    Repo(RepoError),
}

impl Display for CustomerServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::CustomerNotFound(id) => write!(f, "customer not found: {id}"),
            Self::Access(err) => write!(f, "{err}"),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for CustomerServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Access(err) => Some(err),
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for CustomerServiceError {
    fn from(value: RepoError) -> Self {
        Self::Repo(value)
    }
}

impl From<AccessError> for CustomerServiceError {
    fn from(value: AccessError) -> Self {
        Self::Access(value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CustomerStats {
    pub customer_count: usize,
    /// Customers created in the current local month.
    pub new_this_month: usize,
    pub total_purchases: Kyat,
}

pub struct CustomerService<R: CustomerRepository> {
    repo: R,
}

impl<'conn> CustomerService<SqliteCustomerRepository<'conn>> {
    pub fn from_connection(conn: &'conn Connection) -> Self {
        Self::new(SqliteCustomerRepository::new(conn))
    }
}

impl<R: CustomerRepository> CustomerService<R> {
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    /// New customers start with no points and no purchases.
    pub fn create_customer(
        &self,
        session: &Session,
        input: NewCustomer,
    ) -> Result<Customer, CustomerServiceError> {
        session.require(Permission::ManageCustomers)?;
        let now = now_epoch_ms();
        let customer = Customer {
            id: Uuid::new_v4(),
            customer_name: input.customer_name.trim().to_string(),
            customer_phone: input.customer_phone.trim().to_string(),
            customer_email: normalize_optional(input.customer_email),
            customer_address: normalize_optional(input.customer_address),
            total_purchases: 0,
            last_purchase: None,
            loyalty_points: 0,
            created_at: now,
            updated_at: now,
        };
        self.repo.create_customer(&customer)?;
        Ok(customer)
    }

    /// Saves profile fields; balances are owned by checkout and returns.
    pub fn update_customer(
        &self,
        session: &Session,
        customer: &Customer,
    ) -> Result<Customer, CustomerServiceError> {
        session.require(Permission::ManageCustomers)?;
        let mut customer = customer.clone();
        customer.customer_name = customer.customer_name.trim().to_string();
        customer.customer_phone = customer.customer_phone.trim().to_string();
        customer.customer_email = normalize_optional(customer.customer_email);
        customer.customer_address = normalize_optional(customer.customer_address);

        self.repo.update_customer(&customer).map_err(|err| match err {
            RepoError::NotFound { .. } => CustomerServiceError::CustomerNotFound(customer.id),
            other => other.into(),
        })?;
        self.repo
            .get_customer(customer.id)?
            .ok_or(CustomerServiceError::CustomerNotFound(customer.id))
    }

    pub fn delete_customer(
        &self,
        session: &Session,
        id: RecordId,
    ) -> Result<(), CustomerServiceError> {
        session.require(Permission::ManageCustomers)?;
        self.repo.delete_customer(id).map_err(|err| match err {
            RepoError::NotFound { .. } => CustomerServiceError::CustomerNotFound(id),
            other => other.into(),
        })
    }

    pub fn get_customer(&self, id: RecordId) -> Result<Option<Customer>, CustomerServiceError> {
        Ok(self.repo.get_customer(id)?)
    }

    pub fn list_customers(&self) -> Result<Vec<Customer>, CustomerServiceError> {
        Ok(self.repo.list_customers()?)
    }

    /// Term search over name, phone and email.
    pub fn search_customers(&self, query: &str) -> Result<Vec<Customer>, CustomerServiceError> {
        let terms = search_terms(query);
        Ok(self
            .repo
            .list_customers()?
            .into_iter()
            .filter(|customer| {
                matches_all_terms(
                    &terms,
                    &[
                        customer.customer_name.as_str(),
                        customer.customer_phone.as_str(),
                        customer.customer_email.as_deref().unwrap_or(""),
                    ],
                )
            })
            .collect())
    }

    pub fn stats(&self, now: DateTime<FixedOffset>) -> Result<CustomerStats, CustomerServiceError> {
        Ok(customer_stats(&self.repo.list_customers()?, now))
    }
}

pub fn customer_stats(customers: &[Customer], now: DateTime<FixedOffset>) -> CustomerStats {
    let offset = *now.offset();
    let today = now.date_naive();
    CustomerStats {
        customer_count: customers.len(),
        new_this_month: customers
            .iter()
            .filter(|customer| {
                local_date(customer.created_at, offset)
                    .map(|date| same_month(date, today))
                    .unwrap_or(false)
            })
            .count(),
        total_purchases: customers.iter().map(|c| c.total_purchases).sum(),
    }
}
