//! Checkout use-case: turns a cart into a committed sale.
//!
//! # Responsibility
//! - Price the cart with the store tax rate and validate payment.
//! - Compute the customer's loyalty movement.
//! - Commit sale, stock and customer effects in one repository call.
//!
//! # Invariants
//! - Only sessions with `Sell` may check out; the cashier on the receipt is
//!   the session's username.
//! - A failed checkout leaves stock, customers and transactions untouched.
//! - `total_amount = subtotal - discount + tax`; `change = paid - total`.

use crate::model::transaction::{PaymentMethod, Transaction, TransactionKind};
use crate::model::user::Permission;
use crate::model::{Kyat, RecordId};
use crate::repo::customer_repo::{CustomerRepository, SqliteCustomerRepository};
use crate::repo::settings_repo::{SettingsRepository, SqliteSettingsRepository};
use crate::repo::transaction_repo::{
    CustomerSaleUpdate, SaleCommit, SqliteTransactionRepository, TransactionRepository,
};
use crate::repo::RepoError;
use crate::service::cart::Cart;
use crate::service::pricing::{change_due, CheckoutTotals, LoyaltyAdjustment, PricingError};
use crate::service::user_service::{AccessError, Session};
use crate::time::now_epoch_ms;
use log::{info, warn};
use rusqlite::Connection;
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Payment details collected by the checkout dialog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutRequest {
    pub payment_method: PaymentMethod,
    pub paid_amount: Kyat,
}

#[derive(Debug)]
pub enum CheckoutError {
    EmptyCart,
    Access(AccessError),
    /// `PaymentMethod::Return` is reserved for refunds.
    InvalidPaymentMethod(PaymentMethod),
    CustomerNotFound(RecordId),
    Pricing(PricingError),
    OutOfStock {
        product_code: String,
        requested: i64,
        available: i64,
    },
    /// The customer's balance changed after the cart was priced.
    PointsUnavailable {
        requested: i64,
        available: i64,
    },
    Repo(RepoError),
}

impl Display for CheckoutError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyCart => write!(f, "cart is empty"),
            Self::Access(err) => write!(f, "{err}"),
            Self::InvalidPaymentMethod(method) => {
                write!(f, "`{}` cannot be used to pay", method.as_str())
            }
            Self::CustomerNotFound(id) => write!(f, "customer not found: {id}"),
            Self::Pricing(err) => write!(f, "{err}"),
            Self::OutOfStock {
                product_code,
                requested,
                available,
            } => write!(
                f,
                "only {available} of `{product_code}` in stock, requested {requested}"
            ),
            Self::PointsUnavailable {
                requested,
                available,
            } => write!(
                f,
                "customer has {available} loyalty points, sale spends {requested}"
            ),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for CheckoutError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Access(err) => Some(err),
            Self::Pricing(err) => Some(err),
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<PricingError> for CheckoutError {
    fn from(value: PricingError) -> Self {
        Self::Pricing(value)
    }
}

impl From<RepoError> for CheckoutError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::InsufficientStock {
                product_code,
                requested,
                available,
            } => Self::OutOfStock {
                product_code,
                requested,
                available,
            },
            RepoError::InsufficientPoints {
                requested,
                available,
                ..
            } => Self::PointsUnavailable {
                requested,
                available,
            },
            other => Self::Repo(other),
        }
    }
}

impl From<AccessError> for CheckoutError {
    fn from(value: AccessError) -> Self {
        Self::Access(value)
    }
}

pub struct CheckoutService<T, C, S>
where
    T: TransactionRepository,
    C: CustomerRepository,
    S: SettingsRepository,
{
    transactions: T,
    customers: C,
    settings: S,
}

impl<'conn>
    CheckoutService<
        SqliteTransactionRepository<'conn>,
        SqliteCustomerRepository<'conn>,
        SqliteSettingsRepository<'conn>,
    >
{
    /// Wires SQLite repositories that share one connection.
    pub fn from_connection(conn: &'conn Connection) -> Self {
        Self::new(
            SqliteTransactionRepository::new(conn),
            SqliteCustomerRepository::new(conn),
            SqliteSettingsRepository::new(conn),
        )
    }
}

impl<T, C, S> CheckoutService<T, C, S>
where
    T: TransactionRepository,
    C: CustomerRepository,
    S: SettingsRepository,
{
    pub fn new(transactions: T, customers: C, settings: S) -> Self {
        Self {
            transactions,
            customers,
            settings,
        }
    }

    /// Prices the cart for display before payment is taken.
    pub fn quote(&self, cart: &Cart) -> Result<CheckoutTotals, CheckoutError> {
        let settings = self.settings.load_settings()?;
        Ok(CheckoutTotals::compute(
            cart.subtotal(),
            cart.discount(),
            settings.tax_rate_bps,
        )?)
    }

    pub fn checkout(
        &self,
        session: &Session,
        cart: &Cart,
        request: &CheckoutRequest,
    ) -> Result<Transaction, CheckoutError> {
        self.checkout_at(session, cart, request, now_epoch_ms())
    }

    /// Same as [`CheckoutService::checkout`] with an explicit sale time.
    pub fn checkout_at(
        &self,
        session: &Session,
        cart: &Cart,
        request: &CheckoutRequest,
        now_ms: i64,
    ) -> Result<Transaction, CheckoutError> {
        session.require(Permission::Sell)?;
        if cart.is_empty() {
            return Err(CheckoutError::EmptyCart);
        }
        if request.payment_method == PaymentMethod::Return {
            return Err(CheckoutError::InvalidPaymentMethod(request.payment_method));
        }

        let settings = self.settings.load_settings()?;
        let customer = match cart.customer_id() {
            Some(id) => Some(
                self.customers
                    .get_customer(id)?
                    .ok_or(CheckoutError::CustomerNotFound(id))?,
            ),
            None => None,
        };

        let totals =
            CheckoutTotals::compute(cart.subtotal(), cart.discount(), settings.tax_rate_bps)?;
        let change = change_due(totals.total, request.paid_amount)?;

        let customer_update = customer.as_ref().map(|customer| {
            let loyalty = LoyaltyAdjustment::for_sale(
                customer.loyalty_points,
                totals.discount,
                totals.total,
            );
            CustomerSaleUpdate {
                customer_id: customer.id,
                points_spent: loyalty.spent,
                points_earned: loyalty.earned,
                purchase_amount: totals.total,
            }
        });

        let transaction = Transaction {
            id: Uuid::new_v4(),
            kind: TransactionKind::Sale,
            transaction_number: transaction_number("TXN", now_ms),
            original_transaction_id: None,
            transaction_date: now_ms,
            lines: cart.transaction_lines(),
            total_amount: totals.total,
            paid_amount: request.paid_amount,
            change_amount: change,
            discount: totals.discount,
            tax: totals.tax,
            payment_method: request.payment_method,
            cashier: session.user().username.clone(),
            customer_id: customer.as_ref().map(|customer| customer.id),
            return_reason: None,
            restocked: false,
            created_at: now_ms,
        };

        let sale = SaleCommit {
            transaction,
            stock: cart.stock_decrements(),
            customer: customer_update,
        };
        if let Err(err) = self.transactions.commit_sale(&sale) {
            warn!(
                "event=checkout module=checkout status=error lines={} error={}",
                sale.transaction.lines.len(),
                err
            );
            return Err(err.into());
        }

        info!(
            "event=checkout module=checkout status=ok number={} total={} lines={} method={}",
            sale.transaction.transaction_number,
            sale.transaction.total_amount,
            sale.transaction.lines.len(),
            sale.transaction.payment_method.as_str()
        );
        Ok(sale.transaction)
    }
}

/// Receipt number `<prefix>-<epoch_ms>-<4 hex>`.
pub(crate) fn transaction_number(prefix: &str, now_ms: i64) -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!("{prefix}-{now_ms}-{}", suffix[..4].to_ascii_uppercase())
}

#[cfg(test)]
mod tests {
    use super::transaction_number;

    #[test]
    fn transaction_numbers_carry_prefix_and_time() {
        let number = transaction_number("TXN", 1_700_000_000_000);
        assert!(number.starts_with("TXN-1700000000000-"));
        assert_eq!(number.len(), "TXN-1700000000000-".len() + 4);
        assert!(number[18..].chars().all(|c| c.is_ascii_hexdigit()));
    }
}
