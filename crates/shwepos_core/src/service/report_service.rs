//! Sales, profit and finance reporting.
//!
//! # Responsibility
//! - Derive COGS and profit per transaction and per period.
//! - Build the finance overview, daily sales, top products and payment mix.
//! - Filter the transaction history for the history screen.
//!
//! # Invariants
//! - Product cost is looked up by product code at report time; unknown codes
//!   cost 0.
//! - Return COGS is credited back: `cogs = Σ sale cogs - Σ return cogs`.
//! - Calendar periods use the offset carried by `now`; weeks run Sunday to
//!   Saturday.
//! - Top products and payment mix count sales only.

use crate::model::customer::Customer;
use crate::model::product::Product;
use crate::model::transaction::{PaymentMethod, Transaction};
use crate::model::{Kyat, RecordId};
use crate::repo::customer_repo::{CustomerRepository, SqliteCustomerRepository};
use crate::repo::product_repo::{ProductListQuery, ProductRepository, SqliteProductRepository};
use crate::repo::transaction_repo::{
    SqliteTransactionRepository, TransactionListQuery, TransactionRepository,
};
use crate::repo::RepoError;
use crate::service::{matches_all_terms, search_terms};
use crate::time::{local_date, same_month, week_start};
use chrono::{DateTime, Duration, FixedOffset, NaiveDate};
use rusqlite::Connection;
use std::collections::{BTreeMap, HashMap};
use std::error::Error;
use std::fmt::{Display, Formatter};

pub const DEFAULT_TOP_PRODUCTS: usize = 5;
pub const DEFAULT_SALES_DAYS: u32 = 7;

#[derive(Debug)]
pub enum ReportError {
    TransactionNotFound(RecordId),
    Repo(RepoError),
}

impl Display for ReportError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::TransactionNotFound(id) => write!(f, "transaction not found: {id}"),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for ReportError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for ReportError {
    fn from(value: RepoError) -> Self {
        Self::Repo(value)
    }
}

/// Current unit cost per product code.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProductCosts {
    costs: HashMap<String, Kyat>,
}

impl ProductCosts {
    pub fn from_products(products: &[Product]) -> Self {
        Self {
            costs: products
                .iter()
                .map(|product| (product.product_code.clone(), product.cost))
                .collect(),
        }
    }

    pub fn cost_of(&self, product_code: &str) -> Kyat {
        self.costs.get(product_code).copied().unwrap_or(0)
    }
}

/// Calendar window relative to "now".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DateRange {
    #[default]
    All,
    Today,
    ThisWeek,
    ThisMonth,
}

impl DateRange {
    pub fn contains(self, epoch_ms: i64, now: DateTime<FixedOffset>) -> bool {
        if self == DateRange::All {
            return true;
        }
        let Some(date) = local_date(epoch_ms, *now.offset()) else {
            return false;
        };
        let today = now.date_naive();
        match self {
            DateRange::All => true,
            DateRange::Today => date == today,
            DateRange::ThisWeek => week_start(date) == week_start(today),
            DateRange::ThisMonth => same_month(date, today),
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "all" => Some(DateRange::All),
            "today" => Some(DateRange::Today),
            "week" => Some(DateRange::ThisWeek),
            "month" => Some(DateRange::ThisMonth),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PeriodMetrics {
    /// Σ total_amount; returns count negative.
    pub revenue: Kyat,
    pub cogs: Kyat,
    pub profit: Kyat,
    pub transaction_count: usize,
}

/// Per-transaction view used by the detail dialog.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransactionBreakdown {
    pub subtotal: Kyat,
    pub cogs: Kyat,
    /// `subtotal - discount - cogs`.
    pub profit: Kyat,
    pub profit_margin_percent: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FinanceSummary {
    pub total_revenue: Kyat,
    pub total_cogs: Kyat,
    pub total_profit: Kyat,
    pub total_tax: Kyat,
    pub profit_margin_percent: f64,
    pub today: PeriodMetrics,
    pub this_week: PeriodMetrics,
    pub this_month: PeriodMetrics,
    /// Sales only, in `PaymentMethod` order.
    pub payment_totals: Vec<(PaymentMethod, Kyat)>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DailySales {
    pub date: NaiveDate,
    pub total: Kyat,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductSales {
    pub product_code: String,
    pub product_name: String,
    pub quantity: i64,
    pub revenue: Kyat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaymentSummary {
    pub method: PaymentMethod,
    pub count: usize,
    pub amount: Kyat,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransactionFilter {
    pub date_range: DateRange,
    pub payment_method: Option<PaymentMethod>,
    pub customer_id: Option<RecordId>,
    /// Terms over number, customer name/phone and item names.
    pub search: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilteredTransactions {
    /// Newest first.
    pub transactions: Vec<Transaction>,
    pub total_amount: Kyat,
    pub total_profit: Kyat,
    pub count: usize,
}

pub fn transaction_cogs(transaction: &Transaction, costs: &ProductCosts) -> Kyat {
    transaction
        .lines
        .iter()
        .map(|line| costs.cost_of(&line.product_code) * line.quantity)
        .sum()
}

/// Sale: `total - tax - cogs`. Return: `total + cogs` (refund out, goods back).
pub fn transaction_profit(transaction: &Transaction, costs: &ProductCosts) -> Kyat {
    let cogs = transaction_cogs(transaction, costs);
    if transaction.is_return() {
        transaction.total_amount + cogs
    } else {
        transaction.total_amount - transaction.tax - cogs
    }
}

pub fn transaction_breakdown(
    transaction: &Transaction,
    costs: &ProductCosts,
) -> TransactionBreakdown {
    let subtotal = transaction.lines_subtotal();
    let cogs = transaction_cogs(transaction, costs);
    let revenue = subtotal - transaction.discount;
    let profit = revenue - cogs;
    TransactionBreakdown {
        subtotal,
        cogs,
        profit,
        profit_margin_percent: profit_margin_percent(profit, revenue),
    }
}

/// `profit / revenue * 100`, or 0 when revenue is not positive.
pub fn profit_margin_percent(profit: Kyat, revenue: Kyat) -> f64 {
    if revenue <= 0 {
        return 0.0;
    }
    profit as f64 / revenue as f64 * 100.0
}

pub fn period_metrics<'a>(
    transactions: impl IntoIterator<Item = &'a Transaction>,
    costs: &ProductCosts,
) -> PeriodMetrics {
    let mut metrics = PeriodMetrics::default();
    for transaction in transactions {
        let cogs = transaction_cogs(transaction, costs);
        metrics.revenue += transaction.total_amount;
        if transaction.is_return() {
            metrics.cogs -= cogs;
        } else {
            metrics.cogs += cogs;
        }
        metrics.transaction_count += 1;
    }
    metrics.profit = metrics.revenue - metrics.cogs;
    metrics
}

pub fn finance_summary(
    transactions: &[Transaction],
    costs: &ProductCosts,
    now: DateTime<FixedOffset>,
) -> FinanceSummary {
    let total = period_metrics(transactions, costs);
    let in_range = |range: DateRange| {
        period_metrics(
            transactions
                .iter()
                .filter(|t| range.contains(t.transaction_date, now)),
            costs,
        )
    };

    let mut payment_totals: BTreeMap<PaymentMethod, Kyat> = BTreeMap::new();
    for transaction in transactions.iter().filter(|t| t.is_sale()) {
        *payment_totals.entry(transaction.payment_method).or_insert(0) +=
            transaction.total_amount;
    }

    FinanceSummary {
        total_revenue: total.revenue,
        total_cogs: total.cogs,
        total_profit: total.profit,
        total_tax: transactions.iter().map(|t| t.tax).sum(),
        profit_margin_percent: profit_margin_percent(total.profit, total.revenue),
        today: in_range(DateRange::Today),
        this_week: in_range(DateRange::ThisWeek),
        this_month: in_range(DateRange::ThisMonth),
        payment_totals: payment_totals.into_iter().collect(),
    }
}

/// Net totals for the last `days` local days ending today, oldest first.
pub fn sales_by_day(
    transactions: &[Transaction],
    now: DateTime<FixedOffset>,
    days: u32,
) -> Vec<DailySales> {
    let offset = *now.offset();
    let today = now.date_naive();
    let mut totals: BTreeMap<NaiveDate, Kyat> = BTreeMap::new();
    for transaction in transactions {
        if let Some(date) = local_date(transaction.transaction_date, offset) {
            *totals.entry(date).or_insert(0) += transaction.total_amount;
        }
    }

    (0..i64::from(days))
        .rev()
        .map(|back| {
            let date = today - Duration::days(back);
            DailySales {
                date,
                total: totals.get(&date).copied().unwrap_or(0),
            }
        })
        .collect()
}

/// Best sellers by line revenue, sales only.
pub fn top_products(transactions: &[Transaction], limit: usize) -> Vec<ProductSales> {
    let mut by_code: Vec<ProductSales> = Vec::new();
    for line in transactions
        .iter()
        .filter(|t| t.is_sale())
        .flat_map(|t| t.lines.iter())
    {
        match by_code
            .iter_mut()
            .find(|entry| entry.product_code == line.product_code)
        {
            Some(entry) => {
                entry.quantity += line.quantity;
                entry.revenue += line.subtotal;
            }
            None => by_code.push(ProductSales {
                product_code: line.product_code.clone(),
                product_name: line.product_name.clone(),
                quantity: line.quantity,
                revenue: line.subtotal,
            }),
        }
    }
    by_code.sort_by(|a, b| b.revenue.cmp(&a.revenue));
    by_code.truncate(limit);
    by_code
}

pub fn payment_breakdown(transactions: &[Transaction]) -> Vec<PaymentSummary> {
    let mut by_method: BTreeMap<PaymentMethod, PaymentSummary> = BTreeMap::new();
    for transaction in transactions.iter().filter(|t| t.is_sale()) {
        let entry = by_method
            .entry(transaction.payment_method)
            .or_insert(PaymentSummary {
                method: transaction.payment_method,
                count: 0,
                amount: 0,
            });
        entry.count += 1;
        entry.amount += transaction.total_amount;
    }
    by_method.into_values().collect()
}

pub fn filter_transactions(
    transactions: &[Transaction],
    customers: &[Customer],
    costs: &ProductCosts,
    filter: &TransactionFilter,
    now: DateTime<FixedOffset>,
) -> FilteredTransactions {
    let terms = search_terms(&filter.search);
    let mut matched: Vec<Transaction> = transactions
        .iter()
        .filter(|t| filter.date_range.contains(t.transaction_date, now))
        .filter(|t| {
            filter
                .payment_method
                .map_or(true, |method| t.payment_method == method)
        })
        .filter(|t| {
            filter
                .customer_id
                .map_or(true, |id| t.customer_id == Some(id))
        })
        .filter(|t| {
            if terms.is_empty() {
                return true;
            }
            let customer = t
                .customer_id
                .and_then(|id| customers.iter().find(|c| c.id == id));
            let mut fields: Vec<&str> = vec![
                t.transaction_number.as_str(),
                customer.map_or("", |c| c.customer_name.as_str()),
                customer.map_or("", |c| c.customer_phone.as_str()),
            ];
            fields.extend(t.lines.iter().map(|line| line.product_name.as_str()));
            matches_all_terms(&terms, &fields)
        })
        .cloned()
        .collect();
    matched.sort_by(|a, b| {
        b.transaction_date
            .cmp(&a.transaction_date)
            .then(b.created_at.cmp(&a.created_at))
    });

    FilteredTransactions {
        total_amount: matched.iter().map(|t| t.total_amount).sum(),
        total_profit: matched.iter().map(|t| transaction_profit(t, costs)).sum(),
        count: matched.len(),
        transactions: matched,
    }
}

/// Loads transactions, products and customers and runs the report functions.
pub struct ReportService<T, P, C>
where
    T: TransactionRepository,
    P: ProductRepository,
    C: CustomerRepository,
{
    transactions: T,
    products: P,
    customers: C,
}

impl<'conn>
    ReportService<
        SqliteTransactionRepository<'conn>,
        SqliteProductRepository<'conn>,
        SqliteCustomerRepository<'conn>,
    >
{
    pub fn from_connection(conn: &'conn Connection) -> Self {
        Self::new(
            SqliteTransactionRepository::new(conn),
            SqliteProductRepository::new(conn),
            SqliteCustomerRepository::new(conn),
        )
    }
}

impl<T, P, C> ReportService<T, P, C>
where
    T: TransactionRepository,
    P: ProductRepository,
    C: CustomerRepository,
{
    pub fn new(transactions: T, products: P, customers: C) -> Self {
        Self {
            transactions,
            products,
            customers,
        }
    }

    fn load(&self) -> Result<(Vec<Transaction>, ProductCosts), ReportError> {
        let transactions = self
            .transactions
            .list_transactions(&TransactionListQuery::default())?;
        let products = self.products.list_products(&ProductListQuery::default())?;
        Ok((transactions, ProductCosts::from_products(&products)))
    }

    pub fn finance_summary(
        &self,
        now: DateTime<FixedOffset>,
    ) -> Result<FinanceSummary, ReportError> {
        let (transactions, costs) = self.load()?;
        Ok(finance_summary(&transactions, &costs, now))
    }

    pub fn sales_by_day(
        &self,
        now: DateTime<FixedOffset>,
        days: u32,
    ) -> Result<Vec<DailySales>, ReportError> {
        let transactions = self
            .transactions
            .list_transactions(&TransactionListQuery::default())?;
        Ok(sales_by_day(&transactions, now, days))
    }

    pub fn top_products(&self, limit: usize) -> Result<Vec<ProductSales>, ReportError> {
        let transactions = self
            .transactions
            .list_transactions(&TransactionListQuery::default())?;
        Ok(top_products(&transactions, limit))
    }

    pub fn payment_breakdown(&self) -> Result<Vec<PaymentSummary>, ReportError> {
        let transactions = self
            .transactions
            .list_transactions(&TransactionListQuery::default())?;
        Ok(payment_breakdown(&transactions))
    }

    pub fn filter_transactions(
        &self,
        filter: &TransactionFilter,
        now: DateTime<FixedOffset>,
    ) -> Result<FilteredTransactions, ReportError> {
        let (transactions, costs) = self.load()?;
        let customers = self.customers.list_customers()?;
        Ok(filter_transactions(
            &transactions,
            &customers,
            &costs,
            filter,
            now,
        ))
    }

    pub fn transaction_breakdown(
        &self,
        id: RecordId,
    ) -> Result<(Transaction, TransactionBreakdown), ReportError> {
        let transaction = self
            .transactions
            .get_transaction(id)?
            .ok_or(ReportError::TransactionNotFound(id))?;
        let products = self.products.list_products(&ProductListQuery::default())?;
        let breakdown =
            transaction_breakdown(&transaction, &ProductCosts::from_products(&products));
        Ok((transaction, breakdown))
    }
}
