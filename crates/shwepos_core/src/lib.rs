//! Core domain logic for ShwePOS.
//! This crate is the single source of truth for business invariants.

pub mod db;
pub mod localization;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;
pub mod time;

pub use db::{open_db, open_db_in_memory, DbError, DbResult};
pub use logging::{default_log_level, init_logging, logging_status};
pub use model::customer::{Customer, NewCustomer};
pub use model::product::{NewProduct, PriceChange, Product, StockStatus};
pub use model::settings::StoreSettings;
pub use model::supplier::{NewSupplier, Supplier, SupplierCategory};
pub use model::transaction::{PaymentMethod, Transaction, TransactionKind, TransactionLine};
pub use model::user::{Permission, Role, Tab, User};
pub use model::{Kyat, ModelValidationError, RecordId};
pub use repo::{RepoError, RepoResult};
pub use service::cart::{Cart, CartError, CartLine};
pub use service::checkout_service::{CheckoutError, CheckoutRequest, CheckoutService};
pub use service::customer_service::{CustomerService, CustomerServiceError, CustomerStats};
pub use service::inventory_service::{
    InventoryError, InventoryService, InventoryStats, ProductSort, ProductSortKey,
};
pub use service::pricing::{CheckoutTotals, LoyaltyAdjustment, PricingError};
pub use service::report_service::{
    DateRange, FinanceSummary, ReportError, ReportService, TransactionFilter,
};
pub use service::return_service::{
    ReturnError, ReturnItem, ReturnRequest, ReturnService, ReturnableLine,
};
pub use service::settings_service::{SettingsError, SettingsService};
pub use service::supplier_service::{SupplierService, SupplierServiceError};
pub use service::user_service::{AccessError, Session, UserService, UserServiceError};

/// Minimal health-check API for early integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
