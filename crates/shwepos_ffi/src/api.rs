//! FFI use-case API for Flutter-facing calls.
//!
//! # Responsibility
//! - Expose shop use cases (login, product lookup, checkout, returns,
//!   finance) to Dart via FRB.
//! - Flatten core errors into `ok + message` envelopes.
//!
//! # Invariants
//! - Exported functions must not panic across FFI boundary.
//! - Money crosses the boundary as whole kyat (`i64`).
//! - Record IDs cross the boundary as UUID strings.
//! - Writes run as the signed-in user: callers pass the `user_id` from
//!   `login` and the core checks that user's role.

use log::{info, warn};
use rusqlite::Connection;
use shwepos_core::db::open_db;
use shwepos_core::localization::{
    parse_payment_method, payment_method_label, stock_status_label, tab_key, tab_label,
};
use shwepos_core::time::store_now;
use shwepos_core::{
    core_version as core_version_inner, init_logging as init_logging_inner, ping as ping_inner,
    Cart, CheckoutRequest, CheckoutService, InventoryService, Product, ReportService, ReturnItem,
    ReturnRequest, ReturnService, Role, Session, SettingsService, Tab, UserService,
    UserServiceError,
};
use std::path::PathBuf;
use std::sync::OnceLock;
use uuid::Uuid;

const SEARCH_DEFAULT_LIMIT: u32 = 50;
const SEARCH_LIMIT_MAX: u32 = 200;
const STORE_DB_FILE_NAME: &str = "shwepos_store.sqlite3";
static STORE_DB_PATH: OnceLock<PathBuf> = OnceLock::new();

/// Minimal health-check API for FRB smoke integration.
///
/// # FFI contract
/// - Sync call, non-blocking.
/// - Never throws; always returns a UTF-8 string.
#[flutter_rust_bridge::frb(sync)]
pub fn ping() -> String {
    ping_inner().to_owned()
}

/// Expose core crate version through FFI.
#[flutter_rust_bridge::frb(sync)]
pub fn core_version() -> String {
    core_version_inner().to_owned()
}

/// Initializes Rust core logging once per process.
///
/// Input semantics:
/// - `level`: one of `trace|debug|info|warn|error` (case-insensitive).
/// - `log_dir`: absolute directory path where rolling logs are written.
///
/// # FFI contract
/// - Safe to call repeatedly with the same `level + log_dir` (idempotent).
/// - Reconfiguration attempts with different level or directory return error.
/// - Never panics; returns empty string on success and error message on failure.
#[flutter_rust_bridge::frb(sync)]
pub fn init_logging(level: String, log_dir: String) -> String {
    match init_logging_inner(level.as_str(), log_dir.as_str()) {
        Ok(()) => String::new(),
        Err(err) => err,
    }
}

/// Pins the store database file for this process.
///
/// # FFI contract
/// - Must be called before any DB-backed call to take effect.
/// - Repeating the call with the same path is a no-op.
/// - Returns empty string on success and error message on failure.
#[flutter_rust_bridge::frb(sync)]
pub fn configure_store_db(db_path: String) -> String {
    let trimmed = db_path.trim();
    if trimmed.is_empty() {
        return "configure_store_db failed: db_path must not be empty".to_string();
    }
    let requested = PathBuf::from(trimmed);
    let active = STORE_DB_PATH.get_or_init(|| requested.clone());
    if *active != requested {
        warn!("event=store_db_configure module=ffi status=conflict");
        return format!(
            "configure_store_db failed: already using {}",
            active.display()
        );
    }
    match open_db(active) {
        Ok(_) => {
            info!("event=store_db_configure module=ffi status=ok");
            String::new()
        }
        Err(err) => format!("configure_store_db failed: {err}"),
    }
}

/// Generic action response envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionResponse {
    pub ok: bool,
    /// Created record ID, when the action creates one.
    pub record_id: Option<String>,
    pub message: String,
}

impl ActionResponse {
    fn success(message: impl Into<String>, record_id: String) -> Self {
        Self {
            ok: true,
            record_id: Some(record_id),
            message: message.into(),
        }
    }

    fn failure(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            record_id: None,
            message: message.into(),
        }
    }
}

/// Tab entry with a stable key and its Myanmar label.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TabLabelItem {
    pub key: String,
    pub label: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginResponse {
    pub ok: bool,
    pub user_id: Option<String>,
    /// `admin|cashier`, empty on failure.
    pub role: String,
    /// Tabs the signed-in role may open, in display order.
    pub tabs: Vec<TabLabelItem>,
    pub message: String,
}

/// Product row for POS and inventory lists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductItem {
    pub product_id: String,
    pub product_code: String,
    pub barcode: Option<String>,
    pub product_name: String,
    pub category: String,
    pub unit: String,
    pub price: i64,
    pub quantity: i64,
    pub low_stock: bool,
    pub stock_label: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductListResponse {
    pub items: Vec<ProductItem>,
    pub message: String,
    /// Effective applied limit.
    pub applied_limit: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductLookupResponse {
    pub ok: bool,
    pub item: Option<ProductItem>,
    pub message: String,
}

/// One requested line for checkout or return.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineInput {
    pub product_code: String,
    pub quantity: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutInput {
    pub lines: Vec<LineInput>,
    pub discount: i64,
    pub customer_id: Option<String>,
    /// Key (`cash`, `mobile_money`, ...) or Myanmar label.
    pub payment_method: String,
    pub paid_amount: i64,
    /// `user_id` returned by `login`; recorded as the cashier.
    pub user_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutResponse {
    pub ok: bool,
    pub transaction_id: Option<String>,
    pub transaction_number: Option<String>,
    pub total_amount: i64,
    pub tax: i64,
    pub change_amount: i64,
    pub message: String,
}

impl CheckoutResponse {
    fn failure(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            transaction_id: None,
            transaction_number: None,
            total_amount: 0,
            tax: 0,
            change_amount: 0,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentTotalItem {
    pub method: String,
    pub label: String,
    pub amount: i64,
}

/// Finance tab numbers, computed in the store's UTC offset.
#[derive(Debug, Clone, PartialEq)]
pub struct FinanceOverview {
    pub ok: bool,
    pub total_revenue: i64,
    pub total_cogs: i64,
    pub total_profit: i64,
    pub total_tax: i64,
    pub profit_margin_percent: f64,
    pub today_revenue: i64,
    pub today_profit: i64,
    pub week_revenue: i64,
    pub month_revenue: i64,
    pub payments: Vec<PaymentTotalItem>,
    pub message: String,
}

impl FinanceOverview {
    fn failure(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            total_revenue: 0,
            total_cogs: 0,
            total_profit: 0,
            total_tax: 0,
            profit_margin_percent: 0.0,
            today_revenue: 0,
            today_profit: 0,
            week_revenue: 0,
            month_revenue: 0,
            payments: Vec::new(),
            message: message.into(),
        }
    }
}

/// Verifies staff credentials, seeding the default admin on first use.
///
/// # FFI contract
/// - Sync call, DB-backed execution.
/// - Never panics; wrong credentials return `ok=false` without detail.
#[flutter_rust_bridge::frb(sync)]
pub fn login(username: String, password: String) -> LoginResponse {
    let result = with_store(|conn| {
        let service = UserService::from_connection(conn);
        service
            .ensure_default_admin()
            .map_err(|err| err.to_string())?;
        service
            .authenticate(username.trim(), &password)
            .map_err(|err| err.to_string())
    });
    match result {
        Ok(Some(session)) => LoginResponse {
            ok: true,
            user_id: Some(session.user().id.to_string()),
            role: session.role().as_str().to_string(),
            tabs: session.visible_tabs().into_iter().map(to_tab_item).collect(),
            message: "Signed in.".to_string(),
        },
        Ok(None) => LoginResponse {
            ok: false,
            user_id: None,
            role: String::new(),
            tabs: Vec::new(),
            message: "Invalid username or password.".to_string(),
        },
        Err(err) => LoginResponse {
            ok: false,
            user_id: None,
            role: String::new(),
            tabs: Vec::new(),
            message: format!("login failed: {err}"),
        },
    }
}

/// Term search over product name, code, category and barcode.
///
/// # FFI contract
/// - Sync call, DB-backed execution.
/// - Blank `query` lists every product.
/// - Returns deterministic envelope with applied limit.
#[flutter_rust_bridge::frb(sync)]
pub fn search_products(query: String, limit: Option<u32>) -> ProductListResponse {
    let applied_limit = normalize_search_limit(limit);
    let result = with_store(|conn| {
        InventoryService::from_connection(conn)
            .search_products(query.trim(), None)
            .map_err(|err| err.to_string())
    });
    product_list_response("search_products", result, applied_limit)
}

/// Exact barcode match for the POS scanner field.
#[flutter_rust_bridge::frb(sync)]
pub fn lookup_barcode(barcode: String) -> ProductLookupResponse {
    let result = with_store(|conn| {
        InventoryService::from_connection(conn)
            .find_by_barcode(&barcode)
            .map_err(|err| err.to_string())
    });
    match result {
        Ok(Some(product)) => ProductLookupResponse {
            ok: true,
            item: Some(to_product_item(&product)),
            message: "Product found.".to_string(),
        },
        Ok(None) => ProductLookupResponse {
            ok: false,
            item: None,
            message: "No product with this barcode.".to_string(),
        },
        Err(err) => ProductLookupResponse {
            ok: false,
            item: None,
            message: format!("lookup_barcode failed: {err}"),
        },
    }
}

/// Products at or below their reorder level.
#[flutter_rust_bridge::frb(sync)]
pub fn low_stock_products() -> ProductListResponse {
    let result = with_store(|conn| {
        InventoryService::from_connection(conn)
            .low_stock()
            .map_err(|err| err.to_string())
    });
    product_list_response("low_stock_products", result, SEARCH_LIMIT_MAX)
}

/// Prices and commits a sale in one call.
///
/// # FFI contract
/// - Sync call, DB-backed execution.
/// - All-or-nothing: a failure leaves stock and customer balances untouched.
/// - Never panics.
#[flutter_rust_bridge::frb(sync)]
pub fn checkout(input: CheckoutInput) -> CheckoutResponse {
    let Some(payment_method) = parse_payment_method(&input.payment_method) else {
        return CheckoutResponse::failure(format!(
            "checkout failed: unknown payment method `{}`",
            input.payment_method
        ));
    };
    let customer_id = match input.customer_id.as_deref().map(parse_record_id).transpose() {
        Ok(id) => id,
        Err(err) => return CheckoutResponse::failure(format!("checkout failed: {err}")),
    };

    if let Some(line) = input.lines.iter().find(|line| line.quantity <= 0) {
        return CheckoutResponse::failure(format!(
            "checkout failed: quantity for `{}` must be positive, got {}",
            line.product_code, line.quantity
        ));
    }

    let result = with_store(|conn| {
        let session = session_for(conn, &input.user_id)?;
        let inventory = InventoryService::from_connection(conn);
        let mut cart = Cart::new();
        for line in &input.lines {
            let product = inventory
                .get_by_code(line.product_code.trim())
                .map_err(|err| err.to_string())?
                .ok_or_else(|| format!("product `{}` not found", line.product_code))?;
            let current = cart
                .line(&product.product_code)
                .map(|existing| existing.quantity)
                .unwrap_or(0);
            let quantity = current
                .checked_add(line.quantity)
                .ok_or_else(|| format!("quantity for `{}` is too large", product.product_code))?;
            cart.set_quantity(&product, quantity)
                .map_err(|err| err.to_string())?;
        }
        cart.apply_discount(input.discount)
            .map_err(|err| err.to_string())?;
        cart.select_customer(customer_id);

        let request = CheckoutRequest {
            payment_method,
            paid_amount: input.paid_amount,
        };
        CheckoutService::from_connection(conn)
            .checkout(&session, &cart, &request)
            .map_err(|err| err.to_string())
    });

    match result {
        Ok(transaction) => CheckoutResponse {
            ok: true,
            transaction_id: Some(transaction.id.to_string()),
            transaction_number: Some(transaction.transaction_number),
            total_amount: transaction.total_amount,
            tax: transaction.tax,
            change_amount: transaction.change_amount,
            message: "Sale completed.".to_string(),
        },
        Err(err) => CheckoutResponse::failure(format!("checkout failed: {err}")),
    }
}

/// Refunds part or all of an earlier sale.
///
/// # FFI contract
/// - Sync call, DB-backed execution.
/// - Lines with zero quantity are ignored.
/// - `user_id` is the signed-in user from `login`.
/// - Returns the created return transaction ID on success.
#[flutter_rust_bridge::frb(sync)]
pub fn process_return(
    original_transaction_id: String,
    lines: Vec<LineInput>,
    reason: Option<String>,
    restock: bool,
    user_id: String,
) -> ActionResponse {
    let original_id = match parse_record_id(&original_transaction_id) {
        Ok(id) => id,
        Err(err) => return ActionResponse::failure(format!("process_return failed: {err}")),
    };
    let request = ReturnRequest {
        original_transaction_id: original_id,
        items: lines
            .into_iter()
            .map(|line| ReturnItem {
                product_code: line.product_code.trim().to_string(),
                quantity: line.quantity,
            })
            .collect(),
        reason,
        restock,
    };
    let result = with_store(|conn| {
        let session = session_for(conn, &user_id)?;
        ReturnService::from_connection(conn)
            .process_return(&session, &request)
            .map_err(|err| err.to_string())
    });
    match result {
        Ok(transaction) => ActionResponse::success(
            format!("Return {} recorded.", transaction.transaction_number),
            transaction.id.to_string(),
        ),
        Err(err) => ActionResponse::failure(format!("process_return failed: {err}")),
    }
}

/// Finance tab summary in the store's configured UTC offset.
#[flutter_rust_bridge::frb(sync)]
pub fn finance_overview() -> FinanceOverview {
    let result = with_store(|conn| {
        let settings = SettingsService::from_connection(conn)
            .load()
            .map_err(|err| err.to_string())?;
        ReportService::from_connection(conn)
            .finance_summary(store_now(settings.utc_offset_minutes))
            .map_err(|err| err.to_string())
    });
    match result {
        Ok(summary) => FinanceOverview {
            ok: true,
            total_revenue: summary.total_revenue,
            total_cogs: summary.total_cogs,
            total_profit: summary.total_profit,
            total_tax: summary.total_tax,
            profit_margin_percent: summary.profit_margin_percent,
            today_revenue: summary.today.revenue,
            today_profit: summary.today.profit,
            week_revenue: summary.this_week.revenue,
            month_revenue: summary.this_month.revenue,
            payments: summary
                .payment_totals
                .into_iter()
                .map(|(method, amount)| PaymentTotalItem {
                    method: method.as_str().to_string(),
                    label: payment_method_label(method).to_string(),
                    amount,
                })
                .collect(),
            message: "ok".to_string(),
        },
        Err(err) => FinanceOverview::failure(format!("finance_overview failed: {err}")),
    }
}

/// Tabs for `role` (`admin|cashier`); unknown roles get none.
#[flutter_rust_bridge::frb(sync)]
pub fn tab_labels(role: String) -> Vec<TabLabelItem> {
    match Role::parse(&role) {
        Some(role) => role.visible_tabs().into_iter().map(to_tab_item).collect(),
        None => Vec::new(),
    }
}

fn normalize_search_limit(limit: Option<u32>) -> u32 {
    match limit {
        Some(0) | None => SEARCH_DEFAULT_LIMIT,
        Some(value) if value > SEARCH_LIMIT_MAX => SEARCH_LIMIT_MAX,
        Some(value) => value,
    }
}

fn resolve_store_db_path() -> PathBuf {
    STORE_DB_PATH
        .get_or_init(|| {
            if let Ok(raw) = std::env::var("SHWEPOS_DB_PATH") {
                let trimmed = raw.trim();
                if !trimmed.is_empty() {
                    return PathBuf::from(trimmed);
                }
            }
            std::env::temp_dir().join(STORE_DB_FILE_NAME)
        })
        .clone()
}

fn with_store<T>(f: impl FnOnce(&Connection) -> Result<T, String>) -> Result<T, String> {
    let db_path = resolve_store_db_path();
    let conn = open_db(&db_path).map_err(|err| format!("store DB open failed: {err}"))?;
    f(&conn)
}

fn parse_record_id(raw: &str) -> Result<Uuid, String> {
    Uuid::parse_str(raw.trim()).map_err(|_| format!("invalid record id `{raw}`"))
}

fn session_for(conn: &Connection, user_id: &str) -> Result<Session, String> {
    let id = parse_record_id(user_id)?;
    UserService::from_connection(conn)
        .session_for(id)
        .map_err(|err| match err {
            UserServiceError::UserNotFound(_) => "not signed in".to_string(),
            other => other.to_string(),
        })
}

fn product_list_response(
    operation: &str,
    result: Result<Vec<Product>, String>,
    applied_limit: u32,
) -> ProductListResponse {
    match result {
        Ok(products) => {
            let items = products
                .iter()
                .take(applied_limit as usize)
                .map(to_product_item)
                .collect::<Vec<_>>();
            let message = if items.is_empty() {
                "No products.".to_string()
            } else {
                format!("Found {} product(s).", items.len())
            };
            ProductListResponse {
                items,
                message,
                applied_limit,
            }
        }
        Err(err) => ProductListResponse {
            items: Vec::new(),
            message: format!("{operation} failed: {err}"),
            applied_limit,
        },
    }
}

fn to_product_item(product: &Product) -> ProductItem {
    ProductItem {
        product_id: product.id.to_string(),
        product_code: product.product_code.clone(),
        barcode: product.barcode.clone(),
        product_name: product.product_name.clone(),
        category: product.category.clone(),
        unit: product.unit.clone(),
        price: product.price,
        quantity: product.quantity,
        low_stock: product.is_low_stock(),
        stock_label: stock_status_label(product.stock_status()).to_string(),
    }
}

fn to_tab_item(tab: Tab) -> TabLabelItem {
    TabLabelItem {
        key: tab_key(tab).to_string(),
        label: tab_label(tab).to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::{
        checkout, core_version, finance_overview, init_logging, login, lookup_barcode,
        normalize_search_limit, ping, process_return, search_products, tab_labels,
        CheckoutInput, LineInput,
    };
    use shwepos_core::db::open_db;
    use shwepos_core::{InventoryService, NewProduct, Product, Role, Session, UserService};
    use std::time::{SystemTime, UNIX_EPOCH};

    #[test]
    fn ping_returns_pong() {
        assert_eq!(ping(), "pong");
    }

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }

    #[test]
    fn init_logging_rejects_empty_log_dir() {
        let error = init_logging("info".to_string(), String::new());
        assert!(!error.is_empty());
    }

    #[test]
    fn init_logging_rejects_unsupported_level() {
        let error = init_logging("verbose".to_string(), "tmp/logs".to_string());
        assert!(!error.is_empty());
    }

    #[test]
    fn search_limit_is_clamped() {
        assert_eq!(normalize_search_limit(None), 50);
        assert_eq!(normalize_search_limit(Some(0)), 50);
        assert_eq!(normalize_search_limit(Some(7)), 7);
        assert_eq!(normalize_search_limit(Some(10_000)), 200);
    }

    #[test]
    fn tab_labels_follow_role() {
        assert_eq!(tab_labels("admin".to_string()).len(), 8);
        let cashier = tab_labels("cashier".to_string());
        let keys: Vec<&str> = cashier.iter().map(|tab| tab.key.as_str()).collect();
        assert_eq!(keys, vec!["pos", "transactions"]);
        assert!(tab_labels("owner".to_string()).is_empty());
    }

    #[test]
    fn login_seeds_default_admin() {
        let response = login("admin".to_string(), "admin123".to_string());
        assert!(response.ok, "{}", response.message);
        assert_eq!(response.role, "admin");
        assert_eq!(response.tabs.len(), 8);

        let denied = login("admin".to_string(), "wrong".to_string());
        assert!(!denied.ok);
        assert!(denied.user_id.is_none());
    }

    #[test]
    fn checkout_then_return_round_trip() {
        let product = seed_product("ffi-sale", 5);
        let admin_id = admin_user_id();

        let found = search_products(product.product_code.clone(), Some(5));
        assert!(found
            .items
            .iter()
            .any(|item| item.product_code == product.product_code));
        let scanned = lookup_barcode(product.barcode.clone().unwrap_or_default());
        assert!(scanned.ok, "{}", scanned.message);

        let sale = checkout(CheckoutInput {
            lines: vec![
                LineInput {
                    product_code: product.product_code.clone(),
                    quantity: 1,
                },
                LineInput {
                    product_code: product.product_code.clone(),
                    quantity: 1,
                },
            ],
            discount: 0,
            customer_id: None,
            payment_method: "ငွေသား".to_string(),
            paid_amount: 5_000,
            user_id: admin_id.clone(),
        });
        assert!(sale.ok, "{}", sale.message);
        assert_eq!(sale.total_amount, 2_100);
        assert_eq!(sale.change_amount, 2_900);

        let refund = process_return(
            sale.transaction_id.unwrap_or_default(),
            vec![LineInput {
                product_code: product.product_code.clone(),
                quantity: 1,
            }],
            None,
            true,
            admin_id,
        );
        assert!(refund.ok, "{}", refund.message);
        assert!(finance_overview().ok);
    }

    #[test]
    fn checkout_rejects_overselling_and_bad_input() {
        let product = seed_product("ffi-oversell", 1);
        let admin_id = admin_user_id();
        let input = |quantity: i64, payment_method: &str| CheckoutInput {
            lines: vec![LineInput {
                product_code: product.product_code.clone(),
                quantity,
            }],
            discount: 0,
            customer_id: None,
            payment_method: payment_method.to_string(),
            paid_amount: 100_000,
            user_id: admin_id.clone(),
        };

        assert!(!checkout(input(2, "cash")).ok);
        assert!(!checkout(input(1, "crypto")).ok);
        let mut bad_customer = input(1, "cash");
        bad_customer.customer_id = Some("not-a-uuid".to_string());
        assert!(!checkout(bad_customer).ok);
        assert_eq!(stock_of(&product), 1);
    }

    #[test]
    fn checkout_rejects_non_positive_and_overflowing_quantities() {
        let product = seed_product("ffi-quantity", 5);
        let lines = |quantities: &[i64]| {
            quantities
                .iter()
                .map(|quantity| LineInput {
                    product_code: product.product_code.clone(),
                    quantity: *quantity,
                })
                .collect::<Vec<_>>()
        };
        let input = |lines: Vec<LineInput>| CheckoutInput {
            lines,
            discount: 0,
            customer_id: None,
            payment_method: "cash".to_string(),
            paid_amount: 100_000,
            user_id: admin_user_id(),
        };

        let overflow = checkout(input(lines(&[1, i64::MAX])));
        assert!(!overflow.ok);
        assert!(overflow.message.contains("too large"), "{}", overflow.message);

        let zero = checkout(input(lines(&[0])));
        assert!(!zero.ok);
        assert!(zero.message.contains("must be positive"), "{}", zero.message);

        // A negative line must not cancel out a positive one.
        assert!(!checkout(input(lines(&[3, -2]))).ok);
        assert!(!checkout(input(lines(&[-1]))).ok);
        assert_eq!(stock_of(&product), 5);
    }

    #[test]
    fn sales_run_as_the_signed_in_user() {
        let product = seed_product("ffi-cashier", 3);
        let username = unique_token("till");
        let conn = open_db(super::resolve_store_db_path()).expect("open db");
        let cashier = UserService::from_connection(&conn)
            .create_user(&admin_session(), &username, "till-pw", Role::Cashier)
            .expect("create cashier");
        let input = |user_id: String| CheckoutInput {
            lines: vec![LineInput {
                product_code: product.product_code.clone(),
                quantity: 1,
            }],
            discount: 0,
            customer_id: None,
            payment_method: "cash".to_string(),
            paid_amount: 100_000,
            user_id,
        };

        let anonymous = checkout(input(uuid::Uuid::nil().to_string()));
        assert!(!anonymous.ok);
        assert!(anonymous.message.contains("not signed in"));
        assert!(!checkout(input("free text".to_string())).ok);
        assert_eq!(stock_of(&product), 3);

        let sale = checkout(input(cashier.id.to_string()));
        assert!(sale.ok, "{}", sale.message);
        let recorded: String = conn
            .query_row(
                "SELECT cashier FROM transactions WHERE uuid = ?1",
                [sale.transaction_id.clone().unwrap_or_default()],
                |row| row.get(0),
            )
            .expect("query cashier");
        assert_eq!(recorded, username);
    }

    #[test]
    fn process_return_rejects_malformed_id() {
        let response = process_return(
            "nope".to_string(),
            Vec::new(),
            None,
            true,
            admin_user_id(),
        );
        assert!(!response.ok);
        assert!(response.message.contains("invalid record id"));
    }

    fn admin_user_id() -> String {
        let response = login("admin".to_string(), "admin123".to_string());
        assert!(response.ok, "{}", response.message);
        response.user_id.unwrap_or_default()
    }

    fn admin_session() -> Session {
        let conn = open_db(super::resolve_store_db_path()).expect("open db");
        let users = UserService::from_connection(&conn);
        users.ensure_default_admin().expect("seed admin");
        users
            .authenticate("admin", "admin123")
            .expect("authenticate")
            .expect("admin credentials")
    }

    fn stock_of(product: &Product) -> i64 {
        let conn = open_db(super::resolve_store_db_path()).expect("open db");
        conn.query_row(
            "SELECT quantity FROM products WHERE uuid = ?1",
            [product.id.to_string()],
            |row| row.get(0),
        )
        .expect("query stock")
    }

    fn seed_product(prefix: &str, quantity: i64) -> Product {
        let conn = open_db(super::resolve_store_db_path()).expect("open db");
        InventoryService::from_connection(&conn)
            .create_product(&admin_session(), NewProduct {
                product_code: unique_token(prefix),
                product_name: unique_token("item"),
                category: "Test".to_string(),
                unit: "pcs".to_string(),
                cost: 500,
                price: 1_000,
                quantity,
                ..NewProduct::default()
            })
            .expect("seed product")
    }

    fn unique_token(prefix: &str) -> String {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("time went backwards")
            .as_nanos();
        format!("{prefix}-{nanos}")
    }
}
