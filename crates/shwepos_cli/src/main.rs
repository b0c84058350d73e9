//! ShwePOS back-office CLI.
//!
//! # Responsibility
//! - Run store maintenance and read-only reports against a store database.
//! - Keep output plain text, one record per line.

use chrono::{DateTime, FixedOffset};
use clap::{Parser, Subcommand, ValueEnum};
use shwepos_core::localization::{payment_method_label, stock_status_label};
use shwepos_core::time::{local_datetime, store_now, store_offset};
use shwepos_core::{
    default_log_level, open_db, CustomerService, InventoryService, Product, ReportService, Role,
    SettingsService, UserService,
};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "shwepos")]
#[command(version)]
#[command(about = "ShwePOS store database tool")]
struct Cli {
    /// Path to the store database file
    #[arg(long, global = true, default_value = "shwepos.sqlite3")]
    db: PathBuf,

    /// Directory for rolling log files; logging stays off when omitted
    #[arg(long, global = true)]
    log_dir: Option<PathBuf>,

    /// Log level (trace|debug|info|warn|error)
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or migrate the database and seed the default admin
    Init,

    /// List products
    Products {
        /// Search terms over name, code, category and barcode
        #[arg(short, long)]
        search: Option<String>,

        /// Only products at or below their reorder level
        #[arg(long)]
        low_stock: bool,
    },

    /// List customers
    Customers {
        /// Search terms over name, phone and email
        #[arg(short, long)]
        search: Option<String>,
    },

    /// Print a sales report
    Report {
        #[arg(value_enum)]
        kind: ReportKind,

        /// Number of rows for `top`
        #[arg(short, long, default_value = "5")]
        limit: usize,
    },

    /// Manage staff accounts
    User {
        #[command(subcommand)]
        command: UserCommands,
    },

    /// Show the price log of a product
    PriceHistory {
        /// Product code
        code: String,
    },
}

#[derive(Subcommand)]
enum UserCommands {
    /// Add a staff account
    Add {
        username: String,

        #[arg(long, value_parser = parse_role)]
        role: Role,

        #[arg(long)]
        password: String,

        /// Admin account that authorizes the change
        #[arg(long, default_value = "admin")]
        admin_user: String,

        /// Password of `--admin-user`
        #[arg(long)]
        admin_password: String,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum ReportKind {
    Finance,
    Top,
    Payments,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    if let Some(log_dir) = cli.log_dir.as_ref() {
        let level = cli
            .log_level
            .clone()
            .unwrap_or_else(|| default_log_level().as_str().to_string());
        if let Err(err) = shwepos_core::init_logging(&level, &log_dir.to_string_lossy()) {
            eprintln!("error: {err}");
            return ExitCode::FAILURE;
        }
    }

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> Result<(), String> {
    let conn = open_db(&cli.db).map_err(|err| err.to_string())?;
    let offset_minutes = SettingsService::from_connection(&conn)
        .load()
        .map_err(|err| err.to_string())?
        .utc_offset_minutes;

    match &cli.command {
        Commands::Init => {
            match UserService::from_connection(&conn)
                .ensure_default_admin()
                .map_err(|err| err.to_string())?
            {
                Some(admin) => println!("created default admin `{}`", admin.username),
                None => println!("users already present"),
            }
            println!("database ready at {}", cli.db.display());
        }
        Commands::Products { search, low_stock } => {
            let inventory = InventoryService::from_connection(&conn);
            let mut products = match search {
                Some(query) => inventory.search_products(query, None),
                None => inventory.list_products(),
            }
            .map_err(|err| err.to_string())?;
            if *low_stock {
                products.retain(Product::is_low_stock);
            }
            for product in &products {
                println!(
                    "{}\t{}\t{}\tprice={}\tstock={}\t{}",
                    product.product_code,
                    product.product_name,
                    product.category,
                    product.price,
                    product.quantity,
                    stock_status_label(product.stock_status())
                );
            }
            println!("{} product(s)", products.len());
        }
        Commands::Customers { search } => {
            let service = CustomerService::from_connection(&conn);
            let customers = match search {
                Some(query) => service.search_customers(query),
                None => service.list_customers(),
            }
            .map_err(|err| err.to_string())?;
            for customer in &customers {
                println!(
                    "{}\t{}\tpurchases={}\tpoints={}",
                    customer.customer_name,
                    customer.customer_phone,
                    customer.total_purchases,
                    customer.loyalty_points
                );
            }
            println!("{} customer(s)", customers.len());
        }
        Commands::Report { kind, limit } => {
            let reports = ReportService::from_connection(&conn);
            match kind {
                ReportKind::Finance => {
                    let summary = reports
                        .finance_summary(store_now(offset_minutes))
                        .map_err(|err| err.to_string())?;
                    println!("revenue={}", summary.total_revenue);
                    println!("cogs={}", summary.total_cogs);
                    println!("profit={}", summary.total_profit);
                    println!("tax={}", summary.total_tax);
                    println!("margin={:.1}%", summary.profit_margin_percent);
                    println!(
                        "today revenue={} profit={} count={}",
                        summary.today.revenue,
                        summary.today.profit,
                        summary.today.transaction_count
                    );
                    println!(
                        "week revenue={} profit={}",
                        summary.this_week.revenue, summary.this_week.profit
                    );
                    println!(
                        "month revenue={} profit={}",
                        summary.this_month.revenue, summary.this_month.profit
                    );
                    for (method, amount) in &summary.payment_totals {
                        println!("{}={amount}", payment_method_label(*method));
                    }
                }
                ReportKind::Top => {
                    let top = reports
                        .top_products(*limit)
                        .map_err(|err| err.to_string())?;
                    for (rank, row) in top.iter().enumerate() {
                        println!(
                            "{}. {}\t{}\tqty={}\trevenue={}",
                            rank + 1,
                            row.product_code,
                            row.product_name,
                            row.quantity,
                            row.revenue
                        );
                    }
                }
                ReportKind::Payments => {
                    let rows = reports
                        .payment_breakdown()
                        .map_err(|err| err.to_string())?;
                    for row in &rows {
                        println!(
                            "{}\tcount={}\tamount={}",
                            payment_method_label(row.method),
                            row.count,
                            row.amount
                        );
                    }
                }
            }
        }
        Commands::User {
            command:
                UserCommands::Add {
                    username,
                    role,
                    password,
                    admin_user,
                    admin_password,
                },
        } => {
            let users = UserService::from_connection(&conn);
            let session = users
                .authenticate(admin_user, admin_password)
                .map_err(|err| err.to_string())?
                .ok_or_else(|| format!("invalid credentials for `{admin_user}`"))?;
            let user = users
                .create_user(&session, username, password, *role)
                .map_err(|err| err.to_string())?;
            println!("added {} ({})", user.username, user.role.as_str());
        }
        Commands::PriceHistory { code } => {
            let inventory = InventoryService::from_connection(&conn);
            let product = inventory
                .get_by_code(code)
                .map_err(|err| err.to_string())?
                .ok_or_else(|| format!("product `{code}` not found"))?;
            let history = inventory
                .price_history(product.id)
                .map_err(|err| err.to_string())?;
            let offset = store_offset(offset_minutes);
            for change in &history {
                println!(
                    "{}\t{} -> {}\t({:+})",
                    format_time(local_datetime(change.changed_at, offset)),
                    change.old_price,
                    change.new_price,
                    change.delta()
                );
            }
            println!("{} price change(s)", history.len());
        }
    }
    Ok(())
}

fn parse_role(value: &str) -> Result<Role, String> {
    Role::parse(value).ok_or_else(|| format!("unknown role `{value}` (admin|cashier)"))
}

fn format_time(value: Option<DateTime<FixedOffset>>) -> String {
    value
        .map(|time| time.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| "-".to_string())
}
