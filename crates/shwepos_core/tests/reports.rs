use chrono::{DateTime, FixedOffset, TimeZone};
use shwepos_core::db::open_db_in_memory;
use shwepos_core::service::report_service::{
    filter_transactions, finance_summary, payment_breakdown, period_metrics, sales_by_day,
    top_products, transaction_breakdown, transaction_cogs, transaction_profit, ProductCosts,
};
use shwepos_core::service::user_service::{DEFAULT_ADMIN_PASSWORD, DEFAULT_ADMIN_USERNAME};
use shwepos_core::time::{store_now, store_offset};
use shwepos_core::{
    Cart, CheckoutRequest, CheckoutService, Customer, DateRange, InventoryService, NewProduct,
    PaymentMethod, Product, ReportService, ReturnItem, ReturnRequest, ReturnService,
    Transaction, TransactionFilter, TransactionKind, TransactionLine, UserService,
};
use uuid::Uuid;

fn product(code: &str, cost: i64, price: i64) -> Product {
    Product {
        id: Uuid::new_v4(),
        product_code: code.to_string(),
        barcode: None,
        product_name: format!("Item {code}"),
        category: "General".to_string(),
        supplier: None,
        unit: "pcs".to_string(),
        cost,
        price,
        quantity: 100,
        reorder_level: 1,
        image_url: None,
        created_at: 0,
        updated_at: 0,
    }
}

fn at(now: DateTime<FixedOffset>, days_back: i64) -> i64 {
    now.timestamp_millis() - days_back * 86_400_000
}

fn sale(
    number: &str,
    date: i64,
    lines: Vec<TransactionLine>,
    discount: i64,
    tax: i64,
    method: PaymentMethod,
) -> Transaction {
    let subtotal: i64 = lines.iter().map(|l| l.subtotal).sum();
    let total = subtotal - discount + tax;
    Transaction {
        id: Uuid::new_v4(),
        kind: TransactionKind::Sale,
        transaction_number: number.to_string(),
        original_transaction_id: None,
        transaction_date: date,
        lines,
        total_amount: total,
        paid_amount: total,
        change_amount: 0,
        discount,
        tax,
        payment_method: method,
        cashier: "admin".to_string(),
        customer_id: None,
        return_reason: None,
        restocked: false,
        created_at: date,
    }
}

fn refund(original: &Transaction, date: i64, lines: Vec<TransactionLine>) -> Transaction {
    let amount: i64 = lines.iter().map(|l| l.subtotal).sum();
    Transaction {
        id: Uuid::new_v4(),
        kind: TransactionKind::Return,
        transaction_number: format!("RTN-{date}"),
        original_transaction_id: Some(original.id),
        transaction_date: date,
        lines,
        total_amount: -amount,
        paid_amount: -amount,
        change_amount: 0,
        discount: 0,
        tax: 0,
        payment_method: PaymentMethod::Return,
        cashier: "admin".to_string(),
        customer_id: original.customer_id,
        return_reason: None,
        restocked: true,
        created_at: date,
    }
}

fn line(code: &str, quantity: i64, price: i64) -> TransactionLine {
    TransactionLine::new(code, format!("Item {code}"), quantity, price)
}

// Wednesday 2024-05-15 12:00 in Yangon.
fn wednesday_noon() -> DateTime<FixedOffset> {
    store_offset(390)
        .with_ymd_and_hms(2024, 5, 15, 12, 0, 0)
        .unwrap()
}

fn costs() -> ProductCosts {
    ProductCosts::from_products(&[product("A", 600, 1000), product("B", 200, 500)])
}

#[test]
fn sale_and_return_profit() {
    let costs = costs();
    let sold = sale(
        "TXN-1",
        0,
        vec![line("A", 2, 1000), line("B", 1, 500)],
        500,
        100,
        PaymentMethod::Cash,
    );
    // cogs = 2*600 + 200
    assert_eq!(transaction_cogs(&sold, &costs), 1400);
    // total 2100 - tax 100 - cogs 1400
    assert_eq!(transaction_profit(&sold, &costs), 600);

    let returned = refund(&sold, 1, vec![line("A", 1, 1000)]);
    // -1000 + 600
    assert_eq!(transaction_profit(&returned, &costs), -400);

    let unknown = sale("TXN-2", 0, vec![line("GONE", 1, 300)], 0, 0, PaymentMethod::Card);
    assert_eq!(transaction_cogs(&unknown, &costs), 0);

    let breakdown = transaction_breakdown(&sold, &costs);
    assert_eq!(breakdown.subtotal, 2500);
    assert_eq!(breakdown.profit, 2000 - 1400);
    assert!((breakdown.profit_margin_percent - 30.0).abs() < 1e-9);
}

#[test]
fn period_metrics_credit_back_return_cogs() {
    let costs = costs();
    let sold = sale("TXN-1", 0, vec![line("A", 2, 1000)], 0, 0, PaymentMethod::Cash);
    let returned = refund(&sold, 1, vec![line("A", 1, 1000)]);

    let metrics = period_metrics([&sold, &returned], &costs);
    assert_eq!(metrics.revenue, 1000);
    assert_eq!(metrics.cogs, 600);
    assert_eq!(metrics.profit, 400);
    assert_eq!(metrics.transaction_count, 2);
}

#[test]
fn finance_summary_splits_periods_in_store_time() {
    let now = wednesday_noon();
    let costs = costs();
    let transactions = vec![
        sale("T-today", at(now, 0), vec![line("A", 1, 1000)], 0, 50, PaymentMethod::Cash),
        // Sunday 2024-05-12, same week.
        sale("T-sun", at(now, 3), vec![line("B", 2, 500)], 0, 0, PaymentMethod::Card),
        // Saturday 2024-05-11, previous week, same month.
        sale("T-sat", at(now, 4), vec![line("B", 1, 500)], 0, 0, PaymentMethod::Card),
        // April.
        sale("T-apr", at(now, 20), vec![line("A", 1, 1000)], 0, 0, PaymentMethod::MobileMoney),
    ];

    let summary = finance_summary(&transactions, &costs, now);
    assert_eq!(summary.today.transaction_count, 1);
    assert_eq!(summary.today.revenue, 1050);
    assert_eq!(summary.this_week.transaction_count, 2);
    assert_eq!(summary.this_month.transaction_count, 3);
    assert_eq!(summary.total_revenue, 1050 + 1000 + 500 + 1000);
    assert_eq!(summary.total_tax, 50);
    assert_eq!(summary.total_cogs, 600 + 400 + 200 + 600);
    assert_eq!(summary.total_profit, summary.total_revenue - summary.total_cogs);
    assert!(summary.profit_margin_percent > 0.0);
    assert_eq!(
        summary.payment_totals,
        vec![
            (PaymentMethod::Cash, 1050),
            (PaymentMethod::Card, 1500),
            (PaymentMethod::MobileMoney, 1000),
        ]
    );

    let empty = finance_summary(&[], &costs, now);
    assert_eq!(empty.profit_margin_percent, 0.0);
}

#[test]
fn daily_top_and_payment_reports_use_sales_only_where_required() {
    let now = wednesday_noon();
    let first = sale("T1", at(now, 0), vec![line("A", 3, 1000)], 0, 0, PaymentMethod::Cash);
    let second = sale(
        "T2",
        at(now, 2),
        vec![line("B", 10, 500), line("A", 1, 1000)],
        0,
        0,
        PaymentMethod::Cash,
    );
    let returned = refund(&first, at(now, 0), vec![line("A", 3, 1000)]);
    let transactions = vec![first, second, returned];

    let days = sales_by_day(&transactions, now, 7);
    assert_eq!(days.len(), 7);
    assert_eq!(days[6].date, now.date_naive());
    assert_eq!(days[6].total, 0);
    assert_eq!(days[4].total, 6000);
    assert!(days[0].date < days[6].date);

    let top = top_products(&transactions, 5);
    assert_eq!(top.len(), 2);
    assert_eq!(top[0].product_code, "B");
    assert_eq!(top[0].revenue, 5000);
    assert_eq!(top[1].product_code, "A");
    assert_eq!(top[1].quantity, 4);
    assert_eq!(top_products(&transactions, 1).len(), 1);

    let payments = payment_breakdown(&transactions);
    assert_eq!(payments.len(), 1);
    assert_eq!(payments[0].method, PaymentMethod::Cash);
    assert_eq!(payments[0].count, 2);
    assert_eq!(payments[0].amount, 9000);
}

#[test]
fn transaction_filter_matches_terms_and_sorts_newest_first() {
    let now = wednesday_noon();
    let costs = costs();
    let customer = Customer {
        id: Uuid::new_v4(),
        customer_name: "Daw Mya".to_string(),
        customer_phone: "09-111".to_string(),
        customer_email: None,
        customer_address: None,
        total_purchases: 0,
        last_purchase: None,
        loyalty_points: 0,
        created_at: 0,
        updated_at: 0,
    };
    let mut with_customer = sale(
        "TXN-100",
        at(now, 1),
        vec![line("A", 1, 1000)],
        0,
        0,
        PaymentMethod::Card,
    );
    with_customer.customer_id = Some(customer.id);
    let walk_in = sale("TXN-200", at(now, 0), vec![line("B", 1, 500)], 0, 0, PaymentMethod::Cash);
    let old = sale("TXN-300", at(now, 40), vec![line("B", 2, 500)], 0, 0, PaymentMethod::Cash);
    let transactions = vec![with_customer.clone(), walk_in.clone(), old.clone()];
    let customers = vec![customer.clone()];

    let all = filter_transactions(
        &transactions,
        &customers,
        &costs,
        &TransactionFilter::default(),
        now,
    );
    let numbers: Vec<&str> = all
        .transactions
        .iter()
        .map(|t| t.transaction_number.as_str())
        .collect();
    assert_eq!(numbers, vec!["TXN-200", "TXN-100", "TXN-300"]);
    assert_eq!(all.count, 3);
    assert_eq!(all.total_amount, 2500);

    let by_name = filter_transactions(
        &transactions,
        &customers,
        &costs,
        &TransactionFilter {
            search: "mya item".to_string(),
            ..TransactionFilter::default()
        },
        now,
    );
    assert_eq!(by_name.count, 1);
    assert_eq!(by_name.transactions[0].id, with_customer.id);
    assert_eq!(by_name.total_profit, 1000 - 600);

    let this_week_cash = filter_transactions(
        &transactions,
        &customers,
        &costs,
        &TransactionFilter {
            date_range: DateRange::ThisWeek,
            payment_method: Some(PaymentMethod::Cash),
            ..TransactionFilter::default()
        },
        now,
    );
    assert_eq!(this_week_cash.count, 1);
    assert_eq!(this_week_cash.transactions[0].id, walk_in.id);

    let for_customer = filter_transactions(
        &transactions,
        &customers,
        &costs,
        &TransactionFilter {
            customer_id: Some(customer.id),
            ..TransactionFilter::default()
        },
        now,
    );
    assert_eq!(for_customer.count, 1);
    assert_eq!(DateRange::parse("week"), Some(DateRange::ThisWeek));
}

#[test]
fn report_service_reads_from_store() {
    let conn = open_db_in_memory().unwrap();
    let users = UserService::from_connection(&conn);
    users.ensure_default_admin().unwrap();
    let admin = users
        .authenticate(DEFAULT_ADMIN_USERNAME, DEFAULT_ADMIN_PASSWORD)
        .unwrap()
        .unwrap();
    let tea = InventoryService::from_connection(&conn)
        .create_product(&admin, NewProduct {
            product_code: "TEA".to_string(),
            product_name: "Green Tea".to_string(),
            category: "Drinks".to_string(),
            cost: 600,
            price: 1000,
            quantity: 10,
            ..NewProduct::default()
        })
        .unwrap();

    let mut cart = Cart::new();
    cart.set_quantity(&tea, 2).unwrap();
    let sold = CheckoutService::from_connection(&conn)
        .checkout(
            &admin,
            &cart,
            &CheckoutRequest {
                payment_method: PaymentMethod::Cash,
                paid_amount: 5000,
            },
        )
        .unwrap();
    ReturnService::from_connection(&conn)
        .process_return(&admin, &ReturnRequest {
            original_transaction_id: sold.id,
            items: vec![ReturnItem {
                product_code: "TEA".to_string(),
                quantity: 1,
            }],
            reason: None,
            restock: true,
        })
        .unwrap();

    let reports = ReportService::from_connection(&conn);
    let now = store_now(390);
    let summary = reports.finance_summary(now).unwrap();
    // 2100 sale - 1000 refund
    assert_eq!(summary.total_revenue, 1100);
    assert_eq!(summary.total_cogs, 600);
    assert_eq!(summary.total_tax, 100);
    assert_eq!(summary.today.transaction_count, 2);

    let top = reports.top_products(5).unwrap();
    assert_eq!(top[0].quantity, 2);
    assert_eq!(reports.payment_breakdown().unwrap()[0].count, 1);

    let (loaded, breakdown) = reports.transaction_breakdown(sold.id).unwrap();
    assert_eq!(loaded.id, sold.id);
    assert_eq!(breakdown.cogs, 1200);
}
