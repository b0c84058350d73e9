use rusqlite::Connection;
use shwepos_core::db::open_db_in_memory;
use shwepos_core::repo::transaction_repo::{
    CustomerSaleUpdate, SaleCommit, SqliteTransactionRepository, StockDecrement,
    TransactionListQuery, TransactionRepository,
};
use shwepos_core::service::user_service::{DEFAULT_ADMIN_PASSWORD, DEFAULT_ADMIN_USERNAME};
use shwepos_core::{
    Cart, CheckoutError, CheckoutRequest, CheckoutService, Customer, CustomerService,
    InventoryService, NewCustomer, NewProduct, PaymentMethod, PricingError, Product, RepoError,
    Role, Session, Transaction, TransactionKind, TransactionLine, UserService,
};
use uuid::Uuid;

fn admin_session(conn: &Connection) -> Session {
    let users = UserService::from_connection(conn);
    users.ensure_default_admin().unwrap();
    users
        .authenticate(DEFAULT_ADMIN_USERNAME, DEFAULT_ADMIN_PASSWORD)
        .unwrap()
        .unwrap()
}

fn stock_product(conn: &Connection, code: &str, price: i64, quantity: i64) -> Product {
    InventoryService::from_connection(conn)
        .create_product(&admin_session(conn), NewProduct {
            product_code: code.to_string(),
            product_name: format!("Item {code}"),
            category: "General".to_string(),
            unit: "pcs".to_string(),
            cost: price / 2,
            price,
            quantity,
            reorder_level: 1,
            ..NewProduct::default()
        })
        .unwrap()
}

fn stock_of(conn: &Connection, code: &str) -> i64 {
    InventoryService::from_connection(conn)
        .get_by_code(code)
        .unwrap()
        .unwrap()
        .quantity
}

fn cash(paid: i64) -> CheckoutRequest {
    CheckoutRequest {
        payment_method: PaymentMethod::Cash,
        paid_amount: paid,
    }
}

fn loyal_customer(conn: &Connection, points: i64) -> Customer {
    let customers = CustomerService::from_connection(conn);
    let customer = customers
        .create_customer(
            &admin_session(conn),
            NewCustomer {
                customer_name: "Daw Mya".to_string(),
                customer_phone: "09-111".to_string(),
                ..NewCustomer::default()
            },
        )
        .unwrap();
    conn.execute(
        "UPDATE customers SET loyalty_points = ?1 WHERE uuid = ?2;",
        rusqlite::params![points, customer.id.to_string()],
    )
    .unwrap();
    customers.get_customer(customer.id).unwrap().unwrap()
}

fn transaction_count(conn: &Connection) -> usize {
    SqliteTransactionRepository::new(conn)
        .list_transactions(&TransactionListQuery::default())
        .unwrap()
        .len()
}

#[test]
fn checkout_prices_cart_and_decrements_stock() {
    let conn = open_db_in_memory().unwrap();
    let tea = stock_product(&conn, "TEA", 1500, 10);
    let water = stock_product(&conn, "WATER", 500, 10);

    let mut cart = Cart::new();
    cart.set_quantity(&tea, 4).unwrap();
    cart.add_product(&water).unwrap();
    cart.add_product(&water).unwrap();
    cart.apply_discount(1000).unwrap();

    let service = CheckoutService::from_connection(&conn);
    let quote = service.quote(&cart).unwrap();
    assert_eq!(quote.subtotal, 7000);
    assert_eq!(quote.tax, 300);
    assert_eq!(quote.total, 6300);

    let sale = service
        .checkout(&admin_session(&conn), &cart, &cash(10_000))
        .unwrap();
    assert_eq!(sale.kind, TransactionKind::Sale);
    assert!(sale.transaction_number.starts_with("TXN-"));
    assert_eq!(sale.total_amount, 6300);
    assert_eq!(sale.tax, 300);
    assert_eq!(sale.discount, 1000);
    assert_eq!(sale.change_amount, 3700);
    assert_eq!(sale.lines.len(), 2);
    assert_eq!(sale.cashier, "admin");

    assert_eq!(stock_of(&conn, "TEA"), 6);
    assert_eq!(stock_of(&conn, "WATER"), 8);

    let stored = SqliteTransactionRepository::new(&conn)
        .get_by_number(&sale.transaction_number)
        .unwrap()
        .unwrap();
    assert_eq!(stored, sale);
}

#[test]
fn checkout_updates_loyalty_and_purchase_totals() {
    let conn = open_db_in_memory().unwrap();
    let tea = stock_product(&conn, "TEA", 5000, 10);
    let customers = CustomerService::from_connection(&conn);
    let customer = loyal_customer(&conn, 40);

    let mut cart = Cart::new();
    cart.set_quantity(&tea, 2).unwrap();
    cart.select_customer(Some(customer.id));
    cart.apply_discount(300).unwrap();

    let sale = CheckoutService::from_connection(&conn)
        .checkout_at(
            &admin_session(&conn),
            &cart,
            &cash(20_000),
            1_700_000_000_000,
        )
        .unwrap();
    // (10000 - 300) * 1.05 = 10185
    assert_eq!(sale.total_amount, 10_185);
    assert_eq!(sale.customer_id, Some(customer.id));

    let after = customers.get_customer(customer.id).unwrap().unwrap();
    // 40 - 30 spent + 10 earned
    assert_eq!(after.loyalty_points, 20);
    assert_eq!(after.total_purchases, 10_185);
    assert_eq!(after.last_purchase, Some(1_700_000_000_000));
}

#[test]
fn insufficient_payment_changes_nothing() {
    let conn = open_db_in_memory().unwrap();
    let tea = stock_product(&conn, "TEA", 1000, 3);

    let mut cart = Cart::new();
    cart.add_product(&tea).unwrap();

    let err = CheckoutService::from_connection(&conn)
        .checkout(&admin_session(&conn), &cart, &cash(1000))
        .unwrap_err();
    assert!(matches!(
        err,
        CheckoutError::Pricing(PricingError::InsufficientPayment {
            total: 1050,
            paid: 1000
        })
    ));
    assert_eq!(stock_of(&conn, "TEA"), 3);
    assert_eq!(transaction_count(&conn), 0);
}

#[test]
fn stale_cart_rolls_back_whole_sale() {
    let conn = open_db_in_memory().unwrap();
    let tea = stock_product(&conn, "TEA", 1000, 5);
    let water = stock_product(&conn, "WATER", 500, 5);

    let mut cart = Cart::new();
    cart.set_quantity(&water, 2).unwrap();
    cart.set_quantity(&tea, 4).unwrap();

    // Another till sells tea after the cart was built.
    let admin = admin_session(&conn);
    InventoryService::from_connection(&conn)
        .adjust_stock(&admin, tea.id, -4)
        .unwrap();

    let err = CheckoutService::from_connection(&conn)
        .checkout(&admin, &cart, &cash(100_000))
        .unwrap_err();
    match err {
        CheckoutError::OutOfStock {
            product_code,
            requested,
            available,
        } => {
            assert_eq!(product_code, "TEA");
            assert_eq!(requested, 4);
            assert_eq!(available, 1);
        }
        other => panic!("unexpected error: {other}"),
    }

    assert_eq!(stock_of(&conn, "WATER"), 5);
    assert_eq!(stock_of(&conn, "TEA"), 1);
    assert_eq!(transaction_count(&conn), 0);
}

#[test]
fn checkout_rejects_empty_cart_unknown_customer_and_refund_tender() {
    let conn = open_db_in_memory().unwrap();
    let tea = stock_product(&conn, "TEA", 1000, 5);
    let service = CheckoutService::from_connection(&conn);
    let admin = admin_session(&conn);

    assert!(matches!(
        service.checkout(&admin, &Cart::new(), &cash(0)),
        Err(CheckoutError::EmptyCart)
    ));

    let mut cart = Cart::new();
    cart.add_product(&tea).unwrap();
    let ghost = Uuid::new_v4();
    cart.select_customer(Some(ghost));
    assert!(matches!(
        service.checkout(&admin, &cart, &cash(5000)),
        Err(CheckoutError::CustomerNotFound(id)) if id == ghost
    ));

    cart.select_customer(None);
    let refund_tender = CheckoutRequest {
        payment_method: PaymentMethod::Return,
        ..cash(5000)
    };
    assert!(matches!(
        service.checkout(&admin, &cart, &refund_tender),
        Err(CheckoutError::InvalidPaymentMethod(PaymentMethod::Return))
    ));
    assert_eq!(stock_of(&conn, "TEA"), 5);
}

#[test]
fn transactions_list_newest_first() {
    let conn = open_db_in_memory().unwrap();
    let tea = stock_product(&conn, "TEA", 1000, 10);
    let service = CheckoutService::from_connection(&conn);
    let admin = admin_session(&conn);

    let mut cart = Cart::new();
    cart.add_product(&tea).unwrap();
    let first = service
        .checkout_at(&admin, &cart, &cash(2000), 1_000)
        .unwrap();
    let second = service
        .checkout_at(&admin, &cart, &cash(2000), 2_000)
        .unwrap();

    let repo = SqliteTransactionRepository::new(&conn);
    let listed = repo
        .list_transactions(&TransactionListQuery::default())
        .unwrap();
    let ids: Vec<Uuid> = listed.iter().map(|t| t.id).collect();
    assert_eq!(ids, vec![second.id, first.id]);

    let windowed = repo
        .list_transactions(&TransactionListQuery {
            from_ms: Some(1_500),
            ..TransactionListQuery::default()
        })
        .unwrap();
    assert_eq!(windowed.len(), 1);
    assert_eq!(windowed[0].id, second.id);
    assert_eq!(stock_of(&conn, "TEA"), 8);
}

#[test]
fn cashier_on_receipt_comes_from_the_session() {
    let conn = open_db_in_memory().unwrap();
    let tea = stock_product(&conn, "TEA", 1000, 5);
    let users = UserService::from_connection(&conn);
    users
        .create_user(&admin_session(&conn), "mya", "till-pw", Role::Cashier)
        .unwrap();
    let cashier = users.authenticate("mya", "till-pw").unwrap().unwrap();

    let mut cart = Cart::new();
    cart.add_product(&tea).unwrap();
    let sale = CheckoutService::from_connection(&conn)
        .checkout(&cashier, &cart, &cash(2000))
        .unwrap();
    assert_eq!(sale.cashier, "mya");
}

#[test]
fn points_spent_elsewhere_fail_the_sale_without_side_effects() {
    let conn = open_db_in_memory().unwrap();
    let tea = stock_product(&conn, "TEA", 1000, 5);
    let customer = loyal_customer(&conn, 50);

    // Sale priced while the customer still held 50 points.
    let sale = SaleCommit {
        transaction: Transaction {
            id: Uuid::new_v4(),
            kind: TransactionKind::Sale,
            transaction_number: "TXN-1700000000000-0001".to_string(),
            original_transaction_id: None,
            transaction_date: 1_700_000_000_000,
            lines: vec![TransactionLine::new("TEA", "Item TEA", 1, 1000)],
            total_amount: 525,
            paid_amount: 525,
            change_amount: 0,
            discount: 500,
            tax: 25,
            payment_method: PaymentMethod::Cash,
            cashier: "admin".to_string(),
            customer_id: Some(customer.id),
            return_reason: None,
            restocked: false,
            created_at: 1_700_000_000_000,
        },
        stock: vec![StockDecrement {
            product_id: tea.id,
            product_code: "TEA".to_string(),
            quantity: 1,
        }],
        customer: Some(CustomerSaleUpdate {
            customer_id: customer.id,
            points_spent: 50,
            points_earned: 0,
            purchase_amount: 525,
        }),
    };

    // Another till redeems 30 of those points first.
    conn.execute(
        "UPDATE customers SET loyalty_points = 20 WHERE uuid = ?1;",
        [customer.id.to_string()],
    )
    .unwrap();

    let err = SqliteTransactionRepository::new(&conn)
        .commit_sale(&sale)
        .unwrap_err();
    assert!(matches!(
        err,
        RepoError::InsufficientPoints {
            requested: 50,
            available: 20,
            ..
        }
    ));

    let after = CustomerService::from_connection(&conn)
        .get_customer(customer.id)
        .unwrap()
        .unwrap();
    assert_eq!(after.loyalty_points, 20);
    assert_eq!(after.total_purchases, 0);
    assert_eq!(after.last_purchase, None);
    assert_eq!(stock_of(&conn, "TEA"), 5);
    assert_eq!(transaction_count(&conn), 0);
}

#[test]
fn two_tills_cannot_redeem_the_same_points() {
    let conn = open_db_in_memory().unwrap();
    let tea = stock_product(&conn, "TEA", 1000, 10);
    let customer = loyal_customer(&conn, 50);
    let service = CheckoutService::from_connection(&conn);
    let admin = admin_session(&conn);

    let mut cart = Cart::new();
    cart.set_quantity(&tea, 1).unwrap();
    cart.select_customer(Some(customer.id));
    cart.apply_discount(500).unwrap();

    service.checkout(&admin, &cart, &cash(1000)).unwrap();
    let after_first = CustomerService::from_connection(&conn)
        .get_customer(customer.id)
        .unwrap()
        .unwrap();
    assert_eq!(after_first.loyalty_points, 0);

    // The second till re-reads the balance, so the discount is no longer
    // backed by points and nothing is double-spent.
    service.checkout(&admin, &cart, &cash(1000)).unwrap();
    let after_second = CustomerService::from_connection(&conn)
        .get_customer(customer.id)
        .unwrap()
        .unwrap();
    assert_eq!(after_second.loyalty_points, 0);
}
