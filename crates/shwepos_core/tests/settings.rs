use shwepos_core::db::open_db;
use shwepos_core::db::open_db_in_memory;
use shwepos_core::model::settings::{DEFAULT_TAX_RATE_BPS, DEFAULT_UTC_OFFSET_MINUTES};
use shwepos_core::service::user_service::{DEFAULT_ADMIN_PASSWORD, DEFAULT_ADMIN_USERNAME};
use shwepos_core::{
    AccessError, Cart, CheckoutService, InventoryService, ModelValidationError, NewProduct,
    Permission, RepoError, Role, Session, SettingsError, SettingsService, StoreSettings,
    UserService,
};
use rusqlite::Connection;

fn admin_session(conn: &Connection) -> Session {
    let users = UserService::from_connection(conn);
    users.ensure_default_admin().unwrap();
    users
        .authenticate(DEFAULT_ADMIN_USERNAME, DEFAULT_ADMIN_PASSWORD)
        .unwrap()
        .unwrap()
}

#[test]
fn defaults_are_returned_before_first_save() {
    let conn = open_db_in_memory().unwrap();
    let settings = SettingsService::from_connection(&conn).load().unwrap();

    assert_eq!(settings.store_name, "Myanmar Shop");
    assert_eq!(settings.store_address, "Yangon, Myanmar");
    assert_eq!(settings.store_phone, "09-123-456-789");
    assert_eq!(settings.tax_rate_bps, DEFAULT_TAX_RATE_BPS);
    assert_eq!(settings.utc_offset_minutes, DEFAULT_UTC_OFFSET_MINUTES);
}

#[test]
fn saved_settings_survive_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("shop.db");

    {
        let conn = open_db(&path).unwrap();
        let saved = SettingsService::from_connection(&conn)
            .save(&admin_session(&conn), StoreSettings {
                store_name: "  Shwe Shop ".to_string(),
                tax_rate_bps: 0,
                ..StoreSettings::default()
            })
            .unwrap();
        assert_eq!(saved.store_name, "Shwe Shop");
    }

    let conn = open_db(&path).unwrap();
    let loaded = SettingsService::from_connection(&conn).load().unwrap();
    assert_eq!(loaded.store_name, "Shwe Shop");
    assert_eq!(loaded.tax_rate_bps, 0);
}

#[test]
fn invalid_settings_are_rejected() {
    let conn = open_db_in_memory().unwrap();
    let admin = admin_session(&conn);
    let service = SettingsService::from_connection(&conn);

    let err = service
        .save(&admin, StoreSettings {
            tax_rate_bps: 20_000,
            ..StoreSettings::default()
        })
        .unwrap_err();
    assert!(matches!(
        err,
        SettingsError::Repo(RepoError::Validation(
            ModelValidationError::TaxRateOutOfRange(20_000)
        ))
    ));

    assert!(service
        .save(&admin, StoreSettings {
            store_name: " ".to_string(),
            ..StoreSettings::default()
        })
        .is_err());
    assert!(service
        .save(&admin, StoreSettings {
            utc_offset_minutes: 15 * 60,
            ..StoreSettings::default()
        })
        .is_err());
    assert_eq!(service.load().unwrap(), StoreSettings::default());
}

#[test]
fn checkout_uses_saved_tax_rate() {
    let conn = open_db_in_memory().unwrap();
    let admin = admin_session(&conn);
    SettingsService::from_connection(&conn)
        .save(&admin, StoreSettings {
            tax_rate_bps: 1_000,
            ..StoreSettings::default()
        })
        .unwrap();
    let product = InventoryService::from_connection(&conn)
        .create_product(&admin, NewProduct {
            product_code: "P1".to_string(),
            product_name: "Rice".to_string(),
            category: "Food".to_string(),
            price: 2_000,
            quantity: 5,
            ..NewProduct::default()
        })
        .unwrap();

    let mut cart = Cart::new();
    cart.add_product(&product).unwrap();
    let totals = CheckoutService::from_connection(&conn).quote(&cart).unwrap();
    assert_eq!(totals.tax, 200);
    assert_eq!(totals.total, 2_200);
}

#[test]
fn cashier_cannot_change_store_settings() {
    let conn = open_db_in_memory().unwrap();
    let admin = admin_session(&conn);
    let users = UserService::from_connection(&conn);
    users
        .create_user(&admin, "mya", "till-pw", Role::Cashier)
        .unwrap();
    let cashier = users.authenticate("mya", "till-pw").unwrap().unwrap();
    let service = SettingsService::from_connection(&conn);

    let err = service
        .save(
            &cashier,
            StoreSettings {
                tax_rate_bps: 0,
                ..StoreSettings::default()
            },
        )
        .unwrap_err();
    assert!(matches!(
        err,
        SettingsError::Access(AccessError::Forbidden {
            permission: Permission::ManageSettings,
            ..
        })
    ));
    assert_eq!(service.load().unwrap().tax_rate_bps, DEFAULT_TAX_RATE_BPS);
}
