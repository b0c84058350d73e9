use rusqlite::Connection;
use shwepos_core::db::open_db_in_memory;
use shwepos_core::service::user_service::{DEFAULT_ADMIN_PASSWORD, DEFAULT_ADMIN_USERNAME};
use shwepos_core::{
    AccessError, Permission, RepoError, Role, Session, Tab, UserService, UserServiceError,
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

#[test]
fn default_admin_is_seeded_once() {
    let conn = open_db_in_memory().unwrap();
    let service = UserService::from_connection(&conn);

    let admin = service.ensure_default_admin().unwrap().unwrap();
    assert_eq!(admin.username, DEFAULT_ADMIN_USERNAME);
    assert_eq!(admin.role, Role::Admin);
    assert!(service.ensure_default_admin().unwrap().is_none());

    let session = service
        .authenticate(DEFAULT_ADMIN_USERNAME, DEFAULT_ADMIN_PASSWORD)
        .unwrap()
        .unwrap();
    assert_eq!(session.user().id, admin.id);
    assert_eq!(session.visible_tabs(), Tab::ALL.to_vec());
}

#[test]
fn authentication_checks_password_and_ignores_username_case() {
    let conn = open_db_in_memory().unwrap();
    let admin = admin_session(&conn);
    let service = UserService::from_connection(&conn);
    service
        .create_user(&admin, "Mya", "secret-1", Role::Cashier)
        .unwrap();

    assert!(service.authenticate("Mya", "wrong").unwrap().is_none());
    assert!(service.authenticate("nobody", "secret-1").unwrap().is_none());

    let session = service.authenticate("mya", "secret-1").unwrap().unwrap();
    assert_eq!(session.role(), Role::Cashier);
    assert!(session.require(Permission::ProcessReturns).is_ok());
    assert!(session.require(Permission::ManageInventory).is_err());
    assert_eq!(session.visible_tabs(), vec![Tab::Pos, Tab::Transactions]);
}

#[test]
fn passwords_are_stored_as_salted_digests() {
    let conn = open_db_in_memory().unwrap();
    let admin = admin_session(&conn);
    let service = UserService::from_connection(&conn);
    service
        .create_user(&admin, "a", "same-pass", Role::Cashier)
        .unwrap();
    service
        .create_user(&admin, "b", "same-pass", Role::Cashier)
        .unwrap();

    let hashes: Vec<String> = conn
        .prepare("SELECT password_hash FROM users ORDER BY username;")
        .unwrap()
        .query_map([], |row| row.get(0))
        .unwrap()
        .collect::<Result<_, _>>()
        .unwrap();
    assert_eq!(hashes.len(), 3);
    assert_ne!(hashes[0], hashes[2]);
    assert!(hashes.iter().all(|hash| !hash.contains("same-pass")));
}

#[test]
fn create_user_requires_password_and_unique_name() {
    let conn = open_db_in_memory().unwrap();
    let admin = admin_session(&conn);
    let service = UserService::from_connection(&conn);

    assert!(matches!(
        service.create_user(&admin, "mya", "", Role::Cashier),
        Err(UserServiceError::BlankPassword)
    ));
    service
        .create_user(&admin, "mya", "pw", Role::Cashier)
        .unwrap();
    assert!(matches!(
        service.create_user(&admin, "MYA", "pw", Role::Admin),
        Err(UserServiceError::Repo(RepoError::Conflict(_)))
    ));
}

#[test]
fn empty_password_on_update_keeps_old_one() {
    let conn = open_db_in_memory().unwrap();
    let admin = admin_session(&conn);
    let service = UserService::from_connection(&conn);
    let cashier = service
        .create_user(&admin, "mya", "old-pw", Role::Cashier)
        .unwrap();

    let renamed = service
        .update_user(&admin, cashier.id, "mya2", Role::Cashier, Some(""))
        .unwrap();
    assert_eq!(renamed.username, "mya2");
    assert!(service.authenticate("mya2", "old-pw").unwrap().is_some());

    service
        .update_user(&admin, cashier.id, "mya2", Role::Cashier, Some("new-pw"))
        .unwrap();
    assert!(service.authenticate("mya2", "old-pw").unwrap().is_none());
    assert!(service.authenticate("mya2", "new-pw").unwrap().is_some());
}

#[test]
fn last_admin_and_self_cannot_be_removed() {
    let conn = open_db_in_memory().unwrap();
    let service = UserService::from_connection(&conn);
    let admin = service.ensure_default_admin().unwrap().unwrap();
    let admin_session = service.session_for(admin.id).unwrap();
    let cashier = service
        .create_user(&admin_session, "mya", "pw", Role::Cashier)
        .unwrap();

    assert!(matches!(
        service.delete_user(&admin_session, admin.id),
        Err(UserServiceError::CannotDeleteSelf)
    ));
    assert!(matches!(
        service.update_user(&admin_session, admin.id, "admin", Role::Cashier, None),
        Err(UserServiceError::LastAdmin)
    ));

    let second_admin = service
        .create_user(&admin_session, "boss", "pw", Role::Admin)
        .unwrap();
    let boss_session = service.session_for(second_admin.id).unwrap();
    service.delete_user(&admin_session, cashier.id).unwrap();
    service.delete_user(&boss_session, admin.id).unwrap();
    assert!(service.get_user(admin.id).unwrap().is_none());

    assert!(matches!(
        service.update_user(&boss_session, second_admin.id, "boss", Role::Cashier, None),
        Err(UserServiceError::LastAdmin)
    ));
    assert_eq!(service.list_users().unwrap().len(), 1);
}

#[test]
fn cashier_cannot_manage_accounts() {
    let conn = open_db_in_memory().unwrap();
    let admin = admin_session(&conn);
    let service = UserService::from_connection(&conn);
    let cashier = service
        .create_user(&admin, "mya", "pw", Role::Cashier)
        .unwrap();
    let session = service.authenticate("mya", "pw").unwrap().unwrap();

    let err = service
        .create_user(&session, "ghost", "pw", Role::Admin)
        .unwrap_err();
    assert!(matches!(
        err,
        UserServiceError::Access(AccessError::Forbidden {
            permission: Permission::ManageUsers,
            ..
        })
    ));
    assert!(matches!(
        service.update_user(&session, cashier.id, "mya", Role::Admin, None),
        Err(UserServiceError::Access(_))
    ));
    assert!(matches!(
        service.delete_user(&session, admin.user().id),
        Err(UserServiceError::Access(_))
    ));

    assert_eq!(service.list_users().unwrap().len(), 2);
    assert_eq!(
        service.get_user(cashier.id).unwrap().unwrap().role,
        Role::Cashier
    );
}

#[test]
fn session_for_resolves_known_users_only() {
    let conn = open_db_in_memory().unwrap();
    let admin = admin_session(&conn);
    let service = UserService::from_connection(&conn);

    let resumed = service.session_for(admin.user().id).unwrap();
    assert_eq!(resumed.role(), Role::Admin);

    let ghost = Uuid::new_v4();
    assert!(matches!(
        service.session_for(ghost),
        Err(UserServiceError::UserNotFound(id)) if id == ghost
    ));
}
