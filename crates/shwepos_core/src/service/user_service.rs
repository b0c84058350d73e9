//! Staff accounts, login and permission checks.
//!
//! # Responsibility
//! - Authenticate staff and hand out a [`Session`].
//! - Manage accounts without ever losing the last administrator.
//!
//! # Invariants
//! - At least one admin exists once an admin has been created.
//! - A user cannot delete their own account.
//! - Account writes require `ManageUsers`; only the default-admin seed runs
//!   without a session.
//! - Passwords are never logged.

use crate::model::user::{Permission, Role, Tab, User};
use crate::model::RecordId;
use crate::repo::user_repo::{SqliteUserRepository, UserRepository};
use crate::repo::RepoError;
use crate::time::now_epoch_ms;
use log::{info, warn};
use rusqlite::Connection;
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

pub const DEFAULT_ADMIN_USERNAME: &str = "admin";
pub const DEFAULT_ADMIN_PASSWORD: &str = "admin123";

/// Permission check failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessError {
    Forbidden {
        username: String,
        permission: Permission,
    },
}

impl Display for AccessError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Forbidden {
                username,
                permission,
            } => write!(f, "user `{username}` is not allowed to {permission:?}"),
        }
    }
}

impl Error for AccessError {}

#[derive(Debug)]
pub enum UserServiceError {
    BlankPassword,
    UserNotFound(RecordId),
    CannotDeleteSelf,
    /// The change would leave the shop without an admin.
    LastAdmin,
    Access(AccessError),
    Repo(RepoError),
}

impl Display for UserServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BlankPassword => write!(f, "password must not be blank"),
            Self::UserNotFound(id) => write!(f, "user not found: {id}"),
            Self::CannotDeleteSelf => write!(f, "cannot delete the signed-in user"),
            Self::LastAdmin => write!(f, "at least one admin account is required"),
            Self::Access(err) => write!(f, "{err}"),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for UserServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Access(err) => Some(err),
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for UserServiceError {
    fn from(value: RepoError) -> Self {
        Self::Repo(value)
    }
}

impl From<AccessError> for UserServiceError {
    fn from(value: AccessError) -> Self {
        Self::Access(value)
    }
}

/// Signed-in user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    user: User,
}

impl Session {
    pub fn new(user: User) -> Self {
        Self { user }
    }

    pub fn user(&self) -> &User {
        &self.user
    }

    pub fn role(&self) -> Role {
        self.user.role
    }

    pub fn can(&self, permission: Permission) -> bool {
        self.user.role.permits(permission)
    }

    pub fn require(&self, permission: Permission) -> Result<(), AccessError> {
        if self.can(permission) {
            return Ok(());
        }
        Err(AccessError::Forbidden {
            username: self.user.username.clone(),
            permission,
        })
    }

    pub fn visible_tabs(&self) -> Vec<Tab> {
        self.user.role.visible_tabs()
    }
}

pub struct UserService<R: UserRepository> {
    repo: R,
}

impl<'conn> UserService<SqliteUserRepository<'conn>> {
    pub fn from_connection(conn: &'conn Connection) -> Self {
        Self::new(SqliteUserRepository::new(conn))
    }
}

impl<R: UserRepository> UserService<R> {
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    /// Returns a session when the credentials match.
    pub fn authenticate(
        &self,
        username: &str,
        password: &str,
    ) -> Result<Option<Session>, UserServiceError> {
        match self.repo.verify_credentials(username, password)? {
            Some(user) => {
                info!(
                    "event=login module=users status=ok role={}",
                    user.role.as_str()
                );
                Ok(Some(Session::new(user)))
            }
            None => {
                warn!("event=login module=users status=denied");
                Ok(None)
            }
        }
    }

    /// Resumes the session of an already signed-in user.
    pub fn session_for(&self, id: RecordId) -> Result<Session, UserServiceError> {
        self.repo
            .get_user(id)?
            .map(Session::new)
            .ok_or(UserServiceError::UserNotFound(id))
    }

    pub fn create_user(
        &self,
        session: &Session,
        username: &str,
        password: &str,
        role: Role,
    ) -> Result<User, UserServiceError> {
        session.require(Permission::ManageUsers)?;
        self.insert_user(username, password, role)
    }

    fn insert_user(
        &self,
        username: &str,
        password: &str,
        role: Role,
    ) -> Result<User, UserServiceError> {
        if password.is_empty() {
            return Err(UserServiceError::BlankPassword);
        }
        let now = now_epoch_ms();
        let user = User {
            id: Uuid::new_v4(),
            username: username.trim().to_string(),
            role,
            created_at: now,
            updated_at: now,
        };
        self.repo.create_user(&user, password)?;
        info!(
            "event=user_create module=users status=ok role={}",
            role.as_str()
        );
        Ok(user)
    }

    /// Empty `password` keeps the stored digest.
    pub fn update_user(
        &self,
        session: &Session,
        id: RecordId,
        username: &str,
        role: Role,
        password: Option<&str>,
    ) -> Result<User, UserServiceError> {
        session.require(Permission::ManageUsers)?;
        let mut user = self
            .repo
            .get_user(id)?
            .ok_or(UserServiceError::UserNotFound(id))?;
        if user.role == Role::Admin && role != Role::Admin && self.repo.count_admins()? <= 1 {
            return Err(UserServiceError::LastAdmin);
        }

        user.username = username.trim().to_string();
        user.role = role;
        let new_password = password.filter(|value| !value.is_empty());
        self.repo.update_user(&user, new_password)?;
        self.repo
            .get_user(id)?
            .ok_or(UserServiceError::UserNotFound(id))
    }

    pub fn delete_user(&self, session: &Session, id: RecordId) -> Result<(), UserServiceError> {
        session.require(Permission::ManageUsers)?;
        if session.user().id == id {
            return Err(UserServiceError::CannotDeleteSelf);
        }
        let target = self
            .repo
            .get_user(id)?
            .ok_or(UserServiceError::UserNotFound(id))?;
        if target.is_admin() && self.repo.count_admins()? <= 1 {
            return Err(UserServiceError::LastAdmin);
        }
        self.repo.delete_user(id)?;
        info!("event=user_delete module=users status=ok");
        Ok(())
    }

    pub fn get_user(&self, id: RecordId) -> Result<Option<User>, UserServiceError> {
        Ok(self.repo.get_user(id)?)
    }

    pub fn list_users(&self) -> Result<Vec<User>, UserServiceError> {
        Ok(self.repo.list_users()?)
    }

    /// Seeds `admin`/`admin123` into an empty user table.
    pub fn ensure_default_admin(&self) -> Result<Option<User>, UserServiceError> {
        if self.repo.count_users()? > 0 {
            return Ok(None);
        }
        let user = self.insert_user(DEFAULT_ADMIN_USERNAME, DEFAULT_ADMIN_PASSWORD, Role::Admin)?;
        warn!("event=default_admin module=users status=created");
        Ok(Some(user))
    }
}

#[cfg(test)]
mod tests {
    use super::{AccessError, Session};
    use crate::model::user::{Permission, Role, User};
    use uuid::Uuid;

    fn user(role: Role) -> User {
        User {
            id: Uuid::new_v4(),
            username: "mya".to_string(),
            role,
            created_at: 1,
            updated_at: 1,
        }
    }

    #[test]
    fn cashier_session_is_forbidden_from_admin_work() {
        let session = Session::new(user(Role::Cashier));
        assert!(session.require(Permission::Sell).is_ok());
        assert_eq!(
            session.require(Permission::ManageUsers),
            Err(AccessError::Forbidden {
                username: "mya".to_string(),
                permission: Permission::ManageUsers
            })
        );
    }

    #[test]
    fn admin_session_passes_every_check() {
        let session = Session::new(user(Role::Admin));
        assert!(session.require(Permission::ManageSettings).is_ok());
        assert_eq!(session.visible_tabs().len(), 8);
    }
}
