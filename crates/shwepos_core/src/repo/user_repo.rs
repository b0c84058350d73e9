//! User repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Persist staff accounts with salted BLAKE3 password digests.
//! - Verify credentials without ever returning password material.
//!
//! # Invariants
//! - Usernames are unique, compared case-insensitively.
//! - Digest comparison happens in constant time (`blake3::Hash` equality).

use crate::model::user::{Role, User};
use crate::model::RecordId;
use crate::repo::{map_unique_violation, parse_record_id, RepoError, RepoResult};
use crate::time::now_epoch_ms;
use rusqlite::{params, Connection, Row};
use uuid::Uuid;

const USER_SELECT_SQL: &str = "SELECT
    uuid,
    username,
    role,
    created_at,
    updated_at
FROM users";

pub trait UserRepository {
    fn create_user(&self, user: &User, password: &str) -> RepoResult<RecordId>;
    /// Updates username/role, and the password when `new_password` is given.
    fn update_user(&self, user: &User, new_password: Option<&str>) -> RepoResult<()>;
    fn get_user(&self, id: RecordId) -> RepoResult<Option<User>>;
    fn get_by_username(&self, username: &str) -> RepoResult<Option<User>>;
    /// Returns the user only when the password matches.
    fn verify_credentials(&self, username: &str, password: &str) -> RepoResult<Option<User>>;
    fn list_users(&self) -> RepoResult<Vec<User>>;
    fn delete_user(&self, id: RecordId) -> RepoResult<()>;
    fn count_admins(&self) -> RepoResult<u64>;
    fn count_users(&self) -> RepoResult<u64>;
}

/// SQLite-backed user repository.
pub struct SqliteUserRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteUserRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl UserRepository for SqliteUserRepository<'_> {
    fn create_user(&self, user: &User, password: &str) -> RepoResult<RecordId> {
        user.validate()?;

        let salt = new_salt();
        let digest = password_digest(&salt, password);
        self.conn
            .execute(
                "INSERT INTO users (
                    uuid,
                    username,
                    password_salt,
                    password_hash,
                    role,
                    created_at,
                    updated_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7);",
                params![
                    user.id.to_string(),
                    user.username.trim(),
                    salt,
                    digest.to_hex().as_str(),
                    user.role.as_str(),
                    user.created_at,
                    user.updated_at,
                ],
            )
            .map_err(|err| {
                map_unique_violation(err, || format!("username `{}` already exists", user.username))
            })?;

        Ok(user.id)
    }

    fn update_user(&self, user: &User, new_password: Option<&str>) -> RepoResult<()> {
        user.validate()?;

        let now = now_epoch_ms();
        let result = match new_password {
            Some(password) => {
                let salt = new_salt();
                let digest = password_digest(&salt, password);
                self.conn.execute(
                    "UPDATE users
                     SET
                        username = ?1,
                        role = ?2,
                        password_salt = ?3,
                        password_hash = ?4,
                        updated_at = ?5
                     WHERE uuid = ?6;",
                    params![
                        user.username.trim(),
                        user.role.as_str(),
                        salt,
                        digest.to_hex().as_str(),
                        now,
                        user.id.to_string(),
                    ],
                )
            }
            None => self.conn.execute(
                "UPDATE users
                 SET
                    username = ?1,
                    role = ?2,
                    updated_at = ?3
                 WHERE uuid = ?4;",
                params![
                    user.username.trim(),
                    user.role.as_str(),
                    now,
                    user.id.to_string(),
                ],
            ),
        };

        let changed = result.map_err(|err| {
            map_unique_violation(err, || format!("username `{}` already exists", user.username))
        })?;
        if changed == 0 {
            return Err(RepoError::not_found("user", user.id));
        }
        Ok(())
    }

    fn get_user(&self, id: RecordId) -> RepoResult<Option<User>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{USER_SELECT_SQL} WHERE uuid = ?1;"))?;
        let mut rows = stmt.query([id.to_string()])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_user_row(row)?));
        }
        Ok(None)
    }

    fn get_by_username(&self, username: &str) -> RepoResult<Option<User>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{USER_SELECT_SQL} WHERE username = ?1;"))?;
        let mut rows = stmt.query([username.trim()])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_user_row(row)?));
        }
        Ok(None)
    }

    fn verify_credentials(&self, username: &str, password: &str) -> RepoResult<Option<User>> {
        let mut stmt = self.conn.prepare(
            "SELECT uuid, username, role, created_at, updated_at, password_salt, password_hash
             FROM users
             WHERE username = ?1;",
        )?;
        let mut rows = stmt.query([username.trim()])?;
        let Some(row) = rows.next()? else {
            return Ok(None);
        };

        let salt: String = row.get("password_salt")?;
        let stored_hex: String = row.get("password_hash")?;
        let stored = blake3::Hash::from_hex(stored_hex.as_str()).map_err(|_| {
            RepoError::InvalidData("invalid digest in users.password_hash".to_string())
        })?;
        if password_digest(&salt, password) != stored {
            return Ok(None);
        }
        Ok(Some(parse_user_row(row)?))
    }

    fn list_users(&self) -> RepoResult<Vec<User>> {
        let mut stmt = self.conn.prepare(&format!(
            "{USER_SELECT_SQL} ORDER BY username COLLATE NOCASE ASC;"
        ))?;
        let mut rows = stmt.query([])?;
        let mut users = Vec::new();
        while let Some(row) = rows.next()? {
            users.push(parse_user_row(row)?);
        }
        Ok(users)
    }

    fn delete_user(&self, id: RecordId) -> RepoResult<()> {
        let changed = self
            .conn
            .execute("DELETE FROM users WHERE uuid = ?1;", [id.to_string()])?;
        if changed == 0 {
            return Err(RepoError::not_found("user", id));
        }
        Ok(())
    }

    fn count_admins(&self) -> RepoResult<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM users WHERE role = 'admin';",
            [],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    fn count_users(&self) -> RepoResult<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM users;", [], |row| row.get(0))?;
        Ok(count as u64)
    }
}

fn new_salt() -> String {
    Uuid::new_v4().simple().to_string()
}

fn password_digest(salt: &str, password: &str) -> blake3::Hash {
    let mut hasher = blake3::Hasher::new();
    hasher.update(salt.as_bytes());
    hasher.update(b":");
    hasher.update(password.as_bytes());
    hasher.finalize()
}

fn parse_user_row(row: &Row<'_>) -> RepoResult<User> {
    let uuid_text: String = row.get("uuid")?;
    let role_text: String = row.get("role")?;
    let role = Role::parse(&role_text).ok_or_else(|| {
        RepoError::InvalidData(format!("invalid role `{role_text}` in users.role"))
    })?;
    Ok(User {
        id: parse_record_id(&uuid_text, "users.uuid")?,
        username: row.get("username")?,
        role,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

#[cfg(test)]
mod tests {
    use super::password_digest;

    #[test]
    fn digest_depends_on_salt() {
        assert_ne!(
            password_digest("a", "admin123"),
            password_digest("b", "admin123")
        );
        assert_eq!(
            password_digest("a", "admin123"),
            password_digest("a", "admin123")
        );
    }
}
