//! Key/value secure store operations.

use std::sync::Mutex;

use rusqlite::{params, OptionalExtension};

use super::{Database, DbError, DbResult};

/// Bearer token for the authenticated user.
pub const AUTH_TOKEN_KEY: &str = "auth_token";
/// ISO-8601 timestamp of the last successful login.
pub const LAST_LOGIN_KEY: &str = "last_login";
/// Role string (`admin` or `customer`).
pub const USER_TYPE_KEY: &str = "user_type";
/// Serialized user profile JSON.
pub const USER_KEY: &str = "user";
/// Backend id of the signed-in user.
pub const USER_ID_KEY: &str = "user_id";

/// Every key written by a login, in write order.
pub const SESSION_KEYS: [&str; 5] = [
    AUTH_TOKEN_KEY,
    LAST_LOGIN_KEY,
    USER_TYPE_KEY,
    USER_KEY,
    USER_ID_KEY,
];

impl Database {
    /// Get a stored value.
    pub fn get_item(&self, key: &str) -> DbResult<Option<String>> {
        self.conn
            .query_row(
                "SELECT value FROM secure_store WHERE key = ?",
                [key],
                |row| row.get(0),
            )
            .optional()
            .map_err(Into::into)
    }

    /// Set a stored value, replacing any previous one.
    pub fn set_item(&self, key: &str, value: &str) -> DbResult<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO secure_store (key, value, updated_at) VALUES (?, ?, datetime('now'))",
            params![key, value],
        )?;
        Ok(())
    }

    /// Delete a stored value. Returns whether a row was removed.
    pub fn delete_item(&self, key: &str) -> DbResult<bool> {
        let rows_affected = self
            .conn
            .execute("DELETE FROM secure_store WHERE key = ?", [key])?;
        Ok(rows_affected > 0)
    }
}

/// Durable key/value storage shared by the session store and the gateway.
///
/// Each call is an independent operation; there is no grouping of writes.
pub trait SecureStore: Send + Sync {
    fn get_item(&self, key: &str) -> DbResult<Option<String>>;
    fn set_item(&self, key: &str, value: &str) -> DbResult<()>;
    fn delete_item(&self, key: &str) -> DbResult<()>;
}

/// SQLite-backed [`SecureStore`].
pub struct SqliteStore {
    db: Mutex<Database>,
}

impl SqliteStore {
    pub fn new(db: Database) -> Self {
        Self { db: Mutex::new(db) }
    }

    pub fn open_in_memory() -> DbResult<Self> {
        Ok(Self::new(Database::open_in_memory()?))
    }
}

impl SecureStore for SqliteStore {
    fn get_item(&self, key: &str) -> DbResult<Option<String>> {
        let db = self.db.lock().map_err(|_| DbError::LockPoisoned)?;
        db.get_item(key)
    }

    fn set_item(&self, key: &str, value: &str) -> DbResult<()> {
        let db = self.db.lock().map_err(|_| DbError::LockPoisoned)?;
        db.set_item(key, value)
    }

    fn delete_item(&self, key: &str) -> DbResult<()> {
        let db = self.db.lock().map_err(|_| DbError::LockPoisoned)?;
        db.delete_item(key).map(|_| ())
    }
}

/// [`SecureStore`] whose reads and deletes can be switched to fail.
#[cfg(test)]
pub(crate) struct FlakyStore {
    inner: SqliteStore,
    pub(crate) fail_reads: std::sync::atomic::AtomicBool,
    pub(crate) fail_deletes: std::sync::atomic::AtomicBool,
}

#[cfg(test)]
impl FlakyStore {
    pub(crate) fn new() -> Self {
        Self {
            inner: SqliteStore::open_in_memory().unwrap(),
            fail_reads: Default::default(),
            fail_deletes: Default::default(),
        }
    }

    fn check(flag: &std::sync::atomic::AtomicBool) -> DbResult<()> {
        if flag.load(std::sync::atomic::Ordering::SeqCst) {
            Err(DbError::LockPoisoned)
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
impl SecureStore for FlakyStore {
    fn get_item(&self, key: &str) -> DbResult<Option<String>> {
        Self::check(&self.fail_reads)?;
        self.inner.get_item(key)
    }

    fn set_item(&self, key: &str, value: &str) -> DbResult<()> {
        self.inner.set_item(key, value)
    }

    fn delete_item(&self, key: &str) -> DbResult<()> {
        Self::check(&self.fail_deletes)?;
        self.inner.delete_item(key)
    }
}
