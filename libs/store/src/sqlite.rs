//! SQLite backend: a single-file database holding one `resources` table.

use std::path::Path;

use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};

use crate::{StoreBackend, StoreError};

/// Durable backend over a single SQLite file.
pub struct SqliteBackend {
    conn: Mutex<Connection>,
}

impl SqliteBackend {
    /// Open or create a database at the given path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;
        Self::init(conn)
    }

    /// Open a private in-memory database (tests).
    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS resources (
                key   TEXT PRIMARY KEY,
                value BLOB NOT NULL
            );",
        )?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }
}

impl StoreBackend for SqliteBackend {
    fn insert(&self, key: &str, value: &[u8]) -> Result<(), StoreError> {
        let conn = self.conn.lock();
        let exists: bool = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM resources WHERE key = ?1)",
            params![key],
            |row| row.get(0),
        )?;
        if exists {
            return Err(StoreError::AlreadyExists(key.to_string()));
        }
        conn.execute(
            "INSERT INTO resources (key, value) VALUES (?1, ?2)",
            params![key, value],
        )?;
        Ok(())
    }

    fn fetch(&self, key: &str) -> Result<Vec<u8>, StoreError> {
        let conn = self.conn.lock();
        conn.query_row(
            "SELECT value FROM resources WHERE key = ?1",
            params![key],
            |row| row.get(0),
        )
        .optional()?
        .ok_or_else(|| StoreError::NotFound(key.to_string()))
    }

    fn replace(&self, key: &str, value: &[u8]) -> Result<(), StoreError> {
        let conn = self.conn.lock();
        let changed = conn.execute(
            "UPDATE resources SET value = ?2 WHERE key = ?1",
            params![key, value],
        )?;
        if changed == 0 {
            return Err(StoreError::NotFound(key.to_string()));
        }
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<Vec<u8>, StoreError> {
        let conn = self.conn.lock();
        let prior: Option<Vec<u8>> = conn
            .query_row(
                "SELECT value FROM resources WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?;
        let Some(prior) = prior else {
            return Err(StoreError::NotFound(key.to_string()));
        };
        conn.execute("DELETE FROM resources WHERE key = ?1", params![key])?;
        Ok(prior)
    }

    fn scan(&self, prefix: &str) -> Result<Vec<Vec<u8>>, StoreError> {
        let conn = self.conn.lock();
        let mut stmt =
            conn.prepare("SELECT key, value FROM resources WHERE key >= ?1 ORDER BY key")?;
        let rows = stmt.query_map(params![prefix], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, Vec<u8>>(1)?))
        })?;

        let mut out = Vec::new();
        for row in rows {
            let (key, value) = row?;
            if !key.starts_with(prefix) {
                // Keys sort lexicographically; once past the prefix range
                // there is nothing left to collect.
                break;
            }
            out.push(value);
        }
        Ok(out)
    }
}
