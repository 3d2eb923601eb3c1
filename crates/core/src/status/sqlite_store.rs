//! SQLite-backed status table.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use rusqlite::{params, Connection, ErrorCode};
use tracing::info;

use super::{StatusCode, StatusError, StatusStore};

/// SQLite-backed status table.
pub struct SqliteStatusStore {
    conn: Mutex<Connection>,
}

impl SqliteStatusStore {
    /// Open the status table, creating the database file and table if needed.
    pub fn new(path: &Path) -> Result<Self, StatusError> {
        let conn =
            Connection::open(path).map_err(|e| StatusError::StoreUnavailable(e.to_string()))?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory status table (useful for testing).
    pub fn in_memory() -> Result<Self, StatusError> {
        let conn = Connection::open_in_memory()
            .map_err(|e| StatusError::StoreUnavailable(e.to_string()))?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn initialize_schema(conn: &Connection) -> Result<(), StatusError> {
        let version: String = conn
            .query_row("SELECT sqlite_version()", [], |row| row.get(0))
            .map_err(|e| StatusError::StoreUnavailable(e.to_string()))?;
        info!(version = %version, "Connected to status store");

        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS statuses (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL UNIQUE,
                pending INTEGER NOT NULL DEFAULT 1
            );
            "#,
        )
        .map_err(|e| StatusError::StoreUnavailable(e.to_string()))?;

        Ok(())
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn row_to_status(row: &rusqlite::Row) -> rusqlite::Result<StatusCode> {
        Ok(StatusCode {
            id: row.get(0)?,
            label: row.get(1)?,
            pending: row.get(2)?,
        })
    }
}

impl StatusStore for SqliteStatusStore {
    fn load_all(&self) -> Result<Vec<StatusCode>, StatusError> {
        let conn = self.conn();

        let mut stmt = conn
            .prepare("SELECT id, name, pending FROM statuses ORDER BY id")
            .map_err(|e| StatusError::StoreUnavailable(e.to_string()))?;

        let rows = stmt
            .query_map([], Self::row_to_status)
            .map_err(|e| StatusError::StoreUnavailable(e.to_string()))?;

        let mut statuses = Vec::new();
        for row_result in rows {
            statuses.push(row_result.map_err(|e| StatusError::StoreReadFailed(e.to_string()))?);
        }

        Ok(statuses)
    }

    fn find_by_label(&self, label: &str) -> Result<Option<StatusCode>, StatusError> {
        let conn = self.conn();

        let result = conn.query_row(
            "SELECT id, name, pending FROM statuses WHERE name = ?",
            params![label],
            Self::row_to_status,
        );

        match result {
            Ok(status) => Ok(Some(status)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(StatusError::StoreReadFailed(e.to_string())),
        }
    }

    fn insert(&self, label: &str, pending: bool) -> Result<StatusCode, StatusError> {
        let conn = self.conn();

        match conn.execute(
            "INSERT INTO statuses (name, pending) VALUES (?, ?)",
            params![label, pending],
        ) {
            Ok(_) => {}
            Err(rusqlite::Error::SqliteFailure(err, _))
                if err.code == ErrorCode::ConstraintViolation =>
            {
                return Err(StatusError::AlreadyExists(label.to_string()));
            }
            Err(e) => return Err(StatusError::StoreWriteFailed(e.to_string())),
        }

        Ok(StatusCode::new(conn.last_insert_rowid(), label, pending))
    }
}
