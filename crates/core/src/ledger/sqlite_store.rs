//! SQLite-backed item ledger implementation.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, ErrorCode};
use tracing::info;

use crate::status::StatusId;

use super::{DiscoveredEntry, ItemLedger, LedgerError, LedgerItem, UpdateOutcome};

const ITEM_COLUMNS: &str =
    "id, first_seen_at, updated_at, status, title, pub_date, guid, url, filename, length, media_type, payload";

/// SQLite-backed item ledger.
pub struct SqliteItemLedger {
    conn: Mutex<Connection>,
}

impl SqliteItemLedger {
    /// Open the ledger, creating the database file and tables if needed.
    pub fn new(path: &Path) -> Result<Self, LedgerError> {
        let conn =
            Connection::open(path).map_err(|e| LedgerError::StoreUnavailable(e.to_string()))?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory ledger (useful for testing).
    pub fn in_memory() -> Result<Self, LedgerError> {
        let conn = Connection::open_in_memory()
            .map_err(|e| LedgerError::StoreUnavailable(e.to_string()))?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn initialize_schema(conn: &Connection) -> Result<(), LedgerError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS items (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                first_seen_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                status INTEGER NOT NULL,
                title TEXT NOT NULL,
                pub_date TEXT,
                guid TEXT NOT NULL,
                url TEXT NOT NULL UNIQUE,
                filename TEXT NOT NULL,
                length INTEGER NOT NULL DEFAULT 0,
                media_type TEXT NOT NULL DEFAULT '',
                payload TEXT NOT NULL DEFAULT ''
            );

            CREATE INDEX IF NOT EXISTS idx_items_status ON items(status);
            CREATE INDEX IF NOT EXISTS idx_items_updated_at ON items(updated_at);
            "#,
        )
        .map_err(|e| LedgerError::StoreUnavailable(e.to_string()))?;

        Ok(())
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn row_to_item(row: &rusqlite::Row) -> rusqlite::Result<LedgerItem> {
        let first_seen_str: String = row.get(1)?;
        let updated_at_str: String = row.get(2)?;
        let pub_date_str: Option<String> = row.get(5)?;

        let first_seen_at = parse_timestamp(&first_seen_str);
        let updated_at = parse_timestamp(&updated_at_str);
        let pub_date = pub_date_str.and_then(|s| {
            DateTime::parse_from_rfc3339(&s)
                .map(|dt| dt.with_timezone(&Utc))
                .ok()
        });

        Ok(LedgerItem {
            id: row.get(0)?,
            first_seen_at,
            updated_at,
            status: row.get(3)?,
            title: row.get(4)?,
            pub_date,
            guid: row.get(6)?,
            url: row.get(7)?,
            filename: row.get(8)?,
            length: row.get(9)?,
            media_type: row.get(10)?,
            payload: row.get(11)?,
        })
    }
}

// Timestamps are written by this module, so a parse failure means a foreign
// writer; fall back to now rather than failing the read.
fn parse_timestamp(value: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

impl ItemLedger for SqliteItemLedger {
    fn find(&self, address: &str) -> Result<Option<LedgerItem>, LedgerError> {
        let conn = self.conn();

        let result = conn.query_row(
            &format!("SELECT {} FROM items WHERE url = ?", ITEM_COLUMNS),
            params![address],
            Self::row_to_item,
        );

        match result {
            Ok(item) => Ok(Some(item)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(LedgerError::StoreReadFailed(e.to_string())),
        }
    }

    fn create(&self, entry: &DiscoveredEntry, status: StatusId) -> Result<LedgerItem, LedgerError> {
        let conn = self.conn();

        let now = Utc::now();
        let pub_date = entry.parsed_pub_date();
        let filename = entry.local_filename();

        info!(address = %entry.address, filename = %filename, "Adding item");

        match conn.execute(
            "INSERT INTO items (first_seen_at, updated_at, status, title, pub_date, guid, url, filename, length, media_type, payload) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, '')",
            params![
                now.to_rfc3339(),
                now.to_rfc3339(),
                status,
                entry.title,
                pub_date.map(|d| d.to_rfc3339()),
                entry.guid,
                entry.address,
                filename,
                entry.length,
                entry.media_type,
            ],
        ) {
            Ok(_) => {}
            Err(rusqlite::Error::SqliteFailure(err, _))
                if err.code == ErrorCode::ConstraintViolation =>
            {
                return Err(LedgerError::AlreadyExists(entry.address.clone()));
            }
            Err(e) => return Err(LedgerError::StoreWriteFailed(e.to_string())),
        }

        Ok(LedgerItem {
            id: conn.last_insert_rowid(),
            first_seen_at: now,
            updated_at: now,
            status,
            title: entry.title.clone(),
            pub_date,
            guid: entry.guid.clone(),
            url: entry.address.clone(),
            filename,
            length: entry.length,
            media_type: entry.media_type.clone(),
            payload: String::new(),
        })
    }

    fn update_payload_and_status(
        &self,
        address: &str,
        payload: &str,
        status: StatusId,
    ) -> Result<UpdateOutcome, LedgerError> {
        let conn = self.conn();

        let changed = conn
            .execute(
                "UPDATE items SET payload = ?1, status = ?2, updated_at = ?3 WHERE url = ?4 AND (payload <> ?1 OR status <> ?2)",
                params![payload, status, Utc::now().to_rfc3339(), address],
            )
            .map_err(|e| LedgerError::StoreWriteFailed(e.to_string()))?;

        if changed > 0 {
            return Ok(UpdateOutcome::Updated);
        }

        let exists: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM items WHERE url = ?",
                params![address],
                |row| row.get(0),
            )
            .map_err(|e| LedgerError::StoreReadFailed(e.to_string()))?;

        if exists == 0 {
            return Err(LedgerError::NotFound(address.to_string()));
        }

        info!(address = %address, status = status, "Payload and status unchanged");
        Ok(UpdateOutcome::Unchanged)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_ledger() -> SqliteItemLedger {
        SqliteItemLedger::in_memory().unwrap()
    }

    fn create_test_entry(address: &str) -> DiscoveredEntry {
        DiscoveredEntry {
            title: "Morning show".to_string(),
            description: "Morning show, hour 1".to_string(),
            pub_date: "Thu, 12 Feb 2015 16:19:31 +0000".to_string(),
            guid: "g1".to_string(),
            address: address.to_string(),
            length: 1024,
            media_type: "audio/mpeg".to_string(),
        }
    }

    #[test]
    fn test_find_absent() {
        let ledger = create_test_ledger();
        assert!(ledger.find("http://x/a.mp3").unwrap().is_none());
    }

    #[test]
    fn test_create_item() {
        let ledger = create_test_ledger();
        let entry = create_test_entry("http://x/a.mp3");

        let item = ledger.create(&entry, 1).unwrap();

        assert!(item.id > 0);
        assert_eq!(item.status, 1);
        assert_eq!(item.url, "http://x/a.mp3");
        assert_eq!(item.filename, "g1.mp3");
        assert_eq!(item.length, 1024);
        assert_eq!(item.media_type, "audio/mpeg");
        assert!(item.payload.is_empty());
        assert_eq!(item.first_seen_at, item.updated_at);
        assert!(item.pub_date.is_some());
    }

    #[test]
    fn test_create_then_find() {
        let ledger = create_test_ledger();
        let created = ledger
            .create(&create_test_entry("http://x/a.mp3"), 1)
            .unwrap();

        let found = ledger.find("http://x/a.mp3").unwrap().unwrap();
        assert_eq!(found.id, created.id);
        assert_eq!(found.guid, "g1");
        assert_eq!(found.title, "Morning show");
        assert_eq!(found.pub_date, created.pub_date);
    }

    #[test]
    fn test_create_with_bad_pub_date_stores_null() {
        let ledger = create_test_ledger();
        let mut entry = create_test_entry("http://x/a.mp3");
        entry.pub_date = "sometime".to_string();

        ledger.create(&entry, 1).unwrap();
        let found = ledger.find("http://x/a.mp3").unwrap().unwrap();
        assert!(found.pub_date.is_none());
    }

    #[test]
    fn test_create_duplicate_address_reports_collision() {
        let ledger = create_test_ledger();
        let entry = create_test_entry("http://x/a.mp3");
        ledger.create(&entry, 1).unwrap();

        let err = ledger.create(&entry, 1).unwrap_err();
        assert!(matches!(err, LedgerError::AlreadyExists(addr) if addr == "http://x/a.mp3"));
    }

    #[test]
    fn test_update_payload_and_status() {
        let ledger = create_test_ledger();
        ledger
            .create(&create_test_entry("http://x/a.mp3"), 1)
            .unwrap();

        let outcome = ledger
            .update_payload_and_status("http://x/a.mp3", r#"{"status":"processing"}"#, 3)
            .unwrap();
        assert_eq!(outcome, UpdateOutcome::Updated);

        let item = ledger.find("http://x/a.mp3").unwrap().unwrap();
        assert_eq!(item.status, 3);
        assert_eq!(item.payload, r#"{"status":"processing"}"#);
        assert!(item.updated_at >= item.first_seen_at);
    }

    #[test]
    fn test_update_unchanged_is_not_an_error() {
        let ledger = create_test_ledger();
        ledger
            .create(&create_test_entry("http://x/a.mp3"), 1)
            .unwrap();
        ledger
            .update_payload_and_status("http://x/a.mp3", "{}", 3)
            .unwrap();
        let before = ledger.find("http://x/a.mp3").unwrap().unwrap();

        let outcome = ledger
            .update_payload_and_status("http://x/a.mp3", "{}", 3)
            .unwrap();

        assert_eq!(outcome, UpdateOutcome::Unchanged);
        let after = ledger.find("http://x/a.mp3").unwrap().unwrap();
        assert_eq!(after.updated_at, before.updated_at);
    }

    #[test]
    fn test_update_missing_address() {
        let ledger = create_test_ledger();
        let err = ledger
            .update_payload_and_status("http://x/missing.mp3", "{}", 3)
            .unwrap_err();
        assert!(matches!(err, LedgerError::NotFound(_)));
    }

    #[test]
    fn test_ledger_persists_across_reopen() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("items.db");

        {
            let ledger = SqliteItemLedger::new(&path).unwrap();
            ledger
                .create(&create_test_entry("http://x/a.mp3"), 1)
                .unwrap();
        }

        let ledger = SqliteItemLedger::new(&path).unwrap();
        assert!(ledger.find("http://x/a.mp3").unwrap().is_some());
    }
}
