//! SQLite-backed record of detected smiles.

use rusqlite::{params, Connection};
use serde::Serialize;
use smilecam_core::Region;
use std::path::Path;
use std::sync::Mutex;
use thiserror::Error;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS smiles (
    id        INTEGER PRIMARY KEY AUTOINCREMENT,
    timestamp TEXT UNIQUE,
    filename  TEXT UNIQUE,
    x         INTEGER,
    y         INTEGER,
    w         INTEGER,
    h         INTEGER
);
";

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

/// A stored detection as listed to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SmileRecord {
    pub timestamp: String,
    pub filename: String,
}

pub struct EventStore {
    conn: Mutex<Connection>,
}

impl EventStore {
    /// Delete any existing database at `path` and create an empty one.
    ///
    /// All previously recorded events are lost. Saved image files are not
    /// touched.
    pub fn initialize(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        match std::fs::remove_file(path) {
            Ok(()) => tracing::info!(path = %path.display(), "removed previous smile database"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }

        let conn = Connection::open(path)?;
        conn.execute_batch(SCHEMA)?;
        tracing::info!(path = %path.display(), "smile database initialized");

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Insert one detection event and return its row id.
    pub fn record(
        &self,
        timestamp: &str,
        filename: &str,
        region: &Region,
    ) -> Result<i64, StoreError> {
        let conn = self.conn.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        conn.execute(
            "INSERT INTO smiles (timestamp, filename, x, y, w, h) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                timestamp,
                filename,
                region.x,
                region.y,
                region.width,
                region.height
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// All events, most recent first.
    pub fn list(&self) -> Result<Vec<SmileRecord>, StoreError> {
        let conn = self.conn.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let mut stmt = conn.prepare("SELECT timestamp, filename FROM smiles ORDER BY id DESC")?;
        let rows = stmt
            .query_map([], |row| {
                Ok(SmileRecord {
                    timestamp: row.get(0)?,
                    filename: row.get(1)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn count(&self) -> Result<u64, StoreError> {
        let conn = self.conn.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let n: i64 = conn.query_row("SELECT COUNT(*) FROM smiles", [], |row| row.get(0))?;
        Ok(n as u64)
    }
}
