use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use rusqlite::{params, Connection};
use serde::Serialize;
use tracing::info;

/// One persisted chat line.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub id: i64,
    /// "user" or "model".
    pub role: String,
    pub text: String,
    pub created_at: String,
}

/// SQLite store for the assistant transcript.
/// All operations are synchronous (rusqlite is blocking).
/// Callers in async contexts should use `tokio::task::spawn_blocking`.
pub struct ChatHistory {
    conn: Mutex<Connection>,
}

impl ChatHistory {
    /// Create or open the transcript database at `db_path`.
    pub fn new(db_path: &Path) -> Result<Self, String> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| format!("Failed to create data dir: {}", e))?;
        }
        let conn = Connection::open(db_path)
            .map_err(|e| format!("Failed to open chat history db: {}", e))?;
        let history = Self::with_connection(conn)?;
        info!("Opened chat history database at {:?}", db_path);
        Ok(history)
    }

    pub fn open_in_memory() -> Result<Self, String> {
        let conn = Connection::open_in_memory()
            .map_err(|e| format!("Failed to open chat history db: {}", e))?;
        Self::with_connection(conn)
    }

    fn with_connection(conn: Connection) -> Result<Self, String> {
        conn.execute(
            "CREATE TABLE IF NOT EXISTS chat_messages (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                role TEXT NOT NULL,
                text TEXT NOT NULL,
                created_at TEXT NOT NULL DEFAULT (datetime('now'))
            )",
            [],
        )
        .map_err(|e| format!("Failed to create table: {}", e))?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, String> {
        self.conn
            .lock()
            .map_err(|e| format!("Chat history lock poisoned: {}", e))
    }

    /// Append a line. Returns its id.
    pub fn append(&self, role: &str, text: &str) -> Result<i64, String> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO chat_messages (role, text) VALUES (?1, ?2)",
            params![role, text],
        )
        .map_err(|e| format!("Failed to insert message: {}", e))?;
        Ok(conn.last_insert_rowid())
    }

    /// The last `limit` lines, oldest first.
    pub fn recent(&self, limit: usize) -> Result<Vec<HistoryEntry>, String> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(
                "SELECT id, role, text, created_at FROM chat_messages
             ORDER BY id DESC LIMIT ?1",
            )
            .map_err(|e| format!("Failed to prepare query: {}", e))?;

        let rows = stmt
            .query_map(params![limit as i64], |row| {
                Ok(HistoryEntry {
                    id: row.get(0)?,
                    role: row.get(1)?,
                    text: row.get(2)?,
                    created_at: row.get(3)?,
                })
            })
            .map_err(|e| format!("Failed to query messages: {}", e))?;

        let mut entries = rows
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| format!("Failed to collect messages: {}", e))?;
        entries.reverse();
        Ok(entries)
    }

    /// Drop the whole transcript. Returns how many lines were removed.
    pub fn clear(&self) -> Result<usize, String> {
        let removed = self
            .conn()?
            .execute("DELETE FROM chat_messages", [])
            .map_err(|e| format!("Failed to clear history: {}", e))?;
        info!("Cleared {} chat history entries", removed);
        Ok(removed)
    }
}
