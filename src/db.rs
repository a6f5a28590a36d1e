use crate::store::{KeyValueStore, StoreError};
use rusqlite::{Connection, OptionalExtension};
use std::path::Path;

pub const DB_FILE_NAME: &str = "activity.sqlite3";

pub fn open_db(workspace: &Path) -> anyhow::Result<Connection> {
    std::fs::create_dir_all(workspace)?;
    let db_path = workspace.join(DB_FILE_NAME);
    let conn = Connection::open(db_path)?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS kv_store(
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL,
            updated_at TEXT
        )",
        [],
    )?;

    Ok(conn)
}

pub fn settings_get_json(
    kv: &impl KeyValueStore,
    key: &str,
) -> Result<Option<serde_json::Value>, StoreError> {
    let Some(raw) = kv.get(key)? else {
        return Ok(None);
    };
    // A value that no longer parses reads as unset.
    Ok(serde_json::from_str(&raw).ok())
}

pub fn settings_set_json(
    kv: &impl KeyValueStore,
    key: &str,
    value: &serde_json::Value,
) -> Result<(), StoreError> {
    kv.set(key, &serde_json::to_string(value)?)
}

/// Workspace-database backend for the student store and setup sections.
pub struct SqliteKv {
    conn: Connection,
}

impl SqliteKv {
    pub fn new(conn: Connection) -> Self {
        SqliteKv { conn }
    }

    pub fn open(workspace: &Path) -> anyhow::Result<Self> {
        Ok(SqliteKv::new(open_db(workspace)?))
    }
}

fn backend_err(e: rusqlite::Error) -> StoreError {
    StoreError::Backend(e.to_string())
}

impl KeyValueStore for SqliteKv {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        self.conn
            .query_row("SELECT value FROM kv_store WHERE key = ?", [key], |r| {
                r.get::<_, String>(0)
            })
            .optional()
            .map_err(backend_err)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let now = chrono::Utc::now().to_rfc3339();
        self.conn
            .execute(
                "INSERT INTO kv_store(key, value, updated_at) VALUES(?, ?, ?)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
                (key, value, now),
            )
            .map(|_| ())
            .map_err(|e| StoreError::WriteFailed(e.to_string()))
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.conn
            .execute("DELETE FROM kv_store WHERE key = ?", [key])
            .map(|_| ())
            .map_err(backend_err)
    }
}
