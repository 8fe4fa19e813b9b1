// SPDX-FileCopyrightText: 2026 Engram Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Database open and schema initialization.

use std::path::Path;

use tokio_rusqlite::Connection;
use tracing::info;

use engram_core::EngramError;

use crate::storage_err;

/// Open (or create) the database at `path` and apply the schema.
pub async fn open_database(path: &str, wal_mode: bool) -> Result<Connection, EngramError> {
    if let Some(parent) = Path::new(path).parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent).map_err(EngramError::storage)?;
    }

    let conn = Connection::open(path).await.map_err(storage_err)?;
    init(&conn, wal_mode).await?;
    info!(%path, wal_mode, "opened engram database");
    Ok(conn)
}

/// Open an in-memory database with the schema applied. Test helper.
pub async fn open_in_memory() -> Result<Connection, EngramError> {
    let conn = Connection::open_in_memory().await.map_err(storage_err)?;
    init(&conn, false).await?;
    Ok(conn)
}

async fn init(conn: &Connection, wal_mode: bool) -> Result<(), EngramError> {
    conn.call(move |conn| {
        if wal_mode {
            // journal_mode returns the resulting mode as a row.
            conn.query_row("PRAGMA journal_mode = WAL", [], |_| Ok(()))?;
        }
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        conn.execute_batch(SCHEMA)?;
        Ok(())
    })
    .await
    .map_err(storage_err)
}

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS conversations (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    group_id TEXT NOT NULL,
    summary_text TEXT NOT NULL,
    embedding BLOB NOT NULL,
    participants TEXT NOT NULL DEFAULT '[]',
    start_time REAL NOT NULL,
    end_time REAL NOT NULL,
    importance_initial INTEGER NOT NULL,
    importance_current REAL NOT NULL,
    last_accessed REAL NOT NULL,
    is_fuzzy INTEGER NOT NULL DEFAULT 0,
    created_at REAL NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_conversations_group ON conversations(group_id);
CREATE INDEX IF NOT EXISTS idx_conversations_created ON conversations(created_at);
CREATE INDEX IF NOT EXISTS idx_conversations_importance ON conversations(importance_current);

CREATE TABLE IF NOT EXISTS knowledge (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    category TEXT NOT NULL,
    keywords TEXT NOT NULL DEFAULT '[]',
    content TEXT NOT NULL,
    embedding BLOB NOT NULL,
    notes TEXT,
    created_at REAL NOT NULL,
    updated_at REAL NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_knowledge_category ON knowledge(category);
CREATE INDEX IF NOT EXISTS idx_knowledge_updated ON knowledge(updated_at);

CREATE TABLE IF NOT EXISTS entities (
    user_id TEXT NOT NULL,
    group_id TEXT NOT NULL,
    key TEXT NOT NULL,
    value TEXT NOT NULL,
    category TEXT NOT NULL,
    importance INTEGER NOT NULL DEFAULT 3,
    updated_at REAL NOT NULL,
    PRIMARY KEY (user_id, group_id, key)
);
";

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn in_memory_schema_applies() {
        let conn = open_in_memory().await.unwrap();
        let tables: Vec<String> = conn
            .call(|conn| {
                let mut stmt = conn.prepare(
                    "SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name",
                )?;
                let names = stmt
                    .query_map([], |row| row.get(0))?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(names)
            })
            .await
            .unwrap();
        assert!(tables.contains(&"conversations".to_string()));
        assert!(tables.contains(&"knowledge".to_string()));
        assert!(tables.contains(&"entities".to_string()));
    }

    #[tokio::test]
    async fn open_database_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/engram.db");
        let conn = open_database(path.to_str().unwrap(), true).await.unwrap();
        drop(conn);
        assert!(path.exists());
    }

    #[tokio::test]
    async fn reopen_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("engram.db");
        let path_str = path.to_str().unwrap();
        drop(open_database(path_str, false).await.unwrap());
        // Second open re-applies CREATE IF NOT EXISTS without error.
        drop(open_database(path_str, false).await.unwrap());
    }
}
