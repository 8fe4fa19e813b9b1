// SPDX-FileCopyrightText: 2026 Engram Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Entity record store.
//!
//! Entities are attributes the summarizer extracts about users, keyed by
//! (user, group, attribute name). Re-extraction overwrites the value.

use tokio_rusqlite::Connection;

use engram_core::{EngramError, EntityRecord};

use crate::storage_err;

/// Persistent store for extracted entities.
pub struct EntityStore {
    conn: Connection,
}

impl EntityStore {
    pub fn new(conn: Connection) -> Self {
        Self { conn }
    }

    /// Insert or overwrite the record for (user_id, group_id, key).
    pub async fn upsert(&self, record: &EntityRecord, now: f64) -> Result<(), EngramError> {
        let user_id = record.user_id.clone();
        let group_id = record.group_id.clone();
        let key = record.key.clone();
        let value = record.value.clone();
        let category = record.category.clone();
        let importance = record.importance.clamp(1, 5);

        self.conn
            .call(move |conn| {
                conn.execute(
                    "INSERT INTO entities (user_id, group_id, key, value, category, importance, updated_at) \
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7) \
                     ON CONFLICT(user_id, group_id, key) DO UPDATE SET \
                     value = excluded.value, category = excluded.category, \
                     importance = excluded.importance, updated_at = excluded.updated_at",
                    rusqlite::params![user_id, group_id, key, value, category, importance, now],
                )?;
                Ok(())
            })
            .await
            .map_err(storage_err)
    }

    /// All records for a user in a group, most important first.
    pub async fn list(
        &self,
        user_id: &str,
        group_id: &str,
    ) -> Result<Vec<EntityRecord>, EngramError> {
        let user_id = user_id.to_string();
        let group_id = group_id.to_string();
        self.conn
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT user_id, group_id, key, value, category, importance FROM entities \
                     WHERE user_id = ?1 AND group_id = ?2 ORDER BY importance DESC, key",
                )?;
                let rows = stmt
                    .query_map(rusqlite::params![user_id, group_id], |row| {
                        Ok(EntityRecord {
                            user_id: row.get(0)?,
                            group_id: row.get(1)?,
                            key: row.get(2)?,
                            value: row.get(3)?,
                            category: row.get(4)?,
                            importance: row.get(5)?,
                        })
                    })?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(rows)
            })
            .await
            .map_err(storage_err)
    }
}
