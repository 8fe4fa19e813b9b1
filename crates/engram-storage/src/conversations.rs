// SPDX-FileCopyrightText: 2026 Engram Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Conversation summary store.
//!
//! Holds the durable output of the summarizer. The forgetting engine and
//! the retriever both mutate `importance_current` through methods here,
//! never directly.

use tokio_rusqlite::Connection;

use engram_core::types::{blob_to_vec, vec_to_blob};
use engram_core::{ConversationSummary, EngramError};

use crate::storage_err;

/// Ceiling for `importance_current`.
const IMPORTANCE_MAX: f64 = 5.0;

/// Persistent store for conversation summaries.
pub struct ConversationStore {
    conn: Connection,
    dimensions: usize,
}

impl ConversationStore {
    /// Wrap an existing connection. `dimensions` is the embedding length
    /// every inserted summary must carry.
    pub fn new(conn: Connection, dimensions: usize) -> Self {
        Self { conn, dimensions }
    }

    /// Insert a summary and return its row id.
    pub async fn insert(&self, summary: &ConversationSummary) -> Result<i64, EngramError> {
        if summary.embedding.len() != self.dimensions {
            return Err(EngramError::Embedding {
                message: format!(
                    "expected {}-dim embedding, got {}",
                    self.dimensions,
                    summary.embedding.len()
                ),
                source: None,
            });
        }

        let group_id = summary.group_id.clone();
        let summary_text = summary.summary_text.clone();
        let embedding_blob = vec_to_blob(&summary.embedding);
        let participants = serde_json::to_string(&summary.participants)
            .map_err(|e| EngramError::Internal(format!("participants encode: {e}")))?;
        let start_time = summary.start_time;
        let end_time = summary.end_time;
        let importance_initial = summary.importance_initial;
        let importance_current = summary.importance_current.clamp(0.0, IMPORTANCE_MAX);
        let last_accessed = summary.last_accessed;
        let is_fuzzy = summary.is_fuzzy;
        let created_at = summary.created_at;

        self.conn
            .call(move |conn| {
                conn.execute(
                    "INSERT INTO conversations (group_id, summary_text, embedding, participants, start_time, end_time, importance_initial, importance_current, last_accessed, is_fuzzy, created_at) \
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
                    rusqlite::params![
                        group_id,
                        summary_text,
                        embedding_blob,
                        participants,
                        start_time,
                        end_time,
                        importance_initial,
                        importance_current,
                        last_accessed,
                        is_fuzzy,
                        created_at
                    ],
                )?;
                Ok(conn.last_insert_rowid())
            })
            .await
            .map_err(storage_err)
    }

    /// All summary embeddings as (id, vector) pairs for vector search.
    pub async fn embeddings(&self) -> Result<Vec<(i64, Vec<f32>)>, EngramError> {
        self.conn
            .call(move |conn| {
                let mut stmt = conn.prepare("SELECT id, embedding FROM conversations")?;
                let results = stmt
                    .query_map([], |row| {
                        let id: i64 = row.get(0)?;
                        let blob: Vec<u8> = row.get(1)?;
                        Ok((id, blob_to_vec(&blob)))
                    })?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(results)
            })
            .await
            .map_err(storage_err)
    }

    /// Batch retrieval after vector search. Missing ids are skipped.
    pub async fn get_by_ids(&self, ids: &[i64]) -> Result<Vec<ConversationSummary>, EngramError> {
        if ids.is_empty() {
            return Ok(vec![]);
        }
        let ids = ids.to_vec();
        self.conn
            .call(move |conn| {
                let placeholders: Vec<String> = (1..=ids.len()).map(|i| format!("?{i}")).collect();
                let sql = format!(
                    "SELECT {COLUMNS} FROM conversations WHERE id IN ({})",
                    placeholders.join(", ")
                );
                let mut stmt = conn.prepare(&sql)?;
                let params: Vec<&dyn rusqlite::types::ToSql> = ids
                    .iter()
                    .map(|id| id as &dyn rusqlite::types::ToSql)
                    .collect();
                let rows = stmt
                    .query_map(params.as_slice(), row_to_summary)?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(rows)
            })
            .await
            .map_err(storage_err)
    }

    /// Get one summary by id.
    pub async fn get(&self, id: i64) -> Result<Option<ConversationSummary>, EngramError> {
        Ok(self.get_by_ids(&[id]).await?.into_iter().next())
    }

    /// The `limit` most recent summaries for a group, newest first.
    /// Used as context for the next summarization prompt.
    pub async fn recent_for_group(
        &self,
        group_id: &str,
        limit: usize,
    ) -> Result<Vec<ConversationSummary>, EngramError> {
        let group_id = group_id.to_string();
        self.conn
            .call(move |conn| {
                let sql = format!(
                    "SELECT {COLUMNS} FROM conversations WHERE group_id = ?1 ORDER BY created_at DESC LIMIT ?2"
                );
                let mut stmt = conn.prepare(&sql)?;
                let rows = stmt
                    .query_map(rusqlite::params![group_id, limit as i64], row_to_summary)?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(rows)
            })
            .await
            .map_err(storage_err)
    }

    /// Touch retrieved summaries: stamp `last_accessed` and multiply
    /// `importance_current` by `boost`, clamped to the ceiling.
    pub async fn touch(&self, ids: &[i64], boost: f64, now: f64) -> Result<(), EngramError> {
        if ids.is_empty() {
            return Ok(());
        }
        let ids = ids.to_vec();
        self.conn
            .call(move |conn| {
                let tx = conn.transaction()?;
                for id in &ids {
                    tx.execute(
                        "UPDATE conversations SET last_accessed = ?1, \
                         importance_current = min(?2, importance_current * ?3) WHERE id = ?4",
                        rusqlite::params![now, IMPORTANCE_MAX, boost, id],
                    )?;
                }
                tx.commit()?;
                Ok(())
            })
            .await
            .map_err(storage_err)
    }

    /// Summaries eligible for decay: created at or before `max_created_at`
    /// and not accessed since `pass_start`.
    pub async fn decay_candidates(
        &self,
        max_created_at: f64,
        pass_start: f64,
    ) -> Result<Vec<ConversationSummary>, EngramError> {
        self.conn
            .call(move |conn| {
                let sql = format!(
                    "SELECT {COLUMNS} FROM conversations \
                     WHERE created_at <= ?1 AND last_accessed < ?2 ORDER BY id"
                );
                let mut stmt = conn.prepare(&sql)?;
                let rows = stmt
                    .query_map(rusqlite::params![max_created_at, pass_start], row_to_summary)?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(rows)
            })
            .await
            .map_err(storage_err)
    }

    /// Overwrite `importance_current` (clamped to [0, 5]).
    pub async fn set_importance(&self, id: i64, importance: f64) -> Result<(), EngramError> {
        let importance = importance.clamp(0.0, IMPORTANCE_MAX);
        self.conn
            .call(move |conn| {
                conn.execute(
                    "UPDATE conversations SET importance_current = ?1 WHERE id = ?2",
                    rusqlite::params![importance, id],
                )?;
                Ok(())
            })
            .await
            .map_err(storage_err)
    }

    /// Replace the summary text with a compressed gist, mark the row
    /// fuzzy, and reset `importance_current`.
    pub async fn fuzzify(
        &self,
        id: i64,
        gist: &str,
        reset_importance: f64,
    ) -> Result<(), EngramError> {
        let gist = gist.to_string();
        let reset_importance = reset_importance.clamp(0.0, IMPORTANCE_MAX);
        self.conn
            .call(move |conn| {
                conn.execute(
                    "UPDATE conversations SET summary_text = ?1, is_fuzzy = 1, \
                     importance_current = ?2 WHERE id = ?3",
                    rusqlite::params![gist, reset_importance, id],
                )?;
                Ok(())
            })
            .await
            .map_err(storage_err)
    }

    /// Delete a summary permanently. Returns whether a row was removed.
    pub async fn delete(&self, id: i64) -> Result<bool, EngramError> {
        self.conn
            .call(move |conn| {
                let changed =
                    conn.execute("DELETE FROM conversations WHERE id = ?1", rusqlite::params![id])?;
                Ok(changed > 0)
            })
            .await
            .map_err(storage_err)
    }

    /// Total number of stored summaries.
    pub async fn count(&self) -> Result<i64, EngramError> {
        self.conn
            .call(|conn| {
                let count =
                    conn.query_row("SELECT COUNT(*) FROM conversations", [], |row| row.get(0))?;
                Ok(count)
            })
            .await
            .map_err(storage_err)
    }
}

const COLUMNS: &str = "id, group_id, summary_text, embedding, participants, start_time, end_time, importance_initial, importance_current, last_accessed, is_fuzzy, created_at";

/// Convert a rusqlite Row to a ConversationSummary.
fn row_to_summary(row: &rusqlite::Row) -> Result<ConversationSummary, rusqlite::Error> {
    let embedding_blob: Vec<u8> = row.get(3)?;
    let participants_json: String = row.get(4)?;
    Ok(ConversationSummary {
        id: row.get(0)?,
        group_id: row.get(1)?,
        summary_text: row.get(2)?,
        embedding: blob_to_vec(&embedding_blob),
        participants: serde_json::from_str(&participants_json).unwrap_or_default(),
        start_time: row.get(5)?,
        end_time: row.get(6)?,
        importance_initial: row.get(7)?,
        importance_current: row.get(8)?,
        last_accessed: row.get(9)?,
        is_fuzzy: row.get(10)?,
        created_at: row.get(11)?,
    })
}
