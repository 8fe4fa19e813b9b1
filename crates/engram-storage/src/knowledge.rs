// SPDX-FileCopyrightText: 2026 Engram Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Curated knowledge entry store.

use tokio_rusqlite::Connection;

use engram_core::types::{blob_to_vec, vec_to_blob};
use engram_core::{EngramError, KnowledgeEntry};

use crate::storage_err;

/// Fields of a knowledge entry that can change after insert. `None`
/// leaves the stored value untouched.
#[derive(Debug, Default, Clone)]
pub struct KnowledgeUpdate {
    pub content: Option<String>,
    pub keywords: Option<Vec<String>>,
    pub category: Option<String>,
    pub notes: Option<Option<String>>,
    /// Required whenever `content` changes.
    pub embedding: Option<Vec<f32>>,
}

/// Persistent store for knowledge entries.
pub struct KnowledgeStore {
    conn: Connection,
    dimensions: usize,
}

impl KnowledgeStore {
    pub fn new(conn: Connection, dimensions: usize) -> Self {
        Self { conn, dimensions }
    }

    fn check_dimensions(&self, embedding: &[f32]) -> Result<(), EngramError> {
        if embedding.len() != self.dimensions {
            return Err(EngramError::Embedding {
                message: format!(
                    "expected {}-dim embedding, got {}",
                    self.dimensions,
                    embedding.len()
                ),
                source: None,
            });
        }
        Ok(())
    }

    /// Insert an entry and return its row id.
    pub async fn insert(&self, entry: &KnowledgeEntry) -> Result<i64, EngramError> {
        self.check_dimensions(&entry.embedding)?;

        let category = entry.category.clone();
        let keywords = serde_json::to_string(&entry.keywords)
            .map_err(|e| EngramError::Internal(format!("keywords encode: {e}")))?;
        let content = entry.content.clone();
        let embedding_blob = vec_to_blob(&entry.embedding);
        let notes = entry.notes.clone();
        let created_at = entry.created_at;
        let updated_at = entry.updated_at;

        self.conn
            .call(move |conn| {
                conn.execute(
                    "INSERT INTO knowledge (category, keywords, content, embedding, notes, created_at, updated_at) \
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                    rusqlite::params![
                        category,
                        keywords,
                        content,
                        embedding_blob,
                        notes,
                        created_at,
                        updated_at
                    ],
                )?;
                Ok(conn.last_insert_rowid())
            })
            .await
            .map_err(storage_err)
    }

    /// Apply an update. Returns false if the entry does not exist.
    /// `updated_at` is refreshed whenever anything changes.
    pub async fn update(
        &self,
        id: i64,
        update: KnowledgeUpdate,
        now: f64,
    ) -> Result<bool, EngramError> {
        if let Some(embedding) = &update.embedding {
            self.check_dimensions(embedding)?;
        }
        let keywords_json = match &update.keywords {
            Some(keywords) => Some(
                serde_json::to_string(keywords)
                    .map_err(|e| EngramError::Internal(format!("keywords encode: {e}")))?,
            ),
            None => None,
        };
        let embedding_blob = update.embedding.as_deref().map(vec_to_blob);
        let content = update.content;
        let category = update.category;
        let notes = update.notes;

        self.conn
            .call(move |conn| {
                let mut sets = vec!["updated_at = ?1".to_string()];
                let mut params: Vec<Box<dyn rusqlite::types::ToSql>> = vec![Box::new(now)];

                if let Some(content) = content {
                    params.push(Box::new(content));
                    sets.push(format!("content = ?{}", params.len()));
                }
                if let Some(keywords) = keywords_json {
                    params.push(Box::new(keywords));
                    sets.push(format!("keywords = ?{}", params.len()));
                }
                if let Some(category) = category {
                    params.push(Box::new(category));
                    sets.push(format!("category = ?{}", params.len()));
                }
                if let Some(notes) = notes {
                    params.push(Box::new(notes));
                    sets.push(format!("notes = ?{}", params.len()));
                }
                if let Some(blob) = embedding_blob {
                    params.push(Box::new(blob));
                    sets.push(format!("embedding = ?{}", params.len()));
                }

                params.push(Box::new(id));
                let sql = format!(
                    "UPDATE knowledge SET {} WHERE id = ?{}",
                    sets.join(", "),
                    params.len()
                );
                let param_refs: Vec<&dyn rusqlite::types::ToSql> =
                    params.iter().map(|p| p.as_ref()).collect();
                let changed = conn.execute(&sql, param_refs.as_slice())?;
                Ok(changed > 0)
            })
            .await
            .map_err(storage_err)
    }

    /// Delete an entry. Returns whether a row was removed.
    pub async fn delete(&self, id: i64) -> Result<bool, EngramError> {
        self.conn
            .call(move |conn| {
                let changed =
                    conn.execute("DELETE FROM knowledge WHERE id = ?1", rusqlite::params![id])?;
                Ok(changed > 0)
            })
            .await
            .map_err(storage_err)
    }

    /// All entries, most recently updated first.
    pub async fn get_all(&self) -> Result<Vec<KnowledgeEntry>, EngramError> {
        self.conn
            .call(move |conn| {
                let sql = format!("SELECT {COLUMNS} FROM knowledge ORDER BY updated_at DESC");
                let mut stmt = conn.prepare(&sql)?;
                let rows = stmt
                    .query_map([], row_to_entry)?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(rows)
            })
            .await
            .map_err(storage_err)
    }

    /// Batch retrieval after search. Missing ids are skipped.
    pub async fn get_by_ids(&self, ids: &[i64]) -> Result<Vec<KnowledgeEntry>, EngramError> {
        if ids.is_empty() {
            return Ok(vec![]);
        }
        let ids = ids.to_vec();
        self.conn
            .call(move |conn| {
                let placeholders: Vec<String> = (1..=ids.len()).map(|i| format!("?{i}")).collect();
                let sql = format!(
                    "SELECT {COLUMNS} FROM knowledge WHERE id IN ({})",
                    placeholders.join(", ")
                );
                let mut stmt = conn.prepare(&sql)?;
                let params: Vec<&dyn rusqlite::types::ToSql> = ids
                    .iter()
                    .map(|id| id as &dyn rusqlite::types::ToSql)
                    .collect();
                let rows = stmt
                    .query_map(params.as_slice(), row_to_entry)?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(rows)
            })
            .await
            .map_err(storage_err)
    }

    /// Get one entry by id.
    pub async fn get(&self, id: i64) -> Result<Option<KnowledgeEntry>, EngramError> {
        Ok(self.get_by_ids(&[id]).await?.into_iter().next())
    }

    /// All entry embeddings as (id, vector) pairs for vector search.
    pub async fn embeddings(&self) -> Result<Vec<(i64, Vec<f32>)>, EngramError> {
        self.conn
            .call(move |conn| {
                let mut stmt = conn.prepare("SELECT id, embedding FROM knowledge")?;
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
}

const COLUMNS: &str = "id, category, keywords, content, embedding, notes, created_at, updated_at";

/// Convert a rusqlite Row to a KnowledgeEntry.
fn row_to_entry(row: &rusqlite::Row) -> Result<KnowledgeEntry, rusqlite::Error> {
    let keywords_json: String = row.get(2)?;
    let embedding_blob: Vec<u8> = row.get(4)?;
    Ok(KnowledgeEntry {
        id: row.get(0)?,
        category: row.get(1)?,
        keywords: serde_json::from_str(&keywords_json).unwrap_or_default(),
        content: row.get(3)?,
        embedding: blob_to_vec(&embedding_blob),
        notes: row.get(5)?,
        created_at: row.get(6)?,
        updated_at: row.get(7)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::open_in_memory;

    fn make_entry(content: &str, keywords: &[&str], at: f64) -> KnowledgeEntry {
        KnowledgeEntry {
            id: 0,
            category: "general".to_string(),
            keywords: keywords.iter().map(|k| k.to_string()).collect(),
            content: content.to_string(),
            embedding: vec![0.2; 4],
            notes: None,
            created_at: at,
            updated_at: at,
        }
    }

    async fn store() -> KnowledgeStore {
        KnowledgeStore::new(open_in_memory().await.unwrap(), 4)
    }

    #[tokio::test]
    async fn insert_and_get_roundtrip() {
        let store = store().await;
        let id = store
            .insert(&make_entry("pudding is a dessert", &["pudding", "dessert"], 100.0))
            .await
            .unwrap();

        let fetched = store.get(id).await.unwrap().unwrap();
        assert_eq!(fetched.content, "pudding is a dessert");
        assert_eq!(fetched.keywords, vec!["pudding", "dessert"]);
        assert_eq!(fetched.category, "general");
        assert!(fetched.notes.is_none());
    }

    #[tokio::test]
    async fn insert_rejects_wrong_dimension() {
        let store = store().await;
        let mut entry = make_entry("bad", &["bad"], 100.0);
        entry.embedding = vec![0.2; 8];
        assert!(matches!(
            store.insert(&entry).await.unwrap_err(),
            EngramError::Embedding { .. }
        ));
    }

    #[tokio::test]
    async fn update_refreshes_updated_at() {
        let store = store().await;
        let id = store.insert(&make_entry("original", &["orig"], 100.0)).await.unwrap();

        let update = KnowledgeUpdate {
            content: Some("revised".to_string()),
            embedding: Some(vec![0.3; 4]),
            ..Default::default()
        };
        assert!(store.update(id, update, 200.0).await.unwrap());

        let fetched = store.get(id).await.unwrap().unwrap();
        assert_eq!(fetched.content, "revised");
        assert_eq!(fetched.updated_at, 200.0);
        assert_eq!(fetched.created_at, 100.0);
        assert_eq!(fetched.keywords, vec!["orig"], "untouched fields survive");
    }

    #[tokio::test]
    async fn update_missing_entry_returns_false() {
        let store = store().await;
        let update = KnowledgeUpdate {
            category: Some("moved".to_string()),
            ..Default::default()
        };
        assert!(!store.update(404, update, 200.0).await.unwrap());
    }

    #[tokio::test]
    async fn update_can_clear_notes() {
        let store = store().await;
        let mut entry = make_entry("with notes", &["notes"], 100.0);
        entry.notes = Some("temporary".to_string());
        let id = store.insert(&entry).await.unwrap();

        let update = KnowledgeUpdate {
            notes: Some(None),
            ..Default::default()
        };
        assert!(store.update(id, update, 150.0).await.unwrap());
        assert!(store.get(id).await.unwrap().unwrap().notes.is_none());
    }

    #[tokio::test]
    async fn delete_and_get_all() {
        let store = store().await;
        let id1 = store.insert(&make_entry("first", &["a"], 100.0)).await.unwrap();
        store.insert(&make_entry("second", &["b"], 200.0)).await.unwrap();

        assert!(store.delete(id1).await.unwrap());
        assert!(!store.delete(id1).await.unwrap());

        let all = store.get_all().await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].content, "second");
    }

    #[tokio::test]
    async fn embeddings_lists_all_rows() {
        let store = store().await;
        store.insert(&make_entry("one", &["a"], 100.0)).await.unwrap();
        store.insert(&make_entry("two", &["b"], 200.0)).await.unwrap();

        let embeddings = store.embeddings().await.unwrap();
        assert_eq!(embeddings.len(), 2);
        assert!(embeddings.iter().all(|(_, v)| v.len() == 4));
    }
}
