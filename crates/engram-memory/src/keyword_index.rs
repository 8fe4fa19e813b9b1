// SPDX-FileCopyrightText: 2026 Engram Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-memory keyword index over knowledge entries.
//!
//! Rebuilt from the store whenever an entry changes. Matching is
//! case-insensitive substring containment: an entry matches when the
//! query contains one of its keywords.

use std::collections::HashMap;
use std::sync::RwLock;

use engram_core::KnowledgeEntry;

#[derive(Default)]
struct IndexState {
    /// Lowercased keyword to the ids of entries carrying it.
    keywords: HashMap<String, Vec<i64>>,
    /// Entry id to its updated_at, for tie-breaking.
    updated: HashMap<i64, f64>,
}

/// Keyword lookup layer for hybrid retrieval.
#[derive(Default)]
pub struct KeywordIndex {
    state: RwLock<IndexState>,
}

impl KeywordIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the index contents with the given entries.
    pub fn rebuild(&self, entries: &[KnowledgeEntry]) {
        let mut state = IndexState::default();
        for entry in entries {
            state.updated.insert(entry.id, entry.updated_at);
            for keyword in &entry.keywords {
                let keyword = keyword.trim().to_lowercase();
                if keyword.is_empty() {
                    continue;
                }
                let ids = state.keywords.entry(keyword).or_default();
                if !ids.contains(&entry.id) {
                    ids.push(entry.id);
                }
            }
        }
        *self.state.write().expect("keyword index poisoned") = state;
    }

    /// Entry ids whose keywords appear in the query, as (id, match count)
    /// pairs ordered by match count, then recency of update.
    pub fn matches(&self, query: &str) -> Vec<(i64, usize)> {
        let query = query.to_lowercase();
        let state = self.state.read().expect("keyword index poisoned");

        let mut counts: HashMap<i64, usize> = HashMap::new();
        for (keyword, ids) in &state.keywords {
            if query.contains(keyword.as_str()) {
                for id in ids {
                    *counts.entry(*id).or_default() += 1;
                }
            }
        }

        let mut ranked: Vec<(i64, usize)> = counts.into_iter().collect();
        ranked.sort_by(|a, b| {
            b.1.cmp(&a.1).then_with(|| {
                let a_at = state.updated.get(&a.0).copied().unwrap_or(0.0);
                let b_at = state.updated.get(&b.0).copied().unwrap_or(0.0);
                b_at.partial_cmp(&a_at).unwrap_or(std::cmp::Ordering::Equal)
            })
        });
        ranked
    }

    /// Number of distinct keywords indexed.
    pub fn keyword_count(&self) -> usize {
        self.state.read().expect("keyword index poisoned").keywords.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(id: i64, keywords: &[&str], updated_at: f64) -> KnowledgeEntry {
        KnowledgeEntry {
            id,
            category: "general".to_string(),
            keywords: keywords.iter().map(|k| k.to_string()).collect(),
            content: format!("entry {id}"),
            embedding: vec![],
            notes: None,
            created_at: updated_at,
            updated_at,
        }
    }

    #[test]
    fn matches_by_substring_containment() {
        let index = KeywordIndex::new();
        index.rebuild(&[entry(1, &["pudding"], 100.0), entry(2, &["ramen"], 100.0)]);

        let hits = index.matches("did you try the PUDDING place?");
        assert_eq!(hits, vec![(1, 1)]);
    }

    #[test]
    fn ranks_by_match_count_then_recency() {
        let index = KeywordIndex::new();
        index.rebuild(&[
            entry(1, &["trip", "osaka"], 100.0),
            entry(2, &["osaka"], 300.0),
            entry(3, &["osaka"], 200.0),
        ]);

        let hits = index.matches("planning a trip to osaka next month");
        let ids: Vec<i64> = hits.iter().map(|(id, _)| *id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
        assert_eq!(hits[0].1, 2);
    }

    #[test]
    fn rebuild_replaces_previous_contents() {
        let index = KeywordIndex::new();
        index.rebuild(&[entry(1, &["stale"], 100.0)]);
        index.rebuild(&[entry(2, &["fresh"], 200.0)]);

        assert!(index.matches("stale news").is_empty());
        assert_eq!(index.matches("fresh news").len(), 1);
        assert_eq!(index.keyword_count(), 1);
    }

    #[test]
    fn empty_and_blank_keywords_are_skipped() {
        let index = KeywordIndex::new();
        index.rebuild(&[entry(1, &["", "  ", "tea"], 100.0)]);
        assert_eq!(index.keyword_count(), 1);
    }
}
