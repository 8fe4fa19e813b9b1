// SPDX-FileCopyrightText: 2026 Engram Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Hybrid two-layer retrieval.
//!
//! Layer 1 consults the in-memory keyword index (knowledge target only).
//! Layer 2 embeds the query and scans stored embeddings by cosine
//! similarity, skipping ids layer 1 already produced. Results merge
//! keyword-first and are capped by the configured total limit.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::debug;

use engram_config::SharedConfig;
use engram_core::types::cosine_similarity;
use engram_core::{
    Embedder, EmbeddingInput, EngramError, RetrievalOrigin, RetrievalResult, SearchTarget,
};
use engram_storage::{ConversationStore, KnowledgeStore};

use crate::keyword_index::KeywordIndex;
use crate::unix_now;

/// Read-side of the memory subsystem.
pub struct HybridRetriever {
    config: SharedConfig,
    conversations: Arc<ConversationStore>,
    knowledge: Arc<KnowledgeStore>,
    embedder: Arc<dyn Embedder>,
    index: Arc<KeywordIndex>,
}

impl HybridRetriever {
    pub fn new(
        config: SharedConfig,
        conversations: Arc<ConversationStore>,
        knowledge: Arc<KnowledgeStore>,
        embedder: Arc<dyn Embedder>,
        index: Arc<KeywordIndex>,
    ) -> Self {
        Self {
            config,
            conversations,
            knowledge,
            embedder,
            index,
        }
    }

    /// Run a hybrid search against one target store.
    ///
    /// Returns at most `min(limit, retrieval.total_limit)` results with
    /// unique source ids. A blank query returns nothing.
    pub async fn search(
        &self,
        query: &str,
        limit: usize,
        target: SearchTarget,
    ) -> Result<Vec<RetrievalResult>, EngramError> {
        let query = query.trim();
        if query.is_empty() {
            return Ok(vec![]);
        }

        let cfg = self.config.get();
        let effective_total = limit.min(cfg.retrieval.total_limit);
        if effective_total == 0 {
            return Ok(vec![]);
        }

        let mut results: Vec<RetrievalResult> = Vec::new();
        let mut seen: HashSet<i64> = HashSet::new();

        // Layer 1: keyword index. Conversation summaries carry no
        // keywords, so only the knowledge target uses it.
        if target == SearchTarget::Knowledge {
            let hits: Vec<(i64, usize)> = self
                .index
                .matches(query)
                .into_iter()
                .take(cfg.retrieval.layer1_limit.min(effective_total))
                .collect();
            if !hits.is_empty() {
                let ids: Vec<i64> = hits.iter().map(|(id, _)| *id).collect();
                let entries = self.knowledge.get_by_ids(&ids).await?;
                for (id, count) in hits {
                    if let Some(entry) = entries.iter().find(|e| e.id == id) {
                        seen.insert(id);
                        results.push(RetrievalResult {
                            source_id: id,
                            content: entry.content.clone(),
                            score: count as f64,
                            origin: RetrievalOrigin::Keyword,
                        });
                    }
                }
            }
        }

        // Layer 2: vector similarity over the remaining budget.
        let layer2_budget = match target {
            SearchTarget::Knowledge => cfg
                .retrieval
                .layer2_limit
                .min(effective_total.saturating_sub(results.len())),
            SearchTarget::Conversation => effective_total,
        };
        if layer2_budget > 0 {
            let layer2 = self
                .vector_layer(query, layer2_budget, target, &seen, &cfg.retrieval)
                .await?;
            results.extend(layer2);
        }

        results.truncate(effective_total);
        debug!(
            query_len = query.len(),
            target = %target,
            results = results.len(),
            "hybrid search complete"
        );
        Ok(results)
    }

    async fn vector_layer(
        &self,
        query: &str,
        budget: usize,
        target: SearchTarget,
        exclude: &HashSet<i64>,
        retrieval: &engram_config::model::RetrievalConfig,
    ) -> Result<Vec<RetrievalResult>, EngramError> {
        let output = self
            .embedder
            .embed(EmbeddingInput {
                texts: vec![query.to_string()],
            })
            .await?;
        let Some(query_vec) = output.embeddings.first() else {
            return Err(EngramError::Embedding {
                message: "embedder returned no vectors".to_string(),
                source: None,
            });
        };

        let stored = match target {
            SearchTarget::Knowledge => self.knowledge.embeddings().await?,
            SearchTarget::Conversation => self.conversations.embeddings().await?,
        };

        let mut scored: Vec<(i64, f64)> = stored
            .iter()
            .filter(|(id, _)| !exclude.contains(id))
            .map(|(id, vec)| (*id, cosine_similarity(query_vec, vec) as f64))
            .filter(|(_, sim)| *sim >= retrieval.similarity_threshold)
            .collect();
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(budget);

        if scored.is_empty() {
            return Ok(vec![]);
        }
        let ids: Vec<i64> = scored.iter().map(|(id, _)| *id).collect();

        let mut results = Vec::with_capacity(scored.len());
        match target {
            SearchTarget::Knowledge => {
                let entries = self.knowledge.get_by_ids(&ids).await?;
                for (id, sim) in scored {
                    if let Some(entry) = entries.iter().find(|e| e.id == id) {
                        results.push(RetrievalResult {
                            source_id: id,
                            content: entry.content.clone(),
                            score: sim,
                            origin: RetrievalOrigin::Vector,
                        });
                    }
                }
            }
            SearchTarget::Conversation => {
                let summaries = self.conversations.get_by_ids(&ids).await?;
                // Retrieval counts as access: stamp and boost the hits.
                self.conversations
                    .touch(&ids, retrieval.access_boost, unix_now())
                    .await?;
                for (id, sim) in scored {
                    if let Some(summary) = summaries.iter().find(|s| s.id == id) {
                        results.push(RetrievalResult {
                            source_id: id,
                            content: summary.summary_text.clone(),
                            score: sim,
                            origin: RetrievalOrigin::Vector,
                        });
                    }
                }
            }
        }
        Ok(results)
    }
}
