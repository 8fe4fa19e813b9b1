// SPDX-FileCopyrightText: 2026 Engram Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The memory engine: the single context object owning every
//! collaborator of the subsystem.
//!
//! Built once at startup from explicit dependencies and shared by
//! reference. Ingestion, retrieval, knowledge administration, and the
//! background schedulers all hang off this struct; nothing in the
//! subsystem reaches for global state.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use engram_config::SharedConfig;
use engram_core::{
    BufferStore, BufferedMessage, CompletionClient, Embedder, EmbeddingInput, EngramError,
    EntityRecord, KnowledgeEntry, RetrievalResult, ScoreRequest, ScoringClient, SearchTarget,
    TriageOutcome,
};
use engram_storage::{ConversationStore, EntityStore, KnowledgeStore, KnowledgeUpdate};

use crate::forgetting::{ForgettingEngine, PassStats};
use crate::keyword_index::KeywordIndex;
use crate::retriever::HybridRetriever;
use crate::summarizer::SummaryScheduler;
use crate::unix_now;

/// Recent buffered messages sent to the scoring service as context.
const SCORING_CONTEXT_MESSAGES: usize = 10;

/// Entry point for the whole memory subsystem.
pub struct MemoryEngine {
    config: SharedConfig,
    buffer: Arc<dyn BufferStore>,
    scoring: Arc<dyn ScoringClient>,
    embedder: Arc<dyn Embedder>,
    knowledge: Arc<KnowledgeStore>,
    entities: Arc<EntityStore>,
    index: Arc<KeywordIndex>,
    retriever: HybridRetriever,
    scheduler: Arc<SummaryScheduler>,
    forgetting: Arc<ForgettingEngine>,
}

impl MemoryEngine {
    /// Wire up the engine from its collaborators and warm the keyword
    /// index from the knowledge store.
    #[allow(clippy::too_many_arguments)]
    pub async fn new(
        config: SharedConfig,
        buffer: Arc<dyn BufferStore>,
        scoring: Arc<dyn ScoringClient>,
        completion: Arc<dyn CompletionClient>,
        embedder: Arc<dyn Embedder>,
        conversations: Arc<ConversationStore>,
        knowledge: Arc<KnowledgeStore>,
        entities: Arc<EntityStore>,
    ) -> Result<Self, EngramError> {
        let index = Arc::new(KeywordIndex::new());
        let entries = knowledge.get_all().await?;
        index.rebuild(&entries);
        info!(entries = entries.len(), "keyword index warmed");

        let retriever = HybridRetriever::new(
            config.clone(),
            conversations.clone(),
            knowledge.clone(),
            embedder.clone(),
            index.clone(),
        );
        let scheduler = Arc::new(SummaryScheduler::new(
            config.clone(),
            buffer.clone(),
            completion.clone(),
            embedder.clone(),
            conversations.clone(),
            entities.clone(),
        ));
        let forgetting = Arc::new(ForgettingEngine::new(
            config.clone(),
            conversations.clone(),
            completion,
        ));

        Ok(Self {
            config,
            buffer,
            scoring,
            embedder,
            knowledge,
            entities,
            index,
            retriever,
            scheduler,
            forgetting,
        })
    }

    /// Spawn the summarization scheduler and the forgetting engine.
    /// Both stop when `cancel` fires.
    pub fn start(&self, cancel: &CancellationToken) -> Vec<tokio::task::JoinHandle<()>> {
        vec![
            self.scheduler.clone().spawn(cancel.child_token()),
            self.forgetting.clone().spawn(cancel.child_token()),
        ]
    }

    /// Triage one incoming message.
    ///
    /// Cheap filters run before the scoring call: whitespace-trimmed
    /// length, then exact duplication of a recently buffered message
    /// (case-insensitive). A scoring failure degrades to the configured
    /// default score rather than rejecting the message.
    pub async fn ingest(
        &self,
        group_id: &str,
        sender_id: &str,
        text: &str,
    ) -> Result<TriageOutcome, EngramError> {
        let cfg = self.config.get();
        let text = text.trim();

        if text.chars().count() < cfg.triage.filter_min_chars {
            debug!(group_id, sender_id, "discarded: below minimum length");
            return Ok(TriageOutcome::Discarded);
        }

        let window = cfg
            .triage
            .filter_repeat_window
            .max(SCORING_CONTEXT_MESSAGES);
        let recent = self.buffer.recent(group_id, window).await?;

        if cfg.triage.filter_repeat_window > 0 {
            let lowered = text.to_lowercase();
            let repeats = recent
                .iter()
                .rev()
                .take(cfg.triage.filter_repeat_window)
                .any(|m| m.text.to_lowercase() == lowered);
            if repeats {
                debug!(group_id, sender_id, "discarded: duplicate of recent message");
                return Ok(TriageOutcome::Discarded);
            }
        }

        let context = recent
            .iter()
            .rev()
            .take(SCORING_CONTEXT_MESSAGES)
            .rev()
            .map(|m| format!("{}: {}", m.sender_id, m.text))
            .collect::<Vec<_>>()
            .join("\n");
        let score = match self
            .scoring
            .score(ScoreRequest {
                message: text.to_string(),
                context,
                sender_id: sender_id.to_string(),
                group_id: group_id.to_string(),
            })
            .await
        {
            Ok(score) => score.clamp(0.0, 1.0),
            Err(err) => {
                warn!(group_id, error = %err, "scoring failed, using default score");
                cfg.scoring.default_score
            }
        };

        if score < cfg.triage.low_threshold {
            debug!(group_id, sender_id, score, "discarded: below low threshold");
            return Ok(TriageOutcome::Discarded);
        }

        let urgent = score >= cfg.triage.urgent_threshold;
        let mut message = BufferedMessage::new(group_id, sender_id, text, score, unix_now());
        message.counted_toward_summary = !urgent || cfg.triage.count_urgent_toward_summary;
        self.buffer.push(message).await?;

        Ok(if urgent {
            TriageOutcome::BufferedUrgent
        } else {
            TriageOutcome::Buffered
        })
    }

    /// Hybrid search over one target store.
    pub async fn search(
        &self,
        query: &str,
        limit: usize,
        target: SearchTarget,
    ) -> Result<Vec<RetrievalResult>, EngramError> {
        self.retriever.search(query, limit, target).await
    }

    /// Add a knowledge entry. Keywords are trimmed and deduplicated
    /// case-insensitively, preserving first-seen order and casing.
    pub async fn add_knowledge(
        &self,
        category: &str,
        keywords: Vec<String>,
        content: &str,
        notes: Option<String>,
    ) -> Result<i64, EngramError> {
        let now = unix_now();
        let embedding = self.embed_one(content).await?;
        let entry = KnowledgeEntry {
            id: 0,
            category: category.to_string(),
            keywords: normalize_keywords(keywords),
            content: content.to_string(),
            embedding,
            notes,
            created_at: now,
            updated_at: now,
        };
        let id = self.knowledge.insert(&entry).await?;
        self.refresh_index().await?;
        info!(id, category, "knowledge entry added");
        Ok(id)
    }

    /// Update a knowledge entry. A content change re-embeds; the
    /// embedding field of `update` is always overwritten here. Returns
    /// false if the entry does not exist.
    pub async fn update_knowledge(
        &self,
        id: i64,
        mut update: KnowledgeUpdate,
    ) -> Result<bool, EngramError> {
        update.embedding = match &update.content {
            Some(content) => Some(self.embed_one(content).await?),
            None => None,
        };
        if let Some(keywords) = update.keywords.take() {
            update.keywords = Some(normalize_keywords(keywords));
        }
        let changed = self.knowledge.update(id, update, unix_now()).await?;
        if changed {
            self.refresh_index().await?;
            info!(id, "knowledge entry updated");
        }
        Ok(changed)
    }

    /// Delete a knowledge entry. Returns false if it did not exist.
    pub async fn delete_knowledge(&self, id: i64) -> Result<bool, EngramError> {
        let removed = self.knowledge.delete(id).await?;
        if removed {
            self.refresh_index().await?;
            info!(id, "knowledge entry deleted");
        }
        Ok(removed)
    }

    /// All knowledge entries, most recently updated first.
    pub async fn all_knowledge(&self) -> Result<Vec<KnowledgeEntry>, EngramError> {
        self.knowledge.get_all().await
    }

    /// Extracted entities for a user in a group, most important first.
    pub async fn entities_for(
        &self,
        user_id: &str,
        group_id: &str,
    ) -> Result<Vec<EntityRecord>, EngramError> {
        self.entities.list(user_id, group_id).await
    }

    /// Force a summarization attempt for one group, bypassing triggers.
    pub async fn summarize_now(&self, group_id: &str) -> Result<bool, EngramError> {
        self.scheduler.summarize_group(group_id, unix_now()).await
    }

    /// Run one forgetting pass immediately.
    pub async fn run_forgetting_pass(&self) -> Result<PassStats, EngramError> {
        self.forgetting.run_pass().await
    }

    async fn embed_one(&self, text: &str) -> Result<Vec<f32>, EngramError> {
        let output = self
            .embedder
            .embed(EmbeddingInput {
                texts: vec![text.to_string()],
            })
            .await?;
        output
            .embeddings
            .into_iter()
            .next()
            .ok_or_else(|| EngramError::Embedding {
                message: "embedder returned no vectors".to_string(),
                source: None,
            })
    }

    async fn refresh_index(&self) -> Result<(), EngramError> {
        let entries = self.knowledge.get_all().await?;
        self.index.rebuild(&entries);
        Ok(())
    }
}

fn normalize_keywords(keywords: Vec<String>) -> Vec<String> {
    let mut seen: Vec<String> = Vec::new();
    let mut out: Vec<String> = Vec::new();
    for keyword in keywords {
        let keyword = keyword.trim();
        if keyword.is_empty() {
            continue;
        }
        let lowered = keyword.to_lowercase();
        if seen.contains(&lowered) {
            continue;
        }
        seen.push(lowered);
        out.push(keyword.to_string());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use engram_buffer::MemoryBufferStore;
    use engram_config::EngramConfig;
    use engram_storage::database::open_in_memory;
    use engram_test_utils::{HashEmbedder, MockCompletionClient, MockScoringClient};

    struct Fixture {
        engine: MemoryEngine,
        scoring: Arc<MockScoringClient>,
        buffer: Arc<MemoryBufferStore>,
        shared: SharedConfig,
    }

    async fn fixture(config: EngramConfig) -> Fixture {
        let shared = SharedConfig::new(config);
        let buffer = Arc::new(MemoryBufferStore::new(shared.clone()));
        let scoring = Arc::new(MockScoringClient::new());
        let conn = open_in_memory().await.unwrap();
        let conversations = Arc::new(ConversationStore::new(conn.clone(), 8));
        let knowledge = Arc::new(KnowledgeStore::new(conn.clone(), 8));
        let entities = Arc::new(EntityStore::new(conn));
        let engine = MemoryEngine::new(
            shared.clone(),
            buffer.clone(),
            scoring.clone(),
            Arc::new(MockCompletionClient::new()),
            Arc::new(HashEmbedder::new(8)),
            conversations,
            knowledge,
            entities,
        )
        .await
        .unwrap();
        Fixture {
            engine,
            scoring,
            buffer,
            shared,
        }
    }

    #[tokio::test]
    async fn short_messages_skip_scoring() {
        let fx = fixture(EngramConfig::default()).await;
        let outcome = fx.engine.ingest("g1", "alice", "k").await.unwrap();
        assert_eq!(outcome, TriageOutcome::Discarded);
        assert_eq!(fx.scoring.call_count(), 0);
    }

    #[tokio::test]
    async fn duplicates_skip_scoring() {
        let fx = fixture(EngramConfig::default()).await;
        fx.scoring.push_score(0.6);
        assert_eq!(
            fx.engine.ingest("g1", "alice", "See you Friday!").await.unwrap(),
            TriageOutcome::Buffered
        );
        // Same text, different case, different sender.
        assert_eq!(
            fx.engine.ingest("g1", "bob", "see you friday!").await.unwrap(),
            TriageOutcome::Discarded
        );
        assert_eq!(fx.scoring.call_count(), 1);
        assert_eq!(fx.buffer.trigger_state("g1").await.unwrap().buffered, 1);
    }

    #[tokio::test]
    async fn low_scores_are_discarded() {
        let fx = fixture(EngramConfig::default()).await;
        fx.scoring.push_score(0.29);
        let outcome = fx.engine.ingest("g1", "alice", "lol ok").await.unwrap();
        assert_eq!(outcome, TriageOutcome::Discarded);
        assert_eq!(fx.buffer.trigger_state("g1").await.unwrap().buffered, 0);
    }

    #[tokio::test]
    async fn threshold_boundaries_are_inclusive() {
        let fx = fixture(EngramConfig::default()).await;
        fx.scoring.push_score(0.3);
        assert_eq!(
            fx.engine.ingest("g1", "alice", "borderline low").await.unwrap(),
            TriageOutcome::Buffered
        );
        fx.scoring.push_score(0.8);
        assert_eq!(
            fx.engine.ingest("g1", "alice", "borderline urgent").await.unwrap(),
            TriageOutcome::BufferedUrgent
        );
    }

    #[tokio::test]
    async fn scoring_failure_falls_back_to_default() {
        let fx = fixture(EngramConfig::default()).await;
        fx.scoring.fail_next("service down");
        // Default score 0.5 clears the low threshold.
        let outcome = fx.engine.ingest("g1", "alice", "the flight lands at nine").await.unwrap();
        assert_eq!(outcome, TriageOutcome::Buffered);
        let recent = fx.buffer.recent("g1", 1).await.unwrap();
        assert_eq!(recent[0].score, 0.5);
    }

    #[tokio::test]
    async fn urgent_counting_follows_config() {
        let mut config = EngramConfig::default();
        config.triage.count_urgent_toward_summary = false;
        let fx = fixture(config).await;
        fx.scoring.push_score(0.95);
        fx.engine.ingest("g1", "alice", "EMERGENCY call me now").await.unwrap();

        let state = fx.buffer.trigger_state("g1").await.unwrap();
        assert_eq!(state.buffered, 1);
        assert_eq!(state.message_count, 0, "urgent message must not count");
    }

    #[tokio::test]
    async fn hot_swapped_threshold_applies_to_next_ingest() {
        let fx = fixture(EngramConfig::default()).await;
        fx.scoring.push_score(0.4);
        assert_eq!(
            fx.engine.ingest("g1", "alice", "mildly interesting").await.unwrap(),
            TriageOutcome::Buffered
        );

        let mut config = EngramConfig::default();
        config.triage.low_threshold = 0.5;
        fx.shared.swap(config);

        fx.scoring.push_score(0.4);
        assert_eq!(
            fx.engine.ingest("g1", "alice", "equally interesting").await.unwrap(),
            TriageOutcome::Discarded
        );
    }

    #[tokio::test]
    async fn knowledge_lifecycle_keeps_index_fresh() {
        let fx = fixture(EngramConfig::default()).await;
        let id = fx
            .engine
            .add_knowledge(
                "food",
                vec!["Pudding".to_string(), " pudding ".to_string(), String::new()],
                "alice loves convenience store pudding",
                None,
            )
            .await
            .unwrap();

        let entry = fx.engine.all_knowledge().await.unwrap().remove(0);
        assert_eq!(entry.keywords, vec!["Pudding"], "keywords deduplicated");

        let hits = fx
            .engine
            .search("who likes pudding?", 5, SearchTarget::Knowledge)
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].source_id, id);

        assert!(fx.engine.delete_knowledge(id).await.unwrap());
        let hits = fx
            .engine
            .search("who likes pudding?", 5, SearchTarget::Knowledge)
            .await
            .unwrap();
        assert!(hits.is_empty(), "deleted entry must leave the index");
    }

    #[tokio::test]
    async fn content_update_re_embeds() {
        let fx = fixture(EngramConfig::default()).await;
        let id = fx
            .engine
            .add_knowledge("general", vec!["fact".to_string()], "original text", None)
            .await
            .unwrap();
        let before = fx.engine.all_knowledge().await.unwrap().remove(0).embedding;

        let changed = fx
            .engine
            .update_knowledge(
                id,
                KnowledgeUpdate {
                    content: Some("completely different text".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert!(changed);

        let after = fx.engine.all_knowledge().await.unwrap().remove(0).embedding;
        assert_ne!(before, after, "embedding must track content");
    }

    #[tokio::test]
    async fn update_missing_knowledge_returns_false() {
        let fx = fixture(EngramConfig::default()).await;
        let changed = fx
            .engine
            .update_knowledge(
                404,
                KnowledgeUpdate {
                    category: Some("moved".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert!(!changed);
    }

    #[test]
    fn keyword_normalization_preserves_order_and_casing() {
        let normalized = normalize_keywords(vec![
            "Osaka".to_string(),
            "trip".to_string(),
            "OSAKA".to_string(),
            "  ".to_string(),
            "Trip".to_string(),
        ]);
        assert_eq!(normalized, vec!["Osaka", "trip"]);
    }
}
