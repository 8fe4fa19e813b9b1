// SPDX-FileCopyrightText: 2026 Engram Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Scheduled importance decay over stored conversation summaries.
//!
//! Each pass multiplies `importance_current` by the decay factor for
//! summaries past the minimum age that were not accessed during the
//! pass. Summaries falling below the importance threshold are deleted,
//! except high-initial-importance ones, which are compressed to a
//! one-line gist on their first trip below and only deleted the next
//! time they decay under the threshold.

use std::str::FromStr;
use std::sync::Arc;

use croner::Cron;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use engram_config::SharedConfig;
use engram_core::{CompletionClient, CompletionRequest, ConversationSummary, EngramError};
use engram_storage::ConversationStore;

use crate::unix_now;

const SECONDS_PER_DAY: f64 = 86_400.0;

const GIST_SYSTEM_PROMPT: &str = "You compress conversation summaries for long-term storage. \
Respond with one sentence and nothing else.";

/// Counters for one forgetting pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PassStats {
    /// Summaries old and idle enough to be examined.
    pub examined: usize,
    /// Summaries whose importance was decayed but kept.
    pub decayed: usize,
    /// Summaries compressed to a gist this pass.
    pub fuzzified: usize,
    /// Summaries deleted this pass.
    pub deleted: usize,
}

/// Cron-driven decay, fuzzify, delete pass.
pub struct ForgettingEngine {
    config: SharedConfig,
    conversations: Arc<ConversationStore>,
    completion: Arc<dyn CompletionClient>,
}

impl ForgettingEngine {
    pub fn new(
        config: SharedConfig,
        conversations: Arc<ConversationStore>,
        completion: Arc<dyn CompletionClient>,
    ) -> Self {
        Self {
            config,
            conversations,
            completion,
        }
    }

    /// Run passes on the configured cron schedule until `cancel` fires.
    pub fn spawn(self: Arc<Self>, cancel: CancellationToken) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                let schedule = self.config.get().forgetting.schedule.clone();
                let cron = match Cron::from_str(&schedule) {
                    Ok(cron) => cron,
                    Err(err) => {
                        // Validation rejects bad schedules at load time;
                        // a hot-swapped bad value lands here.
                        warn!(schedule = %schedule, error = %err, "invalid forgetting schedule, engine stopped");
                        return;
                    }
                };
                let next = match cron.find_next_occurrence(&chrono::Utc::now(), false) {
                    Ok(next) => next,
                    Err(err) => {
                        warn!(error = %err, "no next forgetting occurrence, engine stopped");
                        return;
                    }
                };
                let wait = (next - chrono::Utc::now())
                    .to_std()
                    .unwrap_or(std::time::Duration::ZERO);
                debug!(next = %next, "forgetting pass scheduled");

                tokio::select! {
                    _ = cancel.cancelled() => {
                        info!("forgetting engine stopped");
                        return;
                    }
                    _ = tokio::time::sleep(wait) => {}
                }

                match self.run_pass().await {
                    Ok(stats) => info!(
                        examined = stats.examined,
                        decayed = stats.decayed,
                        fuzzified = stats.fuzzified,
                        deleted = stats.deleted,
                        "forgetting pass complete"
                    ),
                    Err(err) => warn!(error = %err, "forgetting pass failed"),
                }
            }
        })
    }

    /// Run one pass now.
    pub async fn run_pass(&self) -> Result<PassStats, EngramError> {
        self.run_pass_at(unix_now()).await
    }

    pub async fn run_pass_at(&self, now: f64) -> Result<PassStats, EngramError> {
        let cfg = self.config.get();
        if !cfg.forgetting.enabled {
            debug!("forgetting disabled, skipping pass");
            return Ok(PassStats::default());
        }

        let max_created_at = now - cfg.forgetting.min_age_days as f64 * SECONDS_PER_DAY;
        let candidates = self.conversations.decay_candidates(max_created_at, now).await?;

        let mut stats = PassStats {
            examined: candidates.len(),
            ..PassStats::default()
        };

        for summary in candidates {
            let decayed = summary.importance_current * cfg.forgetting.decay_factor;
            if decayed >= cfg.forgetting.importance_threshold {
                self.conversations.set_importance(summary.id, decayed).await?;
                stats.decayed += 1;
                continue;
            }

            let high_value = summary.importance_initial as f64 > cfg.forgetting.importance_threshold;
            if cfg.forgetting.fuzzify_high_value && high_value && !summary.is_fuzzy {
                match self.compress_to_gist(&summary, &cfg).await {
                    Ok(gist) => {
                        self.conversations
                            .fuzzify(summary.id, &gist, summary.importance_initial as f64)
                            .await?;
                        stats.fuzzified += 1;
                    }
                    Err(err) => {
                        // Keep the decayed row; it will be retried on a
                        // later pass.
                        warn!(id = summary.id, error = %err, "gist compression failed");
                        self.conversations.set_importance(summary.id, decayed).await?;
                        stats.decayed += 1;
                    }
                }
            } else {
                self.conversations.delete(summary.id).await?;
                debug!(id = summary.id, group_id = %summary.group_id, "summary forgotten");
                stats.deleted += 1;
            }
        }
        Ok(stats)
    }

    async fn compress_to_gist(
        &self,
        summary: &ConversationSummary,
        cfg: &engram_config::EngramConfig,
    ) -> Result<String, EngramError> {
        let request = CompletionRequest {
            model: cfg.completion.summary_model.clone(),
            system_prompt: Some(GIST_SYSTEM_PROMPT.to_string()),
            prompt: format!(
                "Compress this conversation summary to one sentence keeping only \
                 the most durable fact:\n\n{}",
                summary.summary_text
            ),
            temperature: cfg.completion.summary_temperature,
            max_tokens: 256,
        };
        let response = self.completion.complete(request).await?;
        let gist = response.content.trim().to_string();
        if gist.is_empty() {
            return Err(EngramError::Completion {
                message: "model returned empty gist".to_string(),
                source: None,
            });
        }
        Ok(gist)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use engram_config::EngramConfig;
    use engram_storage::database::open_in_memory;
    use engram_test_utils::MockCompletionClient;

    const DAY: f64 = SECONDS_PER_DAY;

    struct Fixture {
        engine: ForgettingEngine,
        conversations: Arc<ConversationStore>,
        completion: Arc<MockCompletionClient>,
        shared: SharedConfig,
    }

    async fn fixture(config: EngramConfig) -> Fixture {
        let shared = SharedConfig::new(config);
        let conn = open_in_memory().await.unwrap();
        let conversations = Arc::new(ConversationStore::new(conn, 4));
        let completion = Arc::new(MockCompletionClient::new());
        let engine = ForgettingEngine::new(shared.clone(), conversations.clone(), completion.clone());
        Fixture {
            engine,
            conversations,
            completion,
            shared,
        }
    }

    async fn insert(
        fx: &Fixture,
        initial: i64,
        current: f64,
        created_at: f64,
        is_fuzzy: bool,
    ) -> i64 {
        fx.conversations
            .insert(&ConversationSummary {
                id: 0,
                group_id: "g1".to_string(),
                summary_text: "a long detailed account of the evening".to_string(),
                embedding: vec![0.1; 4],
                participants: vec!["alice".to_string()],
                start_time: created_at,
                end_time: created_at,
                importance_initial: initial,
                importance_current: current,
                last_accessed: created_at,
                is_fuzzy,
                created_at,
            })
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn young_summaries_are_exempt() {
        let fx = fixture(EngramConfig::default()).await;
        let now = 100.0 * DAY;
        let id = insert(&fx, 1, 0.5, now - 2.0 * DAY, false).await;

        let stats = fx.engine.run_pass_at(now).await.unwrap();
        assert_eq!(stats, PassStats::default());
        assert!(fx.conversations.get(id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn decay_keeps_summaries_above_threshold() {
        let fx = fixture(EngramConfig::default()).await;
        let now = 100.0 * DAY;
        let id = insert(&fx, 4, 4.0, now - 10.0 * DAY, false).await;

        let stats = fx.engine.run_pass_at(now).await.unwrap();
        assert_eq!(stats.decayed, 1);
        let summary = fx.conversations.get(id).await.unwrap().unwrap();
        assert!((summary.importance_current - 3.8).abs() < 1e-9);
    }

    #[tokio::test]
    async fn low_value_summaries_below_threshold_are_deleted() {
        let fx = fixture(EngramConfig::default()).await;
        let now = 100.0 * DAY;
        // initial 2 is at or below the threshold of 3, so no fuzzify.
        let id = insert(&fx, 2, 2.0, now - 10.0 * DAY, false).await;

        let stats = fx.engine.run_pass_at(now).await.unwrap();
        assert_eq!(stats.deleted, 1);
        assert!(fx.conversations.get(id).await.unwrap().is_none());
        assert_eq!(fx.completion.call_count(), 0);
    }

    #[tokio::test]
    async fn high_value_summaries_are_fuzzified_first() {
        let fx = fixture(EngramConfig::default()).await;
        let now = 100.0 * DAY;
        let id = insert(&fx, 5, 3.1, now - 10.0 * DAY, false).await;
        fx.completion.push_response("They spent an evening together.");

        let stats = fx.engine.run_pass_at(now).await.unwrap();
        assert_eq!(stats.fuzzified, 1);
        let summary = fx.conversations.get(id).await.unwrap().unwrap();
        assert!(summary.is_fuzzy);
        assert_eq!(summary.summary_text, "They spent an evening together.");
        assert_eq!(summary.importance_current, 5.0, "importance resets on fuzzify");
    }

    #[tokio::test]
    async fn fuzzified_summaries_are_deleted_on_second_trip() {
        let fx = fixture(EngramConfig::default()).await;
        let now = 100.0 * DAY;
        let id = insert(&fx, 5, 2.9, now - 10.0 * DAY, true).await;

        let stats = fx.engine.run_pass_at(now).await.unwrap();
        assert_eq!(stats.deleted, 1);
        assert!(fx.conversations.get(id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn gist_failure_keeps_the_decayed_summary() {
        let fx = fixture(EngramConfig::default()).await;
        let now = 100.0 * DAY;
        let id = insert(&fx, 5, 3.0, now - 10.0 * DAY, false).await;
        fx.completion.push_error("model unavailable");

        let stats = fx.engine.run_pass_at(now).await.unwrap();
        assert_eq!(stats.fuzzified, 0);
        assert_eq!(stats.decayed, 1);
        let summary = fx.conversations.get(id).await.unwrap().unwrap();
        assert!(!summary.is_fuzzy);
        assert!((summary.importance_current - 2.85).abs() < 1e-9);
    }

    #[tokio::test]
    async fn disabled_engine_does_nothing() {
        let mut config = EngramConfig::default();
        config.forgetting.enabled = false;
        let fx = fixture(config).await;
        let now = 100.0 * DAY;
        let id = insert(&fx, 1, 0.1, now - 30.0 * DAY, false).await;

        let stats = fx.engine.run_pass_at(now).await.unwrap();
        assert_eq!(stats, PassStats::default());
        assert!(fx.conversations.get(id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn fuzzify_can_be_disabled_by_hot_swap() {
        let fx = fixture(EngramConfig::default()).await;
        let now = 100.0 * DAY;
        let id = insert(&fx, 5, 2.0, now - 10.0 * DAY, false).await;

        let mut config = EngramConfig::default();
        config.forgetting.fuzzify_high_value = false;
        fx.shared.swap(config);

        let stats = fx.engine.run_pass_at(now).await.unwrap();
        assert_eq!(stats.deleted, 1);
        assert!(fx.conversations.get(id).await.unwrap().is_none());
    }
}
