// SPDX-FileCopyrightText: 2026 Engram Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Summarization scheduler.
//!
//! Polls active groups and drains their buffers into stored summaries
//! when a trigger fires. Triggers are checked in priority order:
//! message count, then elapsed time, then token estimate. The buffer is
//! only cleared after the summary is durably inserted; a failed
//! completion leaves everything in place for the next poll.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use serde::Deserialize;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use engram_config::model::SummaryConfig;
use engram_config::{SharedConfig, TokenCounting};
use engram_core::{
    BufferStore, BufferedMessage, CompletionClient, CompletionRequest, ConversationSummary,
    Embedder, EmbeddingInput, EngramError, EntityRecord, RetryPolicy, TriggerState,
};
use engram_storage::{ConversationStore, EntityStore};

use crate::unix_now;

const SYSTEM_PROMPT: &str = "You are the summarization stage of a group-chat memory system. \
Respond with a single JSON object and nothing else.";

/// Upper bound on a single retry backoff.
const MAX_BACKOFF: Duration = Duration::from_secs(10);

/// Parsed completion output.
#[derive(Debug, Deserialize)]
struct SummaryPayload {
    summary: String,
    #[serde(default)]
    entities: Vec<EntityPayload>,
    importance: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct EntityPayload {
    user_id: String,
    key: String,
    value: String,
    #[serde(default = "default_entity_category")]
    category: String,
    #[serde(default = "default_entity_importance")]
    importance: i64,
}

fn default_entity_category() -> String {
    "general".to_string()
}

fn default_entity_importance() -> i64 {
    3
}

/// Which trigger fired, for logging.
fn should_summarize(state: &TriggerState, cfg: &SummaryConfig, now: f64) -> Option<&'static str> {
    if state.buffered == 0 {
        return None;
    }
    if state.message_count >= cfg.message_threshold {
        return Some("count");
    }
    if state.last_summary_at > 0.0
        && now - state.last_summary_at >= cfg.time_threshold_secs as f64
    {
        return Some("time");
    }
    let tokens = match cfg.token_counting {
        TokenCounting::Drained => state.token_estimate,
        TokenCounting::Buffer => state.buffered_token_estimate,
    };
    if tokens >= cfg.token_threshold {
        return Some("tokens");
    }
    None
}

/// Periodic driver for buffer draining and summary storage.
pub struct SummaryScheduler {
    config: SharedConfig,
    buffer: Arc<dyn BufferStore>,
    completion: Arc<dyn CompletionClient>,
    embedder: Arc<dyn Embedder>,
    conversations: Arc<ConversationStore>,
    entities: Arc<EntityStore>,
    in_flight: DashMap<String, ()>,
}

struct InFlightGuard<'a> {
    map: &'a DashMap<String, ()>,
    key: String,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.map.remove(&self.key);
    }
}

impl SummaryScheduler {
    pub fn new(
        config: SharedConfig,
        buffer: Arc<dyn BufferStore>,
        completion: Arc<dyn CompletionClient>,
        embedder: Arc<dyn Embedder>,
        conversations: Arc<ConversationStore>,
        entities: Arc<EntityStore>,
    ) -> Self {
        Self {
            config,
            buffer,
            completion,
            embedder,
            conversations,
            entities,
            in_flight: DashMap::new(),
        }
    }

    /// Run the poll loop until `cancel` fires.
    pub fn spawn(self: Arc<Self>, cancel: CancellationToken) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let poll_secs = self.config.get().summary.poll_interval_secs.max(1);
            let mut interval = tokio::time::interval(Duration::from_secs(poll_secs));
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            info!(poll_secs, "summary scheduler started");
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        info!("summary scheduler stopped");
                        break;
                    }
                    _ = interval.tick() => {
                        if let Err(err) = self.poll_once().await {
                            warn!(error = %err, "summary poll failed");
                        }
                    }
                }
            }
        })
    }

    /// One poll pass over every active group.
    pub async fn poll_once(&self) -> Result<(), EngramError> {
        self.poll_once_at(unix_now()).await
    }

    pub async fn poll_once_at(&self, now: f64) -> Result<(), EngramError> {
        let cfg = self.config.get();

        let expired = self.buffer.expire_idle(cfg.buffer.ttl_secs, now).await?;
        if expired > 0 {
            debug!(expired, "dropped idle group buffers");
        }

        for group_id in self.buffer.active_groups().await? {
            let state = self.buffer.trigger_state(&group_id).await?;
            let Some(trigger) = should_summarize(&state, &cfg.summary, now) else {
                continue;
            };
            info!(
                group_id = %group_id,
                trigger,
                buffered = state.buffered,
                "summarization triggered"
            );
            if let Err(err) = self.summarize_group(&group_id, now).await {
                warn!(group_id = %group_id, error = %err, "summarization failed");
            }
        }
        Ok(())
    }

    /// Drain one group into a stored summary.
    ///
    /// Returns false when nothing was stored (empty buffer, another pass
    /// already running, or the completion could not be obtained). The
    /// buffer is untouched in every false case.
    pub async fn summarize_group(&self, group_id: &str, now: f64) -> Result<bool, EngramError> {
        if self.in_flight.insert(group_id.to_string(), ()).is_some() {
            debug!(group_id = %group_id, "summarization already in flight");
            return Ok(false);
        }
        let _guard = InFlightGuard {
            map: &self.in_flight,
            key: group_id.to_string(),
        };

        let cfg = self.config.get();
        let messages = self
            .buffer
            .snapshot(group_id, cfg.summary.max_messages)
            .await?;
        let Some(last) = messages.last() else {
            return Ok(false);
        };
        let high_seq = last.seq;

        let context = self
            .conversations
            .recent_for_group(group_id, cfg.summary.context_summaries)
            .await?;
        let prompt = build_prompt(&messages, &context);
        let request = CompletionRequest {
            model: cfg.completion.summary_model.clone(),
            system_prompt: Some(SYSTEM_PROMPT.to_string()),
            prompt,
            temperature: cfg.completion.summary_temperature,
            max_tokens: cfg.completion.summary_max_tokens,
        };

        let policy = RetryPolicy::new(
            cfg.summary.max_attempts,
            Duration::from_millis(cfg.summary.base_delay_ms),
            MAX_BACKOFF,
        );
        let payload = policy
            .run("summarize", || async {
                let response = self.completion.complete(request.clone()).await?;
                parse_payload(&response.content)
            })
            .await;
        let payload = match payload {
            Ok(payload) => payload,
            Err(err) => {
                warn!(group_id = %group_id, error = %err, "summary completion failed, buffer kept");
                return Ok(false);
            }
        };

        let summary_text = payload.summary.trim().to_string();
        if summary_text.is_empty() {
            warn!(group_id = %group_id, "model returned empty summary, buffer kept");
            return Ok(false);
        }

        let output = self
            .embedder
            .embed(EmbeddingInput {
                texts: vec![summary_text.clone()],
            })
            .await?;
        let embedding = output.embeddings.into_iter().next().ok_or_else(|| {
            EngramError::Embedding {
                message: "embedder returned no vectors".to_string(),
                source: None,
            }
        })?;

        let mut participants: Vec<String> = Vec::new();
        for message in &messages {
            if !participants.contains(&message.sender_id) {
                participants.push(message.sender_id.clone());
            }
        }

        let importance_initial = payload.importance.unwrap_or(3).clamp(1, 5);
        let summary = ConversationSummary {
            id: 0,
            group_id: group_id.to_string(),
            summary_text,
            embedding,
            participants,
            start_time: messages.first().map(|m| m.timestamp).unwrap_or(now),
            end_time: last.timestamp,
            importance_initial,
            importance_current: importance_initial as f64,
            last_accessed: now,
            is_fuzzy: false,
            created_at: now,
        };
        let summary_id = self.conversations.insert(&summary).await?;

        for entity in payload.entities {
            let record = EntityRecord {
                user_id: entity.user_id,
                group_id: group_id.to_string(),
                key: entity.key,
                value: entity.value,
                category: entity.category,
                importance: entity.importance,
            };
            if let Err(err) = self.entities.upsert(&record, now).await {
                warn!(group_id = %group_id, key = %record.key, error = %err, "entity upsert failed");
            }
        }

        let drained = self.buffer.clear_drained(group_id, high_seq).await?;
        let counted: Vec<&BufferedMessage> = messages
            .iter()
            .filter(|m| m.counted_toward_summary)
            .collect();
        let counted_tokens: u64 = counted
            .iter()
            .map(|m| m.text.chars().count() as u64)
            .sum();
        self.buffer
            .consume(group_id, counted.len() as u64, counted_tokens, now)
            .await?;

        info!(
            group_id = %group_id,
            summary_id,
            drained,
            importance = importance_initial,
            "conversation summarized"
        );
        Ok(true)
    }
}

fn build_prompt(messages: &[BufferedMessage], context: &[ConversationSummary]) -> String {
    let mut prompt = String::new();

    if !context.is_empty() {
        prompt.push_str("Earlier summaries of this group, newest first:\n");
        for summary in context {
            prompt.push_str("- ");
            prompt.push_str(&summary.summary_text);
            prompt.push('\n');
        }
        prompt.push('\n');
    }

    prompt.push_str("Transcript to summarize:\n");
    for message in messages {
        prompt.push_str(&message.sender_id);
        prompt.push_str(": ");
        prompt.push_str(&message.text);
        prompt.push('\n');
    }

    prompt.push_str(
        "\nProduce a JSON object with these keys:\n\
         - \"summary\": a concise paragraph covering the topics, decisions, and plans above\n\
         - \"entities\": array of durable facts about participants, each \
         {\"user_id\", \"key\", \"value\", \"category\", \"importance\" (1-5)}\n\
         - \"importance\": overall importance of this span, 1 (trivial) to 5 (critical)\n",
    );
    prompt
}

fn parse_payload(content: &str) -> Result<SummaryPayload, EngramError> {
    let body = strip_code_fences(content);
    serde_json::from_str(body).map_err(|e| EngramError::Completion {
        message: format!("unparseable summary payload: {e}"),
        source: Some(Box::new(e)),
    })
}

/// Models often wrap JSON in markdown fences despite instructions.
fn strip_code_fences(text: &str) -> &str {
    let text = text.trim();
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    let rest = rest.trim_start();
    rest.strip_suffix("```").map(str::trim_end).unwrap_or(rest)
}
