// SPDX-FileCopyrightText: 2026 Engram Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Domain types shared across the Engram memory subsystem.

use serde::{Deserialize, Serialize};

/// Outcome of ingesting one chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum TriageOutcome {
    /// Below the low-score threshold (or filtered before scoring); not buffered.
    Discarded,
    /// Appended to the group buffer.
    Buffered,
    /// Appended to the group buffer and flagged for the proactive-reply layer.
    BufferedUrgent,
}

impl TriageOutcome {
    /// True for both buffered outcomes.
    pub fn is_buffered(&self) -> bool {
        !matches!(self, TriageOutcome::Discarded)
    }
}

/// Which store a retrieval query runs against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum SearchTarget {
    /// Curated knowledge entries (keyword index + vectors).
    Knowledge,
    /// Conversation summaries (vectors only).
    Conversation,
}

/// Which retrieval layer produced a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RetrievalOrigin {
    /// Matched via the in-memory inverted keyword index.
    Keyword,
    /// Matched via cosine nearest-neighbor over stored embeddings.
    Vector,
}

impl RetrievalOrigin {
    pub fn as_str(&self) -> &'static str {
        match self {
            RetrievalOrigin::Keyword => "keyword",
            RetrievalOrigin::Vector => "vector",
        }
    }
}

/// One message held in a group's expiring buffer.
///
/// `seq` is assigned by the buffer store at append time and increases
/// monotonically per group. Summarization drains by snapshotting messages
/// and later clearing only `seq <= high_seq`, so appends racing the
/// summary call are never lost.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BufferedMessage {
    /// Per-group sequence number, assigned on append (0 until then).
    pub seq: u64,
    /// Chat group this message belongs to.
    pub group_id: String,
    /// Platform identifier of the sender.
    pub sender_id: String,
    /// Message text.
    pub text: String,
    /// Importance score from triage, in [0, 1].
    pub score: f64,
    /// Unix timestamp (seconds) when the message was ingested.
    pub timestamp: f64,
    /// Whether this message counts toward the message-count trigger.
    pub counted_toward_summary: bool,
}

impl BufferedMessage {
    /// Build an unsequenced message; the buffer store assigns `seq` on append.
    pub fn new(
        group_id: impl Into<String>,
        sender_id: impl Into<String>,
        text: impl Into<String>,
        score: f64,
        timestamp: f64,
    ) -> Self {
        Self {
            seq: 0,
            group_id: group_id.into(),
            sender_id: sender_id.into(),
            text: text.into(),
            score,
            timestamp,
            counted_toward_summary: true,
        }
    }
}

/// Per-group trigger counters, read by the summarization scheduler.
#[derive(Debug, Clone, Copy, Default)]
pub struct TriggerState {
    /// Messages counted toward the summary trigger since the last summary.
    pub message_count: u64,
    /// Running token estimate (character count) since the last summary.
    pub token_estimate: u64,
    /// Token estimate recomputed over the live buffer contents.
    pub buffered_token_estimate: u64,
    /// Unix timestamp of the last completed summary (or first append).
    pub last_summary_at: f64,
    /// Number of messages currently held in the buffer.
    pub buffered: usize,
}

/// A stored summary of one span of group conversation.
#[derive(Debug, Clone)]
pub struct ConversationSummary {
    /// Row id (0 before insert).
    pub id: i64,
    pub group_id: String,
    pub summary_text: String,
    /// Embedding of `summary_text`; dimension is configured.
    pub embedding: Vec<f32>,
    /// Distinct sender ids of the summarized messages.
    pub participants: Vec<String>,
    /// Unix timestamp of the oldest summarized message.
    pub start_time: f64,
    /// Unix timestamp of the newest summarized message.
    pub end_time: f64,
    /// Importance assessed at creation, in [1, 5].
    pub importance_initial: i64,
    /// Decaying importance, in [0, 5]. Mutated only by the forgetting
    /// engine (decay, reset on fuzzify) and retrieval touch (boost).
    pub importance_current: f64,
    /// Unix timestamp of the last retrieval touch.
    pub last_accessed: f64,
    /// Whether the summary has been compressed to a one-line gist.
    pub is_fuzzy: bool,
    /// Unix timestamp of insertion.
    pub created_at: f64,
}

/// A curated knowledge entry.
#[derive(Debug, Clone)]
pub struct KnowledgeEntry {
    /// Row id (0 before insert).
    pub id: i64,
    pub category: String,
    /// Ordered keywords, deduplicated case-insensitively.
    pub keywords: Vec<String>,
    pub content: String,
    /// Embedding of `content`.
    pub embedding: Vec<f32>,
    pub notes: Option<String>,
    pub created_at: f64,
    /// Refreshed on every content mutation.
    pub updated_at: f64,
}

/// A named entity or attribute extracted by the summarizer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityRecord {
    pub user_id: String,
    pub group_id: String,
    /// Attribute name, e.g. "favorite_food".
    pub key: String,
    pub value: String,
    pub category: String,
    /// Importance in [1, 5].
    pub importance: i64,
}

/// One hybrid-search hit. Ephemeral; never persisted.
#[derive(Debug, Clone)]
pub struct RetrievalResult {
    /// Id of the matched knowledge entry or conversation summary.
    pub source_id: i64,
    pub content: String,
    /// Keyword match count (layer 1) or cosine similarity (layer 2).
    pub score: f64,
    pub origin: RetrievalOrigin,
}

/// Request sent to the external importance-scoring service.
#[derive(Debug, Clone, Serialize)]
pub struct ScoreRequest {
    pub message: String,
    /// Recent buffered messages joined for context.
    pub context: String,
    pub sender_id: String,
    pub group_id: String,
}

/// Request for one text completion.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub model: String,
    pub system_prompt: Option<String>,
    pub prompt: String,
    pub temperature: f64,
    pub max_tokens: u32,
}

/// Response from a completion client.
#[derive(Debug, Clone)]
pub struct CompletionResponse {
    pub content: String,
    pub model: String,
}

/// Input to an embedding operation.
#[derive(Debug, Clone)]
pub struct EmbeddingInput {
    pub texts: Vec<String>,
}

/// Output of an embedding operation.
#[derive(Debug, Clone)]
pub struct EmbeddingOutput {
    /// One vector per input text, in order.
    pub embeddings: Vec<Vec<f32>>,
    pub dimensions: usize,
}

/// Convert f32 vector to bytes for SQLite BLOB storage.
pub fn vec_to_blob(vec: &[f32]) -> Vec<u8> {
    vec.iter().flat_map(|f| f.to_le_bytes()).collect()
}

/// Convert SQLite BLOB back to f32 vector.
pub fn blob_to_vec(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|chunk| f32::from_le_bytes(chunk.try_into().unwrap()))
        .collect()
}

/// Compute cosine similarity between two vectors.
///
/// Stored vectors are not assumed normalized, so this divides by both
/// norms. Zero-norm or mismatched-length inputs yield 0.0.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}
