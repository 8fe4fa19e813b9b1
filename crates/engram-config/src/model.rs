// SPDX-FileCopyrightText: 2026 Engram Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for the Engram memory subsystem.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages. The loaded
//! struct is immutable; runtime reconfiguration goes through
//! [`crate::handle::SharedConfig`], which swaps the whole value atomically.

use serde::{Deserialize, Serialize};

/// Top-level Engram configuration.
///
/// Loaded from TOML files following XDG hierarchy, with environment variable
/// overrides. All sections are optional and default to sensible values.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct EngramConfig {
    /// Importance-scoring service settings.
    #[serde(default)]
    pub scoring: ScoringConfig,

    /// Ingestion triage thresholds and pre-score filters.
    #[serde(default)]
    pub triage: TriageConfig,

    /// Per-group message buffer settings.
    #[serde(default)]
    pub buffer: BufferConfig,

    /// Summarization scheduler settings.
    #[serde(default)]
    pub summary: SummaryConfig,

    /// Completion model profiles.
    #[serde(default)]
    pub completion: CompletionConfig,

    /// Hybrid retrieval settings.
    #[serde(default)]
    pub retrieval: RetrievalConfig,

    /// Forgetting engine settings.
    #[serde(default)]
    pub forgetting: ForgettingConfig,

    /// Embedding settings.
    #[serde(default)]
    pub embedding: EmbeddingConfig,

    /// Storage backend settings.
    #[serde(default)]
    pub storage: StorageConfig,
}

/// Importance-scoring service configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ScoringConfig {
    /// URL of the external scoring endpoint.
    #[serde(default = "default_scoring_url")]
    pub service_url: String,

    /// Per-request timeout in seconds.
    #[serde(default = "default_scoring_timeout_secs")]
    pub timeout_secs: f64,

    /// Total attempts per score request, including the first.
    #[serde(default = "default_scoring_max_attempts")]
    pub max_attempts: u32,

    /// Base retry backoff in milliseconds; doubles per retry.
    #[serde(default = "default_scoring_base_delay_ms")]
    pub base_delay_ms: u64,

    /// Neutral score substituted when the service is unreachable.
    #[serde(default = "default_score")]
    pub default_score: f64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            service_url: default_scoring_url(),
            timeout_secs: default_scoring_timeout_secs(),
            max_attempts: default_scoring_max_attempts(),
            base_delay_ms: default_scoring_base_delay_ms(),
            default_score: default_score(),
        }
    }
}

fn default_scoring_url() -> String {
    "http://localhost:8000/api/v1/score".to_string()
}

fn default_scoring_timeout_secs() -> f64 {
    2.0
}

fn default_scoring_max_attempts() -> u32 {
    3
}

fn default_scoring_base_delay_ms() -> u64 {
    500
}

fn default_score() -> f64 {
    0.5
}

/// Ingestion triage configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct TriageConfig {
    /// Messages scoring below this are discarded (0.0-1.0).
    #[serde(default = "default_low_threshold")]
    pub low_threshold: f64,

    /// Messages scoring at or above this are flagged urgent (0.0-1.0).
    #[serde(default = "default_urgent_threshold")]
    pub urgent_threshold: f64,

    /// Whether urgent messages count toward the message-count
    /// summarization trigger.
    #[serde(default = "default_count_urgent")]
    pub count_urgent_toward_summary: bool,

    /// Messages shorter than this (after trimming) are discarded
    /// without a scoring call. 0 disables the length filter.
    #[serde(default = "default_filter_min_chars")]
    pub filter_min_chars: usize,

    /// Messages exactly duplicating one of the last N buffered messages
    /// (case-insensitive) are discarded. 0 disables the repeat filter.
    #[serde(default = "default_filter_repeat_window")]
    pub filter_repeat_window: usize,
}

impl Default for TriageConfig {
    fn default() -> Self {
        Self {
            low_threshold: default_low_threshold(),
            urgent_threshold: default_urgent_threshold(),
            count_urgent_toward_summary: default_count_urgent(),
            filter_min_chars: default_filter_min_chars(),
            filter_repeat_window: default_filter_repeat_window(),
        }
    }
}

fn default_low_threshold() -> f64 {
    0.3
}

fn default_urgent_threshold() -> f64 {
    0.8
}

fn default_count_urgent() -> bool {
    true
}

fn default_filter_min_chars() -> usize {
    2
}

fn default_filter_repeat_window() -> usize {
    5
}

/// Per-group message buffer configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct BufferConfig {
    /// Maximum messages held per group; overflow evicts oldest-first.
    #[serde(default = "default_buffer_capacity")]
    pub capacity: usize,

    /// Seconds of inactivity before a group's buffer state is dropped.
    #[serde(default = "default_buffer_ttl_secs")]
    pub ttl_secs: u64,
}

impl Default for BufferConfig {
    fn default() -> Self {
        Self {
            capacity: default_buffer_capacity(),
            ttl_secs: default_buffer_ttl_secs(),
        }
    }
}

fn default_buffer_capacity() -> usize {
    200
}

fn default_buffer_ttl_secs() -> u64 {
    86400 // 24 hours
}

/// Token-counting basis for the token-estimate trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenCounting {
    /// Running counter, reduced by the drained messages' tokens on each
    /// successful summary.
    Drained,
    /// Recomputed from the live buffer contents at every poll.
    Buffer,
}

/// Summarization scheduler configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SummaryConfig {
    /// Poll interval in seconds.
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,

    /// Counted messages since the last summary that trigger a pass.
    #[serde(default = "default_message_threshold")]
    pub message_threshold: u64,

    /// Seconds since the last summary that trigger a pass.
    #[serde(default = "default_time_threshold_secs")]
    pub time_threshold_secs: u64,

    /// Estimated tokens since the last summary that trigger a pass.
    #[serde(default = "default_token_threshold")]
    pub token_threshold: u64,

    /// Maximum messages drained per summarization pass.
    #[serde(default = "default_summary_max_messages")]
    pub max_messages: usize,

    /// How the token estimate is computed ("drained" or "buffer").
    #[serde(default = "default_token_counting")]
    pub token_counting: TokenCounting,

    /// Recent stored summaries included as context in the prompt.
    #[serde(default = "default_context_summaries")]
    pub context_summaries: usize,

    /// Total completion attempts per summarization pass, including the first.
    #[serde(default = "default_summary_max_attempts")]
    pub max_attempts: u32,

    /// Base retry backoff in milliseconds; doubles per retry.
    #[serde(default = "default_summary_base_delay_ms")]
    pub base_delay_ms: u64,
}

impl Default for SummaryConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval_secs(),
            message_threshold: default_message_threshold(),
            time_threshold_secs: default_time_threshold_secs(),
            token_threshold: default_token_threshold(),
            max_messages: default_summary_max_messages(),
            token_counting: default_token_counting(),
            context_summaries: default_context_summaries(),
            max_attempts: default_summary_max_attempts(),
            base_delay_ms: default_summary_base_delay_ms(),
        }
    }
}

fn default_poll_interval_secs() -> u64 {
    300 // 5 minutes
}

fn default_message_threshold() -> u64 {
    50
}

fn default_time_threshold_secs() -> u64 {
    3600 // 1 hour
}

fn default_token_threshold() -> u64 {
    1000
}

fn default_summary_max_messages() -> usize {
    200
}

fn default_token_counting() -> TokenCounting {
    TokenCounting::Drained
}

fn default_context_summaries() -> usize {
    3
}

fn default_summary_max_attempts() -> u32 {
    3
}

fn default_summary_base_delay_ms() -> u64 {
    500
}

/// Completion model profiles.
///
/// The summarizer and the forgetting engine use the summary profile;
/// the chat profile is exposed for the owning agent's own calls.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct CompletionConfig {
    /// Model for chat-facing completions.
    #[serde(default = "default_chat_model")]
    pub chat_model: String,

    /// Sampling temperature for chat completions.
    #[serde(default = "default_chat_temperature")]
    pub chat_temperature: f64,

    /// Max tokens for chat completions.
    #[serde(default = "default_chat_max_tokens")]
    pub chat_max_tokens: u32,

    /// Model for summarization and gist compression.
    #[serde(default = "default_summary_model")]
    pub summary_model: String,

    /// Sampling temperature for summary completions.
    #[serde(default = "default_summary_temperature")]
    pub summary_temperature: f64,

    /// Max tokens for summary completions.
    #[serde(default = "default_summary_max_tokens")]
    pub summary_max_tokens: u32,
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            chat_model: default_chat_model(),
            chat_temperature: default_chat_temperature(),
            chat_max_tokens: default_chat_max_tokens(),
            summary_model: default_summary_model(),
            summary_temperature: default_summary_temperature(),
            summary_max_tokens: default_summary_max_tokens(),
        }
    }
}

fn default_chat_model() -> String {
    "claude-sonnet-4-20250514".to_string()
}

fn default_chat_temperature() -> f64 {
    0.7
}

fn default_chat_max_tokens() -> u32 {
    4096
}

fn default_summary_model() -> String {
    "claude-haiku-4-5-20250901".to_string()
}

fn default_summary_temperature() -> f64 {
    0.3
}

fn default_summary_max_tokens() -> u32 {
    2048
}

/// Hybrid retrieval configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RetrievalConfig {
    /// Max results from the keyword layer.
    #[serde(default = "default_layer1_limit")]
    pub layer1_limit: usize,

    /// Max results from the vector layer for the knowledge target.
    #[serde(default = "default_layer2_limit")]
    pub layer2_limit: usize,

    /// Hard cap on merged results per query.
    #[serde(default = "default_total_limit")]
    pub total_limit: usize,

    /// Minimum cosine similarity for vector-layer hits (0.0-1.0).
    #[serde(default = "default_retrieval_similarity_threshold")]
    pub similarity_threshold: f64,

    /// Multiplier applied to `importance_current` of touched
    /// conversation summaries, result clamped to 5.0.
    #[serde(default = "default_access_boost")]
    pub access_boost: f64,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            layer1_limit: default_layer1_limit(),
            layer2_limit: default_layer2_limit(),
            total_limit: default_total_limit(),
            similarity_threshold: default_retrieval_similarity_threshold(),
            access_boost: default_access_boost(),
        }
    }
}

fn default_layer1_limit() -> usize {
    3
}

fn default_layer2_limit() -> usize {
    2
}

fn default_total_limit() -> usize {
    5
}

fn default_retrieval_similarity_threshold() -> f64 {
    0.65
}

fn default_access_boost() -> f64 {
    1.1
}

/// Forgetting engine configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ForgettingConfig {
    /// Enable the scheduled forgetting pass.
    #[serde(default = "default_forgetting_enabled")]
    pub enabled: bool,

    /// Cron schedule for the pass (croner syntax).
    #[serde(default = "default_forgetting_schedule")]
    pub schedule: String,

    /// Summaries younger than this many days are exempt.
    #[serde(default = "default_min_age_days")]
    pub min_age_days: u32,

    /// Multiplier applied to `importance_current` per pass (0.0-1.0].
    #[serde(default = "default_decay_factor")]
    pub decay_factor: f64,

    /// Decayed summaries below this importance are fuzzified or deleted.
    #[serde(default = "default_importance_threshold")]
    pub importance_threshold: f64,

    /// Compress high-initial-importance summaries to a one-line gist
    /// instead of deleting them on their first trip below the threshold.
    #[serde(default = "default_fuzzify_high_value")]
    pub fuzzify_high_value: bool,
}

impl Default for ForgettingConfig {
    fn default() -> Self {
        Self {
            enabled: default_forgetting_enabled(),
            schedule: default_forgetting_schedule(),
            min_age_days: default_min_age_days(),
            decay_factor: default_decay_factor(),
            importance_threshold: default_importance_threshold(),
            fuzzify_high_value: default_fuzzify_high_value(),
        }
    }
}

fn default_forgetting_enabled() -> bool {
    true
}

fn default_forgetting_schedule() -> String {
    "0 2 * * *".to_string()
}

fn default_min_age_days() -> u32 {
    7
}

fn default_decay_factor() -> f64 {
    0.95
}

fn default_importance_threshold() -> f64 {
    3.0
}

fn default_fuzzify_high_value() -> bool {
    true
}

/// Embedding configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct EmbeddingConfig {
    /// Vector dimension; stores reject any other length.
    #[serde(default = "default_embedding_dimensions")]
    pub dimensions: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            dimensions: default_embedding_dimensions(),
        }
    }
}

fn default_embedding_dimensions() -> usize {
    512
}

/// Storage backend configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// Enable WAL (Write-Ahead Logging) mode for SQLite.
    #[serde(default = "default_wal_mode")]
    pub wal_mode: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            wal_mode: default_wal_mode(),
        }
    }
}

fn default_database_path() -> String {
    dirs::data_dir()
        .map(|p| p.join("engram").join("engram.db"))
        .unwrap_or_else(|| std::path::PathBuf::from("engram.db"))
        .to_string_lossy()
        .into_owned()
}

fn default_wal_mode() -> bool {
    true
}
