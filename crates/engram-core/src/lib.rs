// SPDX-FileCopyrightText: 2026 Engram Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the Engram conversational-memory subsystem.
//!
//! This crate provides the trait definitions, error type, and domain
//! types shared across the Engram workspace. All collaborator services
//! (scoring, completion, embedding, buffering) implement traits defined
//! here and are injected into the engine at construction time.

pub mod error;
pub mod retry;
pub mod traits;
pub mod types;

// Re-export key items at crate root for ergonomic imports.
pub use error::EngramError;
pub use retry::RetryPolicy;
pub use traits::{BufferStore, CompletionClient, Embedder, ScoringClient};
pub use types::{
    BufferedMessage, CompletionRequest, CompletionResponse, ConversationSummary,
    EmbeddingInput, EmbeddingOutput, EntityRecord, KnowledgeEntry, RetrievalOrigin,
    RetrievalResult, ScoreRequest, SearchTarget, TriageOutcome, TriggerState,
};
