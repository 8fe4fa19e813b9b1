// SPDX-FileCopyrightText: 2026 Engram Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Memory lifecycle engine for the Engram subsystem.
//!
//! Wires the collaborator traits from `engram-core` into the full
//! pipeline: ingestion triage with external scoring, per-group
//! buffering, the summarization scheduler, hybrid keyword + vector
//! retrieval, and the scheduled forgetting pass. Everything hangs off
//! one [`MemoryEngine`] built at startup from explicit dependencies;
//! there are no global singletons.

pub mod engine;
pub mod forgetting;
pub mod keyword_index;
pub mod retriever;
pub mod scoring;
pub mod summarizer;

pub use engine::MemoryEngine;
pub use forgetting::{ForgettingEngine, PassStats};
pub use retriever::HybridRetriever;
pub use scoring::HttpScoringClient;
pub use summarizer::SummaryScheduler;

/// Current wall-clock time as unix seconds.
pub(crate) fn unix_now() -> f64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}
