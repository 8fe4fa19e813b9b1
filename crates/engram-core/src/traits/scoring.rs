// SPDX-FileCopyrightText: 2026 Engram Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Importance-scoring client trait.

use async_trait::async_trait;

use crate::error::EngramError;
use crate::types::ScoreRequest;

/// Scores one message for conversational importance.
///
/// Implementations return a value in [0, 1]. Callers treat `Err` as
/// recoverable: triage substitutes the configured neutral default rather
/// than dropping or failing the ingestion.
#[async_trait]
pub trait ScoringClient: Send + Sync + 'static {
    async fn score(&self, request: ScoreRequest) -> Result<f64, EngramError>;
}
