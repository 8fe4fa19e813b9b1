// SPDX-FileCopyrightText: 2026 Engram Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock collaborators shared across Engram test suites.
//!
//! Each mock is FIFO: queue canned responses up front, then assert on
//! the recorded calls afterwards.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use engram_core::{
    CompletionClient, CompletionRequest, CompletionResponse, Embedder, EmbeddingInput,
    EmbeddingOutput, EngramError, ScoreRequest, ScoringClient,
};

/// Scoring client with a FIFO queue of canned results.
///
/// An empty queue yields 0.5, the neutral score.
#[derive(Default)]
pub struct MockScoringClient {
    queue: Mutex<VecDeque<Result<f64, String>>>,
    calls: AtomicUsize,
}

impl MockScoringClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a successful score for the next call.
    pub fn push_score(&self, score: f64) {
        self.queue.lock().unwrap().push_back(Ok(score));
    }

    /// Queue a failure for the next call.
    pub fn fail_next(&self, message: impl Into<String>) {
        self.queue.lock().unwrap().push_back(Err(message.into()));
    }

    /// Number of score calls made so far.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ScoringClient for MockScoringClient {
    async fn score(&self, _request: ScoreRequest) -> Result<f64, EngramError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.queue.lock().unwrap().pop_front() {
            Some(Ok(score)) => Ok(score),
            Some(Err(message)) => Err(EngramError::Scoring {
                message,
                source: None,
            }),
            None => Ok(0.5),
        }
    }
}

/// Completion client with a FIFO queue of canned results.
///
/// An empty queue is an error, so tests fail loudly on unexpected calls.
#[derive(Default)]
pub struct MockCompletionClient {
    queue: Mutex<VecDeque<Result<String, String>>>,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl MockCompletionClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a successful completion for the next call.
    pub fn push_response(&self, content: impl Into<String>) {
        self.queue.lock().unwrap().push_back(Ok(content.into()));
    }

    /// Queue a failure for the next call.
    pub fn push_error(&self, message: impl Into<String>) {
        self.queue.lock().unwrap().push_back(Err(message.into()));
    }

    /// Number of complete calls made so far.
    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    /// The most recent request, if any call was made.
    pub fn last_request(&self) -> Option<CompletionRequest> {
        self.requests.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl CompletionClient for MockCompletionClient {
    async fn complete(
        &self,
        request: CompletionRequest,
    ) -> Result<CompletionResponse, EngramError> {
        let model = request.model.clone();
        self.requests.lock().unwrap().push(request);
        match self.queue.lock().unwrap().pop_front() {
            Some(Ok(content)) => Ok(CompletionResponse { content, model }),
            Some(Err(message)) => Err(EngramError::Completion {
                message,
                source: None,
            }),
            None => Err(EngramError::Completion {
                message: "no queued mock response".to_string(),
                source: None,
            }),
        }
    }
}

/// Deterministic embedder: hashes the text into a seed and expands it
/// into a pseudo-random vector. Equal texts embed equally,
/// distinct texts almost surely do not.
pub struct HashEmbedder {
    dimensions: usize,
}

impl HashEmbedder {
    pub fn new(dimensions: usize) -> Self {
        Self { dimensions }
    }

    fn vector_for(&self, text: &str) -> Vec<f32> {
        // FNV-1a seed, then an LCG per component.
        let mut state: u64 = 0xcbf2_9ce4_8422_2325;
        for byte in text.as_bytes() {
            state ^= u64::from(*byte);
            state = state.wrapping_mul(0x1000_0000_01b3);
        }
        let mut vector = Vec::with_capacity(self.dimensions);
        for _ in 0..self.dimensions {
            state = state
                .wrapping_mul(6_364_136_223_846_793_005)
                .wrapping_add(1_442_695_040_888_963_407);
            let unit = ((state >> 33) as f32) / ((1u64 << 31) as f32) - 1.0;
            vector.push(unit);
        }
        // A zero vector would break cosine similarity.
        if self.dimensions > 0 && vector.iter().all(|v| *v == 0.0) {
            vector[0] = 1.0;
        }
        vector
    }
}

#[async_trait]
impl Embedder for HashEmbedder {
    async fn embed(&self, input: EmbeddingInput) -> Result<EmbeddingOutput, EngramError> {
        Ok(EmbeddingOutput {
            embeddings: input.texts.iter().map(|t| self.vector_for(t)).collect(),
            dimensions: self.dimensions,
        })
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}
