// SPDX-FileCopyrightText: 2026 Engram Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Embedding trait.

use async_trait::async_trait;

use crate::error::EngramError;
use crate::types::{EmbeddingInput, EmbeddingOutput};

/// Maps texts to fixed-dimension vectors.
///
/// The dimension must match `embedding.dimensions` in configuration;
/// stores reject vectors of any other length.
#[async_trait]
pub trait Embedder: Send + Sync + 'static {
    async fn embed(&self, input: EmbeddingInput) -> Result<EmbeddingOutput, EngramError>;

    /// The dimension of vectors this embedder produces.
    fn dimensions(&self) -> usize;
}
