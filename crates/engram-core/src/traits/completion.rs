// SPDX-FileCopyrightText: 2026 Engram Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Text-completion client trait.

use async_trait::async_trait;

use crate::error::EngramError;
use crate::types::{CompletionRequest, CompletionResponse};

/// Produces one text completion for a prompt.
///
/// The summarizer and the forgetting engine both call this with their
/// own model profiles from configuration.
#[async_trait]
pub trait CompletionClient: Send + Sync + 'static {
    async fn complete(
        &self,
        request: CompletionRequest,
    ) -> Result<CompletionResponse, EngramError>;
}
