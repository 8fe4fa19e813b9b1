// SPDX-FileCopyrightText: 2026 Engram Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Collaborator traits for the memory engine.
//!
//! Every external dependency of the engine (scoring service, completion
//! service, embedding model, buffer backend) sits behind one of these
//! traits and is injected at construction time.

pub mod buffer;
pub mod completion;
pub mod embedding;
pub mod scoring;

pub use buffer::BufferStore;
pub use completion::CompletionClient;
pub use embedding::Embedder;
pub use scoring::ScoringClient;
