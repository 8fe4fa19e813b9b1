// SPDX-FileCopyrightText: 2026 Engram Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite-backed durable store for the Engram memory subsystem.
//!
//! Three tables: `conversations` (summaries with embeddings),
//! `knowledge` (curated entries with keyword sets and embeddings), and
//! `entities` (per-user attributes, upserted). Embeddings are stored as
//! little-endian f32 BLOBs; cosine nearest-neighbor runs in-process over
//! the stored vectors. All access goes through tokio-rusqlite's single
//! background connection, which serializes writes without blocking the
//! async runtime.

pub mod conversations;
pub mod database;
pub mod entities;
pub mod knowledge;

pub use conversations::ConversationStore;
pub use database::{open_database, open_in_memory};
pub use entities::EntityStore;
pub use knowledge::{KnowledgeStore, KnowledgeUpdate};

/// Helper to convert tokio_rusqlite errors into EngramError::Storage.
pub(crate) fn storage_err(e: tokio_rusqlite::Error) -> engram_core::EngramError {
    engram_core::EngramError::Storage {
        source: Box::new(e),
    }
}
