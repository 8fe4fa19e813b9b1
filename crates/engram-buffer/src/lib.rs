// SPDX-FileCopyrightText: 2026 Engram Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-process implementation of the per-group message buffer.
//!
//! Backed by a `DashMap` of group states, so ingestion across groups
//! never contends on a single lock. Shard guards are held only for the
//! duration of one synchronous operation, never across an await point.

mod store;

pub use store::MemoryBufferStore;
