// SPDX-FileCopyrightText: 2026 Engram Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Buffer store trait: a key-scoped, bounded, expiring message queue.

use async_trait::async_trait;

use crate::error::EngramError;
use crate::types::{BufferedMessage, TriggerState};

/// Per-group short-term message buffer.
///
/// Semantics every implementation must honor:
///
/// - append order is preserved; overflow evicts oldest-first;
/// - `push` assigns a per-group monotonically increasing `seq`;
/// - `clear_drained(group, up_to_seq)` removes only messages with
///   `seq <= up_to_seq`, so appends racing a summarization pass survive;
/// - trigger counters accumulate on counted pushes and are reduced via
///   `consume` after a successful summary.
#[async_trait]
pub trait BufferStore: Send + Sync + 'static {
    /// Append a message, evicting the oldest entry if the group is at
    /// capacity. Returns the assigned sequence number.
    async fn push(&self, message: BufferedMessage) -> Result<u64, EngramError>;

    /// The newest `limit` messages in chronological order.
    async fn recent(
        &self,
        group_id: &str,
        limit: usize,
    ) -> Result<Vec<BufferedMessage>, EngramError>;

    /// The oldest `max` messages in chronological order, with their
    /// assigned sequence numbers. Does not remove anything.
    async fn snapshot(
        &self,
        group_id: &str,
        max: usize,
    ) -> Result<Vec<BufferedMessage>, EngramError>;

    /// Remove every buffered message with `seq <= up_to_seq`. Returns
    /// the number removed.
    async fn clear_drained(&self, group_id: &str, up_to_seq: u64) -> Result<usize, EngramError>;

    /// Current trigger counters for the group. Unknown groups yield the
    /// default (all-zero) state.
    async fn trigger_state(&self, group_id: &str) -> Result<TriggerState, EngramError>;

    /// Reduce trigger counters by the drained amounts and stamp
    /// `last_summary_at = now`.
    async fn consume(
        &self,
        group_id: &str,
        drained_messages: u64,
        drained_tokens: u64,
        now: f64,
    ) -> Result<(), EngramError>;

    /// Groups with buffered messages or nonzero counters.
    async fn active_groups(&self) -> Result<Vec<String>, EngramError>;

    /// Drop state for groups idle longer than `ttl_secs`. Returns the
    /// number of groups expired.
    async fn expire_idle(&self, ttl_secs: u64, now: f64) -> Result<usize, EngramError>;
}
