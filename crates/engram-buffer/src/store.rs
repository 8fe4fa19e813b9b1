// SPDX-FileCopyrightText: 2026 Engram Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `DashMap`-backed buffer store.

use std::collections::VecDeque;

use async_trait::async_trait;
use dashmap::DashMap;
use tracing::debug;

use engram_config::SharedConfig;
use engram_core::{BufferStore, BufferedMessage, EngramError, TriggerState};

/// Per-group buffer state. Trigger counters are running totals: they
/// survive capacity eviction and are only reduced via `consume`.
struct GroupState {
    messages: VecDeque<BufferedMessage>,
    next_seq: u64,
    message_count: u64,
    token_estimate: u64,
    /// Baseline for the time trigger. Set on first append so a group
    /// that never summarized still trips the elapsed threshold.
    last_summary_at: f64,
    last_activity: f64,
}

impl GroupState {
    fn new(now: f64) -> Self {
        Self {
            messages: VecDeque::new(),
            next_seq: 1,
            message_count: 0,
            token_estimate: 0,
            last_summary_at: now,
            last_activity: now,
        }
    }
}

/// In-memory [`BufferStore`] with bounded per-group queues.
pub struct MemoryBufferStore {
    groups: DashMap<String, GroupState>,
    config: SharedConfig,
}

impl MemoryBufferStore {
    pub fn new(config: SharedConfig) -> Self {
        Self {
            groups: DashMap::new(),
            config,
        }
    }
}

/// Token estimate for one message: its character count.
fn estimate_tokens(text: &str) -> u64 {
    text.chars().count() as u64
}

#[async_trait]
impl BufferStore for MemoryBufferStore {
    async fn push(&self, mut message: BufferedMessage) -> Result<u64, EngramError> {
        let capacity = self.config.get().buffer.capacity.max(1);
        let now = message.timestamp;
        let mut state = self
            .groups
            .entry(message.group_id.clone())
            .or_insert_with(|| GroupState::new(now));

        let seq = state.next_seq;
        state.next_seq += 1;
        message.seq = seq;

        while state.messages.len() >= capacity {
            let evicted = state.messages.pop_front();
            if let Some(evicted) = evicted {
                debug!(
                    group_id = %message.group_id,
                    seq = evicted.seq,
                    "buffer at capacity, evicting oldest message"
                );
            }
        }

        if message.counted_toward_summary {
            state.message_count += 1;
            state.token_estimate += estimate_tokens(&message.text);
        }
        state.last_activity = now;
        state.messages.push_back(message);

        Ok(seq)
    }

    async fn recent(
        &self,
        group_id: &str,
        limit: usize,
    ) -> Result<Vec<BufferedMessage>, EngramError> {
        let Some(state) = self.groups.get(group_id) else {
            return Ok(Vec::new());
        };
        let skip = state.messages.len().saturating_sub(limit);
        Ok(state.messages.iter().skip(skip).cloned().collect())
    }

    async fn snapshot(
        &self,
        group_id: &str,
        max: usize,
    ) -> Result<Vec<BufferedMessage>, EngramError> {
        let Some(state) = self.groups.get(group_id) else {
            return Ok(Vec::new());
        };
        Ok(state.messages.iter().take(max).cloned().collect())
    }

    async fn clear_drained(&self, group_id: &str, up_to_seq: u64) -> Result<usize, EngramError> {
        let Some(mut state) = self.groups.get_mut(group_id) else {
            return Ok(0);
        };
        let mut removed = 0;
        while state
            .messages
            .front()
            .is_some_and(|msg| msg.seq <= up_to_seq)
        {
            state.messages.pop_front();
            removed += 1;
        }
        Ok(removed)
    }

    async fn trigger_state(&self, group_id: &str) -> Result<TriggerState, EngramError> {
        let Some(state) = self.groups.get(group_id) else {
            return Ok(TriggerState::default());
        };
        Ok(TriggerState {
            message_count: state.message_count,
            token_estimate: state.token_estimate,
            buffered_token_estimate: state
                .messages
                .iter()
                .map(|msg| estimate_tokens(&msg.text))
                .sum(),
            last_summary_at: state.last_summary_at,
            buffered: state.messages.len(),
        })
    }

    async fn consume(
        &self,
        group_id: &str,
        drained_messages: u64,
        drained_tokens: u64,
        now: f64,
    ) -> Result<(), EngramError> {
        let Some(mut state) = self.groups.get_mut(group_id) else {
            return Ok(());
        };
        state.message_count = state.message_count.saturating_sub(drained_messages);
        state.token_estimate = state.token_estimate.saturating_sub(drained_tokens);
        state.last_summary_at = now;
        Ok(())
    }

    async fn active_groups(&self) -> Result<Vec<String>, EngramError> {
        Ok(self
            .groups
            .iter()
            .filter(|entry| !entry.messages.is_empty() || entry.message_count > 0)
            .map(|entry| entry.key().clone())
            .collect())
    }

    async fn expire_idle(&self, ttl_secs: u64, now: f64) -> Result<usize, EngramError> {
        let before = self.groups.len();
        self.groups
            .retain(|_, state| now - state.last_activity <= ttl_secs as f64);
        let expired = before - self.groups.len();
        if expired > 0 {
            debug!(expired, "dropped idle group buffers");
        }
        Ok(expired)
    }
}
