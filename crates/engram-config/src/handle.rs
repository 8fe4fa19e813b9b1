// SPDX-FileCopyrightText: 2026 Engram Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Shared, hot-swappable configuration handle.
//!
//! The loaded [`EngramConfig`] is immutable. Runtime reconfiguration
//! replaces the whole value: a new config is loaded, validated, and then
//! swapped in atomically. Readers take a cheap snapshot per operation,
//! so a swap never tears values mid-operation.

use std::sync::Arc;

use arc_swap::ArcSwap;

use crate::model::EngramConfig;

/// Cloneable handle to the current configuration.
#[derive(Clone)]
pub struct SharedConfig {
    inner: Arc<ArcSwap<EngramConfig>>,
}

impl SharedConfig {
    /// Wrap an already-validated configuration.
    pub fn new(config: EngramConfig) -> Self {
        Self {
            inner: Arc::new(ArcSwap::from_pointee(config)),
        }
    }

    /// Snapshot the current configuration.
    ///
    /// The returned `Arc` stays valid across swaps; callers should hold
    /// it for the duration of one logical operation and re-read next time.
    pub fn get(&self) -> Arc<EngramConfig> {
        self.inner.load_full()
    }

    /// Atomically replace the configuration. Callers must validate the
    /// new value first; this method does no checking.
    pub fn swap(&self, config: EngramConfig) -> Arc<EngramConfig> {
        self.inner.swap(Arc::new(config))
    }
}

impl std::fmt::Debug for SharedConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedConfig").finish_non_exhaustive()
    }
}
