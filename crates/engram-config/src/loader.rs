// SPDX-FileCopyrightText: 2026 Engram Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered config merging.
//!
//! Supports XDG hierarchy: `./engram.toml` > `~/.config/engram/engram.toml` > `/etc/engram/engram.toml`
//! with environment variable overrides via `ENGRAM_` prefix.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::Path;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};

use crate::model::EngramConfig;

/// Load configuration from the standard XDG hierarchy with env var overrides.
///
/// Merge order (later overrides earlier):
/// 1. Compiled defaults
/// 2. `/etc/engram/engram.toml` (system-wide)
/// 3. `~/.config/engram/engram.toml` (user XDG config)
/// 4. `./engram.toml` (local directory)
/// 5. `ENGRAM_*` environment variables
pub fn load_config() -> Result<EngramConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(EngramConfig::default()))
        .merge(Toml::file("/etc/engram/engram.toml"))
        .merge(Toml::file(
            dirs::config_dir()
                .map(|d| d.join("engram/engram.toml"))
                .unwrap_or_default(),
        ))
        .merge(Toml::file("engram.toml"))
        .merge(env_provider())
        .extract()
}

/// Load configuration from a TOML string only (no XDG lookup, no env vars).
///
/// Used for testing and explicit config specification.
pub fn load_config_from_str(toml_content: &str) -> Result<EngramConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(EngramConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from a specific file path with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<EngramConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(EngramConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// Config sections recognized by the env var mapper.
const SECTIONS: &[&str] = &[
    "scoring",
    "triage",
    "buffer",
    "summary",
    "completion",
    "retrieval",
    "forgetting",
    "embedding",
    "storage",
];

/// Create the environment variable provider using explicit `map()` for section-to-dot mapping.
///
/// Uses `Env::map()` NOT `Env::split("_")` to avoid ambiguity with
/// underscore-containing key names. For example, `ENGRAM_SCORING_SERVICE_URL`
/// must map to `scoring.service_url`, not `scoring.service.url`. Only the
/// leading section name is rewritten, so `ENGRAM_COMPLETION_SUMMARY_MODEL`
/// maps to `completion.summary_model`.
fn env_provider() -> Env {
    Env::prefixed("ENGRAM_").map(|key| {
        // Figment lowercases keys only after the mapper runs, so the
        // raw env var casing arrives here.
        // Example: ENGRAM_SCORING_SERVICE_URL -> "SCORING_SERVICE_URL"
        let key_lower = key.as_str().to_ascii_lowercase();
        for section in SECTIONS {
            if let Some(rest) = key_lower.strip_prefix(*section) {
                if let Some(rest) = rest.strip_prefix('_') {
                    return format!("{section}.{rest}").into();
                }
            }
        }
        key_lower.into()
    })
}
