// SPDX-FileCopyrightText: 2026 Engram Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.
//!
//! Validates semantic constraints that cannot be expressed via serde
//! attributes, such as threshold ranges, cron syntax, and ordering
//! between related values.

use std::str::FromStr;

use crate::diagnostic::ConfigError;
use crate::model::EngramConfig;

/// Validate a deserialized configuration for semantic correctness.
///
/// Returns `Ok(())` if all validations pass, or `Err(Vec<ConfigError>)` with
/// all collected validation errors (does not fail fast).
pub fn validate_config(config: &EngramConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    let mut check_unit = |key: &str, value: f64| {
        if !(0.0..=1.0).contains(&value) {
            errors.push(ConfigError::Validation {
                message: format!("{key} must be in [0.0, 1.0], got {value}"),
            });
        }
    };

    check_unit("triage.low_threshold", config.triage.low_threshold);
    check_unit("triage.urgent_threshold", config.triage.urgent_threshold);
    check_unit("scoring.default_score", config.scoring.default_score);
    check_unit(
        "retrieval.similarity_threshold",
        config.retrieval.similarity_threshold,
    );

    if config.triage.low_threshold >= config.triage.urgent_threshold {
        errors.push(ConfigError::Validation {
            message: format!(
                "triage.low_threshold ({}) must be below triage.urgent_threshold ({})",
                config.triage.low_threshold, config.triage.urgent_threshold
            ),
        });
    }

    if config.scoring.service_url.trim().is_empty() {
        errors.push(ConfigError::Validation {
            message: "scoring.service_url must not be empty".to_string(),
        });
    }

    if config.scoring.timeout_secs <= 0.0 {
        errors.push(ConfigError::Validation {
            message: format!(
                "scoring.timeout_secs must be positive, got {}",
                config.scoring.timeout_secs
            ),
        });
    }

    if config.scoring.max_attempts == 0 {
        errors.push(ConfigError::Validation {
            message: "scoring.max_attempts must be at least 1".to_string(),
        });
    }

    if config.buffer.capacity == 0 {
        errors.push(ConfigError::Validation {
            message: "buffer.capacity must be at least 1".to_string(),
        });
    }

    if config.summary.max_messages == 0 {
        errors.push(ConfigError::Validation {
            message: "summary.max_messages must be at least 1".to_string(),
        });
    }

    if config.summary.poll_interval_secs == 0 {
        errors.push(ConfigError::Validation {
            message: "summary.poll_interval_secs must be at least 1".to_string(),
        });
    }

    if config.retrieval.total_limit == 0 {
        errors.push(ConfigError::Validation {
            message: "retrieval.total_limit must be at least 1".to_string(),
        });
    }

    if config.retrieval.access_boost < 1.0 {
        errors.push(ConfigError::Validation {
            message: format!(
                "retrieval.access_boost must be at least 1.0, got {}",
                config.retrieval.access_boost
            ),
        });
    }

    if !(config.forgetting.decay_factor > 0.0 && config.forgetting.decay_factor <= 1.0) {
        errors.push(ConfigError::Validation {
            message: format!(
                "forgetting.decay_factor must be in (0.0, 1.0], got {}",
                config.forgetting.decay_factor
            ),
        });
    }

    if !(0.0..=5.0).contains(&config.forgetting.importance_threshold) {
        errors.push(ConfigError::Validation {
            message: format!(
                "forgetting.importance_threshold must be in [0.0, 5.0], got {}",
                config.forgetting.importance_threshold
            ),
        });
    }

    if let Err(err) = croner::Cron::from_str(&config.forgetting.schedule) {
        errors.push(ConfigError::Validation {
            message: format!(
                "forgetting.schedule `{}` is not a valid cron expression: {err}",
                config.forgetting.schedule
            ),
        });
    }

    if config.embedding.dimensions == 0 {
        errors.push(ConfigError::Validation {
            message: "embedding.dimensions must be at least 1".to_string(),
        });
    }

    if config.storage.database_path.trim().is_empty() {
        errors.push(ConfigError::Validation {
            message: "storage.database_path must not be empty".to_string(),
        });
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
