// SPDX-FileCopyrightText: 2026 Engram Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Integration tests for the Engram configuration system.

use engram_config::diagnostic::{suggest_key, ConfigError};
use engram_config::model::EngramConfig;
use engram_config::{load_and_validate_str, load_config_from_str, SharedConfig, TokenCounting};

/// Valid TOML with all known sections deserializes successfully.
#[test]
fn valid_toml_deserializes_into_engram_config() {
    let toml = r#"
[scoring]
service_url = "http://scoring.internal:9000/score"
timeout_secs = 1.5
default_score = 0.4

[triage]
low_threshold = 0.25
urgent_threshold = 0.85
filter_min_chars = 3

[buffer]
capacity = 100
ttl_secs = 7200

[summary]
message_threshold = 40
time_threshold_secs = 1800
token_threshold = 800
token_counting = "buffer"

[retrieval]
layer1_limit = 4
total_limit = 6
similarity_threshold = 0.7

[forgetting]
schedule = "0 3 * * *"
min_age_days = 14
decay_factor = 0.9

[embedding]
dimensions = 384

[storage]
database_path = "/tmp/engram-test.db"
wal_mode = false
"#;

    let config = load_config_from_str(toml).expect("valid TOML should deserialize");
    assert_eq!(
        config.scoring.service_url,
        "http://scoring.internal:9000/score"
    );
    assert_eq!(config.scoring.timeout_secs, 1.5);
    assert_eq!(config.scoring.default_score, 0.4);
    assert_eq!(config.triage.low_threshold, 0.25);
    assert_eq!(config.triage.urgent_threshold, 0.85);
    assert_eq!(config.triage.filter_min_chars, 3);
    assert_eq!(config.buffer.capacity, 100);
    assert_eq!(config.buffer.ttl_secs, 7200);
    assert_eq!(config.summary.message_threshold, 40);
    assert_eq!(config.summary.token_counting, TokenCounting::Buffer);
    assert_eq!(config.retrieval.layer1_limit, 4);
    assert_eq!(config.retrieval.total_limit, 6);
    assert_eq!(config.forgetting.schedule, "0 3 * * *");
    assert_eq!(config.forgetting.min_age_days, 14);
    assert_eq!(config.embedding.dimensions, 384);
    assert_eq!(config.storage.database_path, "/tmp/engram-test.db");
    assert!(!config.storage.wal_mode);
}

/// Missing optional sections use defaults without error.
#[test]
fn missing_optional_sections_use_defaults() {
    let config = load_config_from_str("").expect("empty TOML should use defaults");

    assert_eq!(config.scoring.service_url, "http://localhost:8000/api/v1/score");
    assert_eq!(config.scoring.timeout_secs, 2.0);
    assert_eq!(config.scoring.max_attempts, 3);
    assert_eq!(config.scoring.default_score, 0.5);
    assert_eq!(config.triage.low_threshold, 0.3);
    assert_eq!(config.triage.urgent_threshold, 0.8);
    assert!(config.triage.count_urgent_toward_summary);
    assert_eq!(config.buffer.capacity, 200);
    assert_eq!(config.summary.poll_interval_secs, 300);
    assert_eq!(config.summary.message_threshold, 50);
    assert_eq!(config.summary.time_threshold_secs, 3600);
    assert_eq!(config.summary.token_threshold, 1000);
    assert_eq!(config.summary.max_messages, 200);
    assert_eq!(config.summary.token_counting, TokenCounting::Drained);
    assert_eq!(config.retrieval.layer1_limit, 3);
    assert_eq!(config.retrieval.layer2_limit, 2);
    assert_eq!(config.retrieval.total_limit, 5);
    assert_eq!(config.retrieval.similarity_threshold, 0.65);
    assert_eq!(config.retrieval.access_boost, 1.1);
    assert!(config.forgetting.enabled);
    assert_eq!(config.forgetting.schedule, "0 2 * * *");
    assert_eq!(config.forgetting.min_age_days, 7);
    assert_eq!(config.forgetting.decay_factor, 0.95);
    assert_eq!(config.forgetting.importance_threshold, 3.0);
    assert!(config.forgetting.fuzzify_high_value);
    assert_eq!(config.embedding.dimensions, 512);
    assert!(config.storage.wal_mode);
}

/// Unknown field in a section is rejected by deny_unknown_fields.
#[test]
fn unknown_field_in_section_produces_error() {
    let toml = r#"
[triage]
low_treshold = 0.3
"#;

    let err = load_config_from_str(toml).expect_err("should reject unknown field");
    let err_str = format!("{err}");
    assert!(
        err_str.contains("unknown field") || err_str.contains("low_treshold"),
        "error should mention unknown field or the bad key, got: {err_str}"
    );
}

/// Unexpected top-level section is rejected by deny_unknown_fields.
#[test]
fn deny_unknown_fields_at_top_level() {
    let toml = r#"
[metrics]
enabled = true
"#;

    let err =
        load_config_from_str(toml).expect_err("unknown top-level section should be rejected");
    let err_str = format!("{err}");
    assert!(
        err_str.contains("unknown field") || err_str.contains("metrics"),
        "error should mention unknown field, got: {err_str}"
    );
}

/// Invalid token_counting value is rejected.
#[test]
fn invalid_token_counting_variant_rejected() {
    let toml = r#"
[summary]
token_counting = "sliding"
"#;

    assert!(load_config_from_str(toml).is_err());
}

/// Dot-notation override (how env vars land after mapping) wins over TOML.
#[test]
fn override_wins_over_toml() {
    use figment::{
        providers::{Format, Serialized, Toml},
        Figment,
    };

    let toml_content = r#"
[buffer]
capacity = 100
"#;

    let config: EngramConfig = Figment::new()
        .merge(Serialized::defaults(EngramConfig::default()))
        .merge(Toml::string(toml_content))
        .merge(("buffer.capacity", 25))
        .extract()
        .expect("should merge override");

    assert_eq!(config.buffer.capacity, 25);
}

/// ENGRAM_* variables land through the section mapper and override file
/// values, including keys whose tail contains underscores.
#[test]
fn env_vars_override_file_values() {
    figment::Jail::expect_with(|jail| {
        jail.create_file(
            "engram.toml",
            r#"
[buffer]
capacity = 100
"#,
        )?;
        jail.set_env("ENGRAM_BUFFER_CAPACITY", "25");
        jail.set_env("ENGRAM_SCORING_SERVICE_URL", "http://override:9000/score");
        jail.set_env("ENGRAM_COMPLETION_SUMMARY_MODEL", "tiny-model");

        let path = std::path::Path::new("engram.toml");
        let config = engram_config::load_config_from_path(path)?;
        assert_eq!(config.buffer.capacity, 25);
        assert_eq!(config.scoring.service_url, "http://override:9000/score");
        assert_eq!(config.completion.summary_model, "tiny-model");
        Ok(())
    });
}

/// Env keys outside any known section are rejected, not silently dropped.
#[test]
fn unknown_env_key_is_rejected() {
    figment::Jail::expect_with(|jail| {
        jail.create_file("engram.toml", "")?;
        jail.set_env("ENGRAM_METRICS_ENABLED", "true");

        let path = std::path::Path::new("engram.toml");
        assert!(engram_config::load_config_from_path(path).is_err());
        Ok(())
    });
}

/// Missing config files are silently skipped (Figment's Toml::file() behavior).
#[test]
fn missing_config_files_silently_skipped() {
    use figment::{
        providers::{Format, Serialized, Toml},
        Figment,
    };

    let config: EngramConfig = Figment::new()
        .merge(Serialized::defaults(EngramConfig::default()))
        .merge(Toml::file("/nonexistent/path/engram.toml"))
        .extract()
        .expect("missing file should be silently skipped");

    assert_eq!(config.buffer.capacity, 200);
}

/// Unknown key produces an UnknownKey diagnostic with a suggestion.
#[test]
fn diagnostic_error_includes_unknown_key() {
    let toml = r#"
[buffer]
capasity = 100
"#;

    let errors = load_and_validate_str(toml).expect_err("should produce errors");
    assert!(!errors.is_empty(), "should have at least one error");

    let has_unknown_key = errors.iter().any(|e| {
        matches!(e, ConfigError::UnknownKey { key, suggestion, valid_keys, .. } if {
            key == "capasity"
                && suggestion.as_deref() == Some("capacity")
                && valid_keys.contains("ttl_secs")
        })
    });
    assert!(
        has_unknown_key,
        "should have UnknownKey error for 'capasity' with suggestion 'capacity', got: {errors:?}"
    );
}

/// No suggestion when nothing is close.
#[test]
fn diagnostic_no_suggestion_for_distant_typo() {
    let valid_keys = &["capacity", "ttl_secs"];
    assert!(suggest_key("qqqqqqq", valid_keys).is_none());
}

/// Out-of-range values pass deserialization but fail validation.
#[test]
fn validation_catches_out_of_range_threshold() {
    let toml = r#"
[retrieval]
similarity_threshold = 1.4
"#;

    let errors = load_and_validate_str(toml).expect_err("out-of-range threshold should fail");
    let has_validation_error = errors.iter().any(|e| {
        matches!(e, ConfigError::Validation { message } if message.contains("similarity_threshold"))
    });
    assert!(has_validation_error, "got: {errors:?}");
}

/// Unparseable cron schedules fail at load time, not at first run.
#[test]
fn validation_catches_bad_cron_schedule() {
    let toml = r#"
[forgetting]
schedule = "nightly"
"#;

    let errors = load_and_validate_str(toml).expect_err("bad cron should fail");
    let has_validation_error = errors.iter().any(
        |e| matches!(e, ConfigError::Validation { message } if message.contains("schedule")),
    );
    assert!(has_validation_error, "got: {errors:?}");
}

/// ConfigError implements miette::Diagnostic and renders.
#[test]
fn config_error_renders_with_miette() {
    use miette::GraphicalReportHandler;

    let error = ConfigError::UnknownKey {
        key: "capasity".to_string(),
        suggestion: Some("capacity".to_string()),
        valid_keys: "capacity, ttl_secs".to_string(),
        span: None,
        src: None,
    };

    let handler = GraphicalReportHandler::new();
    let mut buf = String::new();
    handler
        .render_report(&mut buf, &error)
        .expect("should render without error");
    assert!(buf.contains("capasity"), "rendered report should mention the key");
}

/// Swapping the shared handle changes what subsequent reads observe.
#[test]
fn shared_config_swap_changes_observed_thresholds() {
    let initial = load_and_validate_str("").expect("defaults should validate");
    let shared = SharedConfig::new(initial);
    assert_eq!(shared.get().triage.low_threshold, 0.3);

    let updated = load_and_validate_str(
        r#"
[triage]
low_threshold = 0.5
"#,
    )
    .expect("updated config should validate");
    shared.swap(updated);

    assert_eq!(shared.get().triage.low_threshold, 0.5);
}
