// SPDX-FileCopyrightText: 2026 Engram Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP client for the external importance-scoring service.
//!
//! The service is advisory: when it is unreachable or slow, scoring
//! degrades to the configured neutral default instead of surfacing an
//! error, so ingestion is never blocked on it.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, warn};

use engram_config::SharedConfig;
use engram_core::{EngramError, RetryPolicy, ScoreRequest, ScoringClient};

/// Upper bound on a single retry backoff.
const MAX_BACKOFF: Duration = Duration::from_secs(10);

#[derive(Debug, Deserialize)]
struct ScoreResponse {
    score: f64,
}

/// Reqwest-backed [`ScoringClient`].
///
/// POSTs the score request as JSON to `scoring.service_url` with the
/// configured timeout, retrying transient failures per the configured
/// policy. Exhausted retries yield `Ok(scoring.default_score)`.
pub struct HttpScoringClient {
    client: reqwest::Client,
    config: SharedConfig,
}

impl HttpScoringClient {
    pub fn new(config: SharedConfig) -> Result<Self, EngramError> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| EngramError::Scoring {
                message: format!("failed to build HTTP client: {e}"),
                source: Some(Box::new(e)),
            })?;
        Ok(Self { client, config })
    }

    async fn request_score(
        &self,
        url: &str,
        timeout: Duration,
        request: &ScoreRequest,
    ) -> Result<f64, EngramError> {
        let response = self
            .client
            .post(url)
            .timeout(timeout)
            .json(request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    EngramError::Timeout { duration: timeout }
                } else {
                    EngramError::Scoring {
                        message: format!("HTTP request failed: {e}"),
                        source: Some(Box::new(e)),
                    }
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(EngramError::Scoring {
                message: format!("scoring service returned {status}: {body}"),
                source: None,
            });
        }

        let parsed: ScoreResponse = response.json().await.map_err(|e| EngramError::Scoring {
            message: format!("failed to parse score response: {e}"),
            source: Some(Box::new(e)),
        })?;

        Ok(parsed.score.clamp(0.0, 1.0))
    }
}

#[async_trait]
impl ScoringClient for HttpScoringClient {
    async fn score(&self, request: ScoreRequest) -> Result<f64, EngramError> {
        let cfg = self.config.get();
        let url = cfg.scoring.service_url.clone();
        let timeout = Duration::from_secs_f64(cfg.scoring.timeout_secs.max(0.001));
        let policy = RetryPolicy::new(
            cfg.scoring.max_attempts,
            Duration::from_millis(cfg.scoring.base_delay_ms),
            MAX_BACKOFF,
        );

        let result = policy
            .run("score", || self.request_score(&url, timeout, &request))
            .await;

        match result {
            Ok(score) => {
                debug!(group_id = %request.group_id, score, "message scored");
                Ok(score)
            }
            Err(err) => {
                warn!(
                    group_id = %request.group_id,
                    error = %err,
                    default_score = cfg.scoring.default_score,
                    "scoring unavailable, using neutral default"
                );
                Ok(cfg.scoring.default_score)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use engram_config::EngramConfig;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config_for(server_uri: &str) -> SharedConfig {
        let mut config = EngramConfig::default();
        config.scoring.service_url = format!("{server_uri}/api/v1/score");
        config.scoring.base_delay_ms = 5;
        config.scoring.timeout_secs = 1.0;
        SharedConfig::new(config)
    }

    fn request() -> ScoreRequest {
        ScoreRequest {
            message: "are you free on friday?".to_string(),
            context: "alice: hi\nbob: hello".to_string(),
            sender_id: "alice".to_string(),
            group_id: "g1".to_string(),
        }
    }

    #[tokio::test]
    async fn parses_score_from_response() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v1/score"))
            .and(body_partial_json(serde_json::json!({
                "message": "are you free on friday?",
                "group_id": "g1"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "score": 0.72
            })))
            .mount(&server)
            .await;

        let client = HttpScoringClient::new(config_for(&server.uri())).unwrap();
        let score = client.score(request()).await.unwrap();
        assert_eq!(score, 0.72);
    }

    #[tokio::test]
    async fn clamps_out_of_range_scores() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "score": 3.5
            })))
            .mount(&server)
            .await;

        let client = HttpScoringClient::new(config_for(&server.uri())).unwrap();
        assert_eq!(client.score(request()).await.unwrap(), 1.0);
    }

    #[tokio::test]
    async fn retries_then_succeeds() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .up_to_n_times(2)
            .expect(2)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "score": 0.9
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = HttpScoringClient::new(config_for(&server.uri())).unwrap();
        assert_eq!(client.score(request()).await.unwrap(), 0.9);
    }

    #[tokio::test]
    async fn exhausted_retries_yield_default_score() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503))
            .expect(3)
            .mount(&server)
            .await;

        let client = HttpScoringClient::new(config_for(&server.uri())).unwrap();
        assert_eq!(client.score(request()).await.unwrap(), 0.5);
    }

    #[tokio::test]
    async fn unreachable_host_yields_default_score() {
        // Port 1 is never listening.
        let client = HttpScoringClient::new(config_for("http://127.0.0.1:1")).unwrap();
        assert_eq!(client.score(request()).await.unwrap(), 0.5);
    }
}
