//! External sentiment scoring over HTTP.
//!
//! `POST {endpoint}/score` with `{"text": ...}`, expecting `{"label", "score"}`.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{PilotError, PilotResult};
use crate::types::{Label, Sentiment};

/// Anything that can score text remotely.
#[async_trait]
pub trait ExternalScorer: Send + Sync {
    async fn score(&self, endpoint: &str, text: &str) -> PilotResult<Sentiment>;
}

#[derive(Debug, Serialize)]
struct ScoreRequest<'a> {
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct ScoreResponse {
    label: String,
    score: f64,
}

/// reqwest-backed scorer.
#[derive(Clone)]
pub struct HttpScorer {
    client: reqwest::Client,
}

impl HttpScorer {
    pub fn new(timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_default();
        Self { client }
    }
}

#[async_trait]
impl ExternalScorer for HttpScorer {
    async fn score(&self, endpoint: &str, text: &str) -> PilotResult<Sentiment> {
        let url = format!("{}/score", endpoint.trim_end_matches('/'));

        let resp = self
            .client
            .post(&url)
            .json(&ScoreRequest { text })
            .send()
            .await
            .map_err(|e| PilotError::Scoring(format!("request to {url} failed: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(PilotError::Scoring(format!(
                "{url} returned HTTP {}",
                status.as_u16()
            )));
        }

        let body: ScoreResponse = resp
            .json()
            .await
            .map_err(|e| PilotError::Scoring(format!("malformed score response: {e}")))?;

        let label = Label::parse(&body.label)
            .ok_or_else(|| PilotError::Scoring(format!("unknown label: {}", body.label)))?;
        if !body.score.is_finite() {
            return Err(PilotError::Scoring("non-finite score".to_string()));
        }

        Ok(Sentiment {
            label,
            score: body.score.clamp(-1.0, 1.0),
        })
    }
}
