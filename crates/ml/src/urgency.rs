//! Urgency scoring models.
//!
//! The broker treats scorers as black boxes behind [`UrgencyModel`]; the
//! circuit breaker in [`crate::router`] decides which path serves a call.

use std::sync::LazyLock;

use async_trait::async_trait;
use regex::RegexBuilder;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::classifier;

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error: {0}")]
    Api(String),
}

/// A scoring backend mapping ticket text to urgency S in [0, 1].
#[async_trait]
pub trait UrgencyModel: Send + Sync {
    async fn score(&self, text: &str) -> Result<f64, ModelError>;

    /// Backend name for logs and /health.
    fn name(&self) -> &'static str;
}

/// Baseline scorer: 0.0 on empty text, 0.85 when an urgency keyword is
/// present, else 0.25. Never fails, never slow.
pub fn baseline_urgency(text: &str) -> f64 {
    if text.trim().is_empty() {
        return 0.0;
    }
    if classifier::has_urgency_keyword(text) {
        0.85
    } else {
        0.25
    }
}

fn round4(v: f64) -> f64 {
    (v * 10_000.0).round() / 10_000.0
}

// ── Lexicon model ─────────────────────────────────────────────

static NEGATIVE_RE: LazyLock<regex::Regex> = LazyLock::new(|| {
    RegexBuilder::new(
        r"\b(?:wrong|cannot|can't|failed|failure|unable|problem|issue|error|angry|unacceptable|frustrated)\b",
    )
    .case_insensitive(true)
    .build()
    .expect("negative pattern compiles")
});

/// Deterministic keyword-weighted scorer: the default urgency backend.
///
/// Scores climb with urgency keyword density and negative tone, bounded to
/// [0, 1]. Empty text scores 0.0.
#[derive(Debug, Default, Clone)]
pub struct LexiconModel;

impl LexiconModel {
    pub fn new() -> Self {
        Self
    }

    fn score_sync(text: &str) -> f64 {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return 0.0;
        }
        let urgency_hits = classifier::urgency_keyword_hits(trimmed);
        let negative_hits = NEGATIVE_RE.find_iter(trimmed).count();
        let mut s = 0.2;
        s += 0.25 * urgency_hits.min(3) as f64;
        s += 0.075 * negative_hits.min(2) as f64;
        round4(s.clamp(0.0, 1.0))
    }
}

#[async_trait]
impl UrgencyModel for LexiconModel {
    async fn score(&self, text: &str) -> Result<f64, ModelError> {
        Ok(Self::score_sync(text))
    }

    fn name(&self) -> &'static str {
        "lexicon"
    }
}

// ── HTTP model ────────────────────────────────────────────────

#[derive(Serialize)]
struct ScoreRequest<'a> {
    text: &'a str,
}

#[derive(Deserialize)]
struct ScoreResponse {
    urgency_score: f64,
}

/// Scorer backed by an external inference endpoint — the expensive
/// transformer path the circuit breaker exists for.
pub struct HttpModel {
    client: reqwest::Client,
    url: String,
}

impl HttpModel {
    pub fn new(url: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            url,
        }
    }
}

#[async_trait]
impl UrgencyModel for HttpModel {
    async fn score(&self, text: &str) -> Result<f64, ModelError> {
        let response = self
            .client
            .post(&self.url)
            .json(&ScoreRequest { text })
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ModelError::Api(format!("{status}: {body}")));
        }

        let parsed: ScoreResponse = response.json().await?;
        Ok(parsed.urgency_score.clamp(0.0, 1.0))
    }

    fn name(&self) -> &'static str {
        "http"
    }
}
