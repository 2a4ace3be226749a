//! Classification fusion: external score when available, lexicon otherwise,
//! toxicity veto always, then eligibility and comment drafting.

use std::sync::Arc;
use std::time::Duration;

use crate::lexicon;
use crate::random::RandomSource;
use crate::scoring::{ExternalScorer, HttpScorer};
use crate::types::{ClassificationResult, Label, Sentiment};

/// Minimum score for drafting a comment.
pub const DRAFT_MIN_SCORE: f64 = 0.6;

/// Minimum word count for drafting a comment.
pub const DRAFT_MIN_WORDS: usize = 15;

/// Hard cap on draft length, ellipsis included.
pub const DRAFT_MAX_CHARS: usize = 240;

const KEY_TERM_LIMIT: usize = 18;
const KEY_TERM_MIN_CHARS: usize = 4;

pub struct ClassificationFusion {
    scorer: Arc<dyn ExternalScorer>,
    timeout: Duration,
    rng: Arc<RandomSource>,
}

impl ClassificationFusion {
    pub fn new(scorer: Arc<dyn ExternalScorer>, timeout: Duration, rng: Arc<RandomSource>) -> Self {
        Self {
            scorer,
            timeout,
            rng,
        }
    }

    /// Fusion backed by the HTTP scorer.
    pub fn with_http(timeout: Duration, rng: Arc<RandomSource>) -> Self {
        Self::new(Arc::new(HttpScorer::new(timeout)), timeout, rng)
    }

    /// Classify one item. Never fails: every scoring problem degrades to the
    /// lexicon result.
    pub async fn classify(&self, text: &str, author: &str, endpoint: Option<&str>) -> ClassificationResult {
        let local = lexicon::classify_local(Some(text));

        let sentiment = match endpoint {
            Some(endpoint) => match self.remote(endpoint, text).await {
                Some(remote) => remote,
                None => Sentiment {
                    label: local.label,
                    score: local.score,
                },
            },
            None => Sentiment {
                label: local.label,
                score: local.score,
            },
        };

        let toxic = local.toxic;
        let should_act = !toxic;
        let should_draft_comment =
            should_act && sentiment.score >= DRAFT_MIN_SCORE && word_count(text) >= DRAFT_MIN_WORDS;
        let draft_text = if should_draft_comment {
            self.draft_comment(author, sentiment.label, text)
        } else {
            String::new()
        };

        ClassificationResult {
            label: sentiment.label,
            score: sentiment.score,
            toxic,
            should_act,
            should_draft_comment,
            draft_text,
        }
    }

    async fn remote(&self, endpoint: &str, text: &str) -> Option<Sentiment> {
        match tokio::time::timeout(self.timeout, self.scorer.score(endpoint, text)).await {
            Ok(Ok(sentiment)) => {
                tracing::debug!("Remote score: {} ({:.2})", sentiment.label, sentiment.score);
                Some(sentiment)
            }
            Ok(Err(e)) => {
                tracing::warn!("Remote scoring failed, using lexicon: {e}");
                None
            }
            Err(_) => {
                tracing::warn!(
                    "Remote scoring timed out after {}ms, using lexicon",
                    self.timeout.as_millis()
                );
                None
            }
        }
    }

    fn draft_comment(&self, author: &str, label: Label, text: &str) -> String {
        let first_name = author.split_whitespace().next().unwrap_or("there");
        let detail = key_terms(text);

        let bucket: [String; 2] = match label {
            Label::Positive => [
                format!("Love this, {first_name}! {detail}"),
                format!("Great insights, {first_name}. {detail}"),
            ],
            Label::Neutral => [
                format!("Interesting angle, {first_name}. {detail}"),
                format!("Thanks for sharing, {first_name}. {detail}"),
            ],
            Label::Negative => [
                format!("Appreciate the perspective, {first_name}. Curious, what metrics did you use?"),
                format!("Thought-provoking point, {first_name}. {detail}"),
            ],
        };

        let choice = self.rng.pick(bucket.len());
        let comment = bucket[choice].trim_end().to_string();
        truncate_draft(comment)
    }
}

/// Whitespace-separated word count.
pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

/// "Key takeaway: ..." built from the first long-enough words.
pub fn key_terms(text: &str) -> String {
    let words: Vec<&str> = text
        .split_whitespace()
        .filter(|w| w.chars().count() >= KEY_TERM_MIN_CHARS)
        .collect();
    if words.is_empty() {
        return String::new();
    }
    let truncated = words.len() > KEY_TERM_LIMIT;
    let detail = words[..words.len().min(KEY_TERM_LIMIT)].join(" ");
    let ellipsis = if truncated { "..." } else { "" };
    format!("Key takeaway: {detail}{ellipsis}")
}

fn truncate_draft(comment: String) -> String {
    if comment.chars().count() <= DRAFT_MAX_CHARS {
        return comment;
    }
    let mut cut: String = comment.chars().take(DRAFT_MAX_CHARS - 3).collect();
    cut.push_str("...");
    cut
}
