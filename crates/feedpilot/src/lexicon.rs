//! Lexicon classifier: table-driven sentiment plus a substring toxicity veto.

use crate::types::{Label, Sentiment};

/// Polarity weights. Only lowercase ASCII words; tokens are normalized to match.
const POLARITY: &[(&str, i32)] = &[
    ("great", 2),
    ("love", 3),
    ("awesome", 3),
    ("amazing", 3),
    ("good", 2),
    ("nice", 1),
    ("win", 2),
    ("improve", 1),
    ("bad", -2),
    ("worse", -3),
    ("worst", -3),
    ("sad", -2),
    ("angry", -2),
    ("hate", -3),
    ("fail", -2),
    ("layoffs", -2),
    ("congrats", 2),
    ("congratulations", 2),
    ("thrilled", 2),
    ("excited", 2),
    ("proud", 2),
    ("thank", 1),
];

/// Largest absolute weight in the table; used to normalize.
const MAX_WEIGHT: f64 = 3.0;

const TOXIC_TERMS: &[&str] = &["idiot", "moron", "nazi", "racist", "hate"];

/// Local verdict: sentiment and the independent toxicity flag.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LocalVerdict {
    pub label: Label,
    pub score: f64,
    pub toxic: bool,
}

fn weight(token: &str) -> Option<i32> {
    POLARITY
        .iter()
        .find(|(word, _)| *word == token)
        .map(|(_, w)| *w)
}

/// Lowercase, blank out everything that isn't `a-z`, split on whitespace.
fn tokenize(text: &str) -> Vec<String> {
    let cleaned: String = text
        .to_lowercase()
        .chars()
        .map(|c| if c.is_ascii_lowercase() { c } else { ' ' })
        .collect();
    cleaned.split_whitespace().map(str::to_string).collect()
}

/// Score text against the polarity table.
pub fn score_sentiment(text: Option<&str>) -> Sentiment {
    let text = match text {
        Some(t) if !t.trim().is_empty() => t,
        _ => return Sentiment::NEUTRAL,
    };

    let mut total = 0i64;
    let mut hits = 0u32;
    for token in tokenize(text) {
        if let Some(w) = weight(&token) {
            total += i64::from(w);
            hits += 1;
        }
    }

    if hits == 0 {
        return Sentiment::NEUTRAL;
    }

    let score = (total as f64 / (MAX_WEIGHT * f64::from(hits))).clamp(-1.0, 1.0);
    Sentiment {
        label: Label::from_score(score),
        score,
    }
}

/// Case-insensitive substring match against the blacklist.
pub fn is_toxic(text: Option<&str>) -> bool {
    let Some(text) = text else {
        return false;
    };
    let lower = text.to_lowercase();
    TOXIC_TERMS.iter().any(|term| lower.contains(term))
}

/// Sentiment and toxicity in one pass.
pub fn classify_local(text: Option<&str>) -> LocalVerdict {
    let sentiment = score_sentiment(text);
    LocalVerdict {
        label: sentiment.label,
        score: sentiment.score,
        toxic: is_toxic(text),
    }
}
