//! Core data types: content items, classification results, selector rules,
//! and history records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Maximum excerpt length stored in a history record, ellipsis included.
pub const EXCERPT_MAX_CHARS: usize = 150;

/// Sentiment label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Label {
    Positive,
    Neutral,
    Negative,
}

impl Label {
    /// Parse a label name, case-insensitively.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "positive" => Some(Self::Positive),
            "neutral" => Some(Self::Neutral),
            "negative" => Some(Self::Negative),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Positive => "positive",
            Self::Neutral => "neutral",
            Self::Negative => "negative",
        }
    }

    /// Label for a normalized score in `[-1, 1]`.
    pub fn from_score(score: f64) -> Self {
        if score > 0.2 {
            Self::Positive
        } else if score < -0.2 {
            Self::Negative
        } else {
            Self::Neutral
        }
    }
}

impl std::fmt::Display for Label {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A sentiment verdict: label plus normalized score.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sentiment {
    pub label: Label,
    pub score: f64,
}

impl Sentiment {
    pub const NEUTRAL: Sentiment = Sentiment {
        label: Label::Neutral,
        score: 0.0,
    };
}

/// One observed feed item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentItem {
    pub identity_key: String,
    pub text: String,
    pub author: String,
}

impl ContentItem {
    pub fn new(identity_key: impl Into<String>, text: impl Into<String>, author: impl Into<String>) -> Self {
        Self {
            identity_key: identity_key.into(),
            text: text.into(),
            author: author.into(),
        }
    }

    /// Build an item from what the page walker saw.
    ///
    /// The platform identifier wins when present; otherwise the key is the
    /// item's position plus the first 50 characters of its text with all
    /// whitespace removed.
    pub fn observed(
        platform_id: Option<&str>,
        position: usize,
        text: impl Into<String>,
        author: impl Into<String>,
    ) -> Self {
        let text = text.into();
        let identity_key = match platform_id.map(str::trim).filter(|id| !id.is_empty()) {
            Some(id) => id.to_string(),
            None => {
                let prefix: String = text
                    .chars()
                    .take(50)
                    .filter(|c| !c.is_whitespace())
                    .collect();
                format!("post-{position}-{prefix}")
            }
        };
        Self {
            identity_key,
            text,
            author: author.into(),
        }
    }
}

/// Result of classifying one item. Produced once, never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassificationResult {
    pub label: Label,
    pub score: f64,
    pub toxic: bool,
    pub should_act: bool,
    pub should_draft_comment: bool,
    pub draft_text: String,
}

/// Category of control a selector rule locates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Role {
    PrimaryAction,
    AlreadyActedIndicator,
    RepostIndicator,
    SecondaryAction,
}

impl Role {
    pub const ALL: [Role; 4] = [
        Role::PrimaryAction,
        Role::AlreadyActedIndicator,
        Role::RepostIndicator,
        Role::SecondaryAction,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::PrimaryAction => "primaryAction",
            Role::AlreadyActedIndicator => "alreadyActedIndicator",
            Role::RepostIndicator => "repostIndicator",
            Role::SecondaryAction => "secondaryAction",
        }
    }

    /// Key used by the original extension's export files.
    pub fn legacy_key(&self) -> &'static str {
        match self {
            Role::PrimaryAction => "likeButton",
            Role::AlreadyActedIndicator => "alreadyLikedIndicators",
            Role::RepostIndicator => "repostIndicators",
            Role::SecondaryAction => "commentButton",
        }
    }

    pub(crate) fn index(&self) -> usize {
        match self {
            Role::PrimaryAction => 0,
            Role::AlreadyActedIndicator => 1,
            Role::RepostIndicator => 2,
            Role::SecondaryAction => 3,
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A learned matching rule with its outcome counters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectorRule {
    #[serde(alias = "selector")]
    pub pattern: String,
    #[serde(default)]
    pub success_count: u64,
    #[serde(default)]
    pub failure_count: u64,
    /// Epoch milliseconds.
    #[serde(default)]
    pub first_seen: i64,
    /// Epoch milliseconds.
    #[serde(default)]
    pub last_used: i64,
}

impl SelectorRule {
    pub fn new(pattern: impl Into<String>, now_ms: i64) -> Self {
        Self {
            pattern: pattern.into(),
            success_count: 0,
            failure_count: 0,
            first_seen: now_ms,
            last_used: now_ms,
        }
    }

    /// Ranking order: successes desc, failures asc, most recently used,
    /// then pattern text so the order is total.
    pub fn rank_cmp(a: &SelectorRule, b: &SelectorRule) -> std::cmp::Ordering {
        b.success_count
            .cmp(&a.success_count)
            .then(a.failure_count.cmp(&b.failure_count))
            .then(b.last_used.cmp(&a.last_used))
            .then(a.pattern.cmp(&b.pattern))
    }
}

/// Full registry snapshot, one ranked list per role. This is also the
/// import/export document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleSet {
    #[serde(default, alias = "likeButton")]
    pub primary_action: Vec<SelectorRule>,
    #[serde(default, alias = "alreadyLikedIndicators")]
    pub already_acted_indicator: Vec<SelectorRule>,
    #[serde(default, alias = "repostIndicators")]
    pub repost_indicator: Vec<SelectorRule>,
    #[serde(default, alias = "commentButton")]
    pub secondary_action: Vec<SelectorRule>,
}

impl RuleSet {
    pub fn get(&self, role: Role) -> &[SelectorRule] {
        match role {
            Role::PrimaryAction => &self.primary_action,
            Role::AlreadyActedIndicator => &self.already_acted_indicator,
            Role::RepostIndicator => &self.repost_indicator,
            Role::SecondaryAction => &self.secondary_action,
        }
    }

    pub fn get_mut(&mut self, role: Role) -> &mut Vec<SelectorRule> {
        match role {
            Role::PrimaryAction => &mut self.primary_action,
            Role::AlreadyActedIndicator => &mut self.already_acted_indicator,
            Role::RepostIndicator => &mut self.repost_indicator,
            Role::SecondaryAction => &mut self.secondary_action,
        }
    }

    pub fn is_empty(&self) -> bool {
        Role::ALL.iter().all(|r| self.get(*r).is_empty())
    }

    /// Total number of rules across roles.
    pub fn len(&self) -> usize {
        Role::ALL.iter().map(|r| self.get(*r).len()).sum()
    }
}

/// A completed, verified action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryRecord {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub author: String,
    pub text_excerpt: String,
    pub label: Label,
    pub score: f64,
}

impl HistoryRecord {
    /// Build a record for an action taken now.
    pub fn new(author: &str, text: &str, label: Label, score: f64) -> Self {
        let author = author.trim();
        Self {
            id: Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            author: if author.is_empty() {
                "Unknown".to_string()
            } else {
                author.to_string()
            },
            text_excerpt: excerpt(text, EXCERPT_MAX_CHARS),
            label,
            score,
        }
    }
}

/// Shorten `text` to at most `max_chars` characters, ending in `...` when cut.
pub fn excerpt(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let keep = max_chars.saturating_sub(3);
    let mut out: String = text.chars().take(keep).collect();
    out.push_str("...");
    out
}

/// Current time as epoch milliseconds.
pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}
