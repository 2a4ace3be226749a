//! The candidate source capability and the strict acceptance filter.
//!
//! The engine never walks the page itself. A [`CandidateSource`] scoped to one
//! item's subtree answers pattern queries, reports element state, and applies
//! invocation strategies. Anything that can do that (a live browser page, a
//! test double, a remote agent) plugs in here.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::PilotResult;
use crate::executor::Strategy;

/// Opaque identifier for a candidate element, meaningful only to the source
/// that issued it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ElementHandle(pub String);

impl std::fmt::Display for ElementHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Snapshot of an element's observable state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElementState {
    /// Still connected to the document.
    pub attached: bool,
    /// Has a non-zero rendered box.
    pub visible: bool,
    /// Pressed / active / already-acted.
    pub activated: bool,
    /// Accessible label (e.g. `aria-label`).
    #[serde(default)]
    pub label: String,
    /// Visible text.
    #[serde(default)]
    pub text: String,
    /// Extra facts the source detected, such as icon types.
    #[serde(default)]
    pub markers: Vec<String>,
}

/// Whether a strategy found something to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum StrategyEffect {
    Applied,
    NotApplicable,
}

/// Capability for locating and driving controls inside one item.
#[async_trait]
pub trait CandidateSource: Send + Sync {
    /// Every element in scope matching `pattern`, in document order.
    async fn find_candidates(&self, pattern: &str) -> PilotResult<Vec<ElementHandle>>;

    /// Current state of a previously returned element.
    async fn read_state(&self, handle: &ElementHandle) -> PilotResult<ElementState>;

    /// Apply one invocation strategy to the element.
    async fn invoke(&self, handle: &ElementHandle, strategy: Strategy) -> PilotResult<StrategyEffect>;
}

/// Role-specific acceptance predicate applied to every candidate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StrictFilter {
    /// Must appear in the label or text (case-insensitive). Empty means any.
    pub keyword: String,
    /// None of these may appear in the label or text.
    pub inverse_words: Vec<String>,
    /// At least one must be among the element's markers when non-empty.
    pub required_markers: Vec<String>,
    /// Reject elements already in the activated state.
    pub require_inactive: bool,
    pub require_visible: bool,
}

impl StrictFilter {
    /// Filter for an action control.
    pub fn action(keyword: &str, inverse_words: &[&str], required_markers: &[&str]) -> Self {
        Self {
            keyword: keyword.to_lowercase(),
            inverse_words: inverse_words.iter().map(|w| w.to_lowercase()).collect(),
            required_markers: required_markers.iter().map(|m| m.to_string()).collect(),
            require_inactive: true,
            require_visible: true,
        }
    }

    /// Filter for an indicator: any attached match counts.
    pub fn presence() -> Self {
        Self {
            keyword: String::new(),
            inverse_words: Vec::new(),
            required_markers: Vec::new(),
            require_inactive: false,
            require_visible: false,
        }
    }

    pub fn accepts(&self, state: &ElementState) -> bool {
        if !state.attached {
            return false;
        }
        if self.require_visible && !state.visible {
            return false;
        }
        if self.require_inactive && state.activated {
            return false;
        }

        let haystack = format!("{} {}", state.label, state.text).to_lowercase();
        if !self.keyword.is_empty() && !haystack.contains(&self.keyword) {
            return false;
        }
        if self.inverse_words.iter().any(|w| haystack.contains(w)) {
            return false;
        }

        self.required_markers.is_empty()
            || self
                .required_markers
                .iter()
                .any(|m| state.markers.iter().any(|have| have == m))
    }
}
