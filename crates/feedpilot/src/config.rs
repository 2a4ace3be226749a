//! Host-editable settings and engine tuning knobs.

use std::ops::RangeInclusive;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default minimum spacing between two actions.
pub const DEFAULT_MIN_INTERVAL: Duration = Duration::from_secs(2);

/// Default bound on the external scoring call.
pub const DEFAULT_SCORING_TIMEOUT: Duration = Duration::from_secs(5);

/// Default wait between invoking a control and re-reading its state.
pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_millis(1000);

/// Settings the user can change from the host UI. Persisted with the state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PilotConfig {
    #[serde(default = "default_auto_act")]
    pub auto_act_enabled: bool,
    #[serde(default)]
    pub scoring_endpoint: String,
}

fn default_auto_act() -> bool {
    true
}

impl Default for PilotConfig {
    fn default() -> Self {
        Self {
            auto_act_enabled: true,
            scoring_endpoint: String::new(),
        }
    }
}

impl PilotConfig {
    /// The configured endpoint, if any.
    pub fn endpoint(&self) -> Option<&str> {
        let trimmed = self.scoring_endpoint.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed)
        }
    }
}

/// Tuning knobs fixed for the lifetime of an engine.
#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub min_interval: Duration,
    pub scoring_timeout: Duration,
    pub settle_delay: Duration,
    /// Random pause before acting on an eligible item, in milliseconds.
    pub action_jitter_ms: RangeInclusive<u64>,
    /// Probability that a failed `record()` triggers a persist.
    pub failure_persist_rate: f64,
    /// Items with fewer trimmed characters are skipped.
    pub min_text_len: usize,
    /// Fixed seed for template choice, jitter and persist sampling.
    pub rng_seed: Option<u64>,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            min_interval: DEFAULT_MIN_INTERVAL,
            scoring_timeout: DEFAULT_SCORING_TIMEOUT,
            settle_delay: DEFAULT_SETTLE_DELAY,
            action_jitter_ms: 500..=1500,
            failure_persist_rate: 0.1,
            min_text_len: 8,
            rng_seed: None,
        }
    }
}

impl EngineSettings {
    /// Settings with every delay removed, for tests and dry runs.
    pub fn immediate() -> Self {
        Self {
            min_interval: Duration::ZERO,
            settle_delay: Duration::ZERO,
            action_jitter_ms: 0..=0,
            ..Self::default()
        }
    }
}
