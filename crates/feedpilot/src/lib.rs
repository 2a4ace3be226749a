//! FeedPilot: classify observed feed items, find the right control on an
//! unstable page, act on it through redundant strategies, and pace/record
//! what was done.

pub mod candidate;
#[cfg(feature = "chromium")]
pub mod chromium;
pub mod config;
pub mod error;
pub mod executor;
pub mod fusion;
pub mod history;
pub mod lexicon;
pub mod orchestrator;
pub mod pacing;
pub mod random;
pub mod scoring;
pub mod script;
pub mod selectors;
pub mod store;
pub mod types;

pub use candidate::{CandidateSource, ElementHandle, ElementState, StrategyEffect, StrictFilter};
pub use config::{EngineSettings, PilotConfig};
pub use error::{PilotError, PilotResult};
pub use executor::{ActionExecutor, ActionOutcome, ActionPlan, ActionReport, Strategy};
pub use fusion::ClassificationFusion;
pub use history::{merge_rule_sets, validate_import, HistoryLedger, HISTORY_CAPACITY};
pub use orchestrator::{ItemReport, ItemStatus, Orchestrator};
pub use pacing::PacingPolicy;
pub use random::RandomSource;
pub use scoring::{ExternalScorer, HttpScorer};
pub use script::{ScriptCandidateSource, ScriptHost};
pub use selectors::{LearningStats, SelectorRegistry, MAX_RULES_PER_ROLE};
pub use store::{PersistedState, StateStore};
pub use types::*;
