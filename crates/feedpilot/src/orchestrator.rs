//! The per-item pipeline and the host-facing operations.
//!
//! One [`Orchestrator`] is shared (by `Arc`) across every concurrently
//! processed item. It owns the registry, pacing state, history, and settings,
//! and writes them through to the [`StateStore`].

use std::collections::HashSet;
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::candidate::CandidateSource;
use crate::config::{EngineSettings, PilotConfig};
use crate::error::PilotResult;
use crate::executor::{ActionExecutor, ActionOutcome, ActionPlan, ActionReport};
use crate::fusion::ClassificationFusion;
use crate::history::{merge_rule_sets, validate_import, HistoryLedger};
use crate::pacing::PacingPolicy;
use crate::random::RandomSource;
use crate::scoring::{ExternalScorer, HttpScorer};
use crate::selectors::{LearningStats, SelectorRegistry};
use crate::store::StateStore;
use crate::types::{ClassificationResult, ContentItem, HistoryRecord, Label, RuleSet};

/// Where an item ended up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ItemStatus {
    /// The global stop switch is on.
    Stopped,
    /// Identity key already processed this session.
    Duplicate,
    /// Text below the minimum length.
    TooShort,
    /// Classified toxic; never acted on.
    Toxic,
    /// Eligible, but automatic acting is disabled.
    ManualOnly,
    /// Action taken and verified.
    Acted,
    AlreadyDone,
    NotFound,
    Failed,
    /// Pacing refused; the item may be submitted again.
    Waiting,
}

impl ItemStatus {
    /// Short label for the item's overlay.
    pub fn status_text(&self) -> &'static str {
        match self {
            ItemStatus::Stopped => "Stopped",
            ItemStatus::Duplicate => "Already processed",
            ItemStatus::TooShort => "Too short",
            ItemStatus::Toxic => "Skipped (toxic)",
            ItemStatus::ManualOnly => "Manual Only",
            ItemStatus::Acted => "Done",
            ItemStatus::AlreadyDone => "Already done",
            ItemStatus::NotFound => "No control found",
            ItemStatus::Failed => "Click failed",
            ItemStatus::Waiting => "Waiting...",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemReport {
    pub identity_key: String,
    pub status: ItemStatus,
    pub classification: Option<ClassificationResult>,
    pub action: Option<ActionReport>,
}

impl ItemReport {
    fn early(item: &ContentItem, status: ItemStatus) -> Self {
        Self {
            identity_key: item.identity_key.clone(),
            status,
            classification: None,
            action: None,
        }
    }
}

pub struct Orchestrator {
    settings: EngineSettings,
    config: RwLock<PilotConfig>,
    rng: Arc<RandomSource>,
    fusion: ClassificationFusion,
    registry: Arc<SelectorRegistry>,
    pacing: Arc<PacingPolicy>,
    executor: ActionExecutor,
    history: HistoryLedger,
    store: Arc<StateStore>,
    plan: ActionPlan,
    seen: Mutex<HashSet<String>>,
}

impl Orchestrator {
    /// Engine scoring over HTTP, restored from `store`.
    pub fn new(settings: EngineSettings, store: Arc<StateStore>) -> Self {
        let scorer = Arc::new(HttpScorer::new(settings.scoring_timeout));
        Self::with_scorer(settings, store, scorer)
    }

    pub fn with_scorer(
        settings: EngineSettings,
        store: Arc<StateStore>,
        scorer: Arc<dyn ExternalScorer>,
    ) -> Self {
        let rng = Arc::new(RandomSource::from_seed(settings.rng_seed));
        let fusion = ClassificationFusion::new(scorer, settings.scoring_timeout, Arc::clone(&rng));
        let registry = Arc::new(
            SelectorRegistry::new(Arc::clone(&rng), settings.failure_persist_rate)
                .with_store(Arc::clone(&store)),
        );
        let pacing = Arc::new(PacingPolicy::new(settings.min_interval));
        let executor = ActionExecutor::new(
            Arc::clone(&registry),
            Arc::clone(&pacing),
            settings.settle_delay,
        );

        let persisted = store.load();
        registry.replace(persisted.rules);
        let history = HistoryLedger::new();
        history.restore(persisted.history);
        if persisted.stopped {
            pacing.stop();
        }

        tracing::info!(
            "Engine ready: {} learned rules, {} history records{}",
            registry.snapshot().len(),
            history.len(),
            if pacing.is_stopped() { " (stopped)" } else { "" }
        );

        Self {
            settings,
            config: RwLock::new(persisted.config),
            rng,
            fusion,
            registry,
            pacing,
            executor,
            history,
            store,
            plan: ActionPlan::primary_action(),
            seen: Mutex::new(HashSet::new()),
        }
    }

    /// Engine with nothing persisted.
    pub fn in_memory(settings: EngineSettings) -> Self {
        Self::new(settings, Arc::new(StateStore::in_memory()))
    }

    /// Replace the action plan used by `process_item`.
    pub fn with_plan(mut self, plan: ActionPlan) -> Self {
        self.plan = plan;
        self
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    pub fn registry(&self) -> &Arc<SelectorRegistry> {
        &self.registry
    }

    pub fn pacing(&self) -> &Arc<PacingPolicy> {
        &self.pacing
    }

    /// Run one item through classification and, if eligible, the executor.
    pub async fn process_item(&self, item: &ContentItem, source: &dyn CandidateSource) -> ItemReport {
        if self.pacing.is_stopped() {
            return ItemReport::early(item, ItemStatus::Stopped);
        }
        if !self.mark_seen(&item.identity_key) {
            return ItemReport::early(item, ItemStatus::Duplicate);
        }
        if item.text.trim().chars().count() < self.settings.min_text_len {
            return ItemReport::early(item, ItemStatus::TooShort);
        }

        let classification = self.analyze(&item.text, &item.author).await;
        let mut report = ItemReport {
            identity_key: item.identity_key.clone(),
            status: ItemStatus::Toxic,
            classification: Some(classification.clone()),
            action: None,
        };

        if classification.toxic {
            tracing::debug!("Skipping toxic item {}", item.identity_key);
            return report;
        }
        if !self.config().auto_act_enabled {
            report.status = ItemStatus::ManualOnly;
            return report;
        }

        let jitter = self.rng.within(&self.settings.action_jitter_ms);
        if jitter > 0 {
            tokio::time::sleep(Duration::from_millis(jitter)).await;
        }
        if self.pacing.is_stopped() {
            self.unmark_seen(&item.identity_key);
            report.status = ItemStatus::Stopped;
            return report;
        }

        let action = self.executor.resolve_and_act(source, &self.plan).await;
        report.status = match action.outcome {
            ActionOutcome::Success => {
                self.record_action(&item.author, &item.text, classification.label, classification.score);
                ItemStatus::Acted
            }
            ActionOutcome::AlreadyDone => ItemStatus::AlreadyDone,
            ActionOutcome::NotFound => ItemStatus::NotFound,
            ActionOutcome::Failed => ItemStatus::Failed,
            ActionOutcome::Throttled => {
                self.unmark_seen(&item.identity_key);
                ItemStatus::Waiting
            }
        };
        report.action = Some(action);
        report
    }

    /// Forget which items were already processed.
    pub fn reset_session(&self) {
        self.seen_guard().clear();
    }

    fn seen_guard(&self) -> std::sync::MutexGuard<'_, HashSet<String>> {
        self.seen.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn mark_seen(&self, key: &str) -> bool {
        self.seen_guard().insert(key.to_string())
    }

    fn unmark_seen(&self, key: &str) {
        self.seen_guard().remove(key);
    }

    // Host operations

    /// Classify text with the current settings.
    pub async fn analyze(&self, text: &str, author: &str) -> ClassificationResult {
        let endpoint = self.config().endpoint().map(str::to_string);
        self.fusion.classify(text, author, endpoint.as_deref()).await
    }

    /// Claim the pacing slot. `true` means the caller may act now.
    pub fn can_act(&self) -> bool {
        self.pacing.try_acquire()
    }

    /// Append a completed action to history and persist it.
    pub fn record_action(&self, author: &str, text: &str, label: Label, score: f64) -> HistoryRecord {
        let record = HistoryRecord::new(author, text, label, score);
        self.history.append(record.clone());
        self.persist_history();
        tracing::info!("Recorded action on post by {}", record.author);
        record
    }

    /// Newest first.
    pub fn history(&self) -> Vec<HistoryRecord> {
        self.history.records()
    }

    pub fn clear_history(&self) {
        self.history.clear();
        self.persist_history();
    }

    /// Validate and merge a rule document into the registry. An invalid
    /// document changes nothing.
    pub fn import_rules(&self, doc: &Value) -> PilotResult<RuleSet> {
        let imported = validate_import(doc)?;
        let merged = merge_rule_sets(&self.registry.snapshot(), &imported);
        self.registry.replace(merged.clone());
        self.registry.persist();
        tracing::info!("Imported {} rules ({} after merge)", imported.len(), merged.len());
        Ok(merged)
    }

    pub fn export_rules(&self) -> RuleSet {
        self.registry.snapshot()
    }

    pub fn stop(&self) {
        self.pacing.stop();
        if let Err(e) = self.store.save_stopped(true) {
            tracing::warn!("Failed to persist stop flag: {e}");
        }
        tracing::info!("Stopped");
    }

    pub fn start(&self) {
        self.pacing.resume();
        if let Err(e) = self.store.save_stopped(false) {
            tracing::warn!("Failed to persist stop flag: {e}");
        }
        tracing::info!("Started");
    }

    pub fn is_stopped(&self) -> bool {
        self.pacing.is_stopped()
    }

    pub fn config(&self) -> PilotConfig {
        self.config
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn update_config(&self, config: PilotConfig) {
        if let Err(e) = self.store.save_config(&config) {
            tracing::warn!("Failed to persist settings: {e}");
        }
        *self
            .config
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = config;
    }

    pub fn learning_stats(&self) -> LearningStats {
        self.registry.stats()
    }

    pub fn clear_rules(&self) {
        self.registry.clear();
        tracing::info!("Cleared learned rules");
    }

    /// Write every section to the store.
    pub fn flush(&self) -> PilotResult<()> {
        self.store.save_rules_with(|| self.registry.snapshot())?;
        self.store.save_history(&self.history.records())?;
        self.store.save_stopped(self.pacing.is_stopped())?;
        self.store.save_config(&self.config())
    }

    fn persist_history(&self) {
        if let Err(e) = self.store.save_history(&self.history.records()) {
            tracing::warn!("Failed to persist history: {e}");
        }
    }
}
