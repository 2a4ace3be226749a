//! Selector ranking registry: per-role ranked patterns learned from outcomes.
//!
//! Learned patterns are tried before built-in defaults. A success promotes a
//! pattern; a failure both counts against it and takes back one success, so
//! patterns that stop working sink quickly once the page markup changes.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};

use serde::{Deserialize, Serialize};

use crate::random::RandomSource;
use crate::store::StateStore;
use crate::types::{now_millis, Role, RuleSet, SelectorRule};

/// Per-role capacity of the ranked list.
pub const MAX_RULES_PER_ROLE: usize = 10;

/// Rule counts per role, as shown in the host's learning panel.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LearningStats {
    pub primary_action: usize,
    pub already_acted_indicator: usize,
    pub repost_indicator: usize,
    pub secondary_action: usize,
}

pub struct SelectorRegistry {
    /// One list per role, indexed by `Role::index`. Each lock serializes
    /// read-modify-write for its role only.
    lists: [Mutex<Vec<SelectorRule>>; 4],
    rng: Arc<RandomSource>,
    failure_persist_rate: f64,
    store: Option<Arc<StateStore>>,
}

impl SelectorRegistry {
    pub fn new(rng: Arc<RandomSource>, failure_persist_rate: f64) -> Self {
        Self {
            lists: Default::default(),
            rng,
            failure_persist_rate,
            store: None,
        }
    }

    /// Persist snapshots to `store` whenever a record asks for it.
    pub fn with_store(mut self, store: Arc<StateStore>) -> Self {
        self.store = Some(store);
        self
    }

    fn list(&self, role: Role) -> MutexGuard<'_, Vec<SelectorRule>> {
        self.lists[role.index()]
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Learned patterns in rank order, then defaults, without duplicates.
    pub fn prioritize<S: AsRef<str>>(&self, role: Role, defaults: &[S]) -> Vec<String> {
        let learned: Vec<String> = self.list(role).iter().map(|r| r.pattern.clone()).collect();

        let mut seen = HashSet::new();
        learned
            .into_iter()
            .chain(defaults.iter().map(|d| d.as_ref().to_string()))
            .filter(|p| seen.insert(p.clone()))
            .collect()
    }

    /// Record an outcome for `pattern` under `role`.
    ///
    /// Returns whether a persist was triggered: always on success, on failure
    /// only with probability `failure_persist_rate`.
    pub fn record(&self, role: Role, pattern: &str, success: bool) -> bool {
        if pattern.is_empty() {
            return false;
        }

        {
            let mut list = self.list(role);
            apply_outcome(&mut list, pattern, success, now_millis());
        }

        let persist = success || self.rng.chance(self.failure_persist_rate);
        if persist {
            self.persist();
        }
        persist
    }

    /// Current ranked rules for one role.
    pub fn rules(&self, role: Role) -> Vec<SelectorRule> {
        self.list(role).clone()
    }

    /// Full snapshot of every role.
    pub fn snapshot(&self) -> RuleSet {
        let mut set = RuleSet::default();
        for role in Role::ALL {
            *set.get_mut(role) = self.rules(role);
        }
        set
    }

    /// Replace the registry contents, re-ranking and truncating each role.
    pub fn replace(&self, set: RuleSet) {
        let mut set = set;
        for role in Role::ALL {
            let mut incoming = std::mem::take(set.get_mut(role));
            normalize(&mut incoming);
            *self.list(role) = incoming;
        }
    }

    /// Forget everything learned.
    pub fn clear(&self) {
        for role in Role::ALL {
            self.list(role).clear();
        }
        self.persist();
    }

    pub fn stats(&self) -> LearningStats {
        LearningStats {
            primary_action: self.list(Role::PrimaryAction).len(),
            already_acted_indicator: self.list(Role::AlreadyActedIndicator).len(),
            repost_indicator: self.list(Role::RepostIndicator).len(),
            secondary_action: self.list(Role::SecondaryAction).len(),
        }
    }

    /// Write the current snapshot to the store. Failures are logged only:
    /// the in-memory registry stays authoritative for the session.
    pub fn persist(&self) {
        let Some(store) = &self.store else {
            return;
        };
        if let Err(e) = store.save_rules_with(|| self.snapshot()) {
            tracing::warn!("Failed to persist selector rules: {e}");
        } else {
            tracing::debug!("Saved learned selectors");
        }
    }
}

/// Upsert, count, re-rank and truncate one role's list.
fn apply_outcome(list: &mut Vec<SelectorRule>, pattern: &str, success: bool, now_ms: i64) {
    let idx = match list.iter().position(|r| r.pattern == pattern) {
        Some(i) => i,
        None => {
            list.push(SelectorRule::new(pattern, now_ms));
            list.len() - 1
        }
    };

    let rule = &mut list[idx];
    rule.last_used = now_ms;
    if success {
        rule.success_count += 1;
    } else {
        rule.failure_count += 1;
        rule.success_count = rule.success_count.saturating_sub(1);
    }

    normalize(list);
}

/// Sort by rank and keep the top `MAX_RULES_PER_ROLE`.
pub(crate) fn normalize(list: &mut Vec<SelectorRule>) {
    list.sort_by(SelectorRule::rank_cmp);
    list.truncate(MAX_RULES_PER_ROLE);
}
