//! Action history ledger and rule-set import/merge.

use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard};

use serde_json::Value;

use crate::error::{PilotError, PilotResult};
use crate::selectors::normalize;
use crate::types::{HistoryRecord, Role, RuleSet, SelectorRule};

/// Number of records kept, newest first.
pub const HISTORY_CAPACITY: usize = 50;

/// Bounded, newest-first ring of completed actions.
pub struct HistoryLedger {
    records: Mutex<VecDeque<HistoryRecord>>,
    capacity: usize,
}

impl HistoryLedger {
    pub fn new() -> Self {
        Self::with_capacity(HISTORY_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            records: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
        }
    }

    fn guard(&self) -> MutexGuard<'_, VecDeque<HistoryRecord>> {
        self.records
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Insert at the front, dropping the oldest past capacity.
    pub fn append(&self, record: HistoryRecord) {
        let mut records = self.guard();
        records.push_front(record);
        records.truncate(self.capacity);
    }

    pub fn clear(&self) {
        self.guard().clear();
    }

    /// Newest first.
    pub fn records(&self) -> Vec<HistoryRecord> {
        self.guard().iter().cloned().collect()
    }

    /// Replace the contents with persisted records (assumed newest first).
    pub fn restore(&self, records: Vec<HistoryRecord>) {
        let mut guard = self.guard();
        *guard = records.into_iter().take(self.capacity).collect();
    }

    pub fn len(&self) -> usize {
        self.guard().len()
    }

    pub fn is_empty(&self) -> bool {
        self.guard().is_empty()
    }
}

impl Default for HistoryLedger {
    fn default() -> Self {
        Self::new()
    }
}

/// Merge two rule sets role by role.
///
/// Each side first has repeated patterns folded into one rule. Rules sharing a
/// pattern across the sides then have their counters summed, keeping the
/// latest `last_used` and earliest `first_seen`; an identical rule on both
/// sides is kept once. Each role is then re-ranked and truncated.
pub fn merge_rule_sets(existing: &RuleSet, imported: &RuleSet) -> RuleSet {
    let mut merged = RuleSet::default();

    for role in Role::ALL {
        let mut out = fold_repeats(existing.get(role));
        let mut index: HashMap<String, usize> = out
            .iter()
            .enumerate()
            .map(|(i, r)| (r.pattern.clone(), i))
            .collect();

        for rule in fold_repeats(imported.get(role)) {
            match index.get(&rule.pattern) {
                None => {
                    index.insert(rule.pattern.clone(), out.len());
                    out.push(rule);
                }
                Some(&i) if out[i] == rule => {}
                Some(&i) => absorb(&mut out[i], &rule),
            }
        }

        normalize(&mut out);
        *merged.get_mut(role) = out;
    }

    merged
}

/// One rule per pattern, with repeats accumulated in list order.
fn fold_repeats(rules: &[SelectorRule]) -> Vec<SelectorRule> {
    let mut out: Vec<SelectorRule> = Vec::with_capacity(rules.len());
    let mut index: HashMap<&str, usize> = HashMap::new();

    for rule in rules {
        match index.get(rule.pattern.as_str()) {
            Some(&i) => absorb(&mut out[i], rule),
            None => {
                index.insert(&rule.pattern, out.len());
                out.push(rule.clone());
            }
        }
    }

    out
}

fn absorb(target: &mut SelectorRule, rule: &SelectorRule) {
    target.success_count = target.success_count.saturating_add(rule.success_count);
    target.failure_count = target.failure_count.saturating_add(rule.failure_count);
    target.last_used = target.last_used.max(rule.last_used);
    target.first_seen = target.first_seen.min(rule.first_seen);
}

/// Check an import document's shape and parse it.
///
/// Accepts both the current role keys and the legacy extension keys. Nothing
/// is mutated here; a rejected document leaves the caller's state untouched.
pub fn validate_import(doc: &Value) -> PilotResult<RuleSet> {
    let obj = doc
        .as_object()
        .ok_or_else(|| invalid("expected a JSON object"))?;

    let primary_key = Role::PrimaryAction.as_str();
    let legacy_key = Role::PrimaryAction.legacy_key();
    match obj.get(primary_key).or_else(|| obj.get(legacy_key)) {
        Some(Value::Array(_)) => {}
        Some(_) => return Err(invalid(format!("'{primary_key}' must be an array"))),
        None => return Err(invalid(format!("missing '{primary_key}' array"))),
    }

    let mut set = RuleSet::default();
    for role in Role::ALL {
        let (key, entries) = match (obj.get(role.as_str()), obj.get(role.legacy_key())) {
            (Some(v), _) => (role.as_str(), v),
            (None, Some(v)) => (role.legacy_key(), v),
            (None, None) => continue,
        };
        let entries = entries
            .as_array()
            .ok_or_else(|| invalid(format!("'{key}' must be an array")))?;

        let rules = set.get_mut(role);
        for (i, entry) in entries.iter().enumerate() {
            rules.push(parse_rule(entry).map_err(|msg| invalid(format!("{key}[{i}]: {msg}")))?);
        }
    }

    Ok(set)
}

fn parse_rule(entry: &Value) -> Result<SelectorRule, String> {
    let obj = entry.as_object().ok_or("expected an object")?;

    let pattern = obj
        .get("pattern")
        .or_else(|| obj.get("selector"))
        .and_then(Value::as_str)
        .filter(|p| !p.is_empty())
        .ok_or("missing string 'pattern'")?;

    let count = |name: &str| -> Result<u64, String> {
        match obj.get(name) {
            None | Some(Value::Null) => Ok(0),
            Some(v) => v
                .as_u64()
                .ok_or_else(|| format!("'{name}' must be a non-negative integer")),
        }
    };
    let stamp = |name: &str| -> Result<i64, String> {
        match obj.get(name) {
            None | Some(Value::Null) => Ok(0),
            Some(v) => v
                .as_i64()
                .ok_or_else(|| format!("'{name}' must be an integer timestamp")),
        }
    };

    Ok(SelectorRule {
        pattern: pattern.to_string(),
        success_count: count("successCount")?,
        failure_count: count("failureCount")?,
        first_seen: stamp("firstSeen")?,
        last_used: stamp("lastUsed")?,
    })
}

fn invalid(msg: impl Into<String>) -> PilotError {
    PilotError::InvalidImport(msg.into())
}
