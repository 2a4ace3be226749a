//! JSON-file persistence for rules, history, the stop switch and settings.
//!
//! One document holds everything. Each `save_*` call updates its section in
//! memory and rewrites the whole file through a temp file and rename, so a
//! crash mid-write leaves the previous document intact.

use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use serde::{Deserialize, Serialize};

use crate::config::PilotConfig;
use crate::error::{PilotError, PilotResult};
use crate::types::{HistoryRecord, RuleSet};

/// Everything that survives a restart.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PersistedState {
    #[serde(default)]
    pub rules: RuleSet,
    #[serde(default)]
    pub history: Vec<HistoryRecord>,
    #[serde(default)]
    pub stopped: bool,
    #[serde(default)]
    pub config: PilotConfig,
}

pub struct StateStore {
    /// `None` keeps everything in memory.
    path: Option<PathBuf>,
    state: Mutex<PersistedState>,
}

impl StateStore {
    /// Open a state file, or start empty if it does not exist yet. Nothing is
    /// created on disk until the first save.
    pub fn open(path: impl AsRef<Path>) -> PilotResult<Self> {
        let path = path.as_ref().to_path_buf();

        let state = if path.exists() {
            tracing::info!("Opening existing state file: {}", path.display());
            let data = std::fs::read_to_string(&path)?;
            serde_json::from_str(&data).map_err(|e| {
                PilotError::Storage(format!("Failed to parse {}: {e}", path.display()))
            })?
        } else {
            tracing::info!("No state file yet at {}", path.display());
            PersistedState::default()
        };

        Ok(Self {
            path: Some(path),
            state: Mutex::new(state),
        })
    }

    /// A store that never touches the filesystem.
    pub fn in_memory() -> Self {
        Self {
            path: None,
            state: Mutex::new(PersistedState::default()),
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn guard(&self) -> MutexGuard<'_, PersistedState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Copy of the current document.
    pub fn load(&self) -> PersistedState {
        self.guard().clone()
    }

    pub fn save_rules(&self, rules: &RuleSet) -> PilotResult<()> {
        self.update(|s| s.rules = rules.clone())
    }

    /// Save rules produced by `snapshot`, called while the document lock is
    /// held. Writers therefore land in snapshot order and an older snapshot
    /// can never replace a newer one on disk.
    pub fn save_rules_with(&self, snapshot: impl FnOnce() -> RuleSet) -> PilotResult<()> {
        self.update(|s| s.rules = snapshot())
    }

    pub fn save_history(&self, history: &[HistoryRecord]) -> PilotResult<()> {
        self.update(|s| s.history = history.to_vec())
    }

    pub fn save_stopped(&self, stopped: bool) -> PilotResult<()> {
        self.update(|s| s.stopped = stopped)
    }

    pub fn save_config(&self, config: &PilotConfig) -> PilotResult<()> {
        self.update(|s| s.config = config.clone())
    }

    /// Rewrite the file with the current document.
    pub fn flush(&self) -> PilotResult<()> {
        self.update(|_| {})
    }

    fn update(&self, f: impl FnOnce(&mut PersistedState)) -> PilotResult<()> {
        let mut state = self.guard();
        f(&mut state);
        match &self.path {
            Some(path) => write_atomic(path, &state),
            None => Ok(()),
        }
    }
}

fn write_atomic(path: &Path, state: &PersistedState) -> PilotResult<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| {
            PilotError::Storage(format!("Failed to create directory {}: {e}", parent.display()))
        })?;
    }
    let json = serde_json::to_string_pretty(state)?;
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, json)?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}
