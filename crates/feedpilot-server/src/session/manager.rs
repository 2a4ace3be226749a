//! Engine lifecycle: open the state file, hand out the engine, save on exit.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use feedpilot::{EngineSettings, Orchestrator, StateStore};

use crate::types::{ServerError, ServerResult};

/// Owns the engine and the state file it writes through to.
pub struct PilotSession {
    engine: Arc<Orchestrator>,
    file_path: PathBuf,
    /// Set by mutating requests; a clean session never writes the file.
    dirty: AtomicBool,
}

impl PilotSession {
    /// Open or create a state file at the given path.
    pub fn open(path: &str, settings: EngineSettings) -> ServerResult<Self> {
        let file_path = PathBuf::from(path);
        let store = StateStore::open(&file_path)
            .map_err(|e| ServerError::Storage(format!("Failed to open state file: {e}")))?;
        let engine = Orchestrator::new(settings, Arc::new(store));

        tracing::info!(
            "Session started. State: {} ({} rules, {} history records)",
            file_path.display(),
            engine.export_rules().len(),
            engine.history().len()
        );

        Ok(Self {
            engine: Arc::new(engine),
            file_path,
            dirty: AtomicBool::new(false),
        })
    }

    pub fn engine(&self) -> &Arc<Orchestrator> {
        &self.engine
    }

    pub fn file_path(&self) -> &PathBuf {
        &self.file_path
    }

    /// Note that the engine state changed and must reach the file.
    pub fn mark_dirty(&self) {
        self.dirty.store(true, Ordering::SeqCst);
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty.load(Ordering::SeqCst)
    }

    /// Write every section of the state file, if anything changed.
    pub fn save(&self) -> ServerResult<()> {
        if !self.dirty.swap(false, Ordering::SeqCst) {
            return Ok(());
        }

        if let Err(e) = self.engine.flush() {
            self.mark_dirty();
            return Err(e.into());
        }
        tracing::debug!("Saved state file: {}", self.file_path.display());
        Ok(())
    }
}

impl Drop for PilotSession {
    fn drop(&mut self) {
        if self.is_dirty() {
            if let Err(e) = self.save() {
                tracing::error!("Failed to save on drop: {e}");
            }
        }
    }
}
