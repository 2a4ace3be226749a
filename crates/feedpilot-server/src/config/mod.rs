//! Configuration loading and resolution.

use std::path::PathBuf;
use std::time::Duration;

use feedpilot::EngineSettings;

/// Environment variable naming the state file.
pub const STATE_ENV_VAR: &str = "FEEDPILOT_STATE";

/// Resolve the state file path: explicit flag, then `FEEDPILOT_STATE`, then
/// `./.feedpilot/state.json` if it exists, then the per-user default.
pub fn resolve_state_path(explicit: Option<&str>) -> String {
    if let Some(path) = explicit {
        return path.to_string();
    }

    if let Ok(env_path) = std::env::var(STATE_ENV_VAR) {
        if !env_path.trim().is_empty() {
            return env_path;
        }
    }

    let cwd_state = PathBuf::from(".feedpilot/state.json");
    if cwd_state.exists() {
        return cwd_state.display().to_string();
    }

    resolve_default_state_path()
}

fn resolve_default_state_path() -> String {
    let home = std::env::var("HOME")
        .or_else(|_| std::env::var("USERPROFILE"))
        .unwrap_or_else(|_| ".".to_string());

    format!("{home}/.feedpilot/state.json")
}

/// Engine settings with command-line overrides applied.
pub fn engine_settings(
    min_interval_ms: Option<u64>,
    scoring_timeout_ms: Option<u64>,
    seed: Option<u64>,
) -> EngineSettings {
    let mut settings = EngineSettings::default();
    if let Some(ms) = min_interval_ms {
        settings.min_interval = Duration::from_millis(ms);
    }
    if let Some(ms) = scoring_timeout_ms {
        settings.scoring_timeout = Duration::from_millis(ms);
    }
    settings.rng_seed = seed;
    settings
}
