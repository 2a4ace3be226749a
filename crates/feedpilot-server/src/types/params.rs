//! Method parameter and descriptor types.

use serde::{Deserialize, Serialize};

use feedpilot::Label;

#[derive(Debug, Clone, Deserialize)]
pub struct AnalyzeParams {
    pub text: String,
    #[serde(default)]
    pub author: String,
}

/// A completed action reported by the host.
#[derive(Debug, Clone, Deserialize)]
pub struct RecordActionParams {
    #[serde(default)]
    pub author: String,
    pub text: String,
    #[serde(alias = "sentiment")]
    pub label: Label,
    #[serde(default)]
    pub score: f64,
}

/// Partial settings update; absent fields keep their current value.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetConfigParams {
    pub auto_act_enabled: Option<bool>,
    pub scoring_endpoint: Option<String>,
}

/// Description of one exposed method, as printed by `info`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MethodDescriptor {
    pub name: String,
    pub description: String,
}

impl MethodDescriptor {
    pub fn new(name: &str, description: &str) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
        }
    }
}
