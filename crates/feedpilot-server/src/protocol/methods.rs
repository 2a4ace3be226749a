//! The method table exposed over JSON-RPC.

use crate::types::MethodDescriptor;

pub struct MethodRegistry;

impl MethodRegistry {
    pub fn list_methods() -> Vec<MethodDescriptor> {
        [
            ("analyze", "Classify {text, author}; returns label, score, toxicity, eligibility and a draft comment"),
            ("can_act", "Claim the pacing slot; returns {ok}"),
            ("record_action", "Append {author, text, label, score} to the action history"),
            ("get_history", "Action history, newest first; returns {posts}"),
            ("clear_history", "Delete the action history"),
            ("import_rules", "Validate and merge a learned-rule document"),
            ("export_rules", "Current learned rules for every role"),
            ("stop", "Turn on the global stop switch"),
            ("start", "Turn off the global stop switch"),
            ("get_config", "Current host settings"),
            ("set_config", "Update {autoActEnabled, scoringEndpoint}"),
            ("learning_stats", "Number of learned rules per role"),
            ("clear_rules", "Forget every learned rule"),
            ("ping", "Liveness check"),
            ("shutdown", "Save state and stop reading input"),
        ]
        .into_iter()
        .map(|(name, description)| MethodDescriptor::new(name, description))
        .collect()
    }
}
