//! Candidate resolution and the multi-strategy executor.
//!
//! For one item: check the already-acted and repost indicators, walk the
//! prioritized patterns until a candidate passes the strict filter, claim a
//! pacing slot, fire every invocation strategy in order, wait for the page to
//! settle, then verify and feed the outcome back to the registry.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::candidate::{CandidateSource, ElementHandle, StrategyEffect, StrictFilter};
use crate::pacing::PacingPolicy;
use crate::selectors::SelectorRegistry;
use crate::types::Role;

/// Built-in patterns for the primary action control.
pub const DEFAULT_ACTION_PATTERNS: &[&str] = &[
    r#"button[aria-label*="Like"]:not([aria-label*="Unlike"])"#,
    r#"button[data-control-name="like_toggle"]"#,
    r#".social-actions-button[aria-label*="Like"]:not([aria-label*="Unlike"])"#,
    r#".feed-shared-social-action-bar button[aria-label*="Like"]:not([aria-label*="Unlike"])"#,
    r#"button.feed-shared-social-action-bar__action-button[aria-label*="Like"]:not([aria-label*="Unlike"])"#,
    r#".reactions-react-button[aria-label*="Like"]:not([aria-label*="Unlike"])"#,
    r#"button.reactions-react-button[aria-pressed="false"]"#,
];

/// Built-in patterns that mean the action was already taken.
pub const DEFAULT_ALREADY_ACTED_PATTERNS: &[&str] = &[
    r#"button[aria-pressed="true"][aria-label*="Like"]"#,
    r#"button[aria-label*="Unlike"]"#,
    r#".reactions-react-button[aria-pressed="true"]"#,
    "button.liked",
    "button.reactions-react-button--is-reacted",
];

/// Built-in patterns that mark a reshare.
pub const DEFAULT_REPOST_PATTERNS: &[&str] = &[
    r#"[aria-label*="reposted this"]"#,
    ".feed-shared-actor__supplementary-actor-info",
    r#"[class*="repost"]"#,
    r#".update-components-actor__supplementary-actor-info:has([aria-label*="reposted"])"#,
];

/// Marker a source reports for a thumbs-up style icon inside a control.
pub const THUMBS_UP_MARKER: &str = "thumbs-up";

/// One independent way of invoking a control. Run in declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Strategy {
    /// Native activation of the element.
    DirectInvoke,
    /// Activate every descendant.
    DescendantInvoke,
    /// Lift disabled / pointer-events restrictions, activate, restore.
    ForcedStateInvoke,
    /// Call the UI framework's own click handler if one is attached.
    FrameworkHandler,
    /// Focus and dispatch a space keydown/keyup pair.
    KeyboardDispatch,
    /// Run an inline handler attribute if present.
    InlineHandler,
}

impl Strategy {
    pub const ORDERED: [Strategy; 6] = [
        Strategy::DirectInvoke,
        Strategy::DescendantInvoke,
        Strategy::ForcedStateInvoke,
        Strategy::FrameworkHandler,
        Strategy::KeyboardDispatch,
        Strategy::InlineHandler,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Strategy::DirectInvoke => "directInvoke",
            Strategy::DescendantInvoke => "descendantInvoke",
            Strategy::ForcedStateInvoke => "forcedStateInvoke",
            Strategy::FrameworkHandler => "frameworkHandler",
            Strategy::KeyboardDispatch => "keyboardDispatch",
            Strategy::InlineHandler => "inlineHandler",
        }
    }
}

impl std::fmt::Display for Strategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a single strategy went.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "kind", content = "detail")]
pub enum AttemptResult {
    Applied,
    NotApplicable,
    Error(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StrategyAttempt {
    pub strategy: Strategy,
    pub result: AttemptResult,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ActionOutcome {
    /// Invoked and verified activated.
    Success,
    /// An already-acted indicator matched; nothing invoked.
    AlreadyDone,
    /// No pattern produced an acceptable candidate.
    NotFound,
    /// Invoked, but the control did not end up activated.
    Failed,
    /// Pacing refused the slot; nothing invoked.
    Throttled,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionReport {
    pub outcome: ActionOutcome,
    /// Pattern that located the control (or the indicator that matched).
    pub pattern: Option<String>,
    /// A repost indicator matched. Informational only.
    pub is_derivative: bool,
    pub attempts: Vec<StrategyAttempt>,
}

impl ActionReport {
    fn new(outcome: ActionOutcome, pattern: Option<String>, is_derivative: bool) -> Self {
        Self {
            outcome,
            pattern,
            is_derivative,
            attempts: Vec::new(),
        }
    }
}

/// An indicator lookup run before the action.
#[derive(Debug, Clone)]
pub struct IndicatorCheck {
    pub role: Role,
    pub defaults: Vec<String>,
    pub filter: StrictFilter,
}

impl IndicatorCheck {
    pub fn new(role: Role, defaults: &[&str]) -> Self {
        Self {
            role,
            defaults: defaults.iter().map(|d| d.to_string()).collect(),
            filter: StrictFilter::presence(),
        }
    }
}

/// What to find and how to judge it.
#[derive(Debug, Clone)]
pub struct ActionPlan {
    pub role: Role,
    pub defaults: Vec<String>,
    pub filter: StrictFilter,
    pub already_done: Option<IndicatorCheck>,
    pub derivative: Option<IndicatorCheck>,
}

impl ActionPlan {
    pub fn new(role: Role, defaults: &[&str], filter: StrictFilter) -> Self {
        Self {
            role,
            defaults: defaults.iter().map(|d| d.to_string()).collect(),
            filter,
            already_done: None,
            derivative: None,
        }
    }

    pub fn with_already_done(mut self, check: IndicatorCheck) -> Self {
        self.already_done = Some(check);
        self
    }

    pub fn with_derivative(mut self, check: IndicatorCheck) -> Self {
        self.derivative = Some(check);
        self
    }

    /// The "like" plan: built-in patterns, strict like/unlike filter with a
    /// thumbs-up icon, plus both indicator pre-checks.
    pub fn primary_action() -> Self {
        Self::new(
            Role::PrimaryAction,
            DEFAULT_ACTION_PATTERNS,
            StrictFilter::action("like", &["unlike"], &[THUMBS_UP_MARKER]),
        )
        .with_already_done(IndicatorCheck::new(
            Role::AlreadyActedIndicator,
            DEFAULT_ALREADY_ACTED_PATTERNS,
        ))
        .with_derivative(IndicatorCheck::new(Role::RepostIndicator, DEFAULT_REPOST_PATTERNS))
    }
}

pub struct ActionExecutor {
    registry: Arc<SelectorRegistry>,
    pacing: Arc<PacingPolicy>,
    settle_delay: Duration,
}

impl ActionExecutor {
    pub fn new(registry: Arc<SelectorRegistry>, pacing: Arc<PacingPolicy>, settle_delay: Duration) -> Self {
        Self {
            registry,
            pacing,
            settle_delay,
        }
    }

    pub fn registry(&self) -> &Arc<SelectorRegistry> {
        &self.registry
    }

    pub fn pacing(&self) -> &Arc<PacingPolicy> {
        &self.pacing
    }

    /// Locate the plan's control in `source` and act on it.
    pub async fn resolve_and_act(&self, source: &dyn CandidateSource, plan: &ActionPlan) -> ActionReport {
        if let Some(check) = &plan.already_done {
            if let Some(pattern) = self.detect(source, check).await {
                tracing::debug!("Already acted (detected via: {pattern})");
                return ActionReport::new(ActionOutcome::AlreadyDone, Some(pattern), false);
            }
        }

        let is_derivative = match &plan.derivative {
            Some(check) => match self.detect(source, check).await {
                Some(pattern) => {
                    tracing::debug!("Detected repost (via: {pattern})");
                    true
                }
                None => false,
            },
            None => false,
        };

        let patterns = self.registry.prioritize(plan.role, &plan.defaults);
        let mut tried = Vec::new();
        let mut found = None;
        for pattern in patterns {
            match self.first_accepted(source, &pattern, &plan.filter).await {
                Some(handle) => {
                    found = Some((pattern, handle));
                    break;
                }
                None => tried.push(pattern),
            }
        }

        let Some((pattern, handle)) = found else {
            tracing::debug!("No {} control found after {} patterns", plan.role, tried.len());
            for p in &tried {
                self.registry.record(plan.role, p, false);
            }
            return ActionReport::new(ActionOutcome::NotFound, None, is_derivative);
        };
        tracing::debug!("Found {} control (pattern: {pattern})", plan.role);

        if !self.pacing.try_acquire() {
            tracing::debug!("Pacing refused action, retry later");
            return ActionReport::new(ActionOutcome::Throttled, Some(pattern), is_derivative);
        }

        let mut attempts = Vec::with_capacity(Strategy::ORDERED.len());
        for strategy in Strategy::ORDERED {
            let result = match source.invoke(&handle, strategy).await {
                Ok(StrategyEffect::Applied) => AttemptResult::Applied,
                Ok(StrategyEffect::NotApplicable) => AttemptResult::NotApplicable,
                Err(e) => {
                    tracing::debug!("Strategy {strategy} failed: {e}");
                    AttemptResult::Error(e.to_string())
                }
            };
            attempts.push(StrategyAttempt { strategy, result });
        }

        if !self.settle_delay.is_zero() {
            tokio::time::sleep(self.settle_delay).await;
        }

        let activated = match source.read_state(&handle).await {
            Ok(state) => state.activated,
            Err(e) => {
                tracing::warn!("Could not verify {} control: {e}", plan.role);
                false
            }
        };

        self.registry.record(plan.role, &pattern, activated);

        let outcome = if activated {
            tracing::info!("Action verified (pattern: {pattern})");
            ActionOutcome::Success
        } else {
            tracing::warn!("Strategies did not activate the control (pattern: {pattern})");
            ActionOutcome::Failed
        };

        ActionReport {
            outcome,
            pattern: Some(pattern),
            is_derivative,
            attempts,
        }
    }

    /// Run an indicator check; a hit counts as a success for its pattern.
    async fn detect(&self, source: &dyn CandidateSource, check: &IndicatorCheck) -> Option<String> {
        for pattern in self.registry.prioritize(check.role, &check.defaults) {
            if self.first_accepted(source, &pattern, &check.filter).await.is_some() {
                self.registry.record(check.role, &pattern, true);
                return Some(pattern);
            }
        }
        None
    }

    async fn first_accepted(
        &self,
        source: &dyn CandidateSource,
        pattern: &str,
        filter: &StrictFilter,
    ) -> Option<ElementHandle> {
        let handles = match source.find_candidates(pattern).await {
            Ok(h) => h,
            Err(e) => {
                tracing::debug!("Pattern {pattern} could not be queried: {e}");
                return None;
            }
        };

        for handle in handles {
            match source.read_state(&handle).await {
                Ok(state) if filter.accepts(&state) => return Some(handle),
                Ok(_) => {}
                Err(e) => tracing::debug!("Skipping candidate {handle}: {e}"),
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::candidate::ElementState;
    use crate::error::{PilotError, PilotResult};
    use crate::random::RandomSource;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// In-memory page: pattern -> handles, handle -> state.
    #[derive(Default)]
    struct FakePage {
        matches: HashMap<String, Vec<String>>,
        states: Mutex<HashMap<String, ElementState>>,
        /// Strategy that flips the element to activated.
        activating: Option<Strategy>,
        failing: Vec<Strategy>,
        invoked: Mutex<Vec<Strategy>>,
    }

    impl FakePage {
        fn with(mut self, pattern: &str, handle: &str, state: ElementState) -> Self {
            self.matches
                .entry(pattern.to_string())
                .or_default()
                .push(handle.to_string());
            self.states
                .lock()
                .unwrap()
                .insert(handle.to_string(), state);
            self
        }
    }

    #[async_trait]
    impl CandidateSource for FakePage {
        async fn find_candidates(&self, pattern: &str) -> PilotResult<Vec<ElementHandle>> {
            Ok(self
                .matches
                .get(pattern)
                .map(|v| v.iter().cloned().map(ElementHandle).collect())
                .unwrap_or_default())
        }

        async fn read_state(&self, handle: &ElementHandle) -> PilotResult<ElementState> {
            self.states
                .lock()
                .unwrap()
                .get(&handle.0)
                .cloned()
                .ok_or_else(|| PilotError::Source(format!("no element {handle}")))
        }

        async fn invoke(&self, handle: &ElementHandle, strategy: Strategy) -> PilotResult<StrategyEffect> {
            self.invoked.lock().unwrap().push(strategy);
            if self.failing.contains(&strategy) {
                return Err(PilotError::Source("boom".into()));
            }
            if self.activating == Some(strategy) {
                if let Some(s) = self.states.lock().unwrap().get_mut(&handle.0) {
                    s.activated = true;
                }
            }
            Ok(StrategyEffect::Applied)
        }
    }

    fn like(label: &str) -> ElementState {
        ElementState {
            attached: true,
            visible: true,
            activated: false,
            label: label.to_string(),
            text: String::new(),
            markers: vec![THUMBS_UP_MARKER.to_string()],
        }
    }

    fn present() -> ElementState {
        ElementState {
            attached: true,
            ..Default::default()
        }
    }

    fn executor(interval: Duration) -> ActionExecutor {
        let registry = Arc::new(SelectorRegistry::new(Arc::new(RandomSource::seeded(1)), 0.0));
        ActionExecutor::new(registry, Arc::new(PacingPolicy::new(interval)), Duration::ZERO)
    }

    #[tokio::test]
    async fn test_success_records_pattern() {
        let pattern = DEFAULT_ACTION_PATTERNS[0];
        let page = FakePage {
            activating: Some(Strategy::KeyboardDispatch),
            ..Default::default()
        }
        .with(pattern, "h1", like("Like"));

        let ex = executor(Duration::ZERO);
        let report = ex.resolve_and_act(&page, &ActionPlan::primary_action()).await;

        assert_eq!(report.outcome, ActionOutcome::Success);
        assert_eq!(report.pattern.as_deref(), Some(pattern));
        assert_eq!(report.attempts.len(), 6);
        let rules = ex.registry().rules(Role::PrimaryAction);
        assert_eq!(rules[0].pattern, pattern);
        assert_eq!(rules[0].success_count, 1);
    }

    #[tokio::test]
    async fn test_strict_filter_skips_unlike_and_pressed() {
        let p0 = DEFAULT_ACTION_PATTERNS[0];
        let p1 = DEFAULT_ACTION_PATTERNS[1];
        let mut pressed = like("Like");
        pressed.activated = true;
        let page = FakePage {
            activating: Some(Strategy::DirectInvoke),
            ..Default::default()
        }
        .with(p0, "unlike", like("Unlike"))
        .with(p0, "pressed", pressed)
        .with(p1, "good", like("Like"));

        let ex = executor(Duration::ZERO);
        let report = ex.resolve_and_act(&page, &ActionPlan::primary_action()).await;
        assert_eq!(report.outcome, ActionOutcome::Success);
        assert_eq!(report.pattern.as_deref(), Some(p1));
    }

    #[tokio::test]
    async fn test_already_done_invokes_nothing() {
        let page = FakePage::default()
            .with(DEFAULT_ALREADY_ACTED_PATTERNS[1], "u", present())
            .with(DEFAULT_ACTION_PATTERNS[0], "h", like("Like"));

        let ex = executor(Duration::ZERO);
        let report = ex.resolve_and_act(&page, &ActionPlan::primary_action()).await;
        assert_eq!(report.outcome, ActionOutcome::AlreadyDone);
        assert!(page.invoked.lock().unwrap().is_empty());
        assert_eq!(ex.registry().stats().already_acted_indicator, 1);
    }

    #[tokio::test]
    async fn test_not_found_records_failures_but_not_indicators() {
        let page = FakePage::default();
        let ex = executor(Duration::ZERO);
        let report = ex.resolve_and_act(&page, &ActionPlan::primary_action()).await;

        assert_eq!(report.outcome, ActionOutcome::NotFound);
        let rules = ex.registry().rules(Role::PrimaryAction);
        assert_eq!(rules.len(), DEFAULT_ACTION_PATTERNS.len());
        assert!(rules.iter().all(|r| r.failure_count == 1 && r.success_count == 0));
        assert_eq!(ex.registry().stats().already_acted_indicator, 0);
        assert_eq!(ex.registry().stats().repost_indicator, 0);
    }

    #[tokio::test]
    async fn test_failing_strategy_does_not_abort_the_rest() {
        let pattern = DEFAULT_ACTION_PATTERNS[0];
        let page = FakePage {
            activating: Some(Strategy::InlineHandler),
            failing: vec![Strategy::DirectInvoke, Strategy::FrameworkHandler],
            ..Default::default()
        }
        .with(pattern, "h", like("Like"));

        let ex = executor(Duration::ZERO);
        let report = ex.resolve_and_act(&page, &ActionPlan::primary_action()).await;
        assert_eq!(report.outcome, ActionOutcome::Success);
        assert_eq!(*page.invoked.lock().unwrap(), Strategy::ORDERED.to_vec());
        assert!(matches!(report.attempts[0].result, AttemptResult::Error(_)));
    }

    #[tokio::test]
    async fn test_unverified_click_is_failure() {
        let pattern = DEFAULT_ACTION_PATTERNS[0];
        let page = FakePage::default().with(pattern, "h", like("Like"));

        let ex = executor(Duration::ZERO);
        let report = ex.resolve_and_act(&page, &ActionPlan::primary_action()).await;
        assert_eq!(report.outcome, ActionOutcome::Failed);
        let rules = ex.registry().rules(Role::PrimaryAction);
        assert_eq!(rules[0].failure_count, 1);
    }

    #[tokio::test]
    async fn test_throttled_invokes_nothing() {
        let pattern = DEFAULT_ACTION_PATTERNS[0];
        let page = FakePage::default().with(pattern, "h", like("Like"));

        let ex = executor(Duration::from_secs(60));
        assert!(ex.pacing().try_acquire());
        let report = ex.resolve_and_act(&page, &ActionPlan::primary_action()).await;
        assert_eq!(report.outcome, ActionOutcome::Throttled);
        assert!(page.invoked.lock().unwrap().is_empty());
        assert!(ex.registry().rules(Role::PrimaryAction).is_empty());
    }

    #[tokio::test]
    async fn test_repost_is_informational() {
        let page = FakePage {
            activating: Some(Strategy::DirectInvoke),
            ..Default::default()
        }
        .with(DEFAULT_REPOST_PATTERNS[0], "r", present())
        .with(DEFAULT_ACTION_PATTERNS[0], "h", like("Like"));

        let ex = executor(Duration::ZERO);
        let report = ex.resolve_and_act(&page, &ActionPlan::primary_action()).await;
        assert!(report.is_derivative);
        assert_eq!(report.outcome, ActionOutcome::Success);
    }

    #[tokio::test]
    async fn test_learned_pattern_tried_first() {
        let custom = "button.custom-like";
        let page = FakePage {
            activating: Some(Strategy::DirectInvoke),
            ..Default::default()
        }
        .with(custom, "c", like("Like"))
        .with(DEFAULT_ACTION_PATTERNS[0], "d", like("Like"));

        let ex = executor(Duration::ZERO);
        ex.registry().record(Role::PrimaryAction, custom, true);
        let report = ex.resolve_and_act(&page, &ActionPlan::primary_action()).await;
        assert_eq!(report.pattern.as_deref(), Some(custom));
    }

    #[tokio::test(start_paused = true)]
    async fn test_settle_delay_waits_before_verifying() {
        let pattern = DEFAULT_ACTION_PATTERNS[0];
        let page = FakePage {
            activating: Some(Strategy::DirectInvoke),
            ..Default::default()
        }
        .with(pattern, "h", like("Like"));

        let registry = Arc::new(SelectorRegistry::new(Arc::new(RandomSource::seeded(1)), 0.0));
        let ex = ActionExecutor::new(
            registry,
            Arc::new(PacingPolicy::new(Duration::ZERO)),
            Duration::from_secs(1),
        );
        let start = tokio::time::Instant::now();
        let report = ex.resolve_and_act(&page, &ActionPlan::primary_action()).await;
        assert_eq!(report.outcome, ActionOutcome::Success);
        assert!(start.elapsed() >= Duration::from_secs(1));
    }
}
