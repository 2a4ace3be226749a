//! Chromium-backed [`ScriptHost`] via chromiumoxide.

use std::path::PathBuf;

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::Page;
use futures::StreamExt;

use crate::error::{PilotError, PilotResult};
use crate::script::ScriptHost;

/// Owns a headless browser and hands out page hosts.
pub struct ChromiumBrowser {
    browser: Browser,
}

impl ChromiumBrowser {
    /// Launch a headless Chromium. Uses `chrome_path` when given, otherwise
    /// lets chromiumoxide locate an installed browser.
    pub async fn launch(chrome_path: Option<PathBuf>) -> PilotResult<Self> {
        let mut builder = BrowserConfig::builder()
            .arg("--headless=new")
            .arg("--disable-gpu")
            .arg("--no-sandbox")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-extensions");
        if let Some(path) = chrome_path {
            builder = builder.chrome_executable(path);
        }
        let config = builder
            .build()
            .map_err(|e| PilotError::Source(format!("failed to build browser config: {e}")))?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| PilotError::Source(format!("failed to launch Chromium: {e}")))?;

        tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    tracing::debug!("Browser handler event error: {e}");
                }
            }
        });

        tracing::info!("Launched headless Chromium");
        Ok(Self { browser })
    }

    /// Open `url` in a new tab.
    pub async fn open(&self, url: &str) -> PilotResult<ChromiumHost> {
        let page = self
            .browser
            .new_page(url)
            .await
            .map_err(|e| PilotError::Source(format!("failed to open {url}: {e}")))?;
        Ok(ChromiumHost::new(page))
    }
}

/// Evaluates scripts in one Chromium tab.
pub struct ChromiumHost {
    page: Page,
}

impl ChromiumHost {
    pub fn new(page: Page) -> Self {
        Self { page }
    }

    pub fn page(&self) -> &Page {
        &self.page
    }
}

#[async_trait]
impl ScriptHost for ChromiumHost {
    async fn evaluate(&self, script: &str) -> PilotResult<serde_json::Value> {
        let result = self
            .page
            .evaluate(script)
            .await
            .map_err(|e| PilotError::Source(format!("JS execution failed: {e}")))?;

        result
            .into_value()
            .map_err(|e| PilotError::Source(format!("failed to convert JS result: {e:?}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    use crate::candidate::CandidateSource;
    use crate::executor::{ActionExecutor, ActionOutcome, ActionPlan};
    use crate::pacing::PacingPolicy;
    use crate::random::RandomSource;
    use crate::script::ScriptCandidateSource;
    use crate::selectors::SelectorRegistry;
    use crate::types::Role;

    const PAGE: &str = "data:text/html,<div id='post'><p>Great launch</p>\
        <button aria-label='Like' onclick=\"this.setAttribute('aria-pressed','true')\">\
        <span class='like-icon'></span>Like</button></div>";

    #[tokio::test]
    #[ignore] // Requires Chromium to be installed
    async fn test_chromium_find_and_act() {
        let browser = ChromiumBrowser::launch(None).await.expect("launch failed");
        let host = Arc::new(browser.open(PAGE).await.expect("open failed"));
        let source = ScriptCandidateSource::new(Arc::clone(&host), "#post");

        let handles = source.find_candidates("button").await.unwrap();
        assert_eq!(handles.len(), 1);
        let state = source.read_state(&handles[0]).await.unwrap();
        assert!(state.attached && state.visible && !state.activated);

        let registry = Arc::new(SelectorRegistry::new(Arc::new(RandomSource::seeded(1)), 0.0));
        let executor = ActionExecutor::new(
            Arc::clone(&registry),
            Arc::new(PacingPolicy::new(Duration::from_secs(2))),
            Duration::from_millis(200),
        );
        let report = executor
            .resolve_and_act(&source, &ActionPlan::primary_action())
            .await;

        assert_eq!(report.outcome, ActionOutcome::Success, "{report:?}");
        assert_eq!(registry.rules(Role::PrimaryAction)[0].success_count, 1);
    }
}
