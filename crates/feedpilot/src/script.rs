//! Candidate source backed by JavaScript evaluated in a page.
//!
//! Every capability call becomes one self-contained snippet run through a
//! [`ScriptHost`]. Matched elements are tagged with a `data-feedpilot-handle`
//! attribute, which is the opaque handle handed back to the executor.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::candidate::{CandidateSource, ElementHandle, ElementState, StrategyEffect};
use crate::error::{PilotError, PilotResult};
use crate::executor::{Strategy, THUMBS_UP_MARKER};

const HANDLE_ATTR: &str = "data-feedpilot-handle";

/// Anything that can evaluate a script in a page and return its JSON result.
#[async_trait]
pub trait ScriptHost: Send + Sync {
    async fn evaluate(&self, script: &str) -> PilotResult<Value>;
}

/// A [`CandidateSource`] scoped to the element matching `scope` in the page.
pub struct ScriptCandidateSource<H: ScriptHost> {
    host: Arc<H>,
    scope: String,
}

impl<H: ScriptHost> ScriptCandidateSource<H> {
    /// `scope` is a CSS selector for the item's root element.
    pub fn new(host: Arc<H>, scope: impl Into<String>) -> Self {
        Self {
            host,
            scope: scope.into(),
        }
    }

    pub fn scope(&self) -> &str {
        &self.scope
    }

    async fn run(&self, script: String) -> PilotResult<serde_json::Map<String, Value>> {
        let value = self.host.evaluate(&script).await?;
        let obj = match value {
            Value::Object(obj) => obj,
            other => {
                return Err(PilotError::Source(format!(
                    "unexpected script result: {other}"
                )))
            }
        };
        if let Some(err) = obj.get("error").and_then(Value::as_str) {
            return Err(PilotError::Source(err.to_string()));
        }
        Ok(obj)
    }
}

#[async_trait]
impl<H: ScriptHost> CandidateSource for ScriptCandidateSource<H> {
    async fn find_candidates(&self, pattern: &str) -> PilotResult<Vec<ElementHandle>> {
        let obj = self.run(find_script(&self.scope, pattern)).await?;
        let handles = obj
            .get("handles")
            .and_then(Value::as_array)
            .ok_or_else(|| PilotError::Source("missing 'handles' in result".into()))?;
        Ok(handles
            .iter()
            .filter_map(Value::as_str)
            .map(|h| ElementHandle(h.to_string()))
            .collect())
    }

    async fn read_state(&self, handle: &ElementHandle) -> PilotResult<ElementState> {
        let obj = self.run(state_script(handle)).await?;
        serde_json::from_value(Value::Object(obj))
            .map_err(|e| PilotError::Source(format!("malformed element state: {e}")))
    }

    async fn invoke(&self, handle: &ElementHandle, strategy: Strategy) -> PilotResult<StrategyEffect> {
        let obj = self.run(invoke_script(handle, strategy)).await?;
        if obj.get("applied").and_then(Value::as_bool).unwrap_or(false) {
            Ok(StrategyEffect::Applied)
        } else {
            Ok(StrategyEffect::NotApplicable)
        }
    }
}

/// Query `pattern` under the scope root and tag every match.
fn find_script(scope: &str, pattern: &str) -> String {
    format!(
        r#"(() => {{
            const root = document.querySelector('{scope}');
            if (!root) return {{ error: 'scope not found' }};
            let nodes;
            try {{ nodes = root.querySelectorAll('{pattern}'); }}
            catch (e) {{ return {{ error: 'invalid pattern: ' + e.message }}; }}
            const handles = [];
            for (const el of nodes) {{
                if (!el.hasAttribute('{attr}')) {{
                    window.__feedpilotSeq = (window.__feedpilotSeq || 0) + 1;
                    el.setAttribute('{attr}', 'fp-' + window.__feedpilotSeq);
                }}
                handles.push(el.getAttribute('{attr}'));
            }}
            return {{ handles }};
        }})()"#,
        scope = sanitize_js_string(scope),
        pattern = sanitize_js_string(pattern),
        attr = HANDLE_ATTR,
    )
}

fn state_script(handle: &ElementHandle) -> String {
    format!(
        r#"(() => {{
            const el = document.querySelector('[{attr}="{handle}"]');
            if (!el) return {{ attached: false, visible: false, activated: false, label: '', text: '', markers: [] }};
            const markers = [];
            const html = el.innerHTML;
            if (el.querySelector('svg[data-test-icon="thumbs-up-outline"], .like-icon, [class*="like"]')
                || html.includes('thumbs-up') || html.includes('like-icon')) {{
                markers.push('{marker}');
            }}
            const cls = el.classList;
            return {{
                attached: el.isConnected,
                visible: el.offsetParent !== null,
                activated: el.getAttribute('aria-pressed') === 'true'
                    || cls.contains('active') || cls.contains('liked')
                    || cls.contains('reactions-react-button--is-reacted'),
                label: el.getAttribute('aria-label') || '',
                text: (el.textContent || '').trim(),
                markers,
            }};
        }})()"#,
        attr = HANDLE_ATTR,
        handle = sanitize_js_string(&handle.0),
        marker = THUMBS_UP_MARKER,
    )
}

fn invoke_script(handle: &ElementHandle, strategy: Strategy) -> String {
    format!(
        r#"(() => {{
            const el = document.querySelector('[{attr}="{handle}"]');
            if (!el) return {{ error: 'element detached' }};
            try {{ {body} }}
            catch (e) {{ return {{ error: String(e) }}; }}
        }})()"#,
        attr = HANDLE_ATTR,
        handle = sanitize_js_string(&handle.0),
        body = strategy_body(strategy),
    )
}

fn strategy_body(strategy: Strategy) -> &'static str {
    match strategy {
        Strategy::DirectInvoke => "el.click(); return { applied: true };",
        Strategy::DescendantInvoke => {
            "const kids = el.querySelectorAll('*'); \
             kids.forEach(k => k.click()); \
             return { applied: kids.length > 0 };"
        }
        Strategy::ForcedStateInvoke => {
            "const pe = el.style.pointerEvents; const dis = el.disabled; \
             el.style.pointerEvents = 'auto'; el.disabled = false; \
             try { el.click(); } finally { el.style.pointerEvents = pe; el.disabled = dis; } \
             return { applied: true };"
        }
        Strategy::FrameworkHandler => {
            "const key = Object.keys(el).find(k => k.startsWith('__react')); \
             const props = key && el[key] && el[key].memoizedProps; \
             if (!props || typeof props.onClick !== 'function') return { applied: false }; \
             props.onClick({ preventDefault() {}, stopPropagation() {}, target: el, currentTarget: el }); \
             return { applied: true };"
        }
        Strategy::KeyboardDispatch => {
            "el.focus(); \
             const opts = { key: ' ', code: 'Space', keyCode: 32, which: 32, bubbles: true, cancelable: true }; \
             el.dispatchEvent(new KeyboardEvent('keydown', opts)); \
             el.dispatchEvent(new KeyboardEvent('keyup', opts)); \
             return { applied: true };"
        }
        Strategy::InlineHandler => {
            "const code = el.getAttribute('onclick'); \
             if (!code) return { applied: false }; \
             new Function(code).call(el); \
             return { applied: true };"
        }
    }
}

/// Escape a string for a single- or double-quoted JavaScript string literal.
///
/// Also neutralizes `<` and `>` so a value can never close a surrounding
/// `<script>` element, and drops NUL bytes.
pub fn sanitize_js_string(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 8);
    for ch in s.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '\'' => out.push_str("\\'"),
            '"' => out.push_str("\\\""),
            '`' => out.push_str("\\`"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '\u{2028}' => out.push_str("\\u2028"),
            '\u{2029}' => out.push_str("\\u2029"),
            '\0' => {}
            '<' => out.push_str("\\x3c"),
            '>' => out.push_str("\\x3e"),
            _ => out.push(ch),
        }
    }
    out
}
