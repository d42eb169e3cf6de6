use crate::error::{Result, SolverError};
use crate::page::snapshot::PageSnapshot;
use headless_chrome::Tab;
use std::sync::Arc;

/// Script-execution seam between the engine and the host automation layer.
///
/// Detection and injection run as independent, stateless page-script
/// invocations: `snapshot` serializes the page (and its reachable
/// sub-documents) into values the engine can keep, and `eval` runs a script
/// in page context without handing back any live object references.
pub trait PageHandle {
    /// Capture the current page state as a serializable snapshot
    fn snapshot(&self) -> Result<PageSnapshot>;

    /// Evaluate a script in page context and return its JSON value
    fn eval(&self, js: &str) -> Result<serde_json::Value>;
}

/// `PageHandle` adapter over a Chrome DevTools Protocol tab
pub struct Page {
    tab: Arc<Tab>,
}

impl Page {
    pub fn new(tab: Arc<Tab>) -> Self {
        Self { tab }
    }

    /// The underlying CDP tab
    pub fn tab(&self) -> &Arc<Tab> {
        &self.tab
    }
}

impl PageHandle for Page {
    fn snapshot(&self) -> Result<PageSnapshot> {
        let js_code = include_str!("extract_page.js");

        let result = self
            .tab
            .evaluate(js_code, false)
            .map_err(|e| SolverError::SnapshotFailed(format!("extraction script failed: {}", e)))?;

        let json_value = result
            .value
            .ok_or_else(|| SolverError::SnapshotFailed("no value returned from extraction".to_string()))?;

        // The script returns a JSON string, not a JSON object
        let json_str: String = serde_json::from_value(json_value)
            .map_err(|e| SolverError::SnapshotFailed(format!("unexpected extraction value: {}", e)))?;

        PageSnapshot::from_json(&json_str)
            .map_err(|e| SolverError::SnapshotFailed(format!("failed to parse snapshot JSON: {}", e)))
    }

    fn eval(&self, js: &str) -> Result<serde_json::Value> {
        let result = self
            .tab
            .evaluate(js, false)
            .map_err(|e| SolverError::ScriptFailed(e.to_string()))?;

        Ok(result.value.unwrap_or(serde_json::Value::Null))
    }
}

/// Best-effort call into a host-provided page-side logging bridge.
/// Failures are swallowed: the sink is diagnostics, never control flow.
pub fn debug_to_page(page: &dyn PageHandle, sink: Option<&str>, message: &str) {
    let Some(sink) = sink else { return };
    let js = format!(
        r#"(function() {{
            try {{
                if (window[{sink}]) {{ window[{sink}]({msg}); }}
            }} catch (e) {{}}
            return true;
        }})()"#,
        sink = serde_json::to_string(sink).unwrap_or_default(),
        msg = serde_json::to_string(message).unwrap_or_default(),
    );
    if let Err(e) = page.eval(&js) {
        log::debug!("debug sink call failed: {}", e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::page::node::ElementNode;
    use crate::page::snapshot::FrameDocument;
    use std::cell::RefCell;

    struct RecordingPage {
        evals: RefCell<Vec<String>>,
    }

    impl PageHandle for RecordingPage {
        fn snapshot(&self) -> Result<PageSnapshot> {
            Ok(PageSnapshot::new(vec![FrameDocument::new(
                "about:blank",
                ElementNode::new("body"),
            )]))
        }

        fn eval(&self, js: &str) -> Result<serde_json::Value> {
            self.evals.borrow_mut().push(js.to_string());
            Ok(serde_json::Value::Bool(true))
        }
    }

    #[test]
    fn test_debug_to_page_noop_without_sink() {
        let page = RecordingPage { evals: RefCell::new(Vec::new()) };
        debug_to_page(&page, None, "hello");
        assert!(page.evals.borrow().is_empty());
    }

    #[test]
    fn test_debug_to_page_escapes_message() {
        let page = RecordingPage { evals: RefCell::new(Vec::new()) };
        debug_to_page(&page, Some("myDebugSink"), "found \"3\" captchas");
        let evals = page.evals.borrow();
        assert_eq!(evals.len(), 1);
        assert!(evals[0].contains("\"myDebugSink\""));
        assert!(evals[0].contains("found \\\"3\\\" captchas"));
    }
}
