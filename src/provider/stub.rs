//! In-process provider used by tests and dry runs: answers instantly with a
//! fixed text, optionally failing for selected site keys or image URLs.

use crate::error::{Result, SolverError};
use crate::provider::{Provider, ProviderResponse, SolveRequest};
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};

pub struct StubProvider {
    text: String,
    fail_site_keys: Vec<String>,
    counter: AtomicUsize,
}

impl StubProvider {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into(), fail_site_keys: Vec::new(), counter: AtomicUsize::new(0) }
    }

    /// Fail any request carrying this site key
    pub fn failing_for(mut self, site_key: impl Into<String>) -> Self {
        self.fail_site_keys.push(site_key.into());
        self
    }
}

#[async_trait]
impl Provider for StubProvider {
    fn id(&self) -> &str {
        "stub"
    }

    async fn solve(&self, request: &SolveRequest) -> Result<ProviderResponse> {
        if let Some(key) = request.site_key.as_deref() {
            if self.fail_site_keys.iter().any(|k| k == key) {
                return Err(SolverError::Provider(format!(
                    "stub configured to fail for site key {}",
                    key
                )));
            }
        }
        let n = self.counter.fetch_add(1, Ordering::Relaxed);
        Ok(ProviderResponse {
            provider_id: self.id().to_string(),
            request_id: format!("stub-{}", n),
            text: self.text.clone(),
        })
    }
}
