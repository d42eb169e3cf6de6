//! Provider adapter: a uniform interface over external solving backends.
//!
//! The orchestrator fans one [`SolveRequest`] out per challenge and treats
//! the provider's internal polling/retry loop as opaque; only the black-box
//! `solve` contract is used here.

pub mod stub;
pub mod twocaptcha;

use crate::challenge::VendorTag;
use crate::error::Result;
use async_trait::async_trait;
use std::time::Duration;

pub use stub::StubProvider;
pub use twocaptcha::{ProxyConfig, TwoCaptchaOptions, TwoCaptchaProvider};

/// Normalized request sent to a solving backend
#[derive(Debug, Clone)]
pub struct SolveRequest {
    pub vendor: VendorTag,

    /// Site key for widget challenges
    pub site_key: Option<String>,

    /// URL of the page hosting the widget
    pub page_url: Option<String>,

    /// Raw base64 image payload (data URL prefix already stripped)
    pub image_data: Option<String>,

    /// Action name for score-based flows
    pub action: Option<String>,

    /// Google site-specific secondary parameter
    pub data_s: Option<String>,

    pub is_enterprise: bool,
}

/// Normalized answer from a solving backend
#[derive(Debug, Clone)]
pub struct ProviderResponse {
    /// Stable identifier of the backend ("2captcha")
    pub provider_id: String,

    /// Backend-assigned id of this solve job
    pub request_id: String,

    /// Token (widgets) or solved text (image puzzles)
    pub text: String,
}

/// Polling behavior for backends that resolve jobs asynchronously
#[derive(Debug, Clone)]
pub struct PollOptions {
    /// Delay before the first status check
    pub initial_delay: Duration,

    /// Interval between status checks
    pub interval: Duration,

    /// Upper bound on status checks before giving up
    pub max_attempts: usize,
}

impl Default for PollOptions {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(5),
            interval: Duration::from_secs(2),
            max_attempts: 60,
        }
    }
}

/// External solving backend contract
#[async_trait]
pub trait Provider: Send + Sync {
    /// Stable identifier of this backend
    fn id(&self) -> &str;

    /// Solve one challenge. Implementations poll their backend internally
    /// until a terminal result; missing-payload conditions must fail locally
    /// before any remote call.
    async fn solve(&self, request: &SolveRequest) -> Result<ProviderResponse>;
}

impl SolveRequest {
    /// Strip a `data:image/...;base64,` prefix, leaving the raw payload
    pub fn raw_base64(data: &str) -> &str {
        match data.split_once(',') {
            Some((prefix, rest)) if prefix.starts_with("data:image") => rest,
            _ => data,
        }
    }
}
