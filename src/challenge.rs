//! Challenge data model shared by detection, solving, and injection.
//!
//! All records are plain values: a [`ChallengeRecord`] is created fresh on
//! every detection pass, consumed to produce a [`Solution`], which is in
//! turn consumed to produce a [`SolvedRecord`]. Nothing here refers to live
//! page objects.

use crate::descriptor::ElementDescriptor;
use serde::{Deserialize, Serialize};
use std::time::SystemTime;

/// Challenge vendor family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum VendorTag {
    /// reCAPTCHA v2 checkbox (or invisible) widget
    RecaptchaCheckbox,
    /// reCAPTCHA v3 / score-based programmatic widget
    RecaptchaScore,
    /// hCaptcha widget
    Hcaptcha,
    /// Generic image puzzle
    Image,
}

impl VendorTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            VendorTag::RecaptchaCheckbox => "recaptcha-checkbox",
            VendorTag::RecaptchaScore => "recaptcha-score",
            VendorTag::Hcaptcha => "hcaptcha",
            VendorTag::Image => "image",
        }
    }

    /// Whether this is a token-based widget (as opposed to an image puzzle)
    pub fn is_widget(&self) -> bool {
        !matches!(self, VendorTag::Image)
    }
}

impl std::fmt::Display for VendorTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Vendor-specific data carried by a widget challenge
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct WidgetPayload {
    /// Site key configured for the widget
    pub site_key: String,

    /// URL of the page (or frame) hosting the widget
    pub page_url: String,

    /// Optional action name for score-based flows
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,

    /// Google site-specific `data-s` parameter, passed through to the provider
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_s: Option<String>,

    pub is_enterprise: bool,

    /// Widget renders in invisible/programmatic mode
    pub is_invisible: bool,

    /// A response slot (`textarea[name=...-response]`) exists in the document
    pub has_response_slot: bool,

    /// An active challenge overlay (image-grid popup) is currently presented
    pub has_active_overlay: bool,

    /// The response slot already carries a non-empty value
    pub is_solved: bool,
}

/// Vendor-specific data carried by an image challenge
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ImagePayload {
    /// Absolute, normalized image URL (dedup key within one pass)
    pub image_url: String,

    /// Inline PNG data URL captured from the rendered image; absent for
    /// cross-origin images, which cannot be encoded and stay unsolvable
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_data: Option<String>,
}

/// Payload variants, one per vendor family
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ChallengePayload {
    Widget(WidgetPayload),
    Image(ImagePayload),
}

/// One detected challenge instance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChallengeRecord {
    pub vendor: VendorTag,

    /// Unique within one detection pass; correlates solutions and injection
    pub id: String,

    /// URL of the frame the challenge was found in
    pub frame_url: String,

    pub in_viewport: bool,

    /// Descriptor of the widget container / image element
    #[serde(skip_serializing_if = "Option::is_none")]
    pub descriptor: Option<ElementDescriptor>,

    /// Advisory descriptor for the related input control. Injection re-derives
    /// the input independently; this exists for callers inspecting results.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_descriptor: Option<ElementDescriptor>,

    /// Advisory descriptor for the related submit control
    #[serde(skip_serializing_if = "Option::is_none")]
    pub submit_descriptor: Option<ElementDescriptor>,

    pub payload: ChallengePayload,
}

impl ChallengeRecord {
    pub fn widget(&self) -> Option<&WidgetPayload> {
        match &self.payload {
            ChallengePayload::Widget(w) => Some(w),
            _ => None,
        }
    }

    pub fn image(&self) -> Option<&ImagePayload> {
        match &self.payload {
            ChallengePayload::Image(i) => Some(i),
            _ => None,
        }
    }
}

/// Why a detected challenge was excluded from solving
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FilterReason {
    ViewportOnly,
    ScoreBasedDisabled,
    InactiveChallengeDisabled,
    ImageDisabled,
}

/// A dropped challenge together with the policy that dropped it
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilterDecision {
    pub challenge_id: String,
    pub vendor: VendorTag,
    pub reason: FilterReason,
}

/// Provider answer for one challenge
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Solution {
    pub id: String,
    pub vendor: VendorTag,
    pub provider_id: String,

    /// Token (widgets) or solved text (image puzzles)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,

    /// Site key copied from the challenge, used to re-locate the widget
    #[serde(skip_serializing_if = "Option::is_none")]
    pub site_key: Option<String>,

    /// Image URL copied from the challenge, used to re-locate the image
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,

    /// Frame the challenge was detected in
    pub frame_url: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub requested_at: Option<SystemTime>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub responded_at: Option<SystemTime>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_seconds: Option<f64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Solution {
    pub fn has_solution(&self) -> bool {
        self.text.as_deref().map(|t| !t.is_empty()).unwrap_or(false)
    }
}

/// Outcome of injecting one solution back into the page
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SolvedRecord {
    pub id: String,
    pub vendor: VendorTag,
    pub is_solved: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub solved_at: Option<SystemTime>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SolvedRecord {
    pub fn failure(id: impl Into<String>, vendor: VendorTag, error: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            vendor,
            is_solved: false,
            solved_at: None,
            error: Some(error.into()),
        }
    }

    pub fn success(id: impl Into<String>, vendor: VendorTag) -> Self {
        Self {
            id: id.into(),
            vendor,
            is_solved: true,
            solved_at: Some(SystemTime::now()),
            error: None,
        }
    }
}

/// Aggregate result of a detection pass
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FindResult {
    pub challenges: Vec<ChallengeRecord>,
    pub filtered: Vec<FilterDecision>,
    pub error: Option<String>,
}

/// Aggregate result of a solve pass
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SolveResult {
    pub solutions: Vec<Solution>,
    pub error: Option<String>,
}

/// Aggregate result of an injection pass
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EnterResult {
    pub solved: Vec<SolvedRecord>,
    pub error: Option<String>,
}

/// Aggregate result of a full find/solve/enter cycle
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunResult {
    pub challenges: Vec<ChallengeRecord>,
    pub filtered: Vec<FilterDecision>,
    pub solutions: Vec<Solution>,
    pub solved: Vec<SolvedRecord>,
    pub error: Option<String>,
}

/// Per-pass challenge id generator. Ids are deterministic and unique within
/// one detection pass.
#[derive(Debug, Default)]
pub struct IdGenerator {
    next: usize,
}

impl IdGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next(&mut self, vendor: VendorTag) -> String {
        let id = format!("{}-{}", vendor.as_str(), self.next);
        self.next += 1;
        id
    }
}
