//! Vendor detectors.
//!
//! Each detector scans one frame document and produces vendor-specific
//! challenge records. Detectors are polymorphic behind [`Detector`]; the
//! orchestrator is written once against the trait and extended by adding a
//! detector, never by branching on vendor names.

pub mod hcaptcha;
pub mod image;
pub mod recaptcha;

use crate::challenge::{ChallengeRecord, IdGenerator};
use crate::error::Result;
use crate::page::snapshot::FrameDocument;

pub use hcaptcha::HcaptchaDetector;
pub use image::ImageCaptchaDetector;
pub use recaptcha::RecaptchaDetector;

/// Common detection contract, one implementation per vendor
pub trait Detector {
    /// Short vendor label used in logs
    fn name(&self) -> &'static str;

    /// Scan one frame document for challenges of this vendor.
    ///
    /// A failure processing a single element must be logged and skipped, not
    /// returned; an `Err` here means the whole frame could not be processed.
    fn detect(&self, frame: &FrameDocument, ids: &mut IdGenerator) -> Result<Vec<ChallengeRecord>>;
}

/// The full detector set, in detection order
pub fn all_detectors() -> Vec<Box<dyn Detector>> {
    vec![
        Box::new(RecaptchaDetector),
        Box::new(HcaptchaDetector),
        Box::new(ImageCaptchaDetector),
    ]
}

/// Extract a parameter from a possibly relative URL, resolved against the
/// frame's location. Checks the query string first, then the fragment
/// (hCaptcha embeds `sitekey`/`frame` after `#`).
pub(crate) fn query_param(frame_url: &str, src: &str, key: &str) -> Option<String> {
    let absolute = match url::Url::parse(src) {
        Ok(u) => u,
        Err(_) => url::Url::parse(frame_url).ok()?.join(src).ok()?,
    };
    if let Some(v) = absolute
        .query_pairs()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.into_owned())
    {
        return Some(v);
    }
    absolute.fragment().and_then(|fragment| {
        url::form_urlencoded::parse(fragment.as_bytes())
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.into_owned())
    })
}

/// Resolve an image/script source to an absolute, normalized URL string
pub(crate) fn absolutize(frame_url: &str, src: &str) -> Option<String> {
    match url::Url::parse(src) {
        Ok(u) => Some(u.to_string()),
        Err(_) => url::Url::parse(frame_url).ok()?.join(src).ok().map(|u| u.to_string()),
    }
}
