//! Vendor injectors.
//!
//! Injection runs as a fresh, independent script execution: nothing from the
//! detection pass survives except the serialized solution, so every injector
//! re-derives its target elements (from a fresh snapshot) before committing
//! the answer through small page-context evals. Per-challenge failures are
//! captured into the returned [`SolvedRecord`], never propagated.

pub mod image;
pub mod widget;

use crate::challenge::{Solution, SolvedRecord, VendorTag};
use crate::page::script::PageHandle;
use crate::page::snapshot::PageSnapshot;

pub use image::ImageCaptchaInjector;
pub use widget::{HcaptchaInjector, RecaptchaInjector};

/// Tuning knobs shared by all injectors
#[derive(Debug, Clone)]
pub struct InjectOptions {
    /// Draw a colored border on processed elements
    pub visual_feedback: bool,

    /// Delay before clicking the discovered submit control, giving page-side
    /// validation listeners time to observe the value change
    pub submit_delay_ms: u64,

    /// Name of a host-provided page-side logging bridge
    pub debug_sink: Option<String>,
}

impl Default for InjectOptions {
    fn default() -> Self {
        Self { visual_feedback: true, submit_delay_ms: 500, debug_sink: None }
    }
}

/// Common injection contract, one implementation per vendor family
pub trait Injector {
    /// Whether this injector handles the given vendor
    fn handles(&self, vendor: VendorTag) -> bool;

    /// Commit one solution into the page. Failures are captured into the
    /// record's `error`; this never returns `Err`.
    fn inject(
        &self,
        page: &dyn PageHandle,
        snapshot: &PageSnapshot,
        solution: &Solution,
        opts: &InjectOptions,
    ) -> SolvedRecord;
}

/// The full injector set
pub fn all_injectors() -> Vec<Box<dyn Injector>> {
    vec![
        Box::new(RecaptchaInjector),
        Box::new(HcaptchaInjector),
        Box::new(ImageCaptchaInjector),
    ]
}

/// JS prelude resolving the document of a same-origin frame by location href.
/// Falls back to the top document when the frame has navigated away.
pub(crate) const DOC_FOR_JS: &str = r#"
    function docFor(url) {
        if (window.location.href === url) return document;
        var found = null;
        (function walk(w) {
            for (var i = 0; i < w.frames.length; i++) {
                try {
                    if (w.frames[i].location.href === url) { found = w.frames[i].document; return; }
                    walk(w.frames[i]);
                } catch (e) { /* cross-origin frame */ }
                if (found) return;
            }
        })(window);
        return found || document;
    }
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_injectors_cover_all_vendors() {
        let injectors = all_injectors();
        for vendor in [
            VendorTag::RecaptchaCheckbox,
            VendorTag::RecaptchaScore,
            VendorTag::Hcaptcha,
            VendorTag::Image,
        ] {
            assert!(
                injectors.iter().any(|i| i.handles(vendor)),
                "no injector handles {}",
                vendor
            );
        }
    }
}
