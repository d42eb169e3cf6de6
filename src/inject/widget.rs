//! Token widget injectors (reCAPTCHA, hCaptcha).
//!
//! The returned token is written into the widget's response slot and the
//! page-registered completion callback is invoked when one exists; otherwise
//! the vendor script picks the response up on its own validation path.

use crate::challenge::{Solution, SolvedRecord, VendorTag};
use crate::inject::{DOC_FOR_JS, InjectOptions, Injector};
use crate::page::script::{PageHandle, debug_to_page};
use crate::page::snapshot::PageSnapshot;

pub struct RecaptchaInjector;

impl Injector for RecaptchaInjector {
    fn handles(&self, vendor: VendorTag) -> bool {
        matches!(vendor, VendorTag::RecaptchaCheckbox | VendorTag::RecaptchaScore)
    }

    fn inject(
        &self,
        page: &dyn PageHandle,
        _snapshot: &PageSnapshot,
        solution: &Solution,
        opts: &InjectOptions,
    ) -> SolvedRecord {
        inject_token(page, solution, "g-recaptcha-response", ".g-recaptcha", opts)
    }
}

pub struct HcaptchaInjector;

impl Injector for HcaptchaInjector {
    fn handles(&self, vendor: VendorTag) -> bool {
        matches!(vendor, VendorTag::Hcaptcha)
    }

    fn inject(
        &self,
        page: &dyn PageHandle,
        _snapshot: &PageSnapshot,
        solution: &Solution,
        opts: &InjectOptions,
    ) -> SolvedRecord {
        inject_token(page, solution, "h-captcha-response", ".h-captcha", opts)
    }
}

fn inject_token(
    page: &dyn PageHandle,
    solution: &Solution,
    slot_name: &str,
    container_selector: &str,
    opts: &InjectOptions,
) -> SolvedRecord {
    let Some(token) = solution.text.as_deref().filter(|t| !t.is_empty()) else {
        return SolvedRecord::failure(
            &solution.id,
            solution.vendor,
            "Missing challenge data: solution carries no token",
        );
    };

    debug_to_page(
        page,
        opts.debug_sink.as_deref(),
        &format!("entering {} token for {}", solution.vendor, solution.id),
    );

    let cfg = serde_json::json!({
        "frameUrl": solution.frame_url,
        "token": token,
        "slotName": slot_name,
        "containerSelector": container_selector,
        "visualFeedback": opts.visual_feedback,
    });

    let js = format!(
        r#"(function() {{
            var cfg = {cfg};
            {doc_for}
            var doc = docFor(cfg.frameUrl);

            var slots = doc.querySelectorAll(
                'textarea[name="' + cfg.slotName + '"], #' + cfg.slotName
            );
            if (!slots.length) return "slot-not-found";
            for (var i = 0; i < slots.length; i++) {{
                var slot = slots[i];
                var display = slot.style.display;
                slot.style.display = 'block';
                slot.value = cfg.token;
                slot.innerHTML = cfg.token;
                slot.style.display = display;
            }}

            // Invoke the page-registered completion callback, if any. The
            // lookup stays scoped to this vendor: other widget families on
            // the same page may carry their own data-callback.
            try {{
                var container = doc.querySelector(cfg.containerSelector + '[data-callback]');
                if (!container) {{
                    container = slots[0].closest('[data-callback]');
                }}
                if (container) {{
                    var name = container.getAttribute('data-callback');
                    if (name && typeof window[name] === 'function') {{
                        window[name](cfg.token);
                    }}
                }}
            }} catch (e) {{ /* callback belongs to the page, not to us */ }}

            if (cfg.visualFeedback) {{
                var widget = doc.querySelector(cfg.containerSelector);
                if (widget) widget.style.border = '3px solid #0d84e3';
            }}
            return "ok";
        }})()"#,
        cfg = cfg,
        doc_for = DOC_FOR_JS,
    );

    match page.eval(&js) {
        Ok(value) => match value.as_str() {
            Some("ok") => SolvedRecord::success(&solution.id, solution.vendor),
            Some("slot-not-found") => SolvedRecord::failure(
                &solution.id,
                solution.vendor,
                format!("Element not found: textarea[name=\"{}\"]", slot_name),
            ),
            other => SolvedRecord::failure(
                &solution.id,
                solution.vendor,
                format!("unexpected injection result: {:?}", other),
            ),
        },
        Err(e) => SolvedRecord::failure(&solution.id, solution.vendor, e.to_string()),
    }
}
