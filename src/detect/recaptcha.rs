//! reCAPTCHA detector: rendered v2 checkbox/invisible widgets and
//! score-based v3 registrations.

use crate::challenge::{
    ChallengePayload, ChallengeRecord, IdGenerator, VendorTag, WidgetPayload,
};
use crate::descriptor;
use crate::detect::{Detector, query_param};
use crate::error::Result;
use crate::page::node::ElementNode;
use crate::page::snapshot::FrameDocument;

pub struct RecaptchaDetector;

const RESPONSE_SLOT_NAME: &str = "g-recaptcha-response";

impl Detector for RecaptchaDetector {
    fn name(&self) -> &'static str {
        "recaptcha"
    }

    fn detect(&self, frame: &FrameDocument, ids: &mut IdGenerator) -> Result<Vec<ChallengeRecord>> {
        let root = &frame.root;
        let mut out = Vec::new();

        let doc_has_recaptcha = root
            .find_first(&|n| {
                (n.is_tag("script") || n.is_tag("iframe")) && n.attr_contains_ci("src", "recaptcha")
            })
            .is_some();

        let is_enterprise = root
            .find_first(&|n| {
                (n.is_tag("script") || n.is_tag("iframe"))
                    && n.attr_contains_ci("src", "recaptcha/enterprise")
            })
            .is_some();

        let response_slot = root.find_first(&|n| {
            n.is_tag("textarea") && n.attr("name") == Some(RESPONSE_SLOT_NAME)
        });
        let has_response_slot = response_slot.is_some();
        let is_solved = response_slot
            .and_then(|n| n.value.as_deref())
            .map(|v| !v.is_empty())
            .unwrap_or(false);

        // An image-grid popup currently presented to the user
        let has_active_overlay = root
            .find_first(&|n| {
                n.is_tag("iframe")
                    && (n.attr_contains_ci("src", "api2/bframe")
                        || n.attr_contains_ci("src", "enterprise/bframe"))
                    && n.is_visible()
            })
            .is_some();

        // Rendered widget containers
        let mut seen_keys: Vec<String> = Vec::new();
        for path in root.collect_paths() {
            let Some(node) = path.last().copied() else { continue };
            if !is_widget_container(node, doc_has_recaptcha) {
                continue;
            }

            let Some(site_key) = container_site_key(frame, node) else {
                log::debug!("recaptcha container without resolvable sitekey, skipping");
                continue;
            };

            let payload = WidgetPayload {
                site_key: site_key.clone(),
                page_url: frame.url.clone(),
                action: node.attr("data-action").map(str::to_string),
                data_s: node.attr("data-s").map(str::to_string),
                is_enterprise,
                is_invisible: node.attr("data-size") == Some("invisible"),
                has_response_slot,
                has_active_overlay,
                is_solved,
            };

            seen_keys.push(site_key);
            out.push(ChallengeRecord {
                vendor: VendorTag::RecaptchaCheckbox,
                id: ids.next(VendorTag::RecaptchaCheckbox),
                frame_url: frame.url.clone(),
                in_viewport: frame.node_in_viewport(node),
                descriptor: Some(descriptor::build(&path)),
                input_descriptor: None,
                submit_descriptor: None,
                payload: ChallengePayload::Widget(payload),
            });
        }

        // Score-based v3: api.js?render=<sitekey> with no rendered container
        for script in root.find_all(&|n| n.is_tag("script") && n.attr("src").is_some()) {
            let src = script.attr("src").unwrap_or_default();
            let lower = src.to_ascii_lowercase();
            if !lower.contains("recaptcha/api.js") && !lower.contains("recaptcha/enterprise.js") {
                continue;
            }
            let Some(site_key) = query_param(&frame.url, src, "render") else { continue };
            if site_key == "explicit" || seen_keys.contains(&site_key) {
                continue;
            }

            let payload = WidgetPayload {
                site_key: site_key.clone(),
                page_url: frame.url.clone(),
                action: None,
                data_s: None,
                is_enterprise: lower.contains("enterprise.js"),
                is_invisible: true,
                has_response_slot,
                has_active_overlay,
                is_solved,
            };

            seen_keys.push(site_key);
            out.push(ChallengeRecord {
                vendor: VendorTag::RecaptchaScore,
                id: ids.next(VendorTag::RecaptchaScore),
                frame_url: frame.url.clone(),
                in_viewport: true,
                descriptor: None,
                input_descriptor: None,
                submit_descriptor: None,
                payload: ChallengePayload::Widget(payload),
            });
        }

        Ok(out)
    }
}

fn is_widget_container(node: &ElementNode, doc_has_recaptcha: bool) -> bool {
    if node.has_class("g-recaptcha") {
        return true;
    }
    // Bare [data-sitekey] containers count only when the page actually loads
    // reCAPTCHA and the container isn't an hCaptcha one
    node.attr("data-sitekey").is_some()
        && doc_has_recaptcha
        && !node.has_class("h-captcha")
        && node.attr("data-hcaptcha-widget-id").is_none()
}

/// Site key from the container attribute, else from the anchor iframe's
/// `k=` query parameter
fn container_site_key(frame: &FrameDocument, node: &ElementNode) -> Option<String> {
    if let Some(key) = node.attr("data-sitekey").filter(|k| !k.is_empty()) {
        return Some(key.to_string());
    }
    let iframe = node.find_first(&|n| n.is_tag("iframe") && n.attr_contains_ci("src", "recaptcha"))?;
    query_param(&frame.url, iframe.attr("src")?, "k")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn checkbox_frame() -> FrameDocument {
        let root = ElementNode::new("body").with_children(vec![
            ElementNode::new("div")
                .with_attr("class", "g-recaptcha")
                .with_attr("data-sitekey", "6Le-wvkSAAAAAPBMRTvw0Q4Muexq9bi0DJwx_mJ-")
                .with_box(10.0, 10.0, 304.0, 78.0)
                .with_children(vec![
                    ElementNode::new("iframe")
                        .with_attr("src", "https://www.google.com/recaptcha/api2/anchor?k=6Le-wvkSAAAAAPBMRTvw0Q4Muexq9bi0DJwx_mJ-")
                        .with_box(10.0, 10.0, 304.0, 78.0),
                    ElementNode::new("textarea").with_attr("name", "g-recaptcha-response"),
                ]),
            ElementNode::new("script")
                .with_attr("src", "https://www.google.com/recaptcha/api.js"),
        ]);
        FrameDocument::new("https://example.com/login", root).with_viewport(1280.0, 720.0)
    }

    #[test]
    fn test_detects_checkbox_widget() {
        let frame = checkbox_frame();
        let mut ids = IdGenerator::new();
        let found = RecaptchaDetector.detect(&frame, &mut ids).unwrap();

        assert_eq!(found.len(), 1);
        let c = &found[0];
        assert_eq!(c.vendor, VendorTag::RecaptchaCheckbox);
        assert_eq!(c.frame_url, "https://example.com/login");
        assert!(c.in_viewport);
        assert!(c.descriptor.is_some());

        let w = c.widget().unwrap();
        assert_eq!(w.site_key, "6Le-wvkSAAAAAPBMRTvw0Q4Muexq9bi0DJwx_mJ-");
        assert!(w.has_response_slot);
        assert!(!w.is_enterprise);
        assert!(!w.is_invisible);
        assert!(!w.is_solved);
        assert!(!w.has_active_overlay);
    }

    #[test]
    fn test_sitekey_falls_back_to_anchor_iframe() {
        let root = ElementNode::new("body").with_children(vec![
            ElementNode::new("div")
                .with_attr("class", "g-recaptcha")
                .with_children(vec![ElementNode::new("iframe").with_attr(
                    "src",
                    "https://www.google.com/recaptcha/api2/anchor?ar=1&k=KEY_FROM_IFRAME&co=x",
                )]),
        ]);
        let frame = FrameDocument::new("https://example.com/", root);

        let found = RecaptchaDetector.detect(&frame, &mut IdGenerator::new()).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].widget().unwrap().site_key, "KEY_FROM_IFRAME");
    }

    #[test]
    fn test_detects_score_based_registration() {
        let root = ElementNode::new("body").with_children(vec![ElementNode::new("script")
            .with_attr("src", "https://www.google.com/recaptcha/api.js?render=SCOREKEY42")]);
        let frame = FrameDocument::new("https://example.com/", root);

        let found = RecaptchaDetector.detect(&frame, &mut IdGenerator::new()).unwrap();
        assert_eq!(found.len(), 1);
        let c = &found[0];
        assert_eq!(c.vendor, VendorTag::RecaptchaScore);
        assert!(c.in_viewport);
        let w = c.widget().unwrap();
        assert_eq!(w.site_key, "SCOREKEY42");
        assert!(w.is_invisible);
        assert!(!w.is_enterprise);
    }

    #[test]
    fn test_render_explicit_is_not_score_based() {
        let root = ElementNode::new("body").with_children(vec![ElementNode::new("script")
            .with_attr("src", "https://www.google.com/recaptcha/api.js?render=explicit")]);
        let frame = FrameDocument::new("https://example.com/", root);
        let found = RecaptchaDetector.detect(&frame, &mut IdGenerator::new()).unwrap();
        assert!(found.is_empty());
    }

    #[test]
    fn test_enterprise_and_data_s() {
        let root = ElementNode::new("body").with_children(vec![
            ElementNode::new("div")
                .with_attr("class", "g-recaptcha")
                .with_attr("data-sitekey", "ENT_KEY")
                .with_attr("data-s", "SITE_SPECIFIC_BLOB"),
            ElementNode::new("script")
                .with_attr("src", "https://www.google.com/recaptcha/enterprise.js"),
        ]);
        let frame = FrameDocument::new("https://example.com/", root);

        let found = RecaptchaDetector.detect(&frame, &mut IdGenerator::new()).unwrap();
        let w = found[0].widget().unwrap();
        assert!(w.is_enterprise);
        assert_eq!(w.data_s.as_deref(), Some("SITE_SPECIFIC_BLOB"));
    }

    #[test]
    fn test_already_solved_widget_flagged() {
        let root = ElementNode::new("body").with_children(vec![
            ElementNode::new("div")
                .with_attr("class", "g-recaptcha")
                .with_attr("data-sitekey", "KEY"),
            ElementNode::new("textarea")
                .with_attr("name", "g-recaptcha-response")
                .with_value("existing-token"),
        ]);
        let frame = FrameDocument::new("https://example.com/", root);

        let found = RecaptchaDetector.detect(&frame, &mut IdGenerator::new()).unwrap();
        assert!(found[0].widget().unwrap().is_solved);
    }

    #[test]
    fn test_active_overlay_detected() {
        let root = ElementNode::new("body").with_children(vec![
            ElementNode::new("div")
                .with_attr("class", "g-recaptcha")
                .with_attr("data-sitekey", "KEY"),
            ElementNode::new("iframe")
                .with_attr("src", "https://www.google.com/recaptcha/api2/bframe?hl=en")
                .with_box(100.0, 100.0, 400.0, 580.0),
        ]);
        let frame = FrameDocument::new("https://example.com/", root);

        let found = RecaptchaDetector.detect(&frame, &mut IdGenerator::new()).unwrap();
        assert!(found[0].widget().unwrap().has_active_overlay);
    }

    #[test]
    fn test_hcaptcha_container_not_claimed() {
        let root = ElementNode::new("body").with_children(vec![
            ElementNode::new("div")
                .with_attr("class", "h-captcha")
                .with_attr("data-sitekey", "HKEY"),
            ElementNode::new("script")
                .with_attr("src", "https://www.google.com/recaptcha/api.js"),
        ]);
        let frame = FrameDocument::new("https://example.com/", root);
        let found = RecaptchaDetector.detect(&frame, &mut IdGenerator::new()).unwrap();
        assert!(found.is_empty());
    }
}
