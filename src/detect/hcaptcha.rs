//! hCaptcha detector: rendered widget containers plus standalone active
//! challenge popups (the widget may have been removed after triggering).

use crate::challenge::{
    ChallengePayload, ChallengeRecord, IdGenerator, VendorTag, WidgetPayload,
};
use crate::descriptor;
use crate::detect::{Detector, query_param};
use crate::error::Result;
use crate::page::node::ElementNode;
use crate::page::snapshot::FrameDocument;

pub struct HcaptchaDetector;

const RESPONSE_SLOT_NAME: &str = "h-captcha-response";

impl Detector for HcaptchaDetector {
    fn name(&self) -> &'static str {
        "hcaptcha"
    }

    fn detect(&self, frame: &FrameDocument, ids: &mut IdGenerator) -> Result<Vec<ChallengeRecord>> {
        let root = &frame.root;
        let mut out = Vec::new();

        let response_slot = root.find_first(&|n| {
            n.is_tag("textarea") && n.attr("name") == Some(RESPONSE_SLOT_NAME)
        });
        let has_response_slot = response_slot.is_some();
        let is_solved = response_slot
            .and_then(|n| n.value.as_deref())
            .map(|v| !v.is_empty())
            .unwrap_or(false);

        let challenge_iframe = root.find_first(&|n| {
            n.is_tag("iframe")
                && n.attr_contains_ci("src", "hcaptcha.com")
                && n.attr_contains_ci("src", "frame=challenge")
        });
        let has_active_overlay = challenge_iframe.map(ElementNode::is_visible).unwrap_or(false);

        for path in root.collect_paths() {
            let Some(node) = path.last().copied() else { continue };
            if !is_widget_container(node) {
                continue;
            }

            let Some(site_key) = container_site_key(frame, node) else {
                log::debug!("hcaptcha container without resolvable sitekey, skipping");
                continue;
            };

            let payload = WidgetPayload {
                site_key,
                page_url: frame.url.clone(),
                action: None,
                data_s: None,
                is_enterprise: false,
                is_invisible: node.attr("data-size") == Some("invisible")
                    || node
                        .find_first(&|n| {
                            n.is_tag("iframe") && n.attr_contains_ci("src", "invisible")
                        })
                        .is_some(),
                has_response_slot,
                has_active_overlay,
                is_solved,
            };

            out.push(ChallengeRecord {
                vendor: VendorTag::Hcaptcha,
                id: ids.next(VendorTag::Hcaptcha),
                frame_url: frame.url.clone(),
                in_viewport: frame.node_in_viewport(node),
                descriptor: Some(descriptor::build(&path)),
                input_descriptor: None,
                submit_descriptor: None,
                payload: ChallengePayload::Widget(payload),
            });
        }

        // Active popup without a surviving widget container
        if out.is_empty() {
            if let Some(iframe) = challenge_iframe {
                if let Some(site_key) = iframe
                    .attr("src")
                    .and_then(|src| query_param(&frame.url, src, "sitekey"))
                {
                    let payload = WidgetPayload {
                        site_key,
                        page_url: frame.url.clone(),
                        action: None,
                        data_s: None,
                        is_enterprise: false,
                        is_invisible: false,
                        has_response_slot,
                        has_active_overlay,
                        is_solved,
                    };
                    out.push(ChallengeRecord {
                        vendor: VendorTag::Hcaptcha,
                        id: ids.next(VendorTag::Hcaptcha),
                        frame_url: frame.url.clone(),
                        in_viewport: frame.node_in_viewport(iframe),
                        descriptor: None,
                        input_descriptor: None,
                        submit_descriptor: None,
                        payload: ChallengePayload::Widget(payload),
                    });
                }
            }
        }

        Ok(out)
    }
}

fn is_widget_container(node: &ElementNode) -> bool {
    node.has_class("h-captcha") || node.attr("data-hcaptcha-widget-id").is_some()
}

fn container_site_key(frame: &FrameDocument, node: &ElementNode) -> Option<String> {
    if let Some(key) = node.attr("data-sitekey").filter(|k| !k.is_empty()) {
        return Some(key.to_string());
    }
    let iframe = node.find_first(&|n| n.is_tag("iframe") && n.attr_contains_ci("src", "hcaptcha.com"))?;
    query_param(&frame.url, iframe.attr("src")?, "sitekey")
}
