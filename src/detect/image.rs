//! Generic image captcha detector.
//!
//! Scans for images whose source, alt text, id, or class carries a
//! case-insensitive "captcha" marker. Images inside forms are preferred; the
//! scan widens to the whole document only when no form contains a match.
//! Duplicate images (same normalized URL) collapse into one challenge per
//! pass. Same-origin images arrive with an inline PNG captured at snapshot
//! time; cross-origin images are detected but carry no payload and stay
//! unsolvable by the image provider.

use crate::challenge::{ChallengePayload, ChallengeRecord, IdGenerator, ImagePayload, VendorTag};
use crate::descriptor::{self, ElementDescriptor};
use crate::detect::{Detector, absolutize};
use crate::error::Result;
use crate::page::node::ElementNode;
use crate::page::snapshot::FrameDocument;
use indexmap::IndexMap;

pub struct ImageCaptchaDetector;

impl Detector for ImageCaptchaDetector {
    fn name(&self) -> &'static str {
        "image"
    }

    fn detect(&self, frame: &FrameDocument, ids: &mut IdGenerator) -> Result<Vec<ChallengeRecord>> {
        let paths = frame.root.collect_paths();

        let mut in_form: Vec<&[&ElementNode]> = Vec::new();
        let mut anywhere: Vec<&[&ElementNode]> = Vec::new();
        for path in &paths {
            let Some(node) = path.last().copied() else { continue };
            if !is_captcha_image(node) {
                continue;
            }
            if path.iter().any(|a| a.is_tag("form")) {
                in_form.push(path);
            } else {
                anywhere.push(path);
            }
        }
        let candidates = if in_form.is_empty() { anywhere } else { in_form };

        // Dedup by normalized URL, keeping first occurrence order
        let mut unique: IndexMap<String, &[&ElementNode]> = IndexMap::new();
        for path in candidates {
            let Some(node) = path.last().copied() else { continue };
            let Some(src) = node.attr("src").filter(|s| !s.is_empty()) else {
                log::debug!("captcha-marked img without src, skipping");
                continue;
            };
            let Some(normalized) = absolutize(&frame.url, src) else {
                log::debug!("unparseable captcha img src {:?}, skipping", src);
                continue;
            };
            unique.entry(normalized).or_insert(path);
        }

        let mut out = Vec::new();
        for (image_url, path) in unique {
            let Some(node) = path.last().copied() else { continue };
            let form = path.iter().rev().find(|a| a.is_tag("form"));

            out.push(ChallengeRecord {
                vendor: VendorTag::Image,
                id: ids.next(VendorTag::Image),
                frame_url: frame.url.clone(),
                in_viewport: frame.node_in_viewport(node),
                descriptor: Some(descriptor::build(path)),
                input_descriptor: form.and_then(|f| advisory_input_descriptor(f)),
                submit_descriptor: form.and_then(|f| advisory_submit_descriptor(f)),
                payload: ChallengePayload::Image(ImagePayload {
                    image_url,
                    image_data: node.image_data.clone(),
                }),
            });
        }

        Ok(out)
    }
}

/// "captcha" marker in src, alt, id, or class, case-insensitive
pub(crate) fn is_captcha_image(node: &ElementNode) -> bool {
    node.is_tag("img")
        && (node.attr_contains_ci("src", "captcha")
            || node.attr_contains_ci("alt", "captcha")
            || node.attr_contains_ci("id", "captcha")
            || node.attr_contains_ci("class", "captcha"))
}

/// A text input usable for typing a captcha answer
pub(crate) fn is_text_input(node: &ElementNode) -> bool {
    node.is_tag("input")
        && node
            .attr("type")
            .map(|t| t.eq_ignore_ascii_case("text"))
            .unwrap_or(true)
}

/// An input flagged as captcha-related by name, id, class, or placeholder
pub(crate) fn is_captcha_input(node: &ElementNode) -> bool {
    is_text_input(node)
        && (node.attr_contains_ci("name", "captcha")
            || node.attr_contains_ci("id", "captcha")
            || node.attr_contains_ci("class", "captcha")
            || node.attr_contains_ci("placeholder", "captcha"))
}

/// Advisory only: injection re-derives the input against a fresh snapshot
fn advisory_input_descriptor(form: &ElementNode) -> Option<ElementDescriptor> {
    let target = form
        .find_first(&|n| is_captcha_input(n))
        .or_else(|| form.find_first(&|n| is_text_input(n) && n.is_visible()))?;
    descriptor_within(form, target)
}

fn advisory_submit_descriptor(form: &ElementNode) -> Option<ElementDescriptor> {
    let target = form
        .find_first(&|n| n.is_tag("input") && n.attr("type") == Some("submit"))
        .or_else(|| form.find_first(&|n| n.is_tag("button") && n.attr("type") == Some("submit")))
        .or_else(|| form.find_first(&|n| n.is_tag("button")))?;
    descriptor_within(form, target)
}

fn descriptor_within(scope: &ElementNode, target: &ElementNode) -> Option<ElementDescriptor> {
    scope
        .collect_paths()
        .into_iter()
        .find(|p| p.last().is_some_and(|l| std::ptr::eq(*l, target)))
        .map(|p| descriptor::build(&p))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form_with_captcha() -> ElementNode {
        ElementNode::new("form").with_attr("action", "/verify").with_children(vec![
            ElementNode::new("img")
                .with_attr("src", "/captcha.php?t=123")
                .with_attr("alt", "Captcha")
                .with_box(10.0, 10.0, 120.0, 40.0)
                .with_image_data("data:image/png;base64,iVBORw0KGgoAAAANSUhEUg=="),
            ElementNode::new("input")
                .with_attr("type", "text")
                .with_attr("name", "captcha_code")
                .with_box(10.0, 60.0, 150.0, 24.0),
            ElementNode::new("input").with_attr("type", "submit"),
        ])
    }

    #[test]
    fn test_detects_form_image() {
        let root = ElementNode::new("body").with_children(vec![form_with_captcha()]);
        let frame = FrameDocument::new("https://example.com/login", root);

        let found = ImageCaptchaDetector.detect(&frame, &mut IdGenerator::new()).unwrap();
        assert_eq!(found.len(), 1);
        let c = &found[0];
        assert_eq!(c.vendor, VendorTag::Image);
        assert!(c.in_viewport);
        let payload = c.image().unwrap();
        assert_eq!(payload.image_url, "https://example.com/captcha.php?t=123");
        assert!(payload.image_data.is_some());
        assert!(c.input_descriptor.is_some());
        assert!(c.submit_descriptor.is_some());
    }

    #[test]
    fn test_dedup_by_normalized_url() {
        let root = ElementNode::new("body").with_children(vec![
            ElementNode::new("form").with_children(vec![
                ElementNode::new("img").with_attr("src", "/captcha.png"),
                ElementNode::new("img").with_attr("src", "/captcha.png"),
            ]),
        ]);
        let frame = FrameDocument::new("https://example.com/", root);

        let found = ImageCaptchaDetector.detect(&frame, &mut IdGenerator::new()).unwrap();
        assert_eq!(found.len(), 1);
    }

    #[test]
    fn test_prefers_form_images_over_document_wide() {
        let root = ElementNode::new("body").with_children(vec![
            ElementNode::new("img").with_attr("src", "/decoration-captcha.png"),
            ElementNode::new("form").with_children(vec![
                ElementNode::new("img").with_attr("src", "/real-captcha.png"),
            ]),
        ]);
        let frame = FrameDocument::new("https://example.com/", root);

        let found = ImageCaptchaDetector.detect(&frame, &mut IdGenerator::new()).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(
            found[0].image().unwrap().image_url,
            "https://example.com/real-captcha.png"
        );
    }

    #[test]
    fn test_widens_to_document_when_no_form_match() {
        let root = ElementNode::new("body").with_children(vec![
            ElementNode::new("div").with_children(vec![
                ElementNode::new("img")
                    .with_attr("id", "captchaImage")
                    .with_attr("src", "/challenge.png"),
            ]),
        ]);
        let frame = FrameDocument::new("https://example.com/", root);

        let found = ImageCaptchaDetector.detect(&frame, &mut IdGenerator::new()).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].image().unwrap().image_url, "https://example.com/challenge.png");
    }

    #[test]
    fn test_cross_origin_image_has_no_payload() {
        let root = ElementNode::new("body").with_children(vec![
            ElementNode::new("img").with_attr("src", "https://cdn.other.org/captcha.jpg"),
        ]);
        let frame = FrameDocument::new("https://example.com/", root);

        let found = ImageCaptchaDetector.detect(&frame, &mut IdGenerator::new()).unwrap();
        assert_eq!(found.len(), 1);
        assert!(found[0].image().unwrap().image_data.is_none());
    }

    #[test]
    fn test_text_input_type_matched_case_insensitively() {
        let upper = ElementNode::new("input").with_attr("type", "Text");
        let lower = ElementNode::new("input").with_attr("type", "text");
        let untyped = ElementNode::new("input");
        let hidden = ElementNode::new("input").with_attr("type", "hidden");
        assert!(is_text_input(&upper));
        assert!(is_text_input(&lower));
        assert!(is_text_input(&untyped));
        assert!(!is_text_input(&hidden));
    }

    #[test]
    fn test_non_captcha_images_ignored() {
        let root = ElementNode::new("body").with_children(vec![
            ElementNode::new("img").with_attr("src", "/logo.png").with_attr("alt", "Logo"),
        ]);
        let frame = FrameDocument::new("https://example.com/", root);

        let found = ImageCaptchaDetector.detect(&frame, &mut IdGenerator::new()).unwrap();
        assert!(found.is_empty());
    }
}
