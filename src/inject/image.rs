//! Image captcha injector.
//!
//! Re-locates the source image against a fresh snapshot (the page may have
//! re-rendered since detection), independently re-derives the answer input
//! and submit control, writes the solved text, fires the change
//! notifications, and clicks submit after a short delay.

use crate::challenge::{Solution, SolvedRecord, VendorTag};
use crate::descriptor;
use crate::detect::absolutize;
use crate::detect::image::{is_captcha_input, is_text_input};
use crate::inject::{DOC_FOR_JS, InjectOptions, Injector};
use crate::page::node::ElementNode;
use crate::page::script::{PageHandle, debug_to_page};
use crate::page::snapshot::{FrameDocument, PageSnapshot};

/// Maximum accepted distance, in pixels, between an image and an input
/// located by the geometric last-resort strategy
const MAX_INPUT_DISTANCE: f64 = 300.0;

/// How many ancestor containers above the image are searched for an input
const ANCESTOR_SEARCH_DEPTH: usize = 3;

pub struct ImageCaptchaInjector;

impl Injector for ImageCaptchaInjector {
    fn handles(&self, vendor: VendorTag) -> bool {
        matches!(vendor, VendorTag::Image)
    }

    fn inject(
        &self,
        page: &dyn PageHandle,
        snapshot: &PageSnapshot,
        solution: &Solution,
        opts: &InjectOptions,
    ) -> SolvedRecord {
        let Some(text) = solution.text.as_deref().filter(|t| !t.is_empty()) else {
            return SolvedRecord::failure(
                &solution.id,
                solution.vendor,
                "Missing challenge data: solution carries no text",
            );
        };
        let Some(image_url) = solution.image_url.as_deref() else {
            return SolvedRecord::failure(
                &solution.id,
                solution.vendor,
                "Missing challenge data: solution carries no image URL",
            );
        };

        // (a) exact, (b) filename-suffix, (c) substring containment
        let Some((frame, paths, image_path_idx)) = locate_image(snapshot, image_url) else {
            return SolvedRecord::failure(
                &solution.id,
                solution.vendor,
                format!("Element not found: image {}", image_url),
            );
        };
        let image_path = &paths[image_path_idx];

        let Some(input_path) = derive_input(frame, &paths, image_path) else {
            return SolvedRecord::failure(
                &solution.id,
                solution.vendor,
                "Element not found: no usable answer input near the captcha image",
            );
        };

        let submit_path = derive_submit(&paths, image_path, &input_path);

        debug_to_page(
            page,
            opts.debug_sink.as_deref(),
            &format!("entering image solution for {}", solution.id),
        );

        let cfg = serde_json::json!({
            "frameUrl": frame.url,
            "text": text,
            "inputSelector": descriptor::build(&input_path).css(),
            "imageSelector": descriptor::build(image_path).css(),
            "submitSelector": submit_path.as_ref().map(|p| descriptor::build(p).css()),
            "visualFeedback": opts.visual_feedback,
            "submitDelayMs": opts.submit_delay_ms,
        });

        let js = format!(
            r#"(function() {{
                var cfg = {cfg};
                {doc_for}
                var doc = docFor(cfg.frameUrl);

                var input = doc.querySelector(cfg.inputSelector);
                if (!input) return "input-not-found";

                input.value = cfg.text;
                input.dispatchEvent(new Event('input', {{ bubbles: true }}));
                input.dispatchEvent(new Event('change', {{ bubbles: true }}));

                if (cfg.visualFeedback) {{
                    var img = doc.querySelector(cfg.imageSelector);
                    if (img) img.style.border = '3px solid #0d84e3';
                }}

                if (cfg.submitSelector) {{
                    var btn = doc.querySelector(cfg.submitSelector);
                    if (btn) setTimeout(function() {{ btn.click(); }}, cfg.submitDelayMs);
                }}
                return "ok";
            }})()"#,
            cfg = cfg,
            doc_for = DOC_FOR_JS,
        );

        match page.eval(&js) {
            Ok(value) => match value.as_str() {
                Some("ok") => SolvedRecord::success(&solution.id, solution.vendor),
                Some("input-not-found") => SolvedRecord::failure(
                    &solution.id,
                    solution.vendor,
                    "Element not found: answer input vanished before injection",
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
}

type NodePath<'a> = Vec<&'a ElementNode>;

/// Find the captcha image across all frames, trying exact URL match first,
/// then filename-suffix (relative-vs-absolute drift), then substring
/// containment either direction (dynamic query parameters).
fn locate_image<'a>(
    snapshot: &'a PageSnapshot,
    image_url: &str,
) -> Option<(&'a FrameDocument, Vec<NodePath<'a>>, usize)> {
    let filename = url_filename(image_url);

    for pass in 0..3 {
        for frame in &snapshot.frames {
            let paths = frame.root.collect_paths();
            let found = paths.iter().position(|path| {
                let Some(node) = path.last().copied() else { return false };
                if !node.is_tag("img") {
                    return false;
                }
                let Some(src) = node.attr("src") else { return false };
                let candidate = absolutize(&frame.url, src).unwrap_or_else(|| src.to_string());
                match pass {
                    0 => candidate == image_url,
                    1 => match &filename {
                        Some(name) => url_filename(&candidate).as_deref() == Some(name),
                        None => false,
                    },
                    _ => candidate.contains(image_url) || image_url.contains(candidate.as_str()),
                }
            });
            if let Some(idx) = found {
                return Some((frame, paths, idx));
            }
        }
    }
    None
}

fn url_filename(u: &str) -> Option<String> {
    let no_query = u.split(['?', '#']).next().unwrap_or(u);
    no_query
        .rsplit('/')
        .next()
        .filter(|f| !f.is_empty())
        .map(str::to_string)
}

/// Ranked input re-derivation: captcha-flagged inputs in the enclosing form;
/// any visible text input in the form; ancestor containers up to a bounded
/// depth (table rows widen to the whole row); sibling containers; and
/// finally the geometrically closest visible text input within a pixel
/// threshold.
fn derive_input<'a>(
    frame: &FrameDocument,
    paths: &[NodePath<'a>],
    image_path: &NodePath<'a>,
) -> Option<NodePath<'a>> {
    let image_node = image_path.last().copied()?;

    if let Some(form) = image_path.iter().rev().find(|a| a.is_tag("form")) {
        if let Some(input) = form.find_first(&|n| is_captcha_input(n)) {
            return path_of(paths, input);
        }
        if let Some(input) = form.find_first(&|n| is_text_input(n) && n.is_visible()) {
            return path_of(paths, input);
        }
    }

    // Ancestor containers, bounded depth
    let ancestors: Vec<&ElementNode> = image_path.iter().rev().skip(1).copied().collect();
    for (depth, ancestor) in ancestors.iter().enumerate() {
        if depth >= ANCESTOR_SEARCH_DEPTH || ancestor.is_tag("body") {
            break;
        }
        // Inside a table cell the input usually sits in a sibling cell;
        // search the whole row
        let scope = if ancestor.is_tag("td") {
            ancestors
                .get(depth + 1)
                .filter(|p| p.is_tag("tr"))
                .copied()
                .unwrap_or(ancestor)
        } else {
            *ancestor
        };
        if let Some(input) = scope.find_first(&|n| is_text_input(n)) {
            return path_of(paths, input);
        }
    }

    // Sibling containers of the image's parent
    if image_path.len() >= 3 {
        let parent = image_path[image_path.len() - 2];
        let grandparent = image_path[image_path.len() - 3];
        for sibling in &grandparent.children {
            if std::ptr::eq(sibling, parent) {
                continue;
            }
            if let Some(input) = sibling.find_first(&|n| is_text_input(n)) {
                return path_of(paths, input);
            }
        }
    }

    // Last resort: nearest visible text input on screen
    let image_box = image_node.bounding_box.as_ref()?;
    let mut best: Option<(f64, &ElementNode)> = None;
    for candidate in frame.root.find_all(&|n| is_text_input(n) && n.is_visible()) {
        let Some(b) = candidate.bounding_box.as_ref() else { continue };
        let dist = image_box.center_distance(b);
        if dist <= MAX_INPUT_DISTANCE && best.map(|(d, _)| dist < d).unwrap_or(true) {
            best = Some((dist, candidate));
        }
    }
    best.and_then(|(_, input)| path_of(paths, input))
}

/// Submit control: submit-typed input/button inside the form, else any form
/// button, else a button near the image
fn derive_submit<'a>(
    paths: &[NodePath<'a>],
    image_path: &NodePath<'a>,
    input_path: &NodePath<'a>,
) -> Option<NodePath<'a>> {
    let form = image_path
        .iter()
        .rev()
        .find(|a| a.is_tag("form"))
        .or_else(|| input_path.iter().rev().find(|a| a.is_tag("form")));

    if let Some(form) = form {
        let submit = form
            .find_first(&|n| n.is_tag("input") && n.attr("type") == Some("submit"))
            .or_else(|| form.find_first(&|n| n.is_tag("button") && n.attr("type") == Some("submit")))
            .or_else(|| form.find_first(&|n| n.is_tag("button")));
        if let Some(submit) = submit {
            return path_of(paths, submit);
        }
    }

    if image_path.len() >= 2 {
        let parent = image_path[image_path.len() - 2];
        let nearby = parent.find_first(&|n| {
            n.is_tag("button") || (n.is_tag("input") && n.attr("type") == Some("submit"))
        });
        if let Some(nearby) = nearby {
            return path_of(paths, nearby);
        }
    }
    None
}

fn path_of<'a>(paths: &[NodePath<'a>], node: &ElementNode) -> Option<NodePath<'a>> {
    paths
        .iter()
        .find(|p| p.last().is_some_and(|l| std::ptr::eq(*l, node)))
        .cloned()
}
