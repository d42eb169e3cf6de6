//! Element Descriptor Codec.
//!
//! Detection and injection are independent script executions, so elements
//! that must survive the boundary are described by value: a stable id, a
//! `tag[name=...]` form for named form controls, or a short structural path.
//! Re-resolving against an unchanged document yields the same element;
//! against a mutated document resolution reports "not found" instead of
//! failing.

use crate::page::node::ElementNode;
use serde::{Deserialize, Serialize};

/// Maximum number of structural path segments kept when no stable anchor
/// attribute is available
pub const MAX_PATH_DEPTH: usize = 3;

/// A reconstructable, serializable description of a page element's location
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ElementDescriptor {
    /// Element carries a stable id attribute
    Id { id: String },

    /// Named form control (`input[name="captcha"]`)
    Named { tag: String, name: String },

    /// Bounded-depth structural path rooted below the document body,
    /// outermost segment first
    Path { segments: Vec<PathSegment> },
}

/// One step of a structural path: tag, first class, and 1-based position
/// among same-tag siblings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathSegment {
    pub tag: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub class: Option<String>,
    pub nth: usize,
}

const NAMED_CONTROL_TAGS: [&str; 4] = ["input", "textarea", "select", "button"];

/// Build a descriptor for the last element of an ancestor path
/// (root first, target last). Deterministic for a static document.
pub fn build(path: &[&ElementNode]) -> ElementDescriptor {
    let Some(target) = path.last() else {
        return ElementDescriptor::Path { segments: Vec::new() };
    };

    if let Some(id) = target.attr("id").filter(|id| !id.is_empty()) {
        return ElementDescriptor::Id { id: id.to_string() };
    }

    if NAMED_CONTROL_TAGS.contains(&target.tag_name.as_str()) {
        if let Some(name) = target.attr("name").filter(|n| !n.is_empty()) {
            return ElementDescriptor::Named {
                tag: target.tag_name.clone(),
                name: name.to_string(),
            };
        }
    }

    // Walk upward from the target, stopping at the body or the depth cap
    let mut segments = Vec::new();
    for i in (0..path.len()).rev() {
        let node = path[i];
        if node.is_tag("body") || segments.len() >= MAX_PATH_DEPTH {
            break;
        }
        let nth = if i > 0 { ElementNode::nth_of_type(path[i - 1], node) } else { 1 };
        segments.push(PathSegment {
            tag: node.tag_name.clone(),
            class: node.first_class().map(str::to_string),
            nth,
        });
    }
    segments.reverse();

    ElementDescriptor::Path { segments }
}

/// Re-resolve a descriptor against the current document root.
///
/// Side-effect-free and idempotent; a missing target yields `None`.
pub fn resolve<'a>(descriptor: &ElementDescriptor, root: &'a ElementNode) -> Option<&'a ElementNode> {
    match descriptor {
        ElementDescriptor::Id { id } => {
            root.find_first(&|n| n.attr("id") == Some(id.as_str()))
        }
        ElementDescriptor::Named { tag, name } => {
            root.find_first(&|n| n.is_tag(tag) && n.attr("name") == Some(name.as_str()))
        }
        ElementDescriptor::Path { segments } => {
            if segments.is_empty() {
                return None;
            }
            root.collect_paths()
                .into_iter()
                .find(|path| path_matches(path, segments))
                .and_then(|path| path.last().copied())
        }
    }
}

/// Whether the tail of an ancestor path matches the descriptor segments
fn path_matches(path: &[&ElementNode], segments: &[PathSegment]) -> bool {
    if path.len() < segments.len() + 1 {
        // Need at least one ancestor above the outermost segment for nth checks
        return false;
    }
    let offset = path.len() - segments.len();
    segments.iter().enumerate().all(|(i, seg)| {
        let node = path[offset + i];
        let parent = path[offset + i - 1];
        node.is_tag(&seg.tag)
            && seg
                .class
                .as_deref()
                .map(|c| node.has_class(c))
                .unwrap_or(true)
            && ElementNode::nth_of_type(parent, node) == seg.nth
    })
}

impl ElementDescriptor {
    /// Render as a CSS selector usable in page context
    pub fn css(&self) -> String {
        match self {
            ElementDescriptor::Id { id } => format!("#{}", id),
            ElementDescriptor::Named { tag, name } => format!("{}[name=\"{}\"]", tag, name),
            ElementDescriptor::Path { segments } => segments
                .iter()
                .map(|seg| {
                    let mut s = seg.tag.clone();
                    if let Some(class) = &seg.class {
                        s.push('.');
                        s.push_str(class);
                    }
                    s.push_str(&format!(":nth-of-type({})", seg.nth));
                    s
                })
                .collect::<Vec<_>>()
                .join(" > "),
        }
    }
}
