use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A single element in a page snapshot.
///
/// Snapshots are extracted in one page-script invocation and consumed in
/// another, so nodes carry everything detection needs up front: attributes,
/// geometry, current form-control values, and (for captcha-suspect images on
/// the same origin) an inline PNG of the rendered image.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ElementNode {
    /// HTML tag name, lowercase (e.g. "div", "img", "textarea")
    pub tag_name: String,

    /// Element attributes (id, class, src, data-sitekey, ...)
    #[serde(default)]
    pub attributes: HashMap<String, String>,

    /// Own text content, trimmed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,

    /// Current value for form controls (input, textarea, select)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,

    /// Inline data URL for same-origin captcha-suspect images
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_data: Option<String>,

    /// Layout box relative to the frame's viewport
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bounding_box: Option<BoundingBox>,

    /// Child elements
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<ElementNode>,
}

/// Bounding box coordinates for an element, viewport-relative
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BoundingBox {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl ElementNode {
    /// Create a new ElementNode
    pub fn new(tag_name: impl Into<String>) -> Self {
        Self {
            tag_name: tag_name.into(),
            attributes: HashMap::new(),
            text: None,
            value: None,
            image_data: None,
            bounding_box: None,
            children: Vec::new(),
        }
    }

    /// Builder method: set a single attribute
    pub fn with_attr(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    /// Builder method: set text content
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    /// Builder method: set the form control value
    pub fn with_value(mut self, value: impl Into<String>) -> Self {
        self.value = Some(value.into());
        self
    }

    /// Builder method: set inline image data
    pub fn with_image_data(mut self, data: impl Into<String>) -> Self {
        self.image_data = Some(data.into());
        self
    }

    /// Builder method: set the bounding box
    pub fn with_box(mut self, x: f64, y: f64, width: f64, height: f64) -> Self {
        self.bounding_box = Some(BoundingBox { x, y, width, height });
        self
    }

    /// Builder method: set children
    pub fn with_children(mut self, children: Vec<ElementNode>) -> Self {
        self.children = children;
        self
    }

    /// Add a child element
    pub fn add_child(&mut self, child: ElementNode) {
        self.children.push(child);
    }

    /// Get attribute value by key
    pub fn attr(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(String::as_str)
    }

    /// Check if an attribute contains a needle, case-insensitive
    pub fn attr_contains_ci(&self, key: &str, needle: &str) -> bool {
        self.attr(key)
            .map(|v| v.to_ascii_lowercase().contains(&needle.to_ascii_lowercase()))
            .unwrap_or(false)
    }

    /// Check if the element carries a specific class
    pub fn has_class(&self, class_name: &str) -> bool {
        if let Some(classes) = self.attr("class") {
            classes.split_whitespace().any(|c| c == class_name)
        } else {
            false
        }
    }

    /// First class in the class attribute, if any
    pub fn first_class(&self) -> Option<&str> {
        self.attr("class")
            .and_then(|c| c.split_whitespace().next())
            .filter(|c| !c.is_empty())
    }

    /// Check if element is a specific tag
    pub fn is_tag(&self, tag: &str) -> bool {
        self.tag_name.eq_ignore_ascii_case(tag)
    }

    /// Whether the element is rendered with a non-empty box
    pub fn is_visible(&self) -> bool {
        self.bounding_box.as_ref().map(BoundingBox::is_visible).unwrap_or(false)
    }

    /// Whether the element's box lies fully within a viewport of the given size
    pub fn is_in_viewport(&self, viewport_width: f64, viewport_height: f64) -> bool {
        match &self.bounding_box {
            Some(b) => b.fully_within(viewport_width, viewport_height),
            None => false,
        }
    }

    /// Collect all nodes (self included) matching a predicate, document order
    pub fn find_all<'a>(&'a self, pred: &dyn Fn(&ElementNode) -> bool) -> Vec<&'a ElementNode> {
        let mut out = Vec::new();
        self.collect_matching(pred, &mut out);
        out
    }

    fn collect_matching<'a>(
        &'a self,
        pred: &dyn Fn(&ElementNode) -> bool,
        out: &mut Vec<&'a ElementNode>,
    ) {
        if pred(self) {
            out.push(self);
        }
        for child in &self.children {
            child.collect_matching(pred, out);
        }
    }

    /// First node (self included) matching a predicate, document order
    pub fn find_first<'a>(&'a self, pred: &dyn Fn(&ElementNode) -> bool) -> Option<&'a ElementNode> {
        if pred(self) {
            return Some(self);
        }
        for child in &self.children {
            if let Some(found) = child.find_first(pred) {
                return Some(found);
            }
        }
        None
    }

    /// Collect the ancestor path (root first, node last) for every node in
    /// the subtree. Paths borrow from the tree and are only valid while the
    /// snapshot is alive.
    pub fn collect_paths(&self) -> Vec<Vec<&ElementNode>> {
        let mut out = Vec::new();
        let mut stack = Vec::new();
        self.collect_paths_rec(&mut stack, &mut out);
        out
    }

    fn collect_paths_rec<'a>(
        &'a self,
        stack: &mut Vec<&'a ElementNode>,
        out: &mut Vec<Vec<&'a ElementNode>>,
    ) {
        stack.push(self);
        out.push(stack.clone());
        for child in &self.children {
            child.collect_paths_rec(stack, out);
        }
        stack.pop();
    }

    /// 1-based position of `target` among `parent`'s children sharing its tag.
    /// Returns 1 when `target` is not actually a child of `parent`.
    pub fn nth_of_type(parent: &ElementNode, target: &ElementNode) -> usize {
        let mut index = 1;
        for child in &parent.children {
            if std::ptr::eq(child, target) {
                return index;
            }
            if child.tag_name == target.tag_name {
                index += 1;
            }
        }
        1
    }
}

impl BoundingBox {
    /// Check if the bounding box has non-zero dimensions
    pub fn is_visible(&self) -> bool {
        self.width > 0.0 && self.height > 0.0
    }

    /// Center point of the box
    pub fn center(&self) -> (f64, f64) {
        (self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    /// Whether the box lies fully inside a viewport anchored at the origin
    pub fn fully_within(&self, viewport_width: f64, viewport_height: f64) -> bool {
        self.x >= 0.0
            && self.y >= 0.0
            && self.x + self.width <= viewport_width
            && self.y + self.height <= viewport_height
    }

    /// Distance between the centers of two boxes
    pub fn center_distance(&self, other: &BoundingBox) -> f64 {
        let (ax, ay) = self.center();
        let (bx, by) = other.center();
        ((ax - bx).powi(2) + (ay - by).powi(2)).sqrt()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attr_contains_ci() {
        let img = ElementNode::new("img").with_attr("src", "/images/CaPtChA.php?x=1");
        assert!(img.attr_contains_ci("src", "captcha"));
        assert!(!img.attr_contains_ci("alt", "captcha"));
    }

    #[test]
    fn test_has_class_and_first_class() {
        let node = ElementNode::new("div").with_attr("class", "g-recaptcha extra");
        assert!(node.has_class("g-recaptcha"));
        assert!(!node.has_class("recaptcha"));
        assert_eq!(node.first_class(), Some("g-recaptcha"));
    }

    #[test]
    fn test_viewport_containment() {
        let inside = ElementNode::new("div").with_box(10.0, 10.0, 100.0, 50.0);
        let clipped = ElementNode::new("div").with_box(700.0, 10.0, 200.0, 50.0);
        assert!(inside.is_in_viewport(800.0, 600.0));
        assert!(!clipped.is_in_viewport(800.0, 600.0));
        assert!(!ElementNode::new("div").is_in_viewport(800.0, 600.0));
    }

    #[test]
    fn test_find_all_document_order() {
        let root = ElementNode::new("body").with_children(vec![
            ElementNode::new("form").with_children(vec![
                ElementNode::new("img").with_attr("id", "a"),
                ElementNode::new("input"),
            ]),
            ElementNode::new("img").with_attr("id", "b"),
        ]);

        let imgs = root.find_all(&|n| n.is_tag("img"));
        assert_eq!(imgs.len(), 2);
        assert_eq!(imgs[0].attr("id"), Some("a"));
        assert_eq!(imgs[1].attr("id"), Some("b"));
    }

    #[test]
    fn test_collect_paths() {
        let root = ElementNode::new("body").with_children(vec![
            ElementNode::new("div").with_children(vec![ElementNode::new("img")]),
        ]);

        let paths = root.collect_paths();
        assert_eq!(paths.len(), 3);
        let img_path = paths.iter().find(|p| p.last().unwrap().is_tag("img")).unwrap();
        let tags: Vec<_> = img_path.iter().map(|n| n.tag_name.as_str()).collect();
        assert_eq!(tags, vec!["body", "div", "img"]);
    }

    #[test]
    fn test_nth_of_type() {
        let parent = ElementNode::new("tr").with_children(vec![
            ElementNode::new("td"),
            ElementNode::new("th"),
            ElementNode::new("td"),
        ]);
        let second_td = &parent.children[2];
        assert_eq!(ElementNode::nth_of_type(&parent, second_td), 2);
    }

    #[test]
    fn test_center_distance() {
        let a = BoundingBox { x: 0.0, y: 0.0, width: 10.0, height: 10.0 };
        let b = BoundingBox { x: 30.0, y: 0.0, width: 10.0, height: 10.0 };
        assert_eq!(a.center_distance(&b), 30.0);
    }

    #[test]
    fn test_serialization_roundtrip() {
        let node = ElementNode::new("textarea")
            .with_attr("name", "g-recaptcha-response")
            .with_value("token")
            .with_box(0.0, 0.0, 1.0, 1.0);

        let json = serde_json::to_string(&node).unwrap();
        let back: ElementNode = serde_json::from_str(&json).unwrap();
        assert_eq!(node, back);
    }
}
