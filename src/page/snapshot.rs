use crate::page::node::ElementNode;
use serde::{Deserialize, Serialize};

/// Viewport dimensions of a frame at snapshot time
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Viewport {
    pub width: f64,
    pub height: f64,
}

impl Default for Viewport {
    fn default() -> Self {
        Self { width: 1280.0, height: 720.0 }
    }
}

/// One document captured by a snapshot: the top document or a reachable
/// same-origin iframe
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FrameDocument {
    /// Location href of the frame
    pub url: String,

    /// Frame viewport at capture time
    #[serde(default)]
    pub viewport: Viewport,

    /// Root element of the frame, normally `body`
    pub root: ElementNode,
}

impl FrameDocument {
    pub fn new(url: impl Into<String>, root: ElementNode) -> Self {
        Self { url: url.into(), viewport: Viewport::default(), root }
    }

    pub fn with_viewport(mut self, width: f64, height: f64) -> Self {
        self.viewport = Viewport { width, height };
        self
    }

    /// Whether a node's box lies fully inside this frame's viewport
    pub fn node_in_viewport(&self, node: &ElementNode) -> bool {
        node.is_in_viewport(self.viewport.width, self.viewport.height)
    }
}

/// Full page capture: the top document plus every reachable sub-document.
///
/// A snapshot is the only thing that crosses the boundary between two
/// independent script executions; nothing in it references live page objects.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageSnapshot {
    pub frames: Vec<FrameDocument>,
}

impl PageSnapshot {
    pub fn new(frames: Vec<FrameDocument>) -> Self {
        Self { frames }
    }

    /// The top-level document, if the capture produced any frame at all
    pub fn top(&self) -> Option<&FrameDocument> {
        self.frames.first()
    }

    /// Parse a snapshot from the JSON string produced by the extraction script
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}
