//! Page snapshot model and the script-execution seam.
//!
//! The engine never holds live element references: a [`PageSnapshot`] is
//! extracted in one script invocation, consumed in Rust, and any later page
//! mutation happens through fresh [`PageHandle::eval`] calls.

pub mod node;
pub mod script;
pub mod snapshot;

pub use node::{BoundingBox, ElementNode};
pub use script::{Page, PageHandle, debug_to_page};
pub use snapshot::{FrameDocument, PageSnapshot, Viewport};
