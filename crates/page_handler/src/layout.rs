//! Block-stacking layout for the simulated page.
//!
//! Every rendered element becomes a full-width box; children stack
//! vertically inside their parent. Heights come from, in order: a
//! `data-height` attribute, the `height` attribute (or 150px) for media,
//! or the sum of the children, with each non-blank text run taking one
//! 20px line.

use crate::viewport::Rect;
use html::{DOM, NodeKey, NodeKind};
use log::trace;
use std::collections::HashMap;

/// Height of one line of text.
pub const LINE_HEIGHT: f32 = 20.0;
/// Height of an image or video without a `height` attribute.
pub const DEFAULT_MEDIA_HEIGHT: f32 = 150.0;

/// Elements that generate no boxes.
const NOT_RENDERED: &[&str] = &[
    "head", "script", "style", "template", "title", "meta", "link", "noscript",
];

fn parse_length(value: Option<&str>) -> Option<f32> {
    value?
        .trim()
        .trim_end_matches("px")
        .parse::<f32>()
        .ok()
        .filter(|height| height.is_finite() && *height >= 0.0)
}

struct StackLayout<'dom> {
    dom: &'dom DOM,
    width: f32,
    boxes: HashMap<NodeKey, Rect>,
}

impl StackLayout<'_> {
    /// Lay out `node` with its top at `top`; returns the height it takes.
    fn place(&mut self, node: NodeKey, top: f32) -> f32 {
        let dom = self.dom;
        let Some(found) = dom.node(node) else {
            return 0.0;
        };
        match &found.kind {
            NodeKind::Text { text } => {
                if text.trim().is_empty() {
                    0.0
                } else {
                    LINE_HEIGHT
                }
            }
            NodeKind::Comment { .. } => 0.0,
            NodeKind::Document => self.place_children(node, top),
            NodeKind::Element { tag } => {
                if NOT_RENDERED.contains(&tag.as_str()) {
                    return 0.0;
                }
                let content = if matches!(tag.as_str(), "img" | "video") {
                    parse_length(dom.attr(node, "height")).unwrap_or(DEFAULT_MEDIA_HEIGHT)
                } else {
                    self.place_children(node, top)
                };
                let height = parse_length(dom.attr(node, "data-height")).unwrap_or(content);
                self.boxes.insert(node, Rect::new(0.0, top, self.width, height));
                height
            }
        }
    }

    fn place_children(&mut self, node: NodeKey, top: f32) -> f32 {
        let children: Vec<NodeKey> = self.dom.children(node).collect();
        let mut cursor = top;
        for child in children {
            cursor += self.place(child, cursor);
        }
        cursor - top
    }
}

/// Compute a box for every rendered element in the document.
#[must_use]
pub fn stack_layout(dom: &DOM, width: f32) -> HashMap<NodeKey, Rect> {
    let mut layout = StackLayout {
        dom,
        width,
        boxes: HashMap::new(),
    };
    let height = layout.place(dom.root(), 0.0);
    trace!("stack layout: {} boxes, page height {height}", layout.boxes.len());
    layout.boxes
}
