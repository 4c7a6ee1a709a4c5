//! Readiness predicates over the page DOM.

use html::{DOM, NodeKey};

/// Whether the node's flattened text is non-blank.
#[must_use]
pub fn has_text_content(dom: &DOM, node: NodeKey) -> bool {
    !dom.text_content(node).trim().is_empty()
}

/// Whether the node has anything an animation should wait for: text (for
/// fonts), an image or a video somewhere below it.
#[must_use]
pub fn has_dependencies(dom: &DOM, node: NodeKey) -> bool {
    has_text_content(dom, node)
        || dom.has_descendant_tag(node, "img")
        || dom.has_descendant_tag(node, "video")
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Error;

    #[test]
    fn whitespace_only_is_not_text() -> Result<(), Error> {
        let mut dom = DOM::new();
        let root = dom.root();
        let empty = dom.append_element(root, "div", &[])?;
        dom.append_text(empty, " \n\t ")?;
        assert!(!has_text_content(&dom, empty));
        assert!(!has_dependencies(&dom, empty));

        let nested = dom.append_element(empty, "span", &[])?;
        dom.append_text(nested, "x")?;
        assert!(has_text_content(&dom, empty));
        Ok(())
    }

    #[test]
    fn media_descendants_count_as_dependencies() -> Result<(), Error> {
        let mut dom = DOM::new();
        let root = dom.root();
        let figure = dom.append_element(root, "figure", &[])?;
        let frame = dom.append_element(figure, "div", &[])?;
        dom.append_element(frame, "video", &[])?;
        assert!(has_dependencies(&dom, figure));
        assert!(!has_text_content(&dom, figure));

        let picture = dom.append_element(root, "div", &[])?;
        dom.append_element(picture, "img", &[])?;
        assert!(has_dependencies(&dom, picture));
        Ok(())
    }
}
