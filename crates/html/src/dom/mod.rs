mod printing;
mod style;

use anyhow::{Error, anyhow};
use core::fmt;
use indextree::{Arena, NodeId};
use smallvec::SmallVec;

pub use style::{parse_declarations, set_declaration};

/// Stable handle to a node in the page DOM.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, PartialOrd, Ord)]
pub struct NodeKey(NodeId);

impl fmt::Display for NodeKey {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Default)]
pub enum NodeKind {
    #[default]
    Document,
    Element {
        tag: String,
    },
    Text {
        text: String,
    },
    Comment {
        text: String,
    },
}

#[derive(Debug, Clone, Default)]
pub struct DOMNode {
    pub kind: NodeKind,
    pub attrs: SmallVec<(String, String), 4>,
}

impl DOMNode {
    fn element(tag: &str) -> Self {
        Self {
            kind: NodeKind::Element {
                tag: tag.to_ascii_lowercase(),
            },
            attrs: SmallVec::new(),
        }
    }

    /// Value of an attribute by (lowercase) name.
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }
}

/// The page DOM: an arena of nodes rooted at a document node.
#[derive(Debug)]
pub struct DOM {
    dom: Arena<DOMNode>,
    root: NodeId,
}

impl Default for DOM {
    fn default() -> Self {
        Self::new()
    }
}

impl DOM {
    pub fn new() -> Self {
        let mut dom = Arena::new();
        Self {
            root: dom.new_node(DOMNode::default()),
            dom,
        }
    }

    /// The document node.
    pub fn root(&self) -> NodeKey {
        NodeKey(self.root)
    }

    pub fn node(&self, key: NodeKey) -> Option<&DOMNode> {
        self.dom.get(key.0).map(|node| node.get())
    }

    fn node_mut(&mut self, key: NodeKey) -> Result<&mut DOMNode, Error> {
        self.dom
            .get_mut(key.0)
            .map(|node| node.get_mut())
            .ok_or_else(|| anyhow!("node {key} is not part of this DOM"))
    }

    /// Create a detached element.
    pub fn create_element(&mut self, tag: &str) -> NodeKey {
        NodeKey(self.dom.new_node(DOMNode::element(tag)))
    }

    /// Create a detached text node.
    pub fn create_text(&mut self, text: &str) -> NodeKey {
        NodeKey(self.dom.new_node(DOMNode {
            kind: NodeKind::Text {
                text: text.to_owned(),
            },
            attrs: SmallVec::new(),
        }))
    }

    /// Create a detached comment node.
    pub fn create_comment(&mut self, text: &str) -> NodeKey {
        NodeKey(self.dom.new_node(DOMNode {
            kind: NodeKind::Comment {
                text: text.to_owned(),
            },
            attrs: SmallVec::new(),
        }))
    }

    /// Append `child` as the last child of `parent`.
    ///
    /// # Errors
    /// Returns an error if the append would create a cycle or either node was removed.
    pub fn append_child(&mut self, parent: NodeKey, child: NodeKey) -> Result<(), Error> {
        parent
            .0
            .checked_append(child.0, &mut self.dom)
            .map_err(|err| anyhow!("cannot append {child} to {parent}: {err}"))
    }

    /// Insert `node` immediately before `sibling`.
    ///
    /// # Errors
    /// Returns an error if the insertion is structurally invalid.
    pub fn insert_before(&mut self, sibling: NodeKey, node: NodeKey) -> Result<(), Error> {
        sibling
            .0
            .checked_insert_before(node.0, &mut self.dom)
            .map_err(|err| anyhow!("cannot insert {node} before {sibling}: {err}"))
    }

    /// Detach a node (and its subtree) from its parent.
    pub fn detach(&mut self, node: NodeKey) {
        node.0.detach(&mut self.dom);
    }

    /// Create an element with the given attributes and append it to `parent`.
    ///
    /// # Errors
    /// Returns an error if the append fails.
    pub fn append_element(
        &mut self,
        parent: NodeKey,
        tag: &str,
        attrs: &[(&str, &str)],
    ) -> Result<NodeKey, Error> {
        let node = self.create_element(tag);
        for (name, value) in attrs {
            self.set_attr(node, name, value)?;
        }
        self.append_child(parent, node)?;
        Ok(node)
    }

    /// Create a text node and append it to `parent`.
    ///
    /// # Errors
    /// Returns an error if the append fails.
    pub fn append_text(&mut self, parent: NodeKey, text: &str) -> Result<NodeKey, Error> {
        let node = self.create_text(text);
        self.append_child(parent, node)?;
        Ok(node)
    }

    /// Append text to `parent`, merging into a trailing text node when there is one.
    ///
    /// # Errors
    /// Returns an error if a new text node cannot be appended.
    pub fn push_text(&mut self, parent: NodeKey, text: &str) -> Result<(), Error> {
        let last = self.dom.get(parent.0).and_then(|node| node.last_child());
        if let Some(last) = last
            && let Some(NodeKind::Text { text: existing }) =
                self.dom.get_mut(last).map(|node| &mut node.get_mut().kind)
        {
            existing.push_str(text);
            return Ok(());
        }
        self.append_text(parent, text).map(|_| ())
    }

    pub fn is_element(&self, key: NodeKey) -> bool {
        matches!(
            self.node(key).map(|node| &node.kind),
            Some(NodeKind::Element { .. })
        )
    }

    /// Lowercase tag name for element nodes.
    pub fn tag_name(&self, key: NodeKey) -> Option<&str> {
        match &self.node(key)?.kind {
            NodeKind::Element { tag } => Some(tag.as_str()),
            _ => None,
        }
    }

    pub fn attr(&self, key: NodeKey, name: &str) -> Option<&str> {
        self.node(key)?.attr(name)
    }

    /// Set (or replace) an attribute on an element.
    ///
    /// # Errors
    /// Returns an error if `key` is not an element of this DOM.
    pub fn set_attr(&mut self, key: NodeKey, name: &str, value: &str) -> Result<(), Error> {
        let node = self.node_mut(key)?;
        if !matches!(node.kind, NodeKind::Element { .. }) {
            return Err(anyhow!("cannot set attribute {name} on non-element {key}"));
        }
        let name = name.to_ascii_lowercase();
        if let Some(slot) = node.attrs.iter_mut().find(|(existing, _)| *existing == name) {
            value.clone_into(&mut slot.1);
        } else {
            node.attrs.push((name, value.to_owned()));
        }
        Ok(())
    }

    /// Whether the element's class list contains `class`.
    pub fn has_class(&self, key: NodeKey, class: &str) -> bool {
        self.attr(key, "class")
            .is_some_and(|list| list.split_ascii_whitespace().any(|token| token == class))
    }

    pub fn parent(&self, key: NodeKey) -> Option<NodeKey> {
        self.dom.get(key.0)?.parent().map(NodeKey)
    }

    /// Nearest element at or above `key` (the parent element for text nodes).
    pub fn closest_element(&self, key: NodeKey) -> Option<NodeKey> {
        self.ancestor_elements(key).next()
    }

    /// Elements from `key` (inclusive) up to the document.
    pub fn ancestor_elements(&self, key: NodeKey) -> impl Iterator<Item = NodeKey> + '_ {
        key.0
            .ancestors(&self.dom)
            .map(NodeKey)
            .filter(|node| self.is_element(*node))
    }

    pub fn children(&self, key: NodeKey) -> impl Iterator<Item = NodeKey> + '_ {
        key.0.children(&self.dom).map(NodeKey)
    }

    /// First child that is an element, skipping text and comments.
    pub fn first_element_child(&self, key: NodeKey) -> Option<NodeKey> {
        self.children(key).find(|child| self.is_element(*child))
    }

    /// Strict descendants of `key` in document order.
    pub fn descendants(&self, key: NodeKey) -> impl Iterator<Item = NodeKey> + '_ {
        key.0.descendants(&self.dom).skip(1).map(NodeKey)
    }

    /// All elements in the document carrying `class`, in document order.
    pub fn elements_by_class(&self, class: &str) -> Vec<NodeKey> {
        self.descendants(self.root())
            .filter(|node| self.has_class(*node, class))
            .collect()
    }

    /// Strict descendant elements of `key` with the given tag, in document order.
    pub fn descendants_by_tag(&self, key: NodeKey, tag: &str) -> Vec<NodeKey> {
        self.descendants(key)
            .filter(|node| self.tag_name(*node) == Some(tag))
            .collect()
    }

    pub fn has_descendant_tag(&self, key: NodeKey, tag: &str) -> bool {
        self.descendants(key)
            .any(|node| self.tag_name(node) == Some(tag))
    }

    /// Flattened text of a node: its own text for text nodes, the
    /// concatenation of all descendant text nodes otherwise.
    pub fn text_content(&self, key: NodeKey) -> String {
        if let Some(NodeKind::Text { text }) = self.node(key).map(|node| &node.kind) {
            return text.clone();
        }
        let mut out = String::new();
        for node in self.descendants(key) {
            if let Some(NodeKind::Text { text }) = self.node(node).map(|found| &found.kind) {
                out.push_str(text);
            }
        }
        out
    }

    /// Descendant text nodes with non-blank content.
    pub fn text_runs(&self, key: NodeKey) -> Vec<NodeKey> {
        self.descendants(key)
            .filter(|node| {
                matches!(
                    self.node(*node).map(|found| &found.kind),
                    Some(NodeKind::Text { text }) if !text.trim().is_empty()
                )
            })
            .collect()
    }

    /// Value of an inline style property, read from the `style` attribute.
    pub fn inline_style(&self, key: NodeKey, property: &str) -> Option<String> {
        let declarations = parse_declarations(self.attr(key, "style")?);
        declarations
            .into_iter()
            .rev()
            .find(|(name, _)| name == property)
            .map(|(_, value)| value)
    }

    /// Set an inline style property. The rest of the `style` attribute is
    /// left as written.
    ///
    /// # Errors
    /// Returns an error if `key` is not an element.
    pub fn set_inline_style(
        &mut self,
        key: NodeKey,
        property: &str,
        value: &str,
    ) -> Result<(), Error> {
        let updated = set_declaration(self.attr(key, "style").unwrap_or_default(), property, value);
        self.set_attr(key, "style", &updated)
    }
}
