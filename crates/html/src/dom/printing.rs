use super::{DOM, DOMNode, NodeKey, NodeKind};
use serde_json::{Map, Value, json};

fn flush_text(children: &mut Vec<Value>, text_buf: &mut String) {
    if !text_buf.trim().is_empty() {
        children.push(json!({ "type": "text", "text": text_buf.trim() }));
    }
    text_buf.clear();
}

fn coalesce_children(dom: &DOM, key: NodeKey) -> Vec<Value> {
    let mut children: Vec<Value> = Vec::new();
    let mut text_buf = String::new();
    for child in dom.children(key) {
        if let Some(NodeKind::Text { text }) = dom.node(child).map(|node| &node.kind) {
            text_buf.push_str(text);
            continue;
        }
        flush_text(&mut children, &mut text_buf);
        let value = node_to_json(dom, child);
        if !value.is_null() {
            children.push(value);
        }
    }
    flush_text(&mut children, &mut text_buf);
    children
}

fn node_to_json(dom: &DOM, key: NodeKey) -> Value {
    let Some(DOMNode { kind, attrs }) = dom.node(key) else {
        return Value::Null;
    };
    match kind {
        NodeKind::Document => json!({ "type": "document", "children": coalesce_children(dom, key) }),
        NodeKind::Element { tag } => {
            let mut pairs: Vec<&(String, String)> = attrs.iter().collect();
            pairs.sort_by(|left, right| left.0.cmp(&right.0));
            let mut attrs_obj = Map::new();
            for (name, value) in pairs {
                attrs_obj.insert(name.clone(), Value::String(value.clone()));
            }
            json!({
                "type": "element",
                "tag": tag,
                "attrs": Value::Object(attrs_obj),
                "children": coalesce_children(dom, key),
            })
        }
        NodeKind::Text { text } => json!({ "type": "text", "text": text }),
        NodeKind::Comment { .. } => Value::Null,
    }
}

impl DOM {
    /// Deterministic JSON snapshot of the tree: adjacent text is coalesced and
    /// trimmed, whitespace-only text and comments are dropped, attributes are
    /// sorted by name.
    pub fn to_json(&self) -> Value {
        node_to_json(self, self.root())
    }
}
