//! html5ever `TreeSink` that writes straight into the DOM arena.

use crate::dom::{DOM, NodeKey};
use anyhow::Error;
use core::cell::RefCell;
use html5ever::tendril::StrTendril;
use html5ever::tree_builder::{ElementFlags, NodeOrText, QuirksMode, TreeSink};
use html5ever::{Attribute, ExpandedName, LocalName, Namespace, QualName};
use log::trace;
use std::borrow::Cow;
use std::rc::Rc;

/// Parser-side handle: the arena key plus the element's qualified name,
/// which html5ever asks for by reference while building the tree.
#[derive(Clone, Debug)]
pub struct SinkHandle {
    key: NodeKey,
    name: Rc<QualName>,
}

pub struct ArenaSink {
    dom: RefCell<DOM>,
    document: SinkHandle,
    unnamed: Rc<QualName>,
    /// First arena error; reported from `finish` since sink callbacks can't fail.
    error: RefCell<Option<Error>>,
}

impl Default for ArenaSink {
    fn default() -> Self {
        let dom = DOM::new();
        let unnamed = Rc::new(QualName::new(
            None,
            Namespace::from(""),
            LocalName::from(""),
        ));
        let document = SinkHandle {
            key: dom.root(),
            name: Rc::clone(&unnamed),
        };
        Self {
            dom: RefCell::new(dom),
            document,
            unnamed,
            error: RefCell::new(None),
        }
    }
}

impl ArenaSink {
    fn handle(&self, key: NodeKey) -> SinkHandle {
        SinkHandle {
            key,
            name: Rc::clone(&self.unnamed),
        }
    }

    fn record(&self, result: Result<(), Error>) {
        if let Err(err) = result {
            let mut slot = self.error.borrow_mut();
            if slot.is_none() {
                *slot = Some(err);
            }
        }
    }

    fn materialize(&self, child: NodeOrText<SinkHandle>) -> NodeKey {
        match child {
            NodeOrText::AppendNode(node) => node.key,
            NodeOrText::AppendText(text) => self.dom.borrow_mut().create_text(&text),
        }
    }
}

impl TreeSink for ArenaSink {
    type Handle = SinkHandle;
    type Output = Result<DOM, Error>;
    type ElemName<'a>
        = ExpandedName<'a>
    where
        Self: 'a;

    fn finish(self) -> Self::Output {
        match self.error.into_inner() {
            Some(err) => Err(err),
            None => Ok(self.dom.into_inner()),
        }
    }

    fn parse_error(&self, msg: Cow<'static, str>) {
        trace!(target: "html", "parse error: {msg}");
    }

    fn get_document(&self) -> Self::Handle {
        self.document.clone()
    }

    fn elem_name<'a>(&'a self, target: &'a Self::Handle) -> Self::ElemName<'a> {
        target.name.expanded()
    }

    fn create_element(
        &self,
        name: QualName,
        attrs: Vec<Attribute>,
        _flags: ElementFlags,
    ) -> Self::Handle {
        let mut dom = self.dom.borrow_mut();
        let key = dom.create_element(&name.local);
        for attr in attrs {
            let result = dom.set_attr(key, &attr.name.local, &attr.value);
            self.record(result);
        }
        SinkHandle {
            key,
            name: Rc::new(name),
        }
    }

    fn create_comment(&self, text: StrTendril) -> Self::Handle {
        let key = self.dom.borrow_mut().create_comment(&text);
        self.handle(key)
    }

    fn create_pi(&self, _target: StrTendril, data: StrTendril) -> Self::Handle {
        let key = self.dom.borrow_mut().create_comment(&data);
        self.handle(key)
    }

    fn append(&self, parent: &Self::Handle, child: NodeOrText<Self::Handle>) {
        let result = match child {
            NodeOrText::AppendText(text) => self.dom.borrow_mut().push_text(parent.key, &text),
            NodeOrText::AppendNode(node) => self.dom.borrow_mut().append_child(parent.key, node.key),
        };
        self.record(result);
    }

    fn append_based_on_parent_node(
        &self,
        element: &Self::Handle,
        prev_element: &Self::Handle,
        child: NodeOrText<Self::Handle>,
    ) {
        let has_parent = self.dom.borrow().parent(element.key).is_some();
        if has_parent {
            self.append_before_sibling(element, child);
        } else {
            self.append(prev_element, child);
        }
    }

    fn append_doctype_to_document(
        &self,
        _name: StrTendril,
        _public_id: StrTendril,
        _system_id: StrTendril,
    ) {
    }

    fn get_template_contents(&self, target: &Self::Handle) -> Self::Handle {
        target.clone()
    }

    fn same_node(&self, left: &Self::Handle, right: &Self::Handle) -> bool {
        left.key == right.key
    }

    fn set_quirks_mode(&self, _mode: QuirksMode) {}

    fn append_before_sibling(&self, sibling: &Self::Handle, new_node: NodeOrText<Self::Handle>) {
        let node = self.materialize(new_node);
        let result = self.dom.borrow_mut().insert_before(sibling.key, node);
        self.record(result);
    }

    fn add_attrs_if_missing(&self, target: &Self::Handle, attrs: Vec<Attribute>) {
        let mut dom = self.dom.borrow_mut();
        for attr in attrs {
            if dom.attr(target.key, &attr.name.local).is_none() {
                let result = dom.set_attr(target.key, &attr.name.local, &attr.value);
                self.record(result);
            }
        }
    }

    fn remove_from_parent(&self, target: &Self::Handle) {
        self.dom.borrow_mut().detach(target.key);
    }

    fn reparent_children(&self, node: &Self::Handle, new_parent: &Self::Handle) {
        let mut dom = self.dom.borrow_mut();
        let children: Vec<NodeKey> = dom.children(node.key).collect();
        for child in children {
            dom.detach(child);
            let result = dom.append_child(new_parent.key, child);
            self.record(result);
        }
    }
}
