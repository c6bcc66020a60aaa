//! An in-memory host tree.
//!
//! Nodes live in an arena and are never freed; [`HostNode`] handles index into it.
//! Every mutation is appended to a log so callers can assert on the exact host
//! operations a patch performed.

use std::fmt::Write as _;
use std::rc::Rc;

use indexmap::IndexMap;

use crate::host::{HostAdapter, HostNode};
use crate::vnode::{Event, Listener};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mutation {
    Create(HostNode),
    Insert { parent: HostNode, node: HostNode },
    /// Insertion of a node that was already attached somewhere.
    Move { parent: HostNode, node: HostNode },
    Remove { parent: HostNode, node: HostNode },
    SetText(HostNode),
    SetAttr { node: HostNode, name: String },
    RemoveAttr { node: HostNode, name: String },
    AddListener { node: HostNode, event: String },
    RemoveListener { node: HostNode, event: String },
}

#[derive(Debug)]
enum Kind {
    Element {
        tag: String,
        ns: Option<String>,
        attrs: IndexMap<String, String>,
        /// Namespace of every attribute set with one.
        attr_ns: IndexMap<String, String>,
        listeners: IndexMap<String, Rc<Listener>>,
    },
    Text(String),
    Comment(String),
    Markup(String),
}

#[derive(Debug)]
struct Entry {
    kind: Kind,
    parent: Option<HostNode>,
    children: Vec<HostNode>,
}

#[derive(Debug, Default)]
pub struct MemoryHost {
    nodes: Vec<Entry>,
    log: Vec<Mutation>,
}

impl MemoryHost {
    pub fn new() -> Self {
        Self::default()
    }

    fn alloc(&mut self, kind: Kind) -> HostNode {
        let node = HostNode::from_raw(self.nodes.len() as u32);
        self.nodes.push(Entry {
            kind,
            parent: None,
            children: Vec::new(),
        });
        self.log.push(Mutation::Create(node));
        node
    }

    fn entry(&self, node: HostNode) -> Option<&Entry> {
        self.nodes.get(node.raw() as usize)
    }

    fn entry_mut(&mut self, node: HostNode) -> Option<&mut Entry> {
        self.nodes.get_mut(node.raw() as usize)
    }

    fn detach(&mut self, node: HostNode) -> bool {
        let Some(parent) = self.entry(node).and_then(|e| e.parent) else {
            return false;
        };
        if let Some(p) = self.entry_mut(parent) {
            p.children.retain(|c| *c != node);
        }
        if let Some(e) = self.entry_mut(node) {
            e.parent = None;
        }
        true
    }

    pub fn mutations(&self) -> &[Mutation] {
        &self.log
    }

    pub fn take_mutations(&mut self) -> Vec<Mutation> {
        std::mem::take(&mut self.log)
    }

    pub fn clear_mutations(&mut self) {
        self.log.clear();
    }

    pub fn children(&self, node: HostNode) -> Vec<HostNode> {
        self.entry(node).map(|e| e.children.clone()).unwrap_or_default()
    }

    pub fn attribute(&self, node: HostNode, name: &str) -> Option<String> {
        match &self.entry(node)?.kind {
            Kind::Element { attrs, .. } => attrs.get(name).cloned(),
            _ => None,
        }
    }

    pub fn attribute_ns(&self, node: HostNode, name: &str) -> Option<String> {
        match &self.entry(node)?.kind {
            Kind::Element { attr_ns, .. } => attr_ns.get(name).cloned(),
            _ => None,
        }
    }

    pub fn namespace(&self, node: HostNode) -> Option<String> {
        match &self.entry(node)?.kind {
            Kind::Element { ns, .. } => ns.clone(),
            _ => None,
        }
    }

    pub fn listener_count(&self, node: HostNode) -> usize {
        match self.entry(node).map(|e| &e.kind) {
            Some(Kind::Element { listeners, .. }) => listeners.len(),
            _ => 0,
        }
    }

    /// Listeners an event of type `kind` at `target` would reach, innermost first.
    pub fn event_path(&self, target: HostNode, kind: &str) -> Vec<(HostNode, Rc<Listener>)> {
        let mut path = Vec::new();
        let mut current = Some(target);
        while let Some(node) = current {
            if let Some(Kind::Element { listeners, .. }) = self.entry(node).map(|e| &e.kind) {
                if let Some(listener) = listeners.get(kind) {
                    path.push((node, listener.clone()));
                }
            }
            current = self.parent(node);
        }
        path
    }

    /// Dispatches an event at `target`, bubbling through its ancestors.
    pub fn dispatch(&self, target: HostNode, kind: &str) -> Event {
        fire(self.event_path(target, kind), kind, target)
    }

    /// Serializes `node` and its descendants.
    pub fn to_markup(&self, node: HostNode) -> String {
        let mut out = String::new();
        self.write_markup(node, &mut out);
        out
    }

    fn write_markup(&self, node: HostNode, out: &mut String) {
        let Some(entry) = self.entry(node) else {
            return;
        };
        match &entry.kind {
            Kind::Text(t) => out.push_str(&escape(t, false)),
            Kind::Comment(t) => {
                let _ = write!(out, "<!--{t}-->");
            }
            Kind::Markup(m) => out.push_str(m),
            Kind::Element { tag, attrs, .. } => {
                let _ = write!(out, "<{tag}");
                for (k, v) in attrs {
                    if v.is_empty() {
                        let _ = write!(out, " {k}");
                    } else {
                        let _ = write!(out, " {k}=\"{}\"", escape(v, true));
                    }
                }
                out.push('>');
                for c in &entry.children {
                    self.write_markup(*c, out);
                }
                let _ = write!(out, "</{tag}>");
            }
        }
    }
}

/// Runs a previously collected event path without borrowing the host.
pub fn fire(path: Vec<(HostNode, Rc<Listener>)>, kind: &str, target: HostNode) -> Event {
    let event = Event::new(kind, target);
    for (node, listener) in path {
        event.set_current_target(node);
        listener.handle(&event);
        if event.propagation_stopped() {
            break;
        }
    }
    event
}

fn escape(s: &str, attr: bool) -> String {
    let mut out = String::with_capacity(s.len());
    for ch in s.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' if attr => out.push_str("&quot;"),
            _ => out.push(ch),
        }
    }
    out
}

impl HostAdapter for MemoryHost {
    fn create_element(&mut self, tag: &str) -> HostNode {
        self.alloc(Kind::Element {
            tag: tag.to_string(),
            ns: None,
            attrs: IndexMap::new(),
            attr_ns: IndexMap::new(),
            listeners: IndexMap::new(),
        })
    }

    fn create_element_ns(&mut self, ns: &str, tag: &str) -> HostNode {
        self.alloc(Kind::Element {
            tag: tag.to_string(),
            ns: Some(ns.to_string()),
            attrs: IndexMap::new(),
            attr_ns: IndexMap::new(),
            listeners: IndexMap::new(),
        })
    }

    fn create_text(&mut self, text: &str) -> HostNode {
        self.alloc(Kind::Text(text.to_string()))
    }

    fn create_comment(&mut self, text: &str) -> HostNode {
        self.alloc(Kind::Comment(text.to_string()))
    }

    fn create_markup(&mut self, markup: &str) -> HostNode {
        self.alloc(Kind::Markup(markup.to_string()))
    }

    fn insert_before(&mut self, parent: HostNode, node: HostNode, reference: Option<HostNode>) {
        let moved = self.detach(node);
        let Some(p) = self.entry_mut(parent) else {
            return;
        };
        let at = reference
            .and_then(|r| p.children.iter().position(|c| *c == r))
            .unwrap_or(p.children.len());
        p.children.insert(at, node);
        if let Some(e) = self.entry_mut(node) {
            e.parent = Some(parent);
        }
        self.log.push(if moved {
            Mutation::Move { parent, node }
        } else {
            Mutation::Insert { parent, node }
        });
    }

    fn remove_child(&mut self, parent: HostNode, child: HostNode) {
        if self.entry(child).and_then(|e| e.parent) != Some(parent) {
            return;
        }
        self.detach(child);
        self.log.push(Mutation::Remove { parent, node: child });
    }

    fn append_child(&mut self, parent: HostNode, child: HostNode) {
        self.insert_before(parent, child, None);
    }

    fn parent(&self, node: HostNode) -> Option<HostNode> {
        self.entry(node)?.parent
    }

    fn next_sibling(&self, node: HostNode) -> Option<HostNode> {
        let parent = self.parent(node)?;
        let siblings = &self.entry(parent)?.children;
        let at = siblings.iter().position(|c| *c == node)?;
        siblings.get(at + 1).copied()
    }

    fn tag_name(&self, node: HostNode) -> Option<String> {
        match &self.entry(node)?.kind {
            Kind::Element { tag, .. } => Some(tag.clone()),
            _ => None,
        }
    }

    fn text_content(&self, node: HostNode) -> Option<String> {
        let entry = self.entry(node)?;
        match &entry.kind {
            Kind::Text(t) | Kind::Comment(t) | Kind::Markup(t) => Some(t.clone()),
            Kind::Element { .. } => {
                let mut out = String::new();
                for c in &entry.children {
                    if let Some(t) = self.text_content(*c) {
                        if !self.is_comment(*c) {
                            out.push_str(&t);
                        }
                    }
                }
                Some(out)
            }
        }
    }

    fn set_text_content(&mut self, node: HostNode, text: &str) {
        let is_element = self.is_element(node);
        if is_element {
            for c in self.children(node) {
                self.detach(c);
            }
            if !text.is_empty() {
                let t = HostNode::from_raw(self.nodes.len() as u32);
                self.nodes.push(Entry {
                    kind: Kind::Text(text.to_string()),
                    parent: Some(node),
                    children: Vec::new(),
                });
                if let Some(e) = self.entry_mut(node) {
                    e.children.push(t);
                }
            }
        } else if let Some(e) = self.entry_mut(node) {
            match &mut e.kind {
                Kind::Text(t) | Kind::Comment(t) | Kind::Markup(t) => *t = text.to_string(),
                Kind::Element { .. } => {}
            }
        }
        self.log.push(Mutation::SetText(node));
    }

    fn is_element(&self, node: HostNode) -> bool {
        matches!(self.entry(node).map(|e| &e.kind), Some(Kind::Element { .. }))
    }

    fn is_text(&self, node: HostNode) -> bool {
        matches!(self.entry(node).map(|e| &e.kind), Some(Kind::Text(_)))
    }

    fn is_comment(&self, node: HostNode) -> bool {
        matches!(self.entry(node).map(|e| &e.kind), Some(Kind::Comment(_)))
    }

    fn set_attribute(&mut self, node: HostNode, name: &str, value: &str) {
        if let Some(Kind::Element { attrs, .. }) = self.entry_mut(node).map(|e| &mut e.kind) {
            attrs.insert(name.to_string(), value.to_string());
            self.log.push(Mutation::SetAttr {
                node,
                name: name.to_string(),
            });
        }
    }

    fn set_attribute_ns(&mut self, node: HostNode, ns: &str, name: &str, value: &str) {
        if let Some(Kind::Element { attr_ns, .. }) = self.entry_mut(node).map(|e| &mut e.kind) {
            attr_ns.insert(name.to_string(), ns.to_string());
        }
        self.set_attribute(node, name, value);
    }

    /// Namespaced attributes are left alone; they go through `remove_attribute_ns`.
    fn remove_attribute(&mut self, node: HostNode, name: &str) {
        if let Some(Kind::Element { attrs, attr_ns, .. }) = self.entry_mut(node).map(|e| &mut e.kind) {
            if !attr_ns.contains_key(name) && attrs.shift_remove(name).is_some() {
                self.log.push(Mutation::RemoveAttr {
                    node,
                    name: name.to_string(),
                });
            }
        }
    }

    fn remove_attribute_ns(&mut self, node: HostNode, ns: &str, name: &str) {
        if let Some(Kind::Element { attrs, attr_ns, .. }) = self.entry_mut(node).map(|e| &mut e.kind) {
            if attr_ns.get(name).is_some_and(|n| n == ns) {
                attr_ns.shift_remove(name);
                attrs.shift_remove(name);
                self.log.push(Mutation::RemoveAttr {
                    node,
                    name: name.to_string(),
                });
            }
        }
    }

    fn add_listener(&mut self, node: HostNode, event: &str, listener: &Rc<Listener>) {
        if let Some(Kind::Element { listeners, .. }) = self.entry_mut(node).map(|e| &mut e.kind) {
            listeners.insert(event.to_string(), listener.clone());
            self.log.push(Mutation::AddListener {
                node,
                event: event.to_string(),
            });
        }
    }

    fn remove_listener(&mut self, node: HostNode, event: &str, listener: &Rc<Listener>) {
        if let Some(Kind::Element { listeners, .. }) = self.entry_mut(node).map(|e| &mut e.kind) {
            if listeners.get(event).is_some_and(|l| Rc::ptr_eq(l, listener)) {
                listeners.shift_remove(event);
                self.log.push(Mutation::RemoveListener {
                    node,
                    event: event.to_string(),
                });
            }
        }
    }
}
