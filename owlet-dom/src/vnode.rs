use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;

use crate::host::HostNode;

/// Selector used for comment vnodes.
pub const COMMENT_SEL: &str = "!";
/// Selector used for raw markup vnodes.
pub const MARKUP_SEL: &str = "#markup";

/// Stable identity of a vnode among its siblings.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Key {
    Str(Rc<str>),
    Int(i64),
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Str(s) => f.write_str(s),
            Key::Int(i) => write!(f, "{i}"),
        }
    }
}

impl From<&str> for Key {
    fn from(s: &str) -> Self {
        Key::Str(s.into())
    }
}

impl From<String> for Key {
    fn from(s: String) -> Self {
        Key::Str(s.into())
    }
}

impl From<i64> for Key {
    fn from(i: i64) -> Self {
        Key::Int(i)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum AttrValue {
    Str(String),
    /// `true` renders as an empty marker attribute, `false` removes it.
    Bool(bool),
}

impl From<&str> for AttrValue {
    fn from(s: &str) -> Self {
        AttrValue::Str(s.to_string())
    }
}

impl From<String> for AttrValue {
    fn from(s: String) -> Self {
        AttrValue::Str(s)
    }
}

impl From<bool> for AttrValue {
    fn from(b: bool) -> Self {
        AttrValue::Bool(b)
    }
}

pub type AttrMap = IndexMap<String, AttrValue>;
pub type Attrs = Rc<AttrMap>;

/// A host event as seen by handlers.
#[derive(Debug)]
pub struct Event {
    kind: String,
    target: HostNode,
    current_target: Cell<HostNode>,
    default_prevented: Cell<bool>,
    propagation_stopped: Cell<bool>,
}

impl Event {
    pub fn new(kind: impl Into<String>, target: HostNode) -> Self {
        Self {
            kind: kind.into(),
            target,
            current_target: Cell::new(target),
            default_prevented: Cell::new(false),
            propagation_stopped: Cell::new(false),
        }
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn target(&self) -> HostNode {
        self.target
    }

    pub fn current_target(&self) -> HostNode {
        self.current_target.get()
    }

    pub fn set_current_target(&self, node: HostNode) {
        self.current_target.set(node);
    }

    pub fn prevent_default(&self) {
        self.default_prevented.set(true);
    }

    pub fn default_prevented(&self) -> bool {
        self.default_prevented.get()
    }

    pub fn stop_propagation(&self) {
        self.propagation_stopped.set(true);
    }

    pub fn propagation_stopped(&self) -> bool {
        self.propagation_stopped.get()
    }
}

/// A reference-counted event callback. Identity is pointer identity.
#[derive(Clone)]
pub struct Handler(Rc<dyn Fn(&Event)>);

impl Handler {
    pub fn new(f: impl Fn(&Event) + 'static) -> Self {
        Handler(Rc::new(f))
    }

    pub fn call(&self, event: &Event) {
        (self.0)(event)
    }

    pub fn ptr_eq(&self, other: &Handler) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for Handler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Handler({:p})", Rc::as_ptr(&self.0))
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Modifiers {
    pub prevent: bool,
    pub stop: bool,
    pub self_only: bool,
}

#[derive(Debug, Clone)]
pub struct EventBinding {
    pub handler: Handler,
    pub modifiers: Modifiers,
}

impl EventBinding {
    pub fn new(handler: Handler) -> Self {
        Self {
            handler,
            modifiers: Modifiers::default(),
        }
    }

    pub fn invoke(&self, event: &Event) {
        if self.modifiers.self_only && event.target() != event.current_target() {
            return;
        }
        if self.modifiers.prevent {
            event.prevent_default();
        }
        if self.modifiers.stop {
            event.stop_propagation();
        }
        self.handler.call(event);
    }
}

pub type EventMap = IndexMap<String, EventBinding>;
pub type Events = Rc<EventMap>;

/// The single physical listener registered on a host node.
///
/// All event types of the node share it; dispatch reads whichever event map
/// the most recent patch installed.
#[derive(Default)]
pub struct Listener {
    events: RefCell<Option<Events>>,
}

impl Listener {
    pub fn new(events: Events) -> Rc<Self> {
        Rc::new(Self {
            events: RefCell::new(Some(events)),
        })
    }

    pub(crate) fn set_events(&self, events: Events) {
        *self.events.borrow_mut() = Some(events);
    }

    pub fn handle(&self, event: &Event) {
        // Handlers may re-render and re-enter `set_events`.
        let events = self.events.borrow().clone();
        if let Some(binding) = events.as_ref().and_then(|on| on.get(event.kind())) {
            binding.invoke(event);
        }
    }
}

impl fmt::Debug for Listener {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let events = self.events.borrow();
        let kinds: Vec<&str> = events
            .iter()
            .flat_map(|on| on.keys().map(String::as_str))
            .collect();
        f.debug_struct("Listener").field("events", &kinds).finish()
    }
}

pub type NodeHook = Rc<dyn Fn(HostNode)>;
pub type RemoveHook = Rc<dyn Fn(HostNode, RemoveToken)>;

/// Completion handle given to `remove` hooks.
///
/// The host node is detached once every token of a removal called [`RemoveToken::done`].
pub struct RemoveToken(Rc<Cell<usize>>);

impl RemoveToken {
    pub(crate) fn new(count: Rc<Cell<usize>>) -> Self {
        RemoveToken(count)
    }

    pub fn done(self) {
        let left = self.0.get().saturating_sub(1);
        self.0.set(left);
    }
}

#[derive(Clone, Default)]
pub struct Hooks {
    /// Runs right after the host node was created, before it is attached.
    pub create: Option<NodeHook>,
    /// Runs once the whole patched subtree is attached.
    pub insert: Option<NodeHook>,
    pub remove: Option<RemoveHook>,
    pub destroy: Option<NodeHook>,
}

impl Hooks {
    pub fn is_empty(&self) -> bool {
        self.create.is_none() && self.insert.is_none() && self.remove.is_none() && self.destroy.is_none()
    }
}

impl fmt::Debug for Hooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hooks")
            .field("create", &self.create.is_some())
            .field("insert", &self.insert.is_some())
            .field("remove", &self.remove.is_some())
            .field("destroy", &self.destroy.is_some())
            .finish()
    }
}

#[derive(Debug, Clone, Default)]
pub struct VNodeData {
    pub attrs: Option<Attrs>,
    pub on: Option<Events>,
    pub ns: Option<Rc<str>>,
    pub hooks: Hooks,
    /// Host markup inserted verbatim (unescaped content).
    pub markup: Option<Rc<str>>,
    /// The host node is owned elsewhere (an embedded component) and only adopted here.
    pub adopt: bool,
    /// Unresolved asynchronous slot, filled before the tree is patched.
    pub pending: Option<usize>,
    /// Installed by the reconciler; carried across patches of the same host node.
    pub listener: Option<Rc<Listener>>,
}

impl VNodeData {
    pub fn attr(mut self, name: impl Into<String>, value: impl Into<AttrValue>) -> Self {
        let mut attrs = self.attrs.take().map(|a| (*a).clone()).unwrap_or_default();
        attrs.insert(name.into(), value.into());
        self.attrs = Some(Rc::new(attrs));
        self
    }

    pub fn on(mut self, event: impl Into<String>, handler: Handler) -> Self {
        let mut on = self.on.take().map(|a| (*a).clone()).unwrap_or_default();
        on.insert(event.into(), EventBinding::new(handler));
        self.on = Some(Rc::new(on));
        self
    }

    pub fn ns(mut self, ns: &str) -> Self {
        self.ns = Some(ns.into());
        self
    }
}

impl From<()> for VNodeData {
    fn from(_: ()) -> Self {
        VNodeData::default()
    }
}

impl From<Vec<(&str, &str)>> for VNodeData {
    fn from(v: Vec<(&str, &str)>) -> Self {
        let attrs: AttrMap = v
            .into_iter()
            .map(|(k, v)| (k.to_string(), AttrValue::from(v)))
            .collect();
        VNodeData {
            attrs: Some(Rc::new(attrs)),
            ..VNodeData::default()
        }
    }
}

impl From<Attrs> for VNodeData {
    fn from(attrs: Attrs) -> Self {
        VNodeData {
            attrs: Some(attrs),
            ..VNodeData::default()
        }
    }
}

/// Lightweight descriptor of a host node.
#[derive(Debug, Clone, Default)]
pub struct VNode {
    /// Tag name; empty for text, [`COMMENT_SEL`] for comments.
    pub sel: String,
    pub data: VNodeData,
    pub children: Vec<VNode>,
    pub text: Option<String>,
    pub key: Option<Key>,
    /// Host node this vnode was patched into.
    pub host: Option<HostNode>,
}

impl VNode {
    pub fn element(sel: impl Into<String>, data: VNodeData, children: Vec<VNode>) -> Self {
        VNode {
            sel: sel.into(),
            data,
            children,
            ..VNode::default()
        }
    }

    pub fn text(text: impl Into<String>) -> Self {
        VNode {
            text: Some(text.into()),
            ..VNode::default()
        }
    }

    pub fn comment(text: impl Into<String>) -> Self {
        VNode {
            sel: COMMENT_SEL.to_string(),
            text: Some(text.into()),
            ..VNode::default()
        }
    }

    pub fn markup(markup: impl Into<Rc<str>>) -> Self {
        VNode {
            sel: MARKUP_SEL.to_string(),
            data: VNodeData {
                markup: Some(markup.into()),
                ..VNodeData::default()
            },
            ..VNode::default()
        }
    }

    /// A placeholder for an asynchronous slot that is not resolved yet.
    pub fn pending(slot: usize) -> Self {
        VNode {
            sel: COMMENT_SEL.to_string(),
            text: Some(String::new()),
            data: VNodeData {
                pending: Some(slot),
                ..VNodeData::default()
            },
            ..VNode::default()
        }
    }

    /// Wraps a live host node owned by someone else.
    pub fn adopt(sel: impl Into<String>, host: HostNode) -> Self {
        VNode {
            sel: sel.into(),
            data: VNodeData {
                adopt: true,
                ..VNodeData::default()
            },
            host: Some(host),
            ..VNode::default()
        }
    }

    pub fn with_key(mut self, key: impl Into<Key>) -> Self {
        self.key = Some(key.into());
        self
    }

    pub fn is_text(&self) -> bool {
        self.sel.is_empty()
    }

    pub fn is_comment(&self) -> bool {
        self.sel == COMMENT_SEL
    }

    /// Two vnodes occupy the same slot iff their keys and selectors match.
    pub fn same_slot(&self, other: &VNode) -> bool {
        self.key == other.key && self.sel == other.sel
    }

    /// Visits every unresolved pending slot in document order.
    pub fn pending_slots(&self) -> Vec<usize> {
        let mut out = Vec::new();
        collect_pending(self, &mut out);
        out
    }

    /// Replaces the pending slot `slot` with `node`. Returns `false` if not found.
    pub fn fill_pending(&mut self, slot: usize, node: VNode) -> bool {
        let mut node = Some(node);
        fill_pending(self, slot, &mut node);
        node.is_none()
    }
}

fn collect_pending(v: &VNode, out: &mut Vec<usize>) {
    if let Some(slot) = v.data.pending {
        out.push(slot);
    }
    for c in &v.children {
        collect_pending(c, out);
    }
}

fn fill_pending(v: &mut VNode, slot: usize, node: &mut Option<VNode>) {
    if v.data.pending == Some(slot) {
        if let Some(n) = node.take() {
            *v = n;
        }
        return;
    }
    for c in &mut v.children {
        if node.is_none() {
            return;
        }
        fill_pending(c, slot, node);
    }
}
