//! Per-owner render state and the second render phase.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::fmt;
use std::rc::{Rc, Weak};

use owlet_dom::{Handler, HostNode, Key, VNode};
use tracing::{debug, trace};

use crate::compiler::ir::NodeId;
use crate::error::{RenderError, RenderResult};
use crate::widget::{EventOwner, Widget, WidgetCache, WidgetFactory, WidgetFuture};

/// Host nodes captured by `t-ref`, by name.
#[derive(Clone, Default)]
pub struct Refs(Rc<RefCell<HashMap<String, HostNode>>>);

impl Refs {
    pub fn get(&self, name: &str) -> Option<HostNode> {
        self.0.borrow().get(name).copied()
    }

    pub fn insert(&self, name: impl Into<String>, node: HostNode) {
        self.0.borrow_mut().insert(name.into(), node);
    }

    /// Forgets `name` unless it was rebound to another node meanwhile.
    pub fn release(&self, name: &str, node: HostNode) {
        let mut refs = self.0.borrow_mut();
        if refs.get(name) == Some(&node) {
            refs.remove(name);
        }
    }

    pub fn len(&self) -> usize {
        self.0.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.borrow().is_empty()
    }
}

impl fmt::Debug for Refs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.0.borrow().iter()).finish()
    }
}

/// A widget render started in phase 1, waiting for its vnode slot.
pub struct PendingWidget {
    pub slot: usize,
    pub key: Key,
    pub name: Rc<str>,
    pub keepalive: bool,
    pub widget: Rc<dyn Widget>,
    pub render: WidgetFuture,
}

impl fmt::Debug for PendingWidget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingWidget")
            .field("slot", &self.slot)
            .field("key", &self.key)
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// Template, event, element and method of a handler without arguments.
///
/// Element ids restart at every compile, so the id alone does not identify a site.
pub(crate) type HandlerKey = (Rc<str>, Rc<str>, NodeId, Rc<str>);

/// State threaded through every render of one owner.
///
/// Handlers, refs and live widgets outlive a single render; the pending list
/// is drained by [`resolve_pending`].
#[derive(Default)]
pub struct RenderContext {
    owner: Option<Weak<dyn EventOwner>>,
    factory: Option<Rc<dyn WidgetFactory>>,
    pub(crate) handlers: RefCell<HashMap<HandlerKey, Handler>>,
    refs: Refs,
    widgets: WidgetCache,
    pending: RefCell<Vec<PendingWidget>>,
    next_slot: Cell<usize>,
}

impl RenderContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Event handlers bound during render dispatch to `owner`.
    pub fn with_owner(mut self, owner: Weak<dyn EventOwner>) -> Self {
        self.owner = Some(owner);
        self
    }

    pub fn with_factory(mut self, factory: Rc<dyn WidgetFactory>) -> Self {
        self.factory = Some(factory);
        self
    }

    pub fn owner(&self) -> Option<Weak<dyn EventOwner>> {
        self.owner.clone()
    }

    pub fn factory(&self) -> Option<&Rc<dyn WidgetFactory>> {
        self.factory.as_ref()
    }

    pub fn refs(&self) -> &Refs {
        &self.refs
    }

    pub fn widgets(&self) -> &WidgetCache {
        &self.widgets
    }

    pub fn handler_count(&self) -> usize {
        self.handlers.borrow().len()
    }

    pub fn pending_count(&self) -> usize {
        self.pending.borrow().len()
    }

    pub(crate) fn next_slot(&self) -> usize {
        let slot = self.next_slot.get();
        self.next_slot.set(slot + 1);
        slot
    }

    pub(crate) fn push_pending(&self, pending: PendingWidget) {
        self.pending.borrow_mut().push(pending);
    }

    pub fn take_pending(&self) -> Vec<PendingWidget> {
        std::mem::take(&mut *self.pending.borrow_mut())
    }
}

impl fmt::Debug for RenderContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RenderContext")
            .field("handlers", &self.handlers.borrow().len())
            .field("refs", &self.refs)
            .field("widgets", &self.widgets)
            .field("pending", &self.pending.borrow().len())
            .finish_non_exhaustive()
    }
}

/// Awaits every widget render started by phase 1 and splices the widgets'
/// host nodes into `roots` in place of their pending slots.
pub async fn resolve_pending(rctx: &RenderContext, roots: &mut [VNode]) -> RenderResult<()> {
    let pending = rctx.take_pending();
    if pending.is_empty() {
        return Ok(());
    }
    debug!(count = pending.len(), "resolving pending widgets");

    for PendingWidget {
        slot,
        key,
        name,
        keepalive,
        widget,
        render,
    } in pending
    {
        render.await?;
        let host = widget.host_node().ok_or_else(|| RenderError::Widget {
            name: name.to_string(),
            message: "rendered without a host node".into(),
        })?;
        let vnode = adopting_vnode(&name, key, host, widget, keepalive, rctx.widgets().clone());

        match roots.iter_mut().find(|r| r.pending_slots().contains(&slot)) {
            Some(root) => {
                root.fill_pending(slot, vnode);
            }
            None => trace!(slot, widget = %name, "pending slot no longer in the tree"),
        }
    }
    Ok(())
}

fn adopting_vnode(
    name: &str,
    key: Key,
    host: HostNode,
    widget: Rc<dyn Widget>,
    keepalive: bool,
    cache: WidgetCache,
) -> VNode {
    let mut vnode = VNode::adopt(format!("widget:{name}"), host).with_key(key.clone());

    let mounted = widget.clone();
    vnode.data.hooks.insert = Some(Rc::new(move |_: HostNode| {
        if !mounted.is_mounted() {
            mounted.mounted();
        }
    }));
    vnode.data.hooks.destroy = Some(Rc::new(move |_: HostNode| {
        if keepalive {
            widget.detach();
        } else {
            widget.destroy();
            cache.remove_if_same(&key, &widget);
        }
    }));
    vnode
}
