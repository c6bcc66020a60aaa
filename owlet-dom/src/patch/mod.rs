//! Reconciliation of two vnode trees against a live host tree.

mod attributes;
mod keyed;
mod listeners;

use std::cell::Cell;
use std::rc::Rc;

use tracing::{instrument, trace, trace_span, warn};

use crate::host::{HostAdapter, HostNode};
use crate::vnode::{COMMENT_SEL, NodeHook, RemoveToken, VNode};

/// What a patch starts from: a previously patched vnode, or a bare host node on first render.
#[derive(Debug)]
pub enum PatchTarget {
    VNode(VNode),
    Host(HostNode),
}

impl From<VNode> for PatchTarget {
    fn from(v: VNode) -> Self {
        PatchTarget::VNode(v)
    }
}

impl From<HostNode> for PatchTarget {
    fn from(node: HostNode) -> Self {
        PatchTarget::Host(node)
    }
}

#[derive(Debug)]
struct PendingRemoval {
    parent: HostNode,
    node: HostNode,
    remaining: Rc<Cell<usize>>,
}

/// Applies vnode diffs to a host tree.
///
/// A `Patcher` may be reused across patches; removals whose `remove` hooks
/// have not completed yet are kept until [`Patcher::flush_removals`] sees them done.
#[derive(Default)]
pub struct Patcher {
    inserted: Vec<(NodeHook, HostNode)>,
    removals: Vec<PendingRemoval>,
}

impl Patcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mutates the host tree so it matches `new` and returns `new` with host refs populated.
    #[instrument(level = "trace", skip_all)]
    pub fn patch<H>(&mut self, host: &mut H, old: impl Into<PatchTarget>, new: VNode) -> VNode
    where
        H: HostAdapter + ?Sized,
    {
        let old = match old.into() {
            PatchTarget::VNode(v) => v,
            PatchTarget::Host(node) => empty_node_at(host, node),
        };

        let patched = if old.same_slot(&new) {
            self.patch_vnode(host, old, new)
        } else {
            trace!(old = %old.sel, new = %new.sel, "root replaced");
            let elm = old.host;
            let parent = elm.and_then(|e| host.parent(e));
            let created = self.create_elm(host, new);
            if let (Some(parent), Some(elm), Some(created_elm)) = (parent, elm, created.host) {
                let next = host.next_sibling(elm);
                host.insert_before(parent, created_elm, next);
                self.remove_vnodes(host, parent, vec![old]);
            }
            created
        };

        for (hook, node) in self.inserted.drain(..) {
            hook(node);
        }
        patched
    }

    /// Detaches nodes whose `remove` hooks all completed. Returns how many were detached.
    pub fn flush_removals<H>(&mut self, host: &mut H) -> usize
    where
        H: HostAdapter + ?Sized,
    {
        let mut flushed = 0;
        self.removals.retain(|r| {
            if r.remaining.get() == 0 {
                host.remove_child(r.parent, r.node);
                flushed += 1;
                false
            } else {
                true
            }
        });
        flushed
    }

    pub fn pending_removals(&self) -> usize {
        self.removals.len()
    }

    fn patch_vnode<H>(&mut self, host: &mut H, old: VNode, mut new: VNode) -> VNode
    where
        H: HostAdapter + ?Sized,
    {
        let span = trace_span!("patch_vnode", sel = %new.sel, key = ?new.key);
        let _enter = span.enter();

        let Some(elm) = old.host else {
            return self.create_elm(host, new);
        };

        if new.data.adopt {
            // The embedded component patches its own subtree; only its root may have changed.
            if let Some(adopted) = new.host {
                if adopted != elm {
                    if let Some(parent) = host.parent(elm) {
                        host.insert_before(parent, adopted, Some(elm));
                        host.remove_child(parent, elm);
                    }
                }
            }
            return new;
        }

        if old.data.markup != new.data.markup {
            let parent = host.parent(elm);
            let created = self.create_elm(host, new);
            if let (Some(parent), Some(created_elm)) = (parent, created.host) {
                host.insert_before(parent, created_elm, Some(elm));
                host.remove_child(parent, elm);
            }
            return created;
        }

        new.host = Some(elm);
        attributes::update(host, elm, old.data.attrs.as_ref(), new.data.attrs.as_ref());
        listeners::update(host, elm, &old.data, &mut new.data);

        let VNode {
            children: old_children,
            text: old_text,
            ..
        } = old;

        match &new.text {
            None => {
                let new_children = std::mem::take(&mut new.children);
                new.children = match (old_children.is_empty(), new_children.is_empty()) {
                    (false, false) => self.update_children(host, elm, old_children, new_children),
                    (true, false) => {
                        if old_text.is_some() {
                            host.set_text_content(elm, "");
                        }
                        self.add_vnodes(host, elm, None, new_children)
                    }
                    (false, true) => {
                        self.remove_vnodes(host, elm, old_children);
                        Vec::new()
                    }
                    (true, true) => {
                        if old_text.is_some() {
                            host.set_text_content(elm, "");
                        }
                        Vec::new()
                    }
                };
            }
            Some(text) if old_text.as_ref() != Some(text) => {
                if !old_children.is_empty() {
                    self.remove_vnodes(host, elm, old_children);
                }
                trace!(node = elm.raw(), "set text");
                host.set_text_content(elm, text);
            }
            Some(_) => {}
        }
        new
    }

    fn create_elm<H>(&mut self, host: &mut H, mut v: VNode) -> VNode
    where
        H: HostAdapter + ?Sized,
    {
        if let Some(slot) = v.data.pending {
            warn!(slot, "patching an unresolved pending slot; it renders as an empty comment");
        }

        let elm = match v.host {
            Some(adopted) if v.data.adopt => adopted,
            _ if v.sel == COMMENT_SEL => host.create_comment(v.text.as_deref().unwrap_or_default()),
            _ if v.sel.is_empty() => host.create_text(v.text.as_deref().unwrap_or_default()),
            _ => match v.data.markup.clone() {
                Some(markup) => host.create_markup(&markup),
                None => {
                    let elm = match &v.data.ns {
                        Some(ns) => host.create_element_ns(ns, &v.sel),
                        None => host.create_element(&v.sel),
                    };
                    attributes::update(host, elm, None, v.data.attrs.as_ref());
                    listeners::create(host, elm, &mut v.data);
                    if !v.children.is_empty() {
                        let children = std::mem::take(&mut v.children);
                        v.children = children
                            .into_iter()
                            .map(|c| {
                                let c = self.create_elm(host, c);
                                if let Some(child) = c.host {
                                    host.append_child(elm, child);
                                }
                                c
                            })
                            .collect();
                    } else if let Some(text) = &v.text {
                        host.set_text_content(elm, text);
                    }
                    elm
                }
            },
        };
        trace!(node = elm.raw(), sel = %v.sel, "created");

        v.host = Some(elm);
        if let Some(create) = &v.data.hooks.create {
            create(elm);
        }
        if let Some(insert) = &v.data.hooks.insert {
            self.inserted.push((insert.clone(), elm));
        }
        v
    }

    fn add_vnodes<H>(&mut self, host: &mut H, parent: HostNode, before: Option<HostNode>, vnodes: Vec<VNode>) -> Vec<VNode>
    where
        H: HostAdapter + ?Sized,
    {
        vnodes
            .into_iter()
            .map(|v| {
                let v = self.create_elm(host, v);
                if let Some(elm) = v.host {
                    host.insert_before(parent, elm, before);
                }
                v
            })
            .collect()
    }

    fn remove_vnodes<H>(&mut self, host: &mut H, parent: HostNode, vnodes: impl IntoIterator<Item = VNode>)
    where
        H: HostAdapter + ?Sized,
    {
        for v in vnodes {
            let Some(elm) = v.host else {
                continue;
            };
            if v.is_text() {
                host.remove_child(parent, elm);
                continue;
            }
            invoke_destroy_hooks(&v);

            let remaining = Rc::new(Cell::new(1));
            if let Some(remove) = &v.data.hooks.remove {
                remaining.set(2);
                remove(elm, RemoveToken::new(remaining.clone()));
            }
            RemoveToken::new(remaining.clone()).done();

            if remaining.get() == 0 {
                trace!(node = elm.raw(), "removed");
                host.remove_child(parent, elm);
            } else {
                trace!(node = elm.raw(), "removal deferred");
                self.removals.push(PendingRemoval {
                    parent,
                    node: elm,
                    remaining,
                });
            }
        }
    }
}

/// Runs `destroy` hooks of `v` and all of its descendants, parents first.
pub fn invoke_destroy_hooks(v: &VNode) {
    if let (Some(destroy), Some(elm)) = (&v.data.hooks.destroy, v.host) {
        destroy(elm);
    }
    for c in &v.children {
        invoke_destroy_hooks(c);
    }
}

fn empty_node_at<H>(host: &H, node: HostNode) -> VNode
where
    H: HostAdapter + ?Sized,
{
    let sel = if host.is_comment(node) {
        COMMENT_SEL.to_string()
    } else {
        host.tag_name(node).map(|t| t.to_lowercase()).unwrap_or_default()
    };
    VNode {
        sel,
        text: host.is_text(node).then(|| host.text_content(node).unwrap_or_default()),
        host: Some(node),
        ..VNode::default()
    }
}

/// Patches with a throwaway [`Patcher`].
///
/// Removals still waiting on `remove` hooks when the patch returns are left attached.
pub fn patch<H>(host: &mut H, old: impl Into<PatchTarget>, new: VNode) -> VNode
where
    H: HostAdapter + ?Sized,
{
    let mut patcher = Patcher::new();
    let patched = patcher.patch(host, old, new);
    if patcher.pending_removals() > 0 {
        warn!(pending = patcher.pending_removals(), "dropping unfinished removals");
    }
    patched
}
