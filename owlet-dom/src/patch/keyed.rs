use std::collections::HashMap;

use tracing::{trace, warn};

use super::Patcher;
use crate::host::{HostAdapter, HostNode};
use crate::vnode::{Key, VNode};

fn same(old: &Option<VNode>, new: &Option<VNode>) -> bool {
    matches!((old, new), (Some(o), Some(n)) if o.same_slot(n))
}

fn host_of(v: &Option<VNode>) -> Option<HostNode> {
    v.as_ref().and_then(|v| v.host)
}

impl Patcher {
    /// Two-ended keyed diff of `parent`'s children.
    ///
    /// Appends, prepends, swaps and reversals resolve through the four cursors alone;
    /// the key index is only built once none of them match.
    pub(super) fn update_children<H>(&mut self, host: &mut H, parent: HostNode, old_ch: Vec<VNode>, new_ch: Vec<VNode>) -> Vec<VNode>
    where
        H: HostAdapter + ?Sized,
    {
        let mut old: Vec<Option<VNode>> = old_ch.into_iter().map(Some).collect();
        let mut new: Vec<Option<VNode>> = new_ch.into_iter().map(Some).collect();
        let mut out: Vec<Option<VNode>> = (0..new.len()).map(|_| None).collect();

        // Cursor ends are exclusive.
        let (mut old_start, mut old_end) = (0, old.len());
        let (mut new_start, mut new_end) = (0, new.len());
        let mut key_index: Option<HashMap<Key, usize>> = None;

        while old_start < old_end && new_start < new_end {
            if old[old_start].is_none() {
                old_start += 1;
            } else if old[old_end - 1].is_none() {
                old_end -= 1;
            } else if same(&old[old_start], &new[new_start]) {
                if let (Some(o), Some(n)) = (old[old_start].take(), new[new_start].take()) {
                    out[new_start] = Some(self.patch_vnode(host, o, n));
                }
                old_start += 1;
                new_start += 1;
            } else if same(&old[old_end - 1], &new[new_end - 1]) {
                if let (Some(o), Some(n)) = (old[old_end - 1].take(), new[new_end - 1].take()) {
                    out[new_end - 1] = Some(self.patch_vnode(host, o, n));
                }
                old_end -= 1;
                new_end -= 1;
            } else if same(&old[old_start], &new[new_end - 1]) {
                // Moved right.
                let anchor = host_of(&old[old_end - 1]).and_then(|e| host.next_sibling(e));
                if let (Some(o), Some(n)) = (old[old_start].take(), new[new_end - 1].take()) {
                    let patched = self.patch_vnode(host, o, n);
                    if let Some(elm) = patched.host {
                        trace!(node = elm.raw(), "moved right");
                        host.insert_before(parent, elm, anchor);
                    }
                    out[new_end - 1] = Some(patched);
                }
                old_start += 1;
                new_end -= 1;
            } else if same(&old[old_end - 1], &new[new_start]) {
                // Moved left.
                let anchor = host_of(&old[old_start]);
                if let (Some(o), Some(n)) = (old[old_end - 1].take(), new[new_start].take()) {
                    let patched = self.patch_vnode(host, o, n);
                    if let Some(elm) = patched.host {
                        trace!(node = elm.raw(), "moved left");
                        host.insert_before(parent, elm, anchor);
                    }
                    out[new_start] = Some(patched);
                }
                old_end -= 1;
                new_start += 1;
            } else {
                let index = key_index.get_or_insert_with(|| build_key_index(&old[old_start..old_end], old_start));
                let anchor = host_of(&old[old_start]);
                let Some(n) = new[new_start].take() else {
                    new_start += 1;
                    continue;
                };
                let found = n.key.as_ref().and_then(|k| index.get(k)).copied();
                let reusable = found.filter(|&i| old[i].as_ref().is_some_and(|o| o.sel == n.sel));
                let placed = match reusable.and_then(|i| old[i].take()) {
                    Some(o) => {
                        let patched = self.patch_vnode(host, o, n);
                        if let Some(elm) = patched.host {
                            trace!(node = elm.raw(), "moved by key");
                            host.insert_before(parent, elm, anchor);
                        }
                        patched
                    }
                    None => {
                        let created = self.create_elm(host, n);
                        if let Some(elm) = created.host {
                            host.insert_before(parent, elm, anchor);
                        }
                        created
                    }
                };
                out[new_start] = Some(placed);
                new_start += 1;
            }
        }

        if old_start < old_end || new_start < new_end {
            if old_start >= old_end {
                let before = out.get(new_end).and_then(host_of);
                let added = self.add_vnodes(host, parent, before, new[new_start..new_end].iter_mut().filter_map(Option::take).collect());
                for (slot, v) in out[new_start..new_end].iter_mut().zip(added) {
                    *slot = Some(v);
                }
            } else {
                let removed: Vec<VNode> = old[old_start..old_end].iter_mut().filter_map(Option::take).collect();
                self.remove_vnodes(host, parent, removed);
            }
        }

        out.into_iter().flatten().collect()
    }
}

fn build_key_index(old: &[Option<VNode>], offset: usize) -> HashMap<Key, usize> {
    let mut index = HashMap::new();
    for (i, v) in old.iter().enumerate() {
        let Some(key) = v.as_ref().and_then(|v| v.key.clone()) else {
            continue;
        };
        if index.insert(key.clone(), offset + i).is_some() {
            warn!(%key, "duplicate key among siblings");
        }
    }
    index
}
