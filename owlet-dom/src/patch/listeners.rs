use std::rc::Rc;

use tracing::trace;

use crate::host::{HostAdapter, HostNode};
use crate::vnode::{Listener, VNodeData};

pub(super) fn create<H>(host: &mut H, elm: HostNode, data: &mut VNodeData)
where
    H: HostAdapter + ?Sized,
{
    update(host, elm, &VNodeData::default(), data);
}

/// Keeps one listener per host node and only touches the event types that
/// appeared or disappeared between `old` and `new`.
pub(super) fn update<H>(host: &mut H, elm: HostNode, old: &VNodeData, new: &mut VNodeData)
where
    H: HostAdapter + ?Sized,
{
    let old_listener = old.listener.clone();

    match (&old.on, &new.on) {
        (None, None) => return,
        (Some(a), Some(b)) if Rc::ptr_eq(a, b) => {
            new.listener = old_listener;
            return;
        }
        _ => {}
    }

    if let (Some(old_on), Some(listener)) = (&old.on, &old_listener) {
        for kind in old_on.keys() {
            if !new.on.as_ref().is_some_and(|on| on.contains_key(kind)) {
                trace!(node = elm.raw(), kind, "remove listener");
                host.remove_listener(elm, kind, listener);
            }
        }
    }

    let Some(on) = new.on.clone() else {
        return;
    };
    let listener = match old_listener {
        Some(listener) => {
            listener.set_events(on.clone());
            listener
        }
        None => Listener::new(on.clone()),
    };
    for kind in on.keys() {
        let existed = old.listener.is_some() && old.on.as_ref().is_some_and(|o| o.contains_key(kind));
        if !existed {
            trace!(node = elm.raw(), kind, "add listener");
            host.add_listener(elm, kind, &listener);
        }
    }
    new.listener = Some(listener);
}
