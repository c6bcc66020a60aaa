use std::rc::Rc;

use tracing::trace;

use crate::host::{HostAdapter, HostNode, XLINK_NS, XML_NS};
use crate::vnode::{AttrValue, Attrs};

pub(super) fn update<H>(host: &mut H, elm: HostNode, old: Option<&Attrs>, new: Option<&Attrs>)
where
    H: HostAdapter + ?Sized,
{
    match (old, new) {
        (None, None) => return,
        (Some(a), Some(b)) if Rc::ptr_eq(a, b) => return,
        _ => {}
    }

    if let Some(new) = new {
        for (name, cur) in new.iter() {
            if old.and_then(|o| o.get(name)) == Some(cur) {
                continue;
            }
            trace!(node = elm.raw(), name, "set attribute");
            match cur {
                AttrValue::Bool(true) => host.set_attribute(elm, name, ""),
                AttrValue::Bool(false) => remove(host, elm, name),
                AttrValue::Str(value) => set(host, elm, name, value),
            }
        }
    }

    if let Some(old) = old {
        for name in old.keys() {
            if !new.is_some_and(|n| n.contains_key(name)) {
                trace!(node = elm.raw(), name, "remove attribute");
                remove(host, elm, name);
            }
        }
    }
}

fn namespace_of(name: &str) -> Option<&'static str> {
    if name.starts_with("xml:") {
        Some(XML_NS)
    } else if name.starts_with("xlink:") {
        Some(XLINK_NS)
    } else {
        None
    }
}

fn set<H>(host: &mut H, elm: HostNode, name: &str, value: &str)
where
    H: HostAdapter + ?Sized,
{
    match namespace_of(name) {
        Some(ns) => host.set_attribute_ns(elm, ns, name, value),
        None => host.set_attribute(elm, name, value),
    }
}

fn remove<H>(host: &mut H, elm: HostNode, name: &str)
where
    H: HostAdapter + ?Sized,
{
    match namespace_of(name) {
        Some(ns) => host.remove_attribute_ns(elm, ns, name),
        None => host.remove_attribute(elm, name),
    }
}
