pub mod host;
pub mod memory;
pub mod patch;
pub mod vnode;

pub use host::{HostAdapter, HostNode};
pub use memory::MemoryHost;
pub use patch::{PatchTarget, Patcher, invoke_destroy_hooks, patch};
pub use vnode::{
    AttrMap, AttrValue, Attrs, Event, EventBinding, EventMap, Events, Handler, Hooks, Key, Listener, Modifiers,
    RemoveToken, VNode, VNodeData,
};

pub fn h(tag: impl Into<String>, data: impl Into<VNodeData>, children: Vec<VNode>) -> VNode {
    VNode::element(tag, data.into(), children)
}

pub fn text(t: impl Into<String>) -> VNode {
    VNode::text(t)
}
