use std::rc::Rc;

use crate::vnode::Listener;

pub const XLINK_NS: &str = "http://www.w3.org/1999/xlink";
pub const XML_NS: &str = "http://www.w3.org/XML/1998/namespace";
pub const SVG_NS: &str = "http://www.w3.org/2000/svg";

/// Opaque handle to a node of the host tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HostNode(u32);

impl HostNode {
    pub fn from_raw(raw: u32) -> Self {
        HostNode(raw)
    }

    pub fn raw(self) -> u32 {
        self.0
    }
}

/// The fixed set of host operations the reconciler depends on.
///
/// Insertion of a node that already has a parent moves it.
pub trait HostAdapter {
    fn create_element(&mut self, tag: &str) -> HostNode;
    fn create_element_ns(&mut self, ns: &str, tag: &str) -> HostNode;
    fn create_text(&mut self, text: &str) -> HostNode;
    fn create_comment(&mut self, text: &str) -> HostNode;
    /// A node standing for host markup that is inserted unescaped.
    fn create_markup(&mut self, markup: &str) -> HostNode;

    fn insert_before(&mut self, parent: HostNode, node: HostNode, reference: Option<HostNode>);
    fn remove_child(&mut self, parent: HostNode, child: HostNode);
    fn append_child(&mut self, parent: HostNode, child: HostNode);

    fn parent(&self, node: HostNode) -> Option<HostNode>;
    fn next_sibling(&self, node: HostNode) -> Option<HostNode>;
    fn tag_name(&self, node: HostNode) -> Option<String>;

    fn text_content(&self, node: HostNode) -> Option<String>;
    fn set_text_content(&mut self, node: HostNode, text: &str);

    fn is_element(&self, node: HostNode) -> bool;
    fn is_text(&self, node: HostNode) -> bool;
    fn is_comment(&self, node: HostNode) -> bool;

    fn set_attribute(&mut self, node: HostNode, name: &str, value: &str);
    fn set_attribute_ns(&mut self, node: HostNode, ns: &str, name: &str, value: &str);
    fn remove_attribute(&mut self, node: HostNode, name: &str);
    /// Removes an attribute set through [`HostAdapter::set_attribute_ns`].
    fn remove_attribute_ns(&mut self, node: HostNode, ns: &str, name: &str);

    fn add_listener(&mut self, node: HostNode, event: &str, listener: &Rc<Listener>);
    fn remove_listener(&mut self, node: HostNode, event: &str, listener: &Rc<Listener>);
}
