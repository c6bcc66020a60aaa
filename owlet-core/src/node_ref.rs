use owlet_dom::HostNode;
use owlet_template::Refs;

/// A named `t-ref` of a component
#[derive(Debug, Clone)]
pub struct NodeRef {
    refs: Refs,
    name: String,
}

impl NodeRef {
    pub(crate) fn new(refs: Refs, name: impl Into<String>) -> Self {
        NodeRef { refs, name: name.into() }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The host node, while the referencing element is rendered
    pub fn get(&self) -> Option<HostNode> {
        self.refs.get(&self.name)
    }

    pub fn is_set(&self) -> bool {
        self.get().is_some()
    }
}
