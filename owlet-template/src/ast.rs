#[derive(Debug, Clone, PartialEq)]
pub struct Attr {
    pub name: String,
    /// Empty for attributes written without a value.
    pub value: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    pub tag: String,
    pub attrs: Vec<Attr>,
    pub children: Vec<Node>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Element(Element),
    Text(String),
}

impl Element {
    pub fn new(tag: impl Into<String>) -> Self {
        Element {
            tag: tag.into(),
            attrs: Vec::new(),
            children: Vec::new(),
        }
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs.iter().find(|a| a.name == name).map(|a| a.value.as_str())
    }

    pub fn has_attr(&self, name: &str) -> bool {
        self.attrs.iter().any(|a| a.name == name)
    }

    /// A copy of this element without the named attributes.
    pub fn without(&self, names: &[&str]) -> Element {
        Element {
            tag: self.tag.clone(),
            attrs: self.attrs.iter().filter(|a| !names.contains(&a.name.as_str())).cloned().collect(),
            children: self.children.clone(),
        }
    }

    /// `<t>` only groups its children and never produces a node of its own.
    pub fn is_transparent(&self) -> bool {
        self.tag == "t"
    }
}

impl Node {
    pub fn as_element(&self) -> Option<&Element> {
        match self {
            Node::Element(el) => Some(el),
            Node::Text(_) => None,
        }
    }

    pub fn is_blank(&self) -> bool {
        matches!(self, Node::Text(t) if t.trim().is_empty())
    }
}
