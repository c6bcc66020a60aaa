//! Attribute-triggered compilation rules.
//!
//! A directive is matched by its `t-<name>` attribute (or `t-<name>-<suffix>`),
//! and the matches of one element run in ascending priority: structural
//! directives wrap the node, content directives fill it, attachment directives
//! need the finished node id.

mod attach;
mod call;
mod content;
mod structural;
mod widget;

use crate::ast::{Attr, Element};
use crate::compiler::Compiler;
use crate::compiler::context::CompilerContext;
use crate::error::TemplateResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Handled {
    /// The directive emitted everything for this node (or, at creation, its children).
    Yes,
    No,
}

/// The attribute that triggered a directive on `node`.
#[derive(Debug, Clone, Copy)]
pub struct DirectiveCall<'a> {
    pub node: &'a Element,
    pub attr: &'a str,
    pub value: &'a str,
}

impl<'a> DirectiveCall<'a> {
    pub fn new(node: &'a Element, attr: &'a Attr) -> Self {
        DirectiveCall {
            node,
            attr: &attr.name,
            value: &attr.value,
        }
    }
}

pub type NodeHook = fn(&mut Compiler<'_>, &DirectiveCall<'_>, &CompilerContext) -> TemplateResult<Handled>;
pub type FinalizeHook = fn(&mut Compiler<'_>, &DirectiveCall<'_>, &CompilerContext) -> TemplateResult<()>;

#[derive(Debug, Clone, Copy)]
pub struct Directive {
    pub name: &'static str,
    pub priority: u8,
    /// Runs before anything is emitted for the node.
    pub at_node_encounter: Option<NodeHook>,
    /// Runs once the element op is emitted; the context's parent is the new node.
    pub at_node_creation: Option<NodeHook>,
    /// Runs after the node and its children were compiled.
    pub finalize: Option<FinalizeHook>,
}

impl Directive {
    pub const fn new(name: &'static str, priority: u8) -> Self {
        Directive {
            name,
            priority,
            at_node_encounter: None,
            at_node_creation: None,
            finalize: None,
        }
    }

    fn matches(&self, attr: &str) -> bool {
        attr.strip_prefix("t-")
            .and_then(|rest| rest.strip_prefix(self.name))
            .is_some_and(|rest| rest.is_empty() || rest.starts_with('-'))
    }
}

/// Directives sorted by ascending priority.
#[derive(Debug, Clone)]
pub struct DirectiveRegistry {
    directives: Vec<Directive>,
}

impl Default for DirectiveRegistry {
    fn default() -> Self {
        let mut registry = DirectiveRegistry { directives: Vec::new() };
        for d in [
            attach::LOG,
            structural::FOREACH,
            structural::IF,
            structural::ELIF,
            structural::ELSE,
            call::CALL,
            call::SET,
            content::ESC,
            content::RAW,
            attach::ON,
            attach::REF,
            widget::WIDGET,
        ] {
            registry.register(d);
        }
        registry
    }
}

impl DirectiveRegistry {
    /// Adds or replaces a directive, keeping the priority order.
    pub fn register(&mut self, directive: Directive) {
        self.directives.retain(|d| d.name != directive.name);
        let at = self.directives.partition_point(|d| d.priority <= directive.priority);
        self.directives.insert(at, directive);
    }

    pub fn get(&self, name: &str) -> Option<&Directive> {
        self.directives.iter().find(|d| d.name == name)
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.directives.iter().map(|d| d.name)
    }

    /// Directives triggered by `el`'s attributes, in priority order.
    pub fn matching<'e>(&self, el: &'e Element) -> Vec<(&Directive, &'e Attr)> {
        let mut found: Vec<(&Directive, &'e Attr)> = el
            .attrs
            .iter()
            .filter_map(|a| self.directives.iter().find(|d| d.matches(&a.name)).map(|d| (d, a)))
            .collect();
        found.sort_by_key(|(d, _)| d.priority);
        found
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::Attr;

    fn el(attrs: &[&str]) -> Element {
        Element {
            tag: "div".into(),
            attrs: attrs
                .iter()
                .map(|n| Attr {
                    name: n.to_string(),
                    value: String::new(),
                })
                .collect(),
            children: Vec::new(),
        }
    }

    #[test]
    fn registry_is_sorted_by_priority() {
        let names: Vec<_> = DirectiveRegistry::default().names().collect();
        assert_eq!(
            names,
            ["log", "foreach", "if", "elif", "else", "call", "set", "esc", "raw", "on", "ref", "widget"]
        );
    }

    #[test]
    fn matches_by_prefix_in_priority_order() {
        let registry = DirectiveRegistry::default();
        let node = el(&["t-on-click", "t-esc", "class", "t-if", "t-att-id", "t-else-x"]);
        let names: Vec<_> = registry.matching(&node).iter().map(|(d, a)| (d.name, a.name.as_str())).collect();
        assert_eq!(names, [("if", "t-if"), ("else", "t-else-x"), ("esc", "t-esc"), ("on", "t-on-click")]);
    }

    #[test]
    fn register_replaces_by_name() {
        let mut registry = DirectiveRegistry::default();
        registry.register(Directive::new("esc", 99));
        assert_eq!(registry.get("esc").map(|d| d.priority), Some(99));
        assert_eq!(registry.names().filter(|n| *n == "esc").count(), 1);
    }
}
