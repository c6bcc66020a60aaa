use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

use crate::ast::{Element, Node};
use crate::compiler::ir::NodeId;
use crate::expr::Expr;

/// What a name is bound to while compiling.
#[derive(Debug, Clone)]
pub enum Binding {
    /// `t-set` with a `t-value` that reads nothing from the context; inlined wherever the name is used.
    Value(Expr),
    /// `t-set` with a body; compiled where `t-esc`/`t-raw` names it.
    Body(Rc<Vec<Node>>),
    /// Only known at render time (loop variables, context-reading `t-set`). Hides outer bindings.
    Runtime,
}

/// One frame of compile-time bindings; lookups fall through to the parent.
#[derive(Debug, Default)]
pub struct Scope {
    vars: RefCell<HashMap<String, Binding>>,
    parent: Option<Rc<Scope>>,
}

impl Scope {
    pub fn child(parent: &Rc<Scope>) -> Rc<Scope> {
        Rc::new(Scope {
            vars: RefCell::default(),
            parent: Some(parent.clone()),
        })
    }

    pub fn bind(&self, name: impl Into<String>, binding: Binding) {
        self.vars.borrow_mut().insert(name.into(), binding);
    }

    pub fn lookup(&self, name: &str) -> Option<Binding> {
        if let Some(b) = self.vars.borrow().get(name) {
            return Some(b.clone());
        }
        self.parent.as_ref().and_then(|p| p.lookup(name))
    }
}

/// The element that invoked `t-call`, whose children `t-esc="0"` projects.
#[derive(Debug)]
pub struct Caller {
    pub node: Element,
    pub outer: Option<Rc<Caller>>,
}

/// Per-node compilation state.
///
/// Contexts are cheap to clone; the `with_*` methods derive child contexts
/// that share the root's id counter and inherit every field they don't override.
#[derive(Debug, Clone)]
pub struct CompilerContext {
    ids: Rc<Cell<NodeId>>,
    pub scope: Rc<Scope>,
    pub parent: Option<NodeId>,
    pub in_loop: bool,
    pub escaping: bool,
    pub caller: Option<Rc<Caller>>,
    pub namespace: Option<Rc<str>>,
    pub call_depth: usize,
}

impl CompilerContext {
    pub fn root() -> Self {
        CompilerContext {
            ids: Rc::new(Cell::new(0)),
            scope: Rc::new(Scope::default()),
            parent: None,
            in_loop: false,
            escaping: false,
            caller: None,
            namespace: None,
            call_depth: 0,
        }
    }

    pub fn next_id(&self) -> NodeId {
        let id = self.ids.get() + 1;
        self.ids.set(id);
        id
    }

    pub fn lookup(&self, name: &str) -> Option<Binding> {
        self.scope.lookup(name)
    }

    pub fn bind(&self, name: impl Into<String>, binding: Binding) {
        self.scope.bind(name, binding);
    }

    /// Children of node `id`, in their own binding frame.
    pub fn with_parent(&self, id: NodeId) -> Self {
        CompilerContext {
            parent: Some(id),
            scope: Scope::child(&self.scope),
            ..self.clone()
        }
    }

    pub fn with_variables(&self) -> Self {
        CompilerContext {
            scope: Scope::child(&self.scope),
            ..self.clone()
        }
    }

    /// A loop body: `names` are shadowed by per-iteration values.
    pub fn with_in_loop<'a>(&self, names: impl IntoIterator<Item = &'a str>) -> Self {
        let scope = Scope::child(&self.scope);
        for name in names {
            scope.bind(name, Binding::Runtime);
        }
        CompilerContext {
            scope,
            in_loop: true,
            ..self.clone()
        }
    }

    pub fn with_caller(&self, caller: Option<Rc<Caller>>) -> Self {
        CompilerContext {
            caller,
            ..self.clone()
        }
    }

    pub fn with_escaping(&self) -> Self {
        CompilerContext {
            escaping: true,
            ..self.clone()
        }
    }

    pub fn with_namespace(&self, ns: Rc<str>) -> Self {
        CompilerContext {
            namespace: Some(ns),
            ..self.clone()
        }
    }

    pub fn deeper(&self) -> Self {
        CompilerContext {
            call_depth: self.call_depth + 1,
            ..self.clone()
        }
    }
}
