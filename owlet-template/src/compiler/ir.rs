//! The typed program a template compiles to.

use std::rc::Rc;

use owlet_dom::{Attrs, Modifiers};

use crate::expr::Expr;

/// Compile-time identity of an element or directive site. Unique within one compile.
pub type NodeId = u32;

#[derive(Debug, Clone, PartialEq)]
pub enum FormatPart {
    Lit(String),
    Expr(Expr),
}

#[derive(Debug, Clone, PartialEq)]
pub enum DynAttr {
    /// `t-att-NAME="expr"`
    Value { name: String, expr: Expr },
    /// `t-attf-NAME="text {{expr}} text"`
    Format { name: String, parts: Vec<FormatPart> },
    /// `t-att="expr"`: a map, or a `[name, value]` pair.
    Spread(Expr),
}

#[derive(Debug, Clone)]
pub struct ElementOp {
    pub id: NodeId,
    pub tag: Rc<str>,
    pub ns: Option<Rc<str>>,
    /// Literal attributes, allocated once and shared by every render.
    pub attrs: Option<Attrs>,
    pub dynamic: Vec<DynAttr>,
    pub key: Option<Expr>,
}

#[derive(Debug, Clone)]
pub struct LoopOp {
    pub id: NodeId,
    pub collection: Expr,
    /// Collection expression as written, for error messages.
    pub source: String,
    pub name: Rc<str>,
    pub body: Vec<Stmt>,
}

#[derive(Debug, Clone)]
pub enum WidgetKey {
    Explicit(Expr),
    /// Inside a loop: the site id plus the enclosing iteration keys.
    Iteration(NodeId),
    Static(NodeId),
}

#[derive(Debug, Clone)]
pub struct WidgetOp {
    pub id: NodeId,
    pub name: Rc<str>,
    pub props: Option<Expr>,
    pub key: WidgetKey,
    pub keepalive: bool,
    pub parent: Option<NodeId>,
}

#[derive(Debug, Clone)]
pub struct Branch {
    pub test: Expr,
    pub body: Vec<Stmt>,
}

#[derive(Debug, Clone)]
pub enum Stmt {
    /// Builds element `id` into the slot table.
    Element(ElementOp),
    Text { parent: Option<NodeId>, text: Rc<str> },
    /// Moves the finished element `id` into its parent's children (or the roots).
    Attach { id: NodeId, parent: Option<NodeId> },
    If { branches: Vec<Branch>, otherwise: Option<Vec<Stmt>> },
    Loop(LoopOp),
    /// `t-esc`/`t-raw`: the value once evaluated, or `fallback` when it is empty.
    Content {
        parent: Option<NodeId>,
        value: Expr,
        raw: bool,
        fallback: Vec<Stmt>,
    },
    On {
        id: NodeId,
        event: Rc<str>,
        method: Rc<str>,
        args: Option<Vec<Expr>>,
        modifiers: Modifiers,
    },
    Ref { id: NodeId, name: Rc<str> },
    Widget(WidgetOp),
    Log { value: Expr, source: String },
    /// `t-set` whose value reads the context: evaluated here, stored in the innermost frame.
    Set { name: Rc<str>, value: Expr },
    /// Runs `body` in a frame of its own.
    Frame(Vec<Stmt>),
}

/// Counts statements, nested ones included.
pub fn stmt_count(stmts: &[Stmt]) -> usize {
    stmts
        .iter()
        .map(|s| {
            1 + match s {
                Stmt::If { branches, otherwise } => {
                    branches.iter().map(|b| stmt_count(&b.body)).sum::<usize>()
                        + otherwise.as_deref().map_or(0, stmt_count)
                }
                Stmt::Loop(op) => stmt_count(&op.body),
                Stmt::Content { fallback, .. } => stmt_count(fallback),
                Stmt::Frame(body) => stmt_count(body),
                _ => 0,
            }
        })
        .sum()
}
