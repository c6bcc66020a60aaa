//! The template expression language: translation, parsing and evaluation.

mod eval;
mod parser;
pub mod translate;

use std::rc::Rc;

use thiserror::Error;

use crate::value::Value;

pub use eval::{Lookup, eval};
pub use parser::parse;
pub use translate::{Translator, translate};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum EvalError {
    #[error("cannot parse expression '{expr}': {message}")]
    Syntax { expr: String, message: String },

    #[error("'{0}' is not a function")]
    NotCallable(String),

    #[error("{0}")]
    Native(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Not,
    Neg,
    Plus,
    TypeOf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Lt,
    Lte,
    Gt,
    Gte,
    Eq,
    NotEq,
    StrictEq,
    StrictNotEq,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalOp {
    And,
    Or,
    Nullish,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Lit(Value),
    /// A field of the data context.
    Var(Rc<str>),
    Global(Rc<str>),
    Array(Vec<Expr>),
    Object(Vec<(String, Expr)>),
    Member(Box<Expr>, Rc<str>),
    Index(Box<Expr>, Box<Expr>),
    Call(Box<Expr>, Vec<Expr>),
    Unary(UnaryOp, Box<Expr>),
    Binary(BinaryOp, Box<Expr>, Box<Expr>),
    Logical(LogicalOp, Box<Expr>, Box<Expr>),
    Cond(Box<Expr>, Box<Expr>, Box<Expr>),
}

impl Expr {
    /// Replaces context variables for which `bound` returns an expression.
    pub fn substitute(self, bound: &dyn Fn(&str) -> Option<Expr>) -> Expr {
        let sub = |e: Box<Expr>| Box::new(e.substitute(bound));
        match self {
            Expr::Var(name) => bound(&name).unwrap_or(Expr::Var(name)),
            Expr::Array(items) => Expr::Array(items.into_iter().map(|e| e.substitute(bound)).collect()),
            Expr::Object(fields) => Expr::Object(fields.into_iter().map(|(k, e)| (k, e.substitute(bound))).collect()),
            Expr::Member(obj, prop) => Expr::Member(sub(obj), prop),
            Expr::Index(obj, idx) => Expr::Index(sub(obj), sub(idx)),
            Expr::Call(f, args) => Expr::Call(sub(f), args.into_iter().map(|e| e.substitute(bound)).collect()),
            Expr::Unary(op, e) => Expr::Unary(op, sub(e)),
            Expr::Binary(op, l, r) => Expr::Binary(op, sub(l), sub(r)),
            Expr::Logical(op, l, r) => Expr::Logical(op, sub(l), sub(r)),
            Expr::Cond(c, t, f) => Expr::Cond(sub(c), sub(t), sub(f)),
            e @ (Expr::Lit(_) | Expr::Global(_)) => e,
        }
    }

    /// Whether evaluating the expression looks anything up in the render context.
    pub fn reads_context(&self) -> bool {
        match self {
            Expr::Var(_) => true,
            Expr::Lit(_) | Expr::Global(_) => false,
            Expr::Array(items) => items.iter().any(Expr::reads_context),
            Expr::Object(fields) => fields.iter().any(|(_, e)| e.reads_context()),
            Expr::Member(obj, _) | Expr::Unary(_, obj) => obj.reads_context(),
            Expr::Call(f, args) => f.reads_context() || args.iter().any(Expr::reads_context),
            Expr::Index(l, r) | Expr::Binary(_, l, r) | Expr::Logical(_, l, r) => l.reads_context() || r.reads_context(),
            Expr::Cond(c, t, f) => c.reads_context() || t.reads_context() || f.reads_context(),
        }
    }

    /// The variable name when the expression is a bare context lookup.
    pub fn as_var(&self) -> Option<&str> {
        match self {
            Expr::Var(name) => Some(name),
            _ => None,
        }
    }
}

/// Translates and parses raw template expression text.
pub fn compile(translator: &Translator, raw: &str) -> Result<Expr, EvalError> {
    parse(&translator.translate(raw)).map_err(|message| EvalError::Syntax {
        expr: raw.to_string(),
        message,
    })
}
