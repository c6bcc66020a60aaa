use thiserror::Error;

use crate::expr::EvalError;

pub type TemplateResult<T> = Result<T, TemplateError>;
pub type RenderResult<T> = Result<T, RenderError>;

/// Failures detected while registering or compiling a template.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TemplateError {
    #[error("invalid template markup: {0}")]
    Parse(String),

    /// Misplaced or conflicting branch directives.
    #[error("template syntax error: {0}")]
    Syntax(String),

    #[error("template '{template}' must have exactly one root node, found {found}")]
    Structure { template: String, found: usize },

    #[error("failed to compile template '{template}': {message}")]
    Compile { template: String, message: String },

    #[error("template '{0}' is already registered")]
    Duplicate(String),

    #[error("unknown template '{0}'")]
    UnknownTemplate(String),
}

/// Failures raised while running a compiled template.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RenderError {
    #[error(transparent)]
    Template(#[from] TemplateError),

    #[error("t-foreach over '{expr}' got {found}")]
    NullishCollection { expr: String, found: &'static str },

    #[error(transparent)]
    Eval(#[from] EvalError),

    #[error("no widget named '{0}'")]
    UnknownWidget(String),

    #[error("widget '{name}' failed: {message}")]
    Widget { name: String, message: String },

    #[error("template '{template}' produced {count} root nodes where one was expected")]
    MultipleRoots { template: String, count: usize },
}
