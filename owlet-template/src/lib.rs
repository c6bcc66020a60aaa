//! A directive-driven template compiler.
//!
//! Templates are parsed and normalized when registered, compiled into a typed
//! program on first render, and evaluated into [`owlet_dom::VNode`] trees.

pub mod ast;
pub mod compiler;
pub mod directives;
pub mod error;
pub mod expr;
pub mod parse;
pub mod preprocess;
pub mod qweb;
pub mod render;
mod runtime;
pub mod value;
pub mod widget;

pub use compiler::CompiledTemplate;
pub use directives::{Directive, DirectiveCall, DirectiveRegistry, Handled};
pub use error::{RenderError, RenderResult, TemplateError, TemplateResult};
pub use expr::EvalError;
pub use parse::parse_fragment;
pub use qweb::{QWeb, QWebConfig};
pub use render::{PendingWidget, RenderContext, Refs, resolve_pending};
pub use value::{NativeFn, Value, ValueMap};
pub use widget::{EventOwner, Widget, WidgetCache, WidgetFactory, WidgetFuture};
