use owlet_dom::VNode;
use tracing::trace;

use super::ir::{Stmt, stmt_count};
use crate::error::RenderResult;
use crate::render::RenderContext;
use crate::runtime::Runtime;
use crate::value::Value;

/// A template compiled once and rendered any number of times.
#[derive(Debug, Clone)]
pub struct CompiledTemplate {
    name: String,
    body: Vec<Stmt>,
    protect_scope: bool,
}

impl CompiledTemplate {
    pub(crate) fn new(name: String, body: Vec<Stmt>, protect_scope: bool) -> Self {
        CompiledTemplate {
            name,
            body,
            protect_scope,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn body(&self) -> &[Stmt] {
        &self.body
    }

    pub fn statement_count(&self) -> usize {
        stmt_count(&self.body)
    }

    /// Whether renders evaluate in a fresh variable frame.
    pub fn protects_scope(&self) -> bool {
        self.protect_scope
    }

    /// Phase 1 of a render: the vnodes, with embedded widgets still pending in `rctx`.
    pub fn render(&self, data: &Value, rctx: &RenderContext) -> RenderResult<Vec<VNode>> {
        trace!(template = %self.name, "render");
        Runtime::new(&self.name, data, rctx, self.protect_scope).run(&self.body)
    }
}
