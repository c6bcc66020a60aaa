use tracing::trace;

use super::{Directive, DirectiveCall, Handled};
use crate::compiler::Compiler;
use crate::compiler::context::CompilerContext;
use crate::compiler::ir::{Stmt, WidgetKey, WidgetOp};
use crate::error::TemplateResult;

pub const WIDGET: Directive = Directive {
    at_node_encounter: Some(embed_widget),
    ..Directive::new("widget", 100)
};

fn embed_widget(c: &mut Compiler<'_>, call: &DirectiveCall<'_>, ctx: &CompilerContext) -> TemplateResult<Handled> {
    let name = call.value.trim();
    if name.is_empty() {
        return Err(c.error("t-widget needs a widget name"));
    }
    let id = ctx.next_id();

    let explicit = call.node.attr("t-key").or_else(|| call.node.attr("t-att-key"));
    let key = match explicit {
        Some(raw) => WidgetKey::Explicit(c.expr(raw, ctx)?),
        None if ctx.in_loop => WidgetKey::Iteration(id),
        None => WidgetKey::Static(id),
    };
    let props = call.node.attr("t-props").map(|raw| c.expr(raw, ctx)).transpose()?;
    let keepalive = call
        .node
        .attr("t-keepalive")
        .is_some_and(|v| !matches!(v.trim(), "0" | "false"));

    trace!(template = c.template(), widget = name, id, keepalive, "embed widget");
    c.emit(Stmt::Widget(WidgetOp {
        id,
        name: name.into(),
        props,
        key,
        keepalive,
        parent: ctx.parent,
    }));
    Ok(Handled::Yes)
}
