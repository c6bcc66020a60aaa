use super::{Directive, DirectiveCall, Handled};
use crate::compiler::context::{Binding, CompilerContext};
use crate::compiler::ir::Stmt;
use crate::compiler::{BlockKind, Compiler};
use crate::error::TemplateResult;

pub const ESC: Directive = Directive {
    at_node_encounter: Some(esc_on_t),
    at_node_creation: Some(esc_in_element),
    ..Directive::new("esc", 70)
};

pub const RAW: Directive = Directive {
    at_node_encounter: Some(raw_on_t),
    at_node_creation: Some(raw_in_element),
    ..Directive::new("raw", 80)
};

fn esc_on_t(c: &mut Compiler<'_>, call: &DirectiveCall<'_>, ctx: &CompilerContext) -> TemplateResult<Handled> {
    on_transparent(c, call, ctx, false)
}

fn raw_on_t(c: &mut Compiler<'_>, call: &DirectiveCall<'_>, ctx: &CompilerContext) -> TemplateResult<Handled> {
    on_transparent(c, call, ctx, true)
}

fn esc_in_element(c: &mut Compiler<'_>, call: &DirectiveCall<'_>, ctx: &CompilerContext) -> TemplateResult<Handled> {
    emit_content(c, call, ctx, false)?;
    Ok(Handled::Yes)
}

fn raw_in_element(c: &mut Compiler<'_>, call: &DirectiveCall<'_>, ctx: &CompilerContext) -> TemplateResult<Handled> {
    emit_content(c, call, ctx, true)?;
    Ok(Handled::Yes)
}

/// On `<t>` the value replaces the node; on other elements it becomes their content.
fn on_transparent(c: &mut Compiler<'_>, call: &DirectiveCall<'_>, ctx: &CompilerContext, raw: bool) -> TemplateResult<Handled> {
    if !call.node.is_transparent() {
        return Ok(Handled::No);
    }
    emit_content(c, call, ctx, raw)?;
    Ok(Handled::Yes)
}

fn emit_content(c: &mut Compiler<'_>, call: &DirectiveCall<'_>, ctx: &CompilerContext, raw: bool) -> TemplateResult<()> {
    let value = call.value.trim();

    // `0` projects the content the enclosing t-call was given.
    if value == "0" {
        if let Some(caller) = &ctx.caller {
            let projected = ctx.with_caller(caller.outer.clone()).with_variables();
            return c.compile_children(&caller.node.children, &projected);
        }
    }

    if let Some(Binding::Body(nodes)) = ctx.lookup(value) {
        let body_ctx = if raw { ctx.with_variables() } else { ctx.with_variables().with_escaping() };
        return c.compile_children(&nodes, &body_ctx);
    }

    let expr = c.expr(value, ctx)?;
    c.open_block(BlockKind::Body);
    c.compile_children(&call.node.children, &ctx.with_variables())?;
    let (_, fallback) = c.close_block()?;

    c.emit(Stmt::Content {
        parent: ctx.parent,
        value: expr,
        raw: raw && !ctx.escaping,
        fallback,
    });
    Ok(())
}
