use std::rc::Rc;

use tracing::{trace, warn};

use super::{Directive, DirectiveCall, Handled};
use crate::compiler::context::{Binding, Caller, CompilerContext};
use crate::compiler::ir::Stmt;
use crate::compiler::{BlockKind, Compiler};
use crate::error::TemplateResult;
use crate::expr::Expr;
use crate::value::Value;

pub const CALL: Directive = Directive {
    at_node_encounter: Some(call_template),
    ..Directive::new("call", 50)
};

pub const SET: Directive = Directive {
    at_node_encounter: Some(set_variable),
    ..Directive::new("set", 60)
};

fn call_template(c: &mut Compiler<'_>, call: &DirectiveCall<'_>, ctx: &CompilerContext) -> TemplateResult<Handled> {
    let target = call.value.trim();
    if ctx.call_depth >= c.max_call_depth() {
        return Err(c.error(format!(
            "t-call=\"{target}\" nests deeper than {} calls",
            c.max_call_depth()
        )));
    }
    if !call.node.is_transparent() {
        warn!(template = c.template(), tag = %call.node.tag, "t-call on an element renders only the called template");
    }

    let caller = call.node.without(&["t-call"]);

    // Only the bindings and the render-time sets survive; other statements are thrown away.
    let harvest = ctx.with_variables();
    c.open_block(BlockKind::Body);
    c.compile_children(&caller.children, &harvest)?;
    let (_, harvested) = c.close_block()?;
    let sets: Vec<Stmt> = harvested.into_iter().filter(|s| matches!(s, Stmt::Set { .. })).collect();

    let nodes = c.template_nodes(target)?;
    trace!(template = c.template(), callee = target, depth = ctx.call_depth + 1, sets = sets.len(), "inline t-call");

    let call_ctx = harvest
        .with_caller(Some(Rc::new(Caller {
            node: caller,
            outer: ctx.caller.clone(),
        })))
        .deeper();
    if sets.is_empty() {
        c.compile_children(&nodes, &call_ctx)?;
        return Ok(Handled::Yes);
    }

    c.open_block(BlockKind::Body);
    for set in sets {
        c.emit(set);
    }
    c.compile_children(&nodes, &call_ctx)?;
    let (_, body) = c.close_block()?;
    c.emit(Stmt::Frame(body));
    Ok(Handled::Yes)
}

fn set_variable(c: &mut Compiler<'_>, call: &DirectiveCall<'_>, ctx: &CompilerContext) -> TemplateResult<Handled> {
    let name = call.value.trim();
    if name.is_empty() {
        return Err(c.error("t-set needs a variable name"));
    }
    let binding = match call.node.attr("t-value") {
        Some(value) => match c.expr(value, ctx)? {
            folded if !folded.reads_context() => Binding::Value(folded),
            value => {
                c.emit(Stmt::Set {
                    name: name.into(),
                    value,
                });
                Binding::Runtime
            }
        },
        None if call.node.children.iter().any(|n| !n.is_blank()) => Binding::Body(Rc::new(call.node.children.clone())),
        None => Binding::Value(Expr::Lit(Value::from(""))),
    };
    ctx.bind(name, binding);
    Ok(Handled::Yes)
}
