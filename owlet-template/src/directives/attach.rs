use owlet_dom::Modifiers;
use tracing::warn;

use super::{Directive, DirectiveCall, Handled};
use crate::compiler::Compiler;
use crate::compiler::context::CompilerContext;
use crate::compiler::ir::Stmt;
use crate::error::TemplateResult;
use crate::expr::Expr;

pub const ON: Directive = Directive {
    at_node_encounter: Some(warn_on_t),
    at_node_creation: Some(bind_event),
    ..Directive::new("on", 90)
};

pub const REF: Directive = Directive {
    at_node_encounter: Some(warn_on_t),
    at_node_creation: Some(bind_ref),
    ..Directive::new("ref", 95)
};

pub const LOG: Directive = Directive {
    at_node_encounter: Some(log_value),
    ..Directive::new("log", 1)
};

fn warn_on_t(c: &mut Compiler<'_>, call: &DirectiveCall<'_>, _ctx: &CompilerContext) -> TemplateResult<Handled> {
    if call.node.is_transparent() {
        warn!(template = c.template(), attr = call.attr, "ignored on <t>, which has no host node");
    }
    Ok(Handled::No)
}

/// Splits `method(a, b)` into the method name and its argument list text.
fn split_handler(value: &str) -> (&str, Option<&str>) {
    let value = value.trim();
    match (value.find('('), value.ends_with(')')) {
        (Some(open), true) => (value[..open].trim(), Some(&value[open + 1..value.len() - 1])),
        _ => (value, None),
    }
}

fn bind_event(c: &mut Compiler<'_>, call: &DirectiveCall<'_>, ctx: &CompilerContext) -> TemplateResult<Handled> {
    let Some(id) = ctx.parent else {
        return Ok(Handled::No);
    };
    let spec = call.attr.trim_start_matches("t-on-");
    let mut parts = spec.split('.');
    let event = parts.next().unwrap_or_default();
    if event.is_empty() {
        return Err(c.error(format!("{} names no event", call.attr)));
    }

    let mut modifiers = Modifiers::default();
    for m in parts {
        match m {
            "prevent" => modifiers.prevent = true,
            "stop" => modifiers.stop = true,
            "self" => modifiers.self_only = true,
            other => return Err(c.error(format!("unknown event modifier '.{other}' on {}", call.attr))),
        }
    }

    let (method, args) = split_handler(call.value);
    if method.is_empty() {
        return Err(c.error(format!("{} has no handler", call.attr)));
    }
    let args = match args {
        Some(text) => match c.expr(&format!("[{text}]"), ctx)? {
            Expr::Array(items) => Some(items),
            other => Some(vec![other]),
        },
        None => None,
    };

    c.emit(Stmt::On {
        id,
        event: event.into(),
        method: method.into(),
        args,
        modifiers,
    });
    Ok(Handled::No)
}

fn bind_ref(c: &mut Compiler<'_>, call: &DirectiveCall<'_>, ctx: &CompilerContext) -> TemplateResult<Handled> {
    let Some(id) = ctx.parent else {
        return Ok(Handled::No);
    };
    let name = call.value.trim();
    if name.is_empty() {
        return Err(c.error("t-ref needs a name"));
    }
    c.emit(Stmt::Ref { id, name: name.into() });
    Ok(Handled::No)
}

fn log_value(c: &mut Compiler<'_>, call: &DirectiveCall<'_>, ctx: &CompilerContext) -> TemplateResult<Handled> {
    let value = c.expr(call.value, ctx)?;
    c.emit(Stmt::Log {
        value,
        source: call.value.to_string(),
    });
    Ok(Handled::No)
}
