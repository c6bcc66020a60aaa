use super::{Directive, DirectiveCall, Handled};
use crate::compiler::context::CompilerContext;
use crate::compiler::ir::{Branch, LoopOp, Stmt};
use crate::compiler::{BlockKind, Compiler};
use crate::error::TemplateResult;

pub const FOREACH: Directive = Directive {
    at_node_encounter: Some(foreach),
    ..Directive::new("foreach", 10)
};

pub const IF: Directive = Directive {
    at_node_encounter: Some(open_if),
    finalize: Some(close_branch),
    ..Directive::new("if", 20)
};

pub const ELIF: Directive = Directive {
    at_node_encounter: Some(open_elif),
    finalize: Some(close_branch),
    ..Directive::new("elif", 30)
};

pub const ELSE: Directive = Directive {
    at_node_encounter: Some(open_else),
    finalize: Some(close_branch),
    ..Directive::new("else", 40)
};

const PSEUDO_SUFFIXES: [&str; 5] = ["_index", "_first", "_last", "_parity", "_value"];

fn foreach(c: &mut Compiler<'_>, call: &DirectiveCall<'_>, ctx: &CompilerContext) -> TemplateResult<Handled> {
    let name = call
        .node
        .attr("t-as")
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .ok_or_else(|| c.error(format!("t-foreach=\"{}\" needs a t-as name", call.value)))?;
    let collection = c.expr(call.value, ctx)?;
    c.protect_scope();

    let id = ctx.next_id();
    let pseudo: Vec<String> = PSEUDO_SUFFIXES.iter().map(|s| format!("{name}{s}")).collect();
    let body_ctx = ctx.with_in_loop(std::iter::once(name).chain(pseudo.iter().map(String::as_str)));
    let body_el = call.node.without(&["t-foreach", "t-as"]);

    c.open_block(BlockKind::Body);
    c.compile_element(&body_el, &body_ctx)?;
    let (_, body) = c.close_block()?;

    c.emit(Stmt::Loop(LoopOp {
        id,
        collection,
        source: call.value.to_string(),
        name: name.into(),
        body,
    }));
    Ok(Handled::Yes)
}

fn open_if(c: &mut Compiler<'_>, call: &DirectiveCall<'_>, ctx: &CompilerContext) -> TemplateResult<Handled> {
    let test = c.expr(call.value, ctx)?;
    c.open_block(BlockKind::If(test));
    Ok(Handled::No)
}

fn open_elif(c: &mut Compiler<'_>, call: &DirectiveCall<'_>, ctx: &CompilerContext) -> TemplateResult<Handled> {
    let test = c.expr(call.value, ctx)?;
    c.open_block(BlockKind::Elif(test));
    Ok(Handled::No)
}

fn open_else(c: &mut Compiler<'_>, _call: &DirectiveCall<'_>, _ctx: &CompilerContext) -> TemplateResult<Handled> {
    c.open_block(BlockKind::Else);
    Ok(Handled::No)
}

/// Closes the block opened for this node and folds `t-elif`/`t-else` into the preceding `If`.
fn close_branch(c: &mut Compiler<'_>, call: &DirectiveCall<'_>, _ctx: &CompilerContext) -> TemplateResult<()> {
    let (kind, body) = c.close_block()?;
    match kind {
        BlockKind::If(test) => {
            c.emit(Stmt::If {
                branches: vec![Branch { test, body }],
                otherwise: None,
            });
            Ok(())
        }
        BlockKind::Elif(test) => {
            if let Some(Stmt::If { branches, otherwise: None }) = c.last_stmt_mut() {
                branches.push(Branch { test, body });
                return Ok(());
            }
            Err(c.error(format!("{} is not preceded by an open t-if", call.attr)))
        }
        BlockKind::Else => {
            if let Some(Stmt::If { otherwise: slot @ None, .. }) = c.last_stmt_mut() {
                *slot = Some(body);
                return Ok(());
            }
            Err(c.error(format!("{} is not preceded by an open t-if", call.attr)))
        }
        BlockKind::Body => Err(c.error(format!("{} closed a block it did not open", call.attr))),
    }
}
