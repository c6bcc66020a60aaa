//! Compiles normalized template nodes into the typed program of [`ir`].

pub mod context;
pub mod ir;
mod program;

use std::collections::HashMap;
use std::rc::Rc;

use owlet_dom::host::SVG_NS;
use owlet_dom::{AttrMap, AttrValue};
use tracing::{debug, trace, warn};

use crate::ast::{Element, Node};
use crate::directives::{DirectiveCall, DirectiveRegistry, Handled};
use crate::error::{TemplateError, TemplateResult};
use crate::expr::{self, Expr, Translator};
use context::{Binding, CompilerContext};
use ir::{DynAttr, ElementOp, FormatPart, NodeId, Stmt};

pub use program::CompiledTemplate;

#[derive(Debug)]
pub enum BlockKind {
    Body,
    If(Expr),
    Elif(Expr),
    Else,
}

#[derive(Debug)]
struct Block {
    kind: BlockKind,
    stmts: Vec<Stmt>,
}

/// Compiles one template. Called templates are inlined into the same program.
pub struct Compiler<'q> {
    template: String,
    templates: &'q HashMap<String, Rc<Vec<Node>>>,
    translator: &'q Translator,
    registry: &'q DirectiveRegistry,
    max_call_depth: usize,
    blocks: Vec<Block>,
    protect_scope: bool,
}

impl<'q> Compiler<'q> {
    pub fn new(
        template: impl Into<String>,
        templates: &'q HashMap<String, Rc<Vec<Node>>>,
        translator: &'q Translator,
        registry: &'q DirectiveRegistry,
        max_call_depth: usize,
    ) -> Self {
        Compiler {
            template: template.into(),
            templates,
            translator,
            registry,
            max_call_depth,
            blocks: Vec::new(),
            protect_scope: false,
        }
    }

    pub fn compile(mut self, nodes: &[Node]) -> TemplateResult<CompiledTemplate> {
        let roots: Vec<&Node> = nodes.iter().filter(|n| !n.is_blank()).collect();
        let [root] = roots.as_slice() else {
            return Err(TemplateError::Structure {
                template: self.template,
                found: roots.len(),
            });
        };

        let ctx = CompilerContext::root();
        self.open_block(BlockKind::Body);
        self.compile_node(root, &ctx)?;
        let (_, body) = self.close_block()?;
        if !self.blocks.is_empty() {
            return Err(self.error("unbalanced conditional blocks"));
        }

        debug!(template = %self.template, statements = ir::stmt_count(&body), "compiled template");
        Ok(CompiledTemplate::new(self.template, body, self.protect_scope))
    }

    pub fn template(&self) -> &str {
        &self.template
    }

    pub fn error(&self, message: impl Into<String>) -> TemplateError {
        TemplateError::Compile {
            template: self.template.clone(),
            message: message.into(),
        }
    }

    pub fn max_call_depth(&self) -> usize {
        self.max_call_depth
    }

    /// Render-time variables must live in a fresh frame per render.
    pub fn protect_scope(&mut self) {
        self.protect_scope = true;
    }

    pub fn template_nodes(&self, name: &str) -> TemplateResult<Rc<Vec<Node>>> {
        self.templates
            .get(name)
            .cloned()
            .ok_or_else(|| TemplateError::UnknownTemplate(name.to_string()))
    }

    pub fn emit(&mut self, stmt: Stmt) {
        match self.blocks.last_mut() {
            Some(block) => block.stmts.push(stmt),
            None => warn!(template = %self.template, "statement emitted outside of any block"),
        }
    }

    pub fn open_block(&mut self, kind: BlockKind) {
        self.blocks.push(Block {
            kind,
            stmts: Vec::new(),
        });
    }

    pub fn close_block(&mut self) -> TemplateResult<(BlockKind, Vec<Stmt>)> {
        let block = self.blocks.pop().ok_or_else(|| self.error("closing a block that was never opened"))?;
        Ok((block.kind, block.stmts))
    }

    pub fn last_stmt_mut(&mut self) -> Option<&mut Stmt> {
        self.blocks.last_mut().and_then(|b| b.stmts.last_mut())
    }

    /// Translates, parses and substitutes compile-time bindings into `raw`.
    pub fn expr(&self, raw: &str, ctx: &CompilerContext) -> TemplateResult<Expr> {
        let parsed = expr::compile(self.translator, raw).map_err(|e| self.error(e.to_string()))?;
        Ok(parsed.substitute(&|name| match ctx.lookup(name) {
            Some(Binding::Value(e)) => Some(e),
            _ => None,
        }))
    }

    /// Splits `text {{expr}} #{expr}` into literal and expression parts.
    pub fn format_parts(&self, raw: &str, ctx: &CompilerContext) -> TemplateResult<Vec<FormatPart>> {
        let mut parts = Vec::new();
        let mut rest = raw;
        while let Some(start) = rest.find("{{").into_iter().chain(rest.find("#{")).min() {
            let (open, close) = if rest[start..].starts_with("{{") { ("{{", "}}") } else { ("#{", "}") };
            if start > 0 {
                parts.push(FormatPart::Lit(rest[..start].to_string()));
            }
            let body = &rest[start + open.len()..];
            let end = body
                .find(close)
                .ok_or_else(|| self.error(format!("unterminated '{open}' in \"{raw}\"")))?;
            parts.push(FormatPart::Expr(self.expr(&body[..end], ctx)?));
            rest = &body[end + close.len()..];
        }
        if !rest.is_empty() {
            parts.push(FormatPart::Lit(rest.to_string()));
        }
        Ok(parts)
    }

    pub fn compile_children(&mut self, children: &[Node], ctx: &CompilerContext) -> TemplateResult<()> {
        for child in children {
            self.compile_node(child, ctx)?;
        }
        Ok(())
    }

    pub fn compile_node(&mut self, node: &Node, ctx: &CompilerContext) -> TemplateResult<()> {
        match node {
            Node::Text(text) => {
                if ctx.parent.is_none() && node.is_blank() {
                    return Ok(());
                }
                self.emit(Stmt::Text {
                    parent: ctx.parent,
                    text: text.as_str().into(),
                });
                Ok(())
            }
            Node::Element(el) => self.compile_element(el, ctx),
        }
    }

    pub fn compile_element(&mut self, el: &Element, ctx: &CompilerContext) -> TemplateResult<()> {
        let registry = self.registry;
        let matched = registry.matching(el);
        trace!(tag = %el.tag, directives = matched.len(), "compile element");

        let mut handled = false;
        for (directive, attr) in &matched {
            if let Some(hook) = directive.at_node_encounter {
                let call = DirectiveCall::new(el, attr);
                if hook(self, &call, ctx)? == Handled::Yes {
                    handled = true;
                    break;
                }
            }
        }

        if !handled {
            if el.is_transparent() {
                self.compile_children(&el.children, &ctx.with_variables())?;
            } else {
                let id = ctx.next_id();
                let op = self.element_op(el, id, ctx)?;
                let mut child_ctx = ctx.with_parent(id);
                if let Some(ns) = &op.ns {
                    child_ctx = child_ctx.with_namespace(ns.clone());
                }
                self.emit(Stmt::Element(op));

                let mut children_done = false;
                for (directive, attr) in &matched {
                    if let Some(hook) = directive.at_node_creation {
                        let call = DirectiveCall::new(el, attr);
                        children_done |= hook(self, &call, &child_ctx)? == Handled::Yes;
                    }
                }
                if !children_done {
                    self.compile_children(&el.children, &child_ctx)?;
                }
                self.emit(Stmt::Attach { id, parent: ctx.parent });
            }
        }

        for (directive, attr) in &matched {
            if let Some(hook) = directive.finalize {
                hook(self, &DirectiveCall::new(el, attr), ctx)?;
            }
        }
        Ok(())
    }

    fn element_op(&self, el: &Element, id: NodeId, ctx: &CompilerContext) -> TemplateResult<ElementOp> {
        let mut statics = AttrMap::new();
        let mut dynamic = Vec::new();
        let mut key = None;

        for attr in &el.attrs {
            let name = attr.name.as_str();
            if let Some(target) = name.strip_prefix("t-attf-") {
                dynamic.push(DynAttr::Format {
                    name: target.to_string(),
                    parts: self.format_parts(&attr.value, ctx)?,
                });
            } else if let Some(target) = name.strip_prefix("t-att-") {
                dynamic.push(DynAttr::Value {
                    name: target.to_string(),
                    expr: self.expr(&attr.value, ctx)?,
                });
            } else if name == "t-att" {
                dynamic.push(DynAttr::Spread(self.expr(&attr.value, ctx)?));
            } else if name == "t-key" {
                key = Some(self.expr(&attr.value, ctx)?);
            } else if !name.starts_with("t-") && name != "xmlns" {
                statics.insert(name.to_string(), AttrValue::from(attr.value.as_str()));
            }
        }

        let ns = match el.attr("xmlns") {
            Some(ns) => Some(Rc::from(ns)),
            None if el.tag == "svg" => Some(Rc::from(SVG_NS)),
            None => ctx.namespace.clone(),
        };

        Ok(ElementOp {
            id,
            tag: el.tag.as_str().into(),
            ns,
            attrs: (!statics.is_empty()).then(|| Rc::new(statics)),
            dynamic,
            key,
        })
    }
}
