//! Template registration and the render entry points.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use owlet_dom::{HostAdapter, HostNode, VNode, patch};
use tracing::{debug, trace};

use crate::ast::Node;
use crate::compiler::{CompiledTemplate, Compiler};
use crate::directives::{Directive, DirectiveRegistry};
use crate::error::{RenderError, RenderResult, TemplateError, TemplateResult};
use crate::expr::Translator;
use crate::parse::parse_fragment;
use crate::preprocess::normalize;
use crate::render::{RenderContext, resolve_pending};
use crate::value::Value;

#[derive(Debug, Clone)]
pub struct QWebConfig {
    /// Nested `t-call`s allowed before compilation fails.
    pub max_call_depth: usize,
    /// Memoize expression translation per raw expression.
    pub translate_cache: bool,
}

impl Default for QWebConfig {
    fn default() -> Self {
        QWebConfig {
            max_call_depth: 32,
            translate_cache: true,
        }
    }
}

/// A set of named templates, compiled lazily and cached by name.
#[derive(Debug, Default)]
pub struct QWeb {
    config: QWebConfig,
    templates: HashMap<String, Rc<Vec<Node>>>,
    compiled: RefCell<HashMap<String, Rc<CompiledTemplate>>>,
    translator: Translator,
    registry: DirectiveRegistry,
}

impl QWeb {
    pub fn new() -> Self {
        Self::with_config(QWebConfig::default())
    }

    pub fn with_config(config: QWebConfig) -> Self {
        QWeb {
            translator: Translator::new(config.translate_cache),
            config,
            templates: HashMap::new(),
            compiled: RefCell::default(),
            registry: DirectiveRegistry::default(),
        }
    }

    pub fn config(&self) -> &QWebConfig {
        &self.config
    }

    pub fn translator(&self) -> &Translator {
        &self.translator
    }

    /// Registers `source` under `name`. An existing name is replaced only with `force`.
    pub fn add_template(&mut self, name: &str, source: &str, force: bool) -> TemplateResult<()> {
        if !force && self.templates.contains_key(name) {
            return Err(TemplateError::Duplicate(name.to_string()));
        }
        let nodes = parse_fragment(source)?;
        self.insert(name, nodes)
    }

    /// Registers every `t-name` child of a `<templates>` document. Returns how many were added.
    pub fn load_templates(&mut self, source: &str) -> TemplateResult<usize> {
        let nodes = parse_fragment(source)?;
        let mut roots = nodes.iter().filter(|n| !n.is_blank());
        let root = match (roots.next().and_then(Node::as_element), roots.next()) {
            (Some(root), None) if root.tag == "templates" => root,
            _ => return Err(TemplateError::Parse("expected a single <templates> element".into())),
        };

        let mut added = 0;
        for child in &root.children {
            if child.is_blank() {
                continue;
            }
            let Some(el) = child.as_element() else {
                return Err(TemplateError::Parse("text directly inside <templates>".into()));
            };
            let name = el
                .attr("t-name")
                .ok_or_else(|| TemplateError::Parse(format!("<{}> inside <templates> has no t-name", el.tag)))?
                .to_string();
            if self.templates.contains_key(&name) {
                return Err(TemplateError::Duplicate(name));
            }
            self.insert(&name, vec![Node::Element(el.without(&["t-name"]))])?;
            added += 1;
        }
        debug!(added, "loaded templates");
        Ok(added)
    }

    fn insert(&mut self, name: &str, mut nodes: Vec<Node>) -> TemplateResult<()> {
        normalize(&mut nodes)?;
        let replaced = self.templates.insert(name.to_string(), Rc::new(nodes)).is_some();
        if replaced {
            // Called templates are inlined, so any compiled template may embed the old one.
            self.compiled.borrow_mut().clear();
        }
        debug!(template = name, replaced, "registered template");
        Ok(())
    }

    pub fn has_template(&self, name: &str) -> bool {
        self.templates.contains_key(name)
    }

    pub fn template_names(&self) -> impl Iterator<Item = &str> {
        self.templates.keys().map(String::as_str)
    }

    /// Adds or replaces a directive. Compiled templates are discarded.
    pub fn register_directive(&mut self, directive: Directive) {
        self.registry.register(directive);
        self.compiled.borrow_mut().clear();
    }

    /// The compiled form of `name`, compiling it on first use.
    pub fn compiled(&self, name: &str) -> TemplateResult<Rc<CompiledTemplate>> {
        if let Some(hit) = self.compiled.borrow().get(name) {
            trace!(template = name, "compiled template cache hit");
            return Ok(hit.clone());
        }
        let nodes = self
            .templates
            .get(name)
            .ok_or_else(|| TemplateError::UnknownTemplate(name.to_string()))?;
        let compiled = Rc::new(
            Compiler::new(
                name,
                &self.templates,
                &self.translator,
                &self.registry,
                self.config.max_call_depth,
            )
            .compile(nodes)?,
        );
        self.compiled.borrow_mut().insert(name.to_string(), compiled.clone());
        Ok(compiled)
    }

    /// Phase 1 for templates that produce a single root node.
    pub fn render(&self, name: &str, data: &Value, rctx: &RenderContext) -> RenderResult<VNode> {
        let mut roots = self.render_fragment(name, data, rctx)?;
        match roots.len() {
            1 => Ok(roots.remove(0)),
            count => Err(RenderError::MultipleRoots {
                template: name.to_string(),
                count,
            }),
        }
    }

    /// Phase 1: every root node the template produced, in order.
    pub fn render_fragment(&self, name: &str, data: &Value, rctx: &RenderContext) -> RenderResult<Vec<VNode>> {
        self.compiled(name)?.render(data, rctx)
    }

    /// Both phases: renders, then waits for every embedded widget.
    pub async fn render_resolved(&self, name: &str, data: &Value, rctx: &RenderContext) -> RenderResult<VNode> {
        let mut root = self.render(name, data, rctx)?;
        resolve_pending(rctx, std::slice::from_mut(&mut root)).await?;
        Ok(root)
    }

    /// Renders `name` into a fresh container of `host` and returns the root host node.
    ///
    /// The host is borrowed only once every widget resolved, so widgets may share it.
    pub async fn render_to_host<H>(
        &self,
        name: &str,
        data: &Value,
        rctx: &RenderContext,
        host: &RefCell<H>,
    ) -> RenderResult<HostNode>
    where
        H: HostAdapter,
    {
        let vnode = self.render_resolved(name, data, rctx).await?;
        let mut host = host.borrow_mut();
        let container = host.create_element("div");
        let placeholder = host.create_comment("");
        host.append_child(container, placeholder);
        let patched = patch(&mut *host, placeholder, vnode);
        patched.host.ok_or_else(|| {
            RenderError::Template(TemplateError::Structure {
                template: name.to_string(),
                found: 0,
            })
        })
    }
}
