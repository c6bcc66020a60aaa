//! Tree-walking evaluation of a compiled template into vnodes.

use std::collections::{HashMap, HashSet};
use std::fmt::Write as _;
use std::rc::{Rc, Weak};

use owlet_dom::{AttrMap, AttrValue, EventBinding, Handler, HostNode, Key, Modifiers, VNode, VNodeData};
use tracing::{info, trace, warn};

use crate::compiler::ir::{DynAttr, ElementOp, FormatPart, LoopOp, NodeId, Stmt, WidgetKey, WidgetOp};
use crate::error::{RenderError, RenderResult};
use crate::expr::{EvalError, Expr, Lookup, eval};
use crate::render::{PendingWidget, RenderContext};
use crate::value::{Value, ValueMap};
use crate::widget::{EventOwner, Widget, WidgetFuture};

/// Largest number a `t-foreach` may count up to.
const MAX_RANGE: usize = 1_000_000;

#[derive(Debug, Default)]
struct Frame {
    vars: Vec<(Rc<str>, Value)>,
}

/// Loop frames over the render's data context.
struct Scope<'a> {
    data: &'a Value,
    frames: Vec<Frame>,
}

impl Scope<'_> {
    /// Binds `name` in the innermost frame, opening one if there is none.
    fn set(&mut self, name: &Rc<str>, value: Value) {
        if self.frames.is_empty() {
            self.frames.push(Frame::default());
        }
        let Some(frame) = self.frames.last_mut() else {
            return;
        };
        match frame.vars.iter_mut().find(|(n, _)| n == name) {
            Some((_, slot)) => *slot = value,
            None => frame.vars.push((name.clone(), value)),
        }
    }
}

impl Lookup for Scope<'_> {
    fn lookup(&self, name: &str) -> Value {
        for frame in self.frames.iter().rev() {
            if let Some((_, v)) = frame.vars.iter().find(|(n, _)| &**n == name) {
                return v.clone();
            }
        }
        self.data.get(name)
    }
}

/// Names of the per-iteration variables of one loop.
struct LoopNames {
    index: Rc<str>,
    first: Rc<str>,
    last: Rc<str>,
    parity: Rc<str>,
    value: Rc<str>,
}

impl LoopNames {
    fn new(name: &str) -> Self {
        LoopNames {
            index: format!("{name}_index").into(),
            first: format!("{name}_first").into(),
            last: format!("{name}_last").into(),
            parity: format!("{name}_parity").into(),
            value: format!("{name}_value").into(),
        }
    }
}

pub(crate) struct Runtime<'r> {
    template: &'r str,
    rctx: &'r RenderContext,
    scope: Scope<'r>,
    /// Elements under construction, by compile-time id.
    slots: HashMap<NodeId, VNode>,
    roots: Vec<VNode>,
    /// Iteration index of every enclosing loop, outermost first.
    loop_keys: Vec<usize>,
    widget_keys: HashSet<Key>,
}

impl<'r> Runtime<'r> {
    pub(crate) fn new(template: &'r str, data: &'r Value, rctx: &'r RenderContext, protect_scope: bool) -> Self {
        let mut frames = Vec::new();
        if protect_scope {
            frames.push(Frame::default());
        }
        Runtime {
            template,
            rctx,
            scope: Scope { data, frames },
            slots: HashMap::new(),
            roots: Vec::new(),
            loop_keys: Vec::new(),
            widget_keys: HashSet::new(),
        }
    }

    pub(crate) fn run(mut self, body: &[Stmt]) -> RenderResult<Vec<VNode>> {
        self.exec_all(body)?;
        if !self.slots.is_empty() {
            warn!(template = self.template, unattached = self.slots.len(), "elements built but never attached");
        }
        Ok(self.roots)
    }

    fn eval(&self, expr: &Expr) -> RenderResult<Value> {
        Ok(eval(expr, &self.scope)?)
    }

    fn push_child(&mut self, parent: Option<NodeId>, node: VNode) {
        match parent {
            Some(id) => match self.slots.get_mut(&id) {
                Some(p) => p.children.push(node),
                None => warn!(template = self.template, parent = id, "child of an element that is not being built"),
            },
            None => self.roots.push(node),
        }
    }

    fn exec_all(&mut self, body: &[Stmt]) -> RenderResult<()> {
        for stmt in body {
            self.exec(stmt)?;
        }
        Ok(())
    }

    fn exec(&mut self, stmt: &Stmt) -> RenderResult<()> {
        match stmt {
            Stmt::Element(op) => {
                let vnode = self.build_element(op)?;
                self.slots.insert(op.id, vnode);
            }
            Stmt::Text { parent, text } => self.push_child(*parent, VNode::text(&**text)),
            Stmt::Attach { id, parent } => {
                if let Some(vnode) = self.slots.remove(id) {
                    self.push_child(*parent, vnode);
                }
            }
            Stmt::If { branches, otherwise } => {
                for branch in branches {
                    if self.eval(&branch.test)?.truthy() {
                        return self.exec_all(&branch.body);
                    }
                }
                if let Some(body) = otherwise {
                    self.exec_all(body)?;
                }
            }
            Stmt::Loop(op) => self.exec_loop(op)?,
            Stmt::Content {
                parent,
                value,
                raw,
                fallback,
            } => {
                let value = self.eval(value)?;
                if value.truthy() || matches!(value, Value::Number(n) if n == 0.0) {
                    let text = value.to_string();
                    let node = if *raw { VNode::markup(text) } else { VNode::text(text) };
                    self.push_child(*parent, node);
                } else {
                    self.exec_all(fallback)?;
                }
            }
            Stmt::On {
                id,
                event,
                method,
                args,
                modifiers,
            } => self.bind_event(*id, event, method, args.as_deref(), *modifiers)?,
            Stmt::Ref { id, name } => self.bind_ref(*id, name),
            Stmt::Widget(op) => self.embed_widget(op)?,
            Stmt::Log { value, source } => {
                let value = self.eval(value)?;
                info!(template = self.template, expr = %source, %value, "t-log");
            }
            Stmt::Set { name, value } => {
                let value = self.eval(value)?;
                self.scope.set(name, value);
            }
            Stmt::Frame(body) => {
                self.scope.frames.push(Frame::default());
                let result = self.exec_all(body);
                self.scope.frames.pop();
                result?;
            }
        }
        Ok(())
    }

    fn build_element(&self, op: &ElementOp) -> RenderResult<VNode> {
        let mut data = VNodeData {
            attrs: op.attrs.clone(),
            ns: op.ns.clone(),
            ..VNodeData::default()
        };

        if !op.dynamic.is_empty() {
            let mut attrs = op.attrs.as_deref().cloned().unwrap_or_default();
            for attr in &op.dynamic {
                match attr {
                    DynAttr::Value { name, expr } => set_attr(&mut attrs, name, self.eval(expr)?),
                    DynAttr::Format { name, parts } => {
                        let mut out = String::new();
                        for part in parts {
                            match part {
                                FormatPart::Lit(s) => out.push_str(s),
                                FormatPart::Expr(e) => {
                                    let v = self.eval(e)?;
                                    if !v.is_nullish() {
                                        let _ = write!(out, "{v}");
                                    }
                                }
                            }
                        }
                        set_attr(&mut attrs, name, Value::from(out));
                    }
                    DynAttr::Spread(expr) => match self.eval(expr)? {
                        Value::Map(m) => {
                            for (k, v) in m.iter() {
                                set_attr(&mut attrs, k, v.clone());
                            }
                        }
                        Value::List(pair) if pair.len() == 2 => set_attr(&mut attrs, &pair[0].to_string(), pair[1].clone()),
                        v if v.is_nullish() => {}
                        other => warn!(
                            template = self.template,
                            found = other.type_name(),
                            "t-att expects a map or a [name, value] pair"
                        ),
                    },
                }
            }
            data.attrs = (!attrs.is_empty()).then(|| Rc::new(attrs));
        }

        let mut vnode = VNode::element(&*op.tag, data, Vec::new());
        if let Some(key) = &op.key {
            vnode.key = Some(self.eval(key)?.to_key());
        }
        Ok(vnode)
    }

    fn exec_loop(&mut self, op: &LoopOp) -> RenderResult<()> {
        let collection = self.eval(&op.collection)?;
        let items: Vec<(Value, Value)> = match &collection {
            Value::Undefined | Value::Null => {
                return Err(RenderError::NullishCollection {
                    expr: op.source.clone(),
                    found: collection.type_name(),
                });
            }
            Value::Number(n) if !n.is_finite() || *n > MAX_RANGE as f64 => {
                return Err(EvalError::Native(format!(
                    "t-foreach over '{}' got {n}, more than the {MAX_RANGE} iterations a number may produce",
                    op.source
                ))
                .into());
            }
            Value::Number(n) => (0..n.max(0.0) as usize).map(|i| (Value::from(i), Value::from(i))).collect(),
            Value::List(items) => items.iter().map(|v| (v.clone(), v.clone())).collect(),
            Value::Map(m) => m.iter().map(|(k, v)| (Value::from(k.as_str()), v.clone())).collect(),
            Value::Str(s) => s
                .chars()
                .map(|c| {
                    let v = Value::from(c.to_string());
                    (v.clone(), v)
                })
                .collect(),
            other => {
                return Err(EvalError::Native(format!(
                    "t-foreach over '{}' got {}, which is not iterable",
                    op.source,
                    other.type_name()
                ))
                .into());
            }
        };
        trace!(template = self.template, expr = %op.source, len = items.len(), "loop");

        let names = LoopNames::new(&op.name);
        let last = items.len().saturating_sub(1);
        for (i, (item, value)) in items.into_iter().enumerate() {
            self.scope.frames.push(Frame {
                vars: vec![
                    (op.name.clone(), item),
                    (names.index.clone(), Value::from(i)),
                    (names.first.clone(), Value::from(i == 0)),
                    (names.last.clone(), Value::from(i == last)),
                    (names.parity.clone(), Value::from(if i % 2 == 0 { "even" } else { "odd" })),
                    (names.value.clone(), value),
                ],
            });
            self.loop_keys.push(i);
            let result = self.exec_all(&op.body);
            self.loop_keys.pop();
            self.scope.frames.pop();
            result?;
        }
        Ok(())
    }

    fn bind_event(
        &mut self,
        id: NodeId,
        event: &Rc<str>,
        method: &Rc<str>,
        args: Option<&[Expr]>,
        modifiers: Modifiers,
    ) -> RenderResult<()> {
        let handler = match args {
            None => self
                .rctx
                .handlers
                .borrow_mut()
                .entry((Rc::from(self.template), event.clone(), id, method.clone()))
                .or_insert_with(|| owner_handler(self.rctx.owner(), method.clone(), Rc::from(Vec::new())))
                .clone(),
            Some(args) => {
                let values = args.iter().map(|a| self.eval(a)).collect::<RenderResult<Vec<_>>>()?;
                owner_handler(self.rctx.owner(), method.clone(), values.into())
            }
        };

        let Some(vnode) = self.slots.get_mut(&id) else {
            warn!(template = self.template, event = %event, "t-on outside of an element");
            return Ok(());
        };
        let on = vnode.data.on.get_or_insert_with(Default::default);
        Rc::make_mut(on).insert(event.to_string(), EventBinding { handler, modifiers });
        Ok(())
    }

    fn bind_ref(&mut self, id: NodeId, name: &Rc<str>) {
        let Some(vnode) = self.slots.get_mut(&id) else {
            return;
        };
        let (refs, ref_name) = (self.rctx.refs().clone(), name.clone());
        vnode.data.hooks.create = Some(Rc::new(move |node: HostNode| refs.insert(&*ref_name, node)));
        let (refs, ref_name) = (self.rctx.refs().clone(), name.clone());
        vnode.data.hooks.destroy = Some(Rc::new(move |node: HostNode| refs.release(&ref_name, node)));
    }

    fn widget_key(&self, op: &WidgetOp) -> RenderResult<Key> {
        Ok(match &op.key {
            WidgetKey::Explicit(expr) => self.eval(expr)?.to_key(),
            WidgetKey::Iteration(id) => {
                let mut key = id.to_string();
                for i in &self.loop_keys {
                    let _ = write!(key, "__{i}");
                }
                Key::from(key)
            }
            WidgetKey::Static(id) => Key::from(id.to_string()),
        })
    }

    fn embed_widget(&mut self, op: &WidgetOp) -> RenderResult<()> {
        let key = self.widget_key(op)?;
        if !self.widget_keys.insert(key.clone()) {
            warn!(template = self.template, widget = %op.name, %key, "widget key used twice in one render");
        }
        let props = match &op.props {
            Some(expr) => self.eval(expr)?,
            None => Value::from(ValueMap::new()),
        };

        let (widget, render) = match self.rctx.widgets().get(&key) {
            Some(w) if w.is_destroyed() => self.construct(op, &key, props)?,
            Some(w) if w.is_started() => {
                trace!(widget = %op.name, %key, "update props");
                let render = w.clone().update_props(props);
                (w, render)
            }
            Some(w) if w.in_flight_props().as_ref() == Some(&props) => {
                trace!(widget = %op.name, %key, "joining in-flight render");
                let render = w.clone().start();
                (w, render)
            }
            Some(w) => {
                trace!(widget = %op.name, %key, "props changed before first render completed");
                w.destroy();
                self.construct(op, &key, props)?
            }
            None => self.construct(op, &key, props)?,
        };

        let slot = self.rctx.next_slot();
        self.push_child(op.parent, VNode::pending(slot));
        self.rctx.push_pending(PendingWidget {
            slot,
            key,
            name: op.name.clone(),
            keepalive: op.keepalive,
            widget,
            render,
        });
        Ok(())
    }

    fn construct(&self, op: &WidgetOp, key: &Key, props: Value) -> RenderResult<(Rc<dyn Widget>, WidgetFuture)> {
        let unknown = || RenderError::UnknownWidget(op.name.to_string());
        let factory = self.rctx.factory().ok_or_else(unknown)?;
        let widget = factory.create(&op.name, props).ok_or_else(unknown)?;
        trace!(widget = %op.name, %key, "constructed");
        self.rctx.widgets().insert(key.clone(), widget.clone());
        let render = widget.clone().start();
        Ok((widget, render))
    }
}

/// `true`/`false` toggle a marker attribute; nullish values leave the attribute as is.
fn set_attr(attrs: &mut AttrMap, name: &str, value: Value) {
    let value = match value {
        v if v.is_nullish() => return,
        Value::Bool(b) => AttrValue::Bool(b),
        other => AttrValue::Str(other.to_string()),
    };
    let merged = match (attrs.get(name), &value) {
        (Some(AttrValue::Str(existing)), AttrValue::Str(extra)) if name == "class" && !existing.is_empty() => {
            Some(AttrValue::Str(format!("{existing} {extra}")))
        }
        _ => None,
    };
    attrs.insert(name.to_string(), merged.unwrap_or(value));
}

fn owner_handler(owner: Option<Weak<dyn EventOwner>>, method: Rc<str>, args: Rc<[Value]>) -> Handler {
    Handler::new(move |event| match owner.as_ref().and_then(Weak::upgrade) {
        Some(owner) => owner.handle_event(&method, &args, event),
        None => trace!(method = %method, "event without a live owner"),
    })
}
