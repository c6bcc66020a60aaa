//! Components rendered from a registered template.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::fmt;
use std::rc::{Rc, Weak};

use owlet_dom::{Event, HostAdapter, HostNode, Patcher, VNode, invoke_destroy_hooks};
use owlet_template::{
    EventOwner, QWeb, RenderContext, RenderError, RenderResult, Value, ValueMap, Widget, WidgetFactory,
    WidgetFuture, resolve_pending,
};
use tracing::{debug, trace, warn};

use crate::lifecycle::Lifecycle;
use crate::node_ref::NodeRef;
use crate::shared_render::SharedRender;

/// A `t-on-*` handler: mutates the component state from the event arguments.
pub type Method = Rc<dyn Fn(&mut ValueMap, &[Value], &Event)>;

/// What a component is made of: its template, initial state and handlers.
#[derive(Clone, Default)]
pub struct ComponentDef {
    template: String,
    state: ValueMap,
    methods: HashMap<String, Method>,
}

impl ComponentDef {
    pub fn new(template: impl Into<String>) -> Self {
        ComponentDef {
            template: template.into(),
            ..ComponentDef::default()
        }
    }

    pub fn state(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.state.insert(key.into(), value.into());
        self
    }

    pub fn method(mut self, name: impl Into<String>, f: impl Fn(&mut ValueMap, &[Value], &Event) + 'static) -> Self {
        self.methods.insert(name.into(), Rc::new(f));
        self
    }

    pub fn template(&self) -> &str {
        &self.template
    }
}

impl fmt::Debug for ComponentDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentDef")
            .field("template", &self.template)
            .field("state", &self.state.keys().collect::<Vec<_>>())
            .field("methods", &self.methods.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderOutcome {
    /// The host tree now shows this render.
    Patched,
    /// A newer render started first (or the component was destroyed); nothing was patched.
    Stale,
}

/// A live component instance.
///
/// Renders are numbered; only the most recently started one may patch. The
/// host is borrowed only while patching, so embedded components share it.
pub struct TemplateComponent<H: HostAdapter + 'static> {
    name: String,
    def: Rc<ComponentDef>,
    qweb: Rc<QWeb>,
    host: Rc<RefCell<H>>,
    props: RefCell<Value>,
    state: RefCell<ValueMap>,
    rctx: RenderContext,
    patcher: RefCell<Patcher>,
    vnode: RefCell<Option<VNode>>,
    renders: Cell<u64>,
    in_flight: RefCell<Option<Value>>,
    /// The first render, joined by every `start` issued before it finishes.
    first: RefCell<Option<SharedRender>>,
    started: Cell<bool>,
    mounted: Cell<bool>,
    destroyed: Cell<bool>,
    dirty: Cell<bool>,
    lifecycle: Lifecycle,
    me: Weak<Self>,
}

impl<H: HostAdapter + 'static> TemplateComponent<H> {
    pub fn new(
        name: impl Into<String>,
        def: Rc<ComponentDef>,
        props: Value,
        qweb: Rc<QWeb>,
        host: Rc<RefCell<H>>,
        factory: Option<Rc<dyn WidgetFactory>>,
    ) -> Rc<Self> {
        Rc::new_cyclic(|me: &Weak<Self>| {
            let owner: Weak<dyn EventOwner> = me.clone();
            let mut rctx = RenderContext::new().with_owner(owner);
            if let Some(factory) = factory {
                rctx = rctx.with_factory(factory);
            }
            TemplateComponent {
                name: name.into(),
                state: RefCell::new(def.state.clone()),
                def,
                qweb,
                host,
                in_flight: RefCell::new(Some(props.clone())),
                first: RefCell::new(None),
                props: RefCell::new(props),
                rctx,
                patcher: RefCell::new(Patcher::new()),
                vnode: RefCell::new(None),
                renders: Cell::new(0),
                started: Cell::new(false),
                mounted: Cell::new(false),
                destroyed: Cell::new(false),
                dirty: Cell::new(false),
                lifecycle: Lifecycle::default(),
                me: me.clone(),
            }
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn lifecycle(&self) -> &Lifecycle {
        &self.lifecycle
    }

    pub fn props(&self) -> Value {
        self.props.borrow().clone()
    }

    pub fn state(&self, key: &str) -> Value {
        self.state.borrow().get(key).cloned().unwrap_or_default()
    }

    /// Updates one state entry. Takes effect on the next render.
    pub fn set_state(&self, key: impl Into<String>, value: impl Into<Value>) {
        self.state.borrow_mut().insert(key.into(), value.into());
        self.dirty.set(true);
    }

    /// Whether state changed since the last render started.
    pub fn is_dirty(&self) -> bool {
        self.dirty.get()
    }

    pub fn node_ref(&self, name: &str) -> NodeRef {
        NodeRef::new(self.rctx.refs().clone(), name)
    }

    pub fn render_context(&self) -> &RenderContext {
        &self.rctx
    }

    /// The last patched vnode tree.
    pub fn vnode(&self) -> Option<VNode> {
        self.vnode.borrow().clone()
    }

    fn context(&self) -> Value {
        Value::map([
            ("props", self.props.borrow().clone()),
            ("state", Value::from(self.state.borrow().clone())),
        ])
    }

    /// Renders the template, waits for embedded components and patches the host.
    pub async fn render(&self) -> RenderResult<RenderOutcome> {
        if self.destroyed.get() {
            return Ok(RenderOutcome::Stale);
        }
        let id = self.renders.get() + 1;
        self.renders.set(id);
        self.dirty.set(false);
        trace!(component = %self.name, render = id, "render started");

        let mut vnode = self.qweb.render(self.def.template(), &self.context(), &self.rctx)?;
        resolve_pending(&self.rctx, std::slice::from_mut(&mut vnode)).await?;

        if id != self.renders.get() || self.destroyed.get() {
            warn!(component = %self.name, render = id, latest = self.renders.get(), "discarding stale render");
            return Ok(RenderOutcome::Stale);
        }
        self.patch(vnode);
        debug!(component = %self.name, render = id, "patched");
        Ok(RenderOutcome::Patched)
    }

    /// Renders only if state changed since the last render.
    pub async fn flush(&self) -> RenderResult<Option<RenderOutcome>> {
        if !self.dirty.get() {
            return Ok(None);
        }
        self.render().await.map(Some)
    }

    fn patch(&self, vnode: VNode) {
        let old = self.vnode.borrow_mut().take();
        let mut host = self.host.borrow_mut();
        let mut patcher = self.patcher.borrow_mut();
        let patched = match old {
            Some(old) => patcher.patch(&mut *host, old, vnode),
            None => {
                let anchor = host.create_comment("");
                patcher.patch(&mut *host, anchor, vnode)
            }
        };
        patcher.flush_removals(&mut *host);
        *self.vnode.borrow_mut() = Some(patched);
    }

    /// Renders the component and appends its host node to `parent`.
    pub async fn mount(&self, parent: HostNode) -> RenderResult<HostNode> {
        self.first_render().await?;
        let node = self.host_node().ok_or_else(|| RenderError::Widget {
            name: self.name.clone(),
            message: "mounted before any render was patched".into(),
        })?;
        self.host.borrow_mut().append_child(parent, node);
        self.mounted();
        Ok(node)
    }

    async fn first_render(&self) -> RenderResult<()> {
        if self.render().await? == RenderOutcome::Patched && !self.started.get() {
            self.started.set(true);
            self.in_flight.borrow_mut().take();
            debug!(component = %self.name, "started");
        }
        Ok(())
    }

    fn rc(&self) -> Option<Rc<Self>> {
        self.me.upgrade()
    }
}

impl<H: HostAdapter + 'static> Widget for TemplateComponent<H> {
    fn start(self: Rc<Self>) -> WidgetFuture {
        if self.started.get() {
            return Box::pin(async { Ok(()) });
        }
        let running = self.first.borrow().as_ref().filter(|f| !f.is_done()).cloned();
        let first = match running {
            Some(first) => {
                trace!(component = %self.name, "joining first render");
                first
            }
            None => {
                let me = self.clone();
                let first = SharedRender::new(Box::pin(async move { me.first_render().await }));
                *self.first.borrow_mut() = Some(first.clone());
                first
            }
        };
        Box::pin(first)
    }

    fn update_props(self: Rc<Self>, props: Value) -> WidgetFuture {
        *self.props.borrow_mut() = props;
        Box::pin(async move { self.render().await.map(drop) })
    }

    fn destroy(&self) {
        if self.destroyed.replace(true) {
            return;
        }
        if self.mounted.replace(false) {
            self.lifecycle.run_will_unmount();
        }
        let vnode = self.vnode.borrow_mut().take();
        if let Some(vnode) = &vnode {
            invoke_destroy_hooks(vnode);
        }
        self.rctx.widgets().clear();
        self.first.borrow_mut().take();
        self.lifecycle.run_destroyed();
        debug!(component = %self.name, "destroyed");
    }

    fn detach(&self) {
        if self.mounted.replace(false) {
            self.lifecycle.run_will_unmount();
        }
        trace!(component = %self.name, "detached");
    }

    fn mounted(&self) {
        if !self.mounted.replace(true) {
            self.lifecycle.run_mounted();
        }
    }

    fn is_started(&self) -> bool {
        self.started.get()
    }

    fn is_destroyed(&self) -> bool {
        self.destroyed.get()
    }

    fn is_mounted(&self) -> bool {
        self.mounted.get()
    }

    fn in_flight_props(&self) -> Option<Value> {
        self.in_flight.borrow().clone()
    }

    fn host_node(&self) -> Option<HostNode> {
        self.vnode.borrow().as_ref().and_then(|v| v.host)
    }

    fn owner(&self) -> Option<Rc<dyn EventOwner>> {
        self.rc().map(|me| me as Rc<dyn EventOwner>)
    }
}

impl<H: HostAdapter + 'static> EventOwner for TemplateComponent<H> {
    fn handle_event(&self, method: &str, args: &[Value], event: &Event) {
        let Some(handler) = self.def.methods.get(method) else {
            warn!(component = %self.name, method, "no such method");
            return;
        };
        trace!(component = %self.name, method, event = event.kind(), "handle event");
        handler(&mut self.state.borrow_mut(), args, event);
        self.dirty.set(true);
    }
}

impl<H: HostAdapter + 'static> fmt::Debug for TemplateComponent<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TemplateComponent")
            .field("name", &self.name)
            .field("template", &self.def.template)
            .field("renders", &self.renders.get())
            .field("started", &self.started.get())
            .field("mounted", &self.mounted.get())
            .field("destroyed", &self.destroyed.get())
            .finish_non_exhaustive()
    }
}

/// Named component definitions sharing one template set and one host.
///
/// Acts as the widget factory of every component it creates, so `t-widget`
/// resolves against the same definitions at any depth.
pub struct ComponentRegistry<H: HostAdapter + 'static> {
    qweb: Rc<QWeb>,
    host: Rc<RefCell<H>>,
    defs: RefCell<HashMap<String, Rc<ComponentDef>>>,
    me: Weak<Self>,
}

impl<H: HostAdapter + 'static> ComponentRegistry<H> {
    pub fn new(qweb: Rc<QWeb>, host: Rc<RefCell<H>>) -> Rc<Self> {
        Rc::new_cyclic(|me| ComponentRegistry {
            qweb,
            host,
            defs: RefCell::default(),
            me: me.clone(),
        })
    }

    pub fn define(&self, name: impl Into<String>, def: ComponentDef) {
        self.defs.borrow_mut().insert(name.into(), Rc::new(def));
    }

    pub fn is_defined(&self, name: &str) -> bool {
        self.defs.borrow().contains_key(name)
    }

    pub fn host(&self) -> &Rc<RefCell<H>> {
        &self.host
    }

    /// A new, not yet rendered instance of `name`.
    pub fn instantiate(&self, name: &str, props: Value) -> Option<Rc<TemplateComponent<H>>> {
        let def = self.defs.borrow().get(name).cloned()?;
        let factory = self.me.upgrade().map(|me| me as Rc<dyn WidgetFactory>);
        trace!(component = name, "instantiate");
        Some(TemplateComponent::new(
            name,
            def,
            props,
            self.qweb.clone(),
            self.host.clone(),
            factory,
        ))
    }
}

impl<H: HostAdapter + 'static> WidgetFactory for ComponentRegistry<H> {
    fn create(&self, name: &str, props: Value) -> Option<Rc<dyn Widget>> {
        self.instantiate(name, props).map(|c| c as Rc<dyn Widget>)
    }
}
