use std::cell::{Cell, RefCell};
use std::rc::Rc;

use owlet_dom::{HostAdapter, HostNode, MemoryHost, Patcher, VNode};
use owlet_template::{
    EventOwner, QWeb, RenderContext, RenderError, Value, Widget, WidgetFactory, WidgetFuture, resolve_pending,
};
use pretty_assertions::assert_eq;
use serde_json::json;

type Host = Rc<RefCell<MemoryHost>>;

/// Renders `<em>{label}</em>` into the shared host.
struct Badge {
    host: Host,
    props: RefCell<Value>,
    node: Cell<Option<HostNode>>,
    renders: Cell<u32>,
    started: Cell<bool>,
    mounted: Cell<bool>,
    destroyed: Cell<bool>,
    detached: Cell<u32>,
}

impl Badge {
    fn new(host: Host, props: Value) -> Self {
        Badge {
            host,
            props: RefCell::new(props),
            node: Cell::new(None),
            renders: Cell::new(0),
            started: Cell::new(false),
            mounted: Cell::new(false),
            destroyed: Cell::new(false),
            detached: Cell::new(0),
        }
    }

    fn render(&self) {
        let mut host = self.host.borrow_mut();
        let node = match self.node.get() {
            Some(node) => node,
            None => {
                let node = host.create_element("em");
                self.node.set(Some(node));
                node
            }
        };
        let label = self.props.borrow().get("label").to_string();
        host.set_text_content(node, &label);
        self.renders.set(self.renders.get() + 1);
        self.started.set(true);
    }
}

impl Widget for Badge {
    fn start(self: Rc<Self>) -> WidgetFuture {
        Box::pin(async move {
            self.render();
            Ok(())
        })
    }

    fn update_props(self: Rc<Self>, props: Value) -> WidgetFuture {
        *self.props.borrow_mut() = props;
        Box::pin(async move {
            self.render();
            Ok(())
        })
    }

    fn destroy(&self) {
        self.destroyed.set(true);
    }

    fn detach(&self) {
        self.mounted.set(false);
        self.detached.set(self.detached.get() + 1);
    }

    fn mounted(&self) {
        self.mounted.set(true);
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
        (!self.started.get()).then(|| self.props.borrow().clone())
    }

    fn host_node(&self) -> Option<HostNode> {
        self.node.get()
    }

    fn owner(&self) -> Option<Rc<dyn EventOwner>> {
        None
    }
}

struct Badges {
    host: Host,
    created: RefCell<Vec<Rc<Badge>>>,
}

impl WidgetFactory for Badges {
    fn create(&self, name: &str, props: Value) -> Option<Rc<dyn Widget>> {
        if name != "Badge" {
            return None;
        }
        let badge = Rc::new(Badge::new(self.host.clone(), props));
        self.created.borrow_mut().push(badge.clone());
        Some(badge as Rc<dyn Widget>)
    }
}

struct Fixture {
    qweb: QWeb,
    host: Host,
    factory: Rc<Badges>,
    rctx: RenderContext,
    patcher: Patcher,
    container: HostNode,
    current: Option<VNode>,
}

impl Fixture {
    fn new(src: &str) -> Self {
        let mut qweb = QWeb::new();
        qweb.add_template("t", src, false).unwrap();
        let host: Host = Rc::new(RefCell::new(MemoryHost::new()));
        let factory = Rc::new(Badges {
            host: host.clone(),
            created: RefCell::new(Vec::new()),
        });
        let rctx = RenderContext::new().with_factory(factory.clone());
        let container = host.borrow_mut().create_element("main");
        Fixture {
            qweb,
            host,
            factory,
            rctx,
            patcher: Patcher::new(),
            container,
            current: None,
        }
    }

    fn render(&mut self, data: serde_json::Value) -> String {
        let vnode = pollster::block_on(self.qweb.render_resolved("t", &Value::from(data), &self.rctx)).unwrap();
        let mut host = self.host.borrow_mut();
        let patched = match self.current.take() {
            Some(old) => self.patcher.patch(&mut *host, old, vnode),
            None => {
                let placeholder = host.create_comment("");
                host.append_child(self.container, placeholder);
                self.patcher.patch(&mut *host, placeholder, vnode)
            }
        };
        self.current = Some(patched);
        host.to_markup(self.container)
    }

    fn created(&self) -> usize {
        self.factory.created.borrow().len()
    }

    fn badge(&self, i: usize) -> Rc<Badge> {
        self.factory.created.borrow()[i].clone()
    }
}

#[test]
fn widget_is_reused_across_renders() {
    let mut fx = Fixture::new(r#"<div><t t-widget="Badge" t-props="{label: name}"/></div>"#);
    for i in 0..5 {
        let markup = fx.render(json!({"name": format!("v{i}")}));
        assert_eq!(markup, format!("<main><div><em>v{i}</em></div></main>"));
    }
    assert_eq!(fx.created(), 1);
    let badge = fx.badge(0);
    assert_eq!(badge.renders.get(), 5);
    assert!(badge.is_mounted());
    assert_eq!(fx.rctx.widgets().len(), 1);
}

#[test]
fn widget_with_explicit_key_is_reused_across_renders() {
    let mut fx = Fixture::new(r#"<div><p t-esc="n"/><t t-widget="Badge" t-key="'main'" t-props="{label: 'n' + n}"/></div>"#);
    for n in 0..4 {
        let markup = fx.render(json!({"n": n}));
        assert_eq!(markup, format!("<main><div><p>{n}</p><em>n{n}</em></div></main>"));
    }
    assert_eq!(fx.created(), 1);
    let badge = fx.badge(0);
    assert_eq!(badge.renders.get(), 4);
    assert!(!badge.is_destroyed());
    assert!(badge.is_mounted());
    assert!(fx.rctx.widgets().get(&owlet_dom::Key::from("main")).is_some());
}

#[test]
fn removed_widget_is_destroyed() {
    let mut fx = Fixture::new(r#"<div><t t-if="show"><t t-widget="Badge" t-key="'b'"/></t></div>"#);
    fx.render(json!({"show": true}));
    assert_eq!(fx.render(json!({"show": false})), "<main><div></div></main>");
    assert!(fx.badge(0).is_destroyed());
    assert!(fx.rctx.widgets().is_empty());

    fx.render(json!({"show": true}));
    assert_eq!(fx.created(), 2);
}

#[test]
fn keepalive_widget_is_detached_and_reused() {
    let mut fx = Fixture::new(r#"<div><t t-if="show"><t t-widget="Badge" t-keepalive="1" t-props="{label: 'k'}"/></t></div>"#);
    fx.render(json!({"show": true}));
    fx.render(json!({"show": false}));
    let badge = fx.badge(0);
    assert!(!badge.is_destroyed());
    assert_eq!(badge.detached.get(), 1);
    assert!(!badge.is_mounted());

    assert_eq!(fx.render(json!({"show": true})), "<main><div><em>k</em></div></main>");
    assert_eq!(fx.created(), 1);
    assert!(badge.is_mounted());
}

#[test]
fn widgets_in_loops_get_one_instance_per_iteration() {
    let mut fx = Fixture::new(r#"<ul><li t-foreach="items" t-as="it"><t t-widget="Badge" t-props="{label: it}"/></li></ul>"#);
    assert_eq!(
        fx.render(json!({"items": ["a", "b", "c"]})),
        "<main><ul><li><em>a</em></li><li><em>b</em></li><li><em>c</em></li></ul></main>"
    );
    assert_eq!(fx.created(), 3);
    assert_eq!(fx.rctx.widgets().len(), 3);

    fx.render(json!({"items": ["a", "b"]}));
    assert_eq!(fx.created(), 3);
    assert!(fx.badge(2).is_destroyed());
    assert_eq!(fx.rctx.widgets().len(), 2);
}

#[test]
fn props_changed_before_first_render_replace_the_instance() {
    let fx = Fixture::new(r#"<div><t t-widget="Badge" t-props="{label: name}"/></div>"#);

    fx.qweb.render("t", &Value::from(json!({"name": "a"})), &fx.rctx).unwrap();
    assert_eq!(fx.rctx.take_pending().len(), 1);

    // Same props while the first render is still in flight: joined, not rebuilt.
    fx.qweb.render("t", &Value::from(json!({"name": "a"})), &fx.rctx).unwrap();
    drop(fx.rctx.take_pending());
    assert_eq!(fx.created(), 1);

    fx.qweb.render("t", &Value::from(json!({"name": "b"})), &fx.rctx).unwrap();
    assert_eq!(fx.created(), 2);
    assert!(fx.badge(0).is_destroyed());
    assert!(!fx.badge(1).is_destroyed());
}

#[test]
fn pending_slots_resolve_in_place() {
    let fx = Fixture::new(r#"<div><p>before</p><t t-widget="Badge" t-props="{label: 'w'}"/><p>after</p></div>"#);
    let mut root = fx.qweb.render("t", &Value::Undefined, &fx.rctx).unwrap();
    assert_eq!(root.pending_slots().len(), 1);
    assert!(root.children[1].is_comment());

    pollster::block_on(resolve_pending(&fx.rctx, std::slice::from_mut(&mut root))).unwrap();
    assert!(root.pending_slots().is_empty());
    assert_eq!(root.children[1].sel, "widget:Badge");
    assert!(root.children[1].data.adopt);
    assert_eq!(root.children[1].host, fx.badge(0).host_node());
}

#[test]
fn unknown_widgets_are_render_errors() {
    let fx = Fixture::new(r#"<div><t t-widget="Nope"/></div>"#);
    let err = fx.qweb.render("t", &Value::Undefined, &fx.rctx).unwrap_err();
    assert_eq!(err, RenderError::UnknownWidget("Nope".into()));

    let err = fx.qweb.render("t", &Value::Undefined, &RenderContext::new()).unwrap_err();
    assert_eq!(err, RenderError::UnknownWidget("Nope".into()));
}
