use std::cell::{Cell, RefCell};
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll, Waker};

use owlet_core::{ComponentDef, RenderOutcome, TemplateComponent};
use owlet_dom::{HostAdapter, HostNode, MemoryHost};
use owlet_template::{EventOwner, QWeb, Value, Widget, WidgetFactory, WidgetFuture};
use pretty_assertions::assert_eq;

type Host = Rc<RefCell<MemoryHost>>;

/// Resolves once the shared flag is set.
struct Gate(Rc<Cell<bool>>);

impl Future for Gate {
    type Output = ();

    fn poll(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<()> {
        if self.0.get() { Poll::Ready(()) } else { Poll::Pending }
    }
}

/// A widget whose first render waits on a gate.
struct Slow {
    host: Host,
    gate: Rc<Cell<bool>>,
    node: Cell<Option<HostNode>>,
    destroyed: Cell<bool>,
}

impl Widget for Slow {
    fn start(self: Rc<Self>) -> WidgetFuture {
        Box::pin(async move {
            Gate(self.gate.clone()).await;
            let node = self.host.borrow_mut().create_element("aside");
            self.node.set(Some(node));
            Ok(())
        })
    }

    fn update_props(self: Rc<Self>, _props: Value) -> WidgetFuture {
        Box::pin(async { Ok(()) })
    }

    fn destroy(&self) {
        self.destroyed.set(true);
    }

    fn detach(&self) {}

    fn mounted(&self) {}

    fn is_started(&self) -> bool {
        self.node.get().is_some()
    }

    fn is_destroyed(&self) -> bool {
        self.destroyed.get()
    }

    fn is_mounted(&self) -> bool {
        false
    }

    fn in_flight_props(&self) -> Option<Value> {
        self.node.get().is_none().then_some(Value::Undefined)
    }

    fn host_node(&self) -> Option<HostNode> {
        self.node.get()
    }

    fn owner(&self) -> Option<Rc<dyn EventOwner>> {
        None
    }
}

struct SlowFactory {
    host: Host,
    gate: Rc<Cell<bool>>,
}

impl WidgetFactory for SlowFactory {
    fn create(&self, _name: &str, _props: Value) -> Option<Rc<dyn Widget>> {
        let slow = Rc::new(Slow {
            host: self.host.clone(),
            gate: self.gate.clone(),
            node: Cell::new(None),
            destroyed: Cell::new(false),
        });
        Some(slow as Rc<dyn Widget>)
    }
}

#[test]
fn older_render_finishing_last_is_discarded() {
    let mut qweb = QWeb::new();
    qweb.add_template(
        "page",
        r#"<div><t t-if="state.slow"><t t-widget="Slow"/></t><p t-esc="state.label"/></div>"#,
        false,
    )
    .unwrap();
    let host: Host = Rc::new(RefCell::new(MemoryHost::new()));
    let gate = Rc::new(Cell::new(false));
    let factory = Rc::new(SlowFactory {
        host: host.clone(),
        gate: gate.clone(),
    });
    let page = TemplateComponent::new(
        "Page",
        Rc::new(ComponentDef::new("page").state("slow", true).state("label", "first")),
        Value::Undefined,
        Rc::new(qweb),
        host.clone(),
        Some(factory as Rc<dyn WidgetFactory>),
    );

    let mut cx = Context::from_waker(Waker::noop());
    let mut first = Box::pin(page.render());
    assert!(first.as_mut().poll(&mut cx).is_pending());

    page.set_state("slow", false);
    page.set_state("label", "second");
    assert_eq!(pollster::block_on(page.render()).unwrap(), RenderOutcome::Patched);
    let root = page.host_node().unwrap();
    assert_eq!(host.borrow().to_markup(root), "<div><p>second</p></div>");

    gate.set(true);
    match first.as_mut().poll(&mut cx) {
        Poll::Ready(outcome) => assert_eq!(outcome.unwrap(), RenderOutcome::Stale),
        Poll::Pending => panic!("first render should have finished"),
    }
    assert_eq!(page.host_node(), Some(root));
    assert_eq!(host.borrow().to_markup(root), "<div><p>second</p></div>");
}

/// Builds `Child` components (whose template embeds `Slow`) and `Slow` widgets.
struct Nested {
    qweb: Rc<QWeb>,
    slow: SlowFactory,
    children: RefCell<Vec<Rc<TemplateComponent<MemoryHost>>>>,
    slows: Cell<usize>,
    me: std::rc::Weak<Nested>,
}

impl WidgetFactory for Nested {
    fn create(&self, name: &str, props: Value) -> Option<Rc<dyn Widget>> {
        match name {
            "Child" => {
                let factory = self.me.upgrade().map(|me| me as Rc<dyn WidgetFactory>);
                let child = TemplateComponent::new(
                    "Child",
                    Rc::new(ComponentDef::new("child")),
                    props,
                    self.qweb.clone(),
                    self.slow.host.clone(),
                    factory,
                );
                self.children.borrow_mut().push(child.clone());
                Some(child as Rc<dyn Widget>)
            }
            _ => {
                self.slows.set(self.slows.get() + 1);
                self.slow.create(name, props)
            }
        }
    }
}

#[test]
fn second_parent_render_joins_the_child_first_render() {
    let mut qweb = QWeb::new();
    qweb.add_template("page", r#"<div><t t-widget="Child"/><p t-esc="state.label"/></div>"#, false)
        .unwrap();
    qweb.add_template("child", r#"<section><t t-widget="Slow"/></section>"#, false).unwrap();
    let qweb = Rc::new(qweb);
    let host: Host = Rc::new(RefCell::new(MemoryHost::new()));
    let gate = Rc::new(Cell::new(false));
    let nested = Rc::new_cyclic(|me| Nested {
        qweb: qweb.clone(),
        slow: SlowFactory {
            host: host.clone(),
            gate: gate.clone(),
        },
        children: RefCell::default(),
        slows: Cell::new(0),
        me: me.clone(),
    });
    let page = TemplateComponent::new(
        "Page",
        Rc::new(ComponentDef::new("page").state("label", "first")),
        Value::Undefined,
        qweb,
        host.clone(),
        Some(nested.clone() as Rc<dyn WidgetFactory>),
    );

    let mut cx = Context::from_waker(Waker::noop());
    let mut first = Box::pin(page.render());
    assert!(first.as_mut().poll(&mut cx).is_pending());

    page.set_state("label", "second");
    let mut second = Box::pin(page.render());
    assert!(second.as_mut().poll(&mut cx).is_pending());

    gate.set(true);
    assert_eq!(pollster::block_on(second).unwrap(), RenderOutcome::Patched);
    match first.as_mut().poll(&mut cx) {
        Poll::Ready(outcome) => assert_eq!(outcome.unwrap(), RenderOutcome::Stale),
        Poll::Pending => panic!("first render should have finished"),
    }

    assert_eq!(nested.children.borrow().len(), 1);
    assert_eq!(nested.slows.get(), 1);
    let child = nested.children.borrow()[0].clone();
    assert!(child.is_started());
    let root = page.host_node().unwrap();
    assert_eq!(
        host.borrow().to_markup(root),
        "<div><section><aside></aside></section><p>second</p></div>"
    );
}

#[test]
fn render_after_destroy_is_stale() {
    let mut qweb = QWeb::new();
    qweb.add_template("page", "<div/>", false).unwrap();
    let host: Host = Rc::new(RefCell::new(MemoryHost::new()));
    let page = TemplateComponent::new(
        "Page",
        Rc::new(ComponentDef::new("page")),
        Value::Undefined,
        Rc::new(qweb),
        host.clone(),
        None,
    );
    pollster::block_on(page.clone().start()).unwrap();
    assert!(page.is_started());
    page.destroy();
    assert_eq!(pollster::block_on(page.render()).unwrap(), RenderOutcome::Stale);
    assert_eq!(page.host_node(), None);
}
