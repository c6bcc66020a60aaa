use std::cell::RefCell;
use std::rc::Rc;

use owlet_dom::host::SVG_NS;
use owlet_dom::memory::Mutation;
use owlet_dom::{HostAdapter, MemoryHost, Patcher, VNode, VNodeData};
use owlet_template::{QWeb, QWebConfig, RenderContext, RenderError, TemplateError, Value};
use pretty_assertions::assert_eq;
use serde_json::json;

fn markup(qweb: &QWeb, name: &str, data: serde_json::Value) -> String {
    let host = RefCell::new(MemoryHost::new());
    let rctx = RenderContext::new();
    let root = pollster::block_on(qweb.render_to_host(name, &Value::from(data), &rctx, &host)).unwrap();
    host.borrow().to_markup(root)
}

#[test]
fn duplicate_names_are_rejected_unless_forced() {
    let mut qweb = QWeb::new();
    qweb.add_template("a", "<div>one</div>", false).unwrap();
    assert_eq!(markup(&qweb, "a", json!({})), "<div>one</div>");

    assert_eq!(
        qweb.add_template("a", "<div>two</div>", false),
        Err(TemplateError::Duplicate("a".into()))
    );
    qweb.add_template("a", "<div>two</div>", true).unwrap();
    assert_eq!(markup(&qweb, "a", json!({})), "<div>two</div>");
}

#[test]
fn load_templates_registers_each_named_child() {
    let mut qweb = QWeb::new();
    let added = qweb
        .load_templates(
            r#"<templates>
    <div t-name="a">A</div>
    <t t-name="b"><span>B</span></t>
</templates>"#,
        )
        .unwrap();
    assert_eq!(added, 2);
    assert!(qweb.has_template("a"));
    assert!(qweb.has_template("b"));
    assert_eq!(markup(&qweb, "a", json!({})), "<div>A</div>");
    assert_eq!(markup(&qweb, "b", json!({})), "<span>B</span>");
}

#[test]
fn load_templates_requires_names() {
    let mut qweb = QWeb::new();
    let err = qweb.load_templates("<templates><div>A</div></templates>").unwrap_err();
    assert!(matches!(err, TemplateError::Parse(_)));
    let err = qweb.load_templates("<div t-name=\"a\"/>").unwrap_err();
    assert!(matches!(err, TemplateError::Parse(_)));
}

#[test]
fn unknown_template_is_an_error() {
    let qweb = QWeb::new();
    let err = qweb.render("nope", &Value::Undefined, &RenderContext::new()).unwrap_err();
    assert_eq!(err, RenderError::Template(TemplateError::UnknownTemplate("nope".into())));
}

#[test]
fn template_needs_exactly_one_root() {
    let mut qweb = QWeb::new();
    qweb.add_template("two", "<div/><div/>", false).unwrap();
    qweb.add_template("none", "  ", false).unwrap();
    let rctx = RenderContext::new();
    assert_eq!(
        qweb.render("two", &Value::Undefined, &rctx).unwrap_err(),
        RenderError::Template(TemplateError::Structure {
            template: "two".into(),
            found: 2
        })
    );
    assert!(matches!(
        qweb.render("none", &Value::Undefined, &rctx),
        Err(RenderError::Template(TemplateError::Structure { found: 0, .. }))
    ));
}

#[test]
fn fragment_templates_render_every_root() {
    let mut qweb = QWeb::new();
    qweb.add_template("items", r#"<t><li t-foreach="[1, 2, 3]" t-as="i" t-esc="i"/></t>"#, false)
        .unwrap();
    let rctx = RenderContext::new();
    let roots = qweb.render_fragment("items", &Value::Undefined, &rctx).unwrap();
    assert_eq!(roots.len(), 3);
    assert!(roots.iter().all(|r| r.sel == "li"));
    assert_eq!(
        qweb.render("items", &Value::Undefined, &rctx).unwrap_err(),
        RenderError::MultipleRoots {
            template: "items".into(),
            count: 3
        }
    );
}

#[test]
fn bare_root_text_is_the_root_vnode() {
    let mut qweb = QWeb::new();
    qweb.add_template("text", "hello", false).unwrap();
    let vnode = qweb.render("text", &Value::Undefined, &RenderContext::new()).unwrap();
    assert!(vnode.is_text());
    assert_eq!(vnode.text.as_deref(), Some("hello"));
}

#[test]
fn compiled_templates_are_cached() {
    let mut qweb = QWeb::new();
    qweb.add_template("a", r#"<p t-esc="x"/>"#, false).unwrap();
    let first = qweb.compiled("a").unwrap();
    let second = qweb.compiled("a").unwrap();
    assert!(Rc::ptr_eq(&first, &second));
    assert_eq!(first.name(), "a");
    assert!(qweb.translator().cached() > 0);
}

#[test]
fn static_attributes_are_shared_across_renders() {
    let mut qweb = QWeb::new();
    qweb.add_template("a", r#"<div class="box"><p id="y" t-esc="x"/></div>"#, false)
        .unwrap();
    let rctx = RenderContext::new();
    let data = Value::from(json!({"x": 1}));
    let one = qweb.render("a", &data, &rctx).unwrap();
    let two = qweb.render("a", &data, &rctx).unwrap();
    assert!(Rc::ptr_eq(one.data.attrs.as_ref().unwrap(), two.data.attrs.as_ref().unwrap()));
    assert!(Rc::ptr_eq(
        one.children[0].data.attrs.as_ref().unwrap(),
        two.children[0].data.attrs.as_ref().unwrap()
    ));
}

#[test]
fn svg_children_inherit_the_namespace() {
    let mut qweb = QWeb::new();
    qweb.add_template("icon", r#"<svg><g><circle r="1"/></g></svg>"#, false).unwrap();
    let vnode = qweb.render("icon", &Value::Undefined, &RenderContext::new()).unwrap();
    assert_eq!(vnode.data.ns.as_deref(), Some(SVG_NS));
    assert_eq!(vnode.children[0].children[0].data.ns.as_deref(), Some(SVG_NS));
}

#[test]
fn call_depth_is_configurable() {
    let mut qweb = QWeb::with_config(QWebConfig {
        max_call_depth: 2,
        ..QWebConfig::default()
    });
    qweb.add_template("leaf", "<b>x</b>", false).unwrap();
    qweb.add_template("mid", r#"<i><t t-call="leaf"/></i>"#, false).unwrap();
    qweb.add_template("top", r#"<p><t t-call="mid"/></p>"#, false).unwrap();
    qweb.add_template("deep", r#"<div><t t-call="top"/></div>"#, false).unwrap();
    assert_eq!(markup(&qweb, "top", json!({})), "<p><i><b>x</b></i></p>");
    assert!(matches!(
        qweb.render("deep", &Value::Undefined, &RenderContext::new()),
        Err(RenderError::Template(TemplateError::Compile { .. }))
    ));
}

fn mounted_list(qweb: &QWeb, items: serde_json::Value) -> (MemoryHost, Patcher, owlet_dom::HostNode, owlet_dom::VNode) {
    let mut host = MemoryHost::new();
    let container = host.create_element("div");
    let placeholder = host.create_comment("");
    host.append_child(container, placeholder);
    let mut patcher = Patcher::new();
    let vnode = qweb
        .render("list", &Value::from(json!({ "items": items })), &RenderContext::new())
        .unwrap();
    let old = patcher.patch(&mut host, placeholder, vnode);
    host.clear_mutations();
    (host, patcher, container, old)
}

fn list_qweb() -> QWeb {
    let mut qweb = QWeb::new();
    qweb.add_template(
        "list",
        r#"<ul><li t-foreach="items" t-as="item" t-key="item" t-esc="item"/></ul>"#,
        false,
    )
    .unwrap();
    qweb
}

#[test]
fn identical_rerender_performs_no_host_mutation() {
    let qweb = list_qweb();
    let (mut host, mut patcher, _, old) = mounted_list(&qweb, json!([1, 2, 3]));
    let again = qweb
        .render("list", &Value::from(json!({"items": [1, 2, 3]})), &RenderContext::new())
        .unwrap();
    patcher.patch(&mut host, old, again);
    assert!(host.mutations().is_empty());
}

#[test]
fn reversing_a_keyed_list_only_moves_nodes() {
    let qweb = list_qweb();
    let (mut host, mut patcher, container, old) = mounted_list(&qweb, json!([1, 2, 3]));
    assert_eq!(
        host.to_markup(container),
        "<div><ul><li>1</li><li>2</li><li>3</li></ul></div>"
    );

    let reversed = qweb
        .render("list", &Value::from(json!({"items": [3, 2, 1]})), &RenderContext::new())
        .unwrap();
    patcher.patch(&mut host, old, reversed);

    let mutations = host.take_mutations();
    assert!(!mutations.is_empty());
    assert!(mutations.iter().all(|m| matches!(m, Mutation::Move { .. })), "{mutations:?}");
    assert_eq!(
        host.to_markup(container),
        "<div><ul><li>3</li><li>2</li><li>1</li></ul></div>"
    );
}

#[test]
fn keyed_fragment_roots_are_reordered_in_place() {
    let mut qweb = QWeb::new();
    let item = r#"t-as="i" t-key="i"><t t-esc="i"/></li></t>"#;
    qweb.add_template("before", &format!(r#"<t><li t-foreach="[3,2,1]" {item}"#), false).unwrap();
    qweb.add_template("after", &format!(r#"<t><li t-foreach="[1,2,3]" {item}"#), false).unwrap();
    let rctx = RenderContext::new();
    let list = |name: &str| {
        let roots = qweb.render_fragment(name, &Value::Undefined, &rctx).unwrap();
        assert_eq!(roots.len(), 3);
        VNode::element("ul", VNodeData::default(), roots)
    };

    let mut host = MemoryHost::new();
    let container = host.create_element("div");
    let placeholder = host.create_comment("");
    host.append_child(container, placeholder);
    let mut patcher = Patcher::new();
    let old = patcher.patch(&mut host, placeholder, list("before"));
    assert_eq!(host.to_markup(container), "<div><ul><li>3</li><li>2</li><li>1</li></ul></div>");
    host.clear_mutations();

    patcher.patch(&mut host, old, list("after"));
    let mutations = host.take_mutations();
    assert!(
        mutations.iter().all(|m| !matches!(m, Mutation::Create(_) | Mutation::Remove { .. })),
        "{mutations:?}"
    );
    assert_eq!(host.to_markup(container), "<div><ul><li>1</li><li>2</li><li>3</li></ul></div>");
}

fn drop_node(
    _: &mut owlet_template::compiler::Compiler<'_>,
    _: &owlet_template::DirectiveCall<'_>,
    _: &owlet_template::compiler::context::CompilerContext,
) -> owlet_template::TemplateResult<owlet_template::Handled> {
    Ok(owlet_template::Handled::Yes)
}

#[test]
fn registered_directives_take_over_matching_nodes() {
    let mut qweb = QWeb::new();
    qweb.add_template("t", r#"<div><p t-skip="">gone</p><p>kept</p></div>"#, false).unwrap();
    qweb.register_directive(owlet_template::Directive {
        at_node_encounter: Some(drop_node),
        ..owlet_template::Directive::new("skip", 5)
    });
    assert_eq!(markup(&qweb, "t", json!({})), "<div><p>kept</p></div>");
}
