use std::cell::RefCell;

use owlet_dom::MemoryHost;
use owlet_template::{EvalError, QWeb, RenderContext, RenderError, TemplateError, Value};
use pretty_assertions::assert_eq;
use serde_json::json;

fn qweb(src: &str) -> QWeb {
    let mut qweb = QWeb::new();
    qweb.add_template("t", src, false).unwrap();
    qweb
}

fn render(src: &str, data: serde_json::Value) -> String {
    let qweb = qweb(src);
    let host = RefCell::new(MemoryHost::new());
    let root = pollster::block_on(qweb.render_to_host("t", &Value::from(data), &RenderContext::new(), &host)).unwrap();
    host.borrow().to_markup(root)
}

#[test]
fn loop_exposes_pseudo_variables() {
    let src = concat!(
        r#"<ul><li t-foreach="items" t-as="it" t-attf-class="{{it_parity}}">"#,
        r#"<t t-esc="it_index"/>:<t t-esc="it"/><t t-if="it_first">F</t><t t-if="it_last">L</t>"#,
        "</li></ul>"
    );
    assert_eq!(
        render(src, json!({"items": ["a", "b", "c"]})),
        r#"<ul><li class="even">0:aF</li><li class="odd">1:b</li><li class="even">2:cL</li></ul>"#
    );
}

#[test]
fn numbers_iterate_a_range() {
    let src = r#"<p><t t-foreach="3" t-as="i"><t t-esc="i"/></t></p>"#;
    assert_eq!(render(src, json!({})), "<p>012</p>");
    assert_eq!(render(r#"<p><t t-foreach="n" t-as="i">x</t></p>"#, json!({"n": 0})), "<p></p>");
}

#[test]
fn huge_or_infinite_numbers_are_render_errors() {
    let counted = qweb(r#"<p><t t-foreach="n" t-as="i">x</t></p>"#);
    for n in [json!(1e15), json!(1_000_001)] {
        let err = counted.render("t", &Value::from(json!({ "n": n })), &RenderContext::new()).unwrap_err();
        assert!(matches!(err, RenderError::Eval(EvalError::Native(_))), "{err:?}");
    }
    let infinite = qweb(r#"<p><t t-foreach="1 / 0" t-as="i">x</t></p>"#);
    let err = infinite.render("t", &Value::Undefined, &RenderContext::new()).unwrap_err();
    assert!(matches!(err, RenderError::Eval(EvalError::Native(_))), "{err:?}");
}

#[test]
fn maps_iterate_keys_with_values() {
    let src = r#"<p><t t-foreach="prices" t-as="k"><t t-esc="k"/>=<t t-esc="k_value"/>;</t></p>"#;
    assert_eq!(render(src, json!({"prices": {"apple": 1, "pear": 2}})), "<p>apple=1;pear=2;</p>");
}

#[test]
fn nested_loops_see_outer_variables() {
    let src = r#"<table><tr t-foreach="rows" t-as="r"><td t-foreach="r" t-as="c" t-esc="r_index * 10 + c"/></tr></table>"#;
    assert_eq!(
        render(src, json!({"rows": [[1, 2], [3]]})),
        "<table><tr><td>1</td><td>2</td></tr><tr><td>13</td></tr></table>"
    );
}

#[test]
fn loop_variables_do_not_leak() {
    let src = r#"<div><t t-foreach="[1, 2]" t-as="x"/><t t-esc="x"/></div>"#;
    assert_eq!(render(src, json!({"x": "outer"})), "<div>outer</div>");
}

#[test]
fn nullish_collection_is_a_render_error() {
    let qweb = qweb(r#"<ul><li t-foreach="items" t-as="i"/></ul>"#);
    let err = qweb.render("t", &Value::from(json!({})), &RenderContext::new()).unwrap_err();
    assert_eq!(
        err,
        RenderError::NullishCollection {
            expr: "items".into(),
            found: "undefined"
        }
    );
    let err = qweb.render("t", &Value::from(json!({"items": null})), &RenderContext::new()).unwrap_err();
    assert!(matches!(err, RenderError::NullishCollection { found: "null", .. }));
}

#[test]
fn foreach_needs_a_name() {
    let qweb = qweb(r#"<ul><li t-foreach="items"/></ul>"#);
    let err = qweb.render("t", &Value::Undefined, &RenderContext::new()).unwrap_err();
    assert!(matches!(err, RenderError::Template(TemplateError::Compile { .. })));
}

#[test]
fn loops_mark_the_template_scope_protected() {
    assert!(qweb(r#"<ul><li t-foreach="items" t-as="i"/></ul>"#).compiled("t").unwrap().protects_scope());
    assert!(!qweb("<ul><li/></ul>").compiled("t").unwrap().protects_scope());
}

#[test]
fn keys_come_from_t_key() {
    let qweb = qweb(r#"<ul><li t-foreach="items" t-as="i" t-key="i.id" t-esc="i.label"/></ul>"#);
    let vnode = qweb
        .render(
            "t",
            &Value::from(json!({"items": [{"id": "a", "label": "A"}, {"id": 7, "label": "B"}]})),
            &RenderContext::new(),
        )
        .unwrap();
    let keys: Vec<String> = vnode.children.iter().map(|c| c.key.as_ref().unwrap().to_string()).collect();
    assert_eq!(keys, ["a", "7"]);
}
