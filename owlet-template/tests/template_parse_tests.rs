use owlet_template::ast::Node;
use owlet_template::preprocess::normalize;
use owlet_template::{TemplateError, parse_fragment};

fn normalized(src: &str) -> Result<Vec<Node>, TemplateError> {
    let mut nodes = parse_fragment(src)?;
    normalize(&mut nodes)?;
    Ok(nodes)
}

#[test]
fn parse_element_with_attributes_and_text() {
    let nodes = parse_fragment(r#"<div class="a" t-att-id='x'><br/>hi &amp; bye</div>"#).unwrap();
    assert_eq!(nodes.len(), 1);
    let el = nodes[0].as_element().unwrap();
    assert_eq!(el.tag, "div");
    assert_eq!(el.attr("class"), Some("a"));
    assert_eq!(el.attr("t-att-id"), Some("x"));
    assert_eq!(el.children.len(), 2);
    assert_eq!(el.children[0].as_element().map(|b| b.tag.as_str()), Some("br"));
    assert!(matches!(&el.children[1], Node::Text(t) if t == "hi & bye"));
}

#[test]
fn parse_valueless_attribute() {
    let nodes = parse_fragment(r#"<p t-else="">a</p><input disabled/>"#).unwrap();
    assert_eq!(nodes[0].as_element().unwrap().attr("t-else"), Some(""));
    assert_eq!(nodes[1].as_element().unwrap().attr("disabled"), Some(""));
}

#[test]
fn parse_drops_comments_and_declarations() {
    let nodes = parse_fragment("<?xml version=\"1.0\"?><div><!-- note --><p/></div>").unwrap();
    assert_eq!(nodes.len(), 1);
    assert_eq!(nodes[0].as_element().unwrap().children.len(), 1);
}

#[test]
fn parse_rejects_mismatched_close_tag() {
    assert!(matches!(parse_fragment("<div></span>"), Err(TemplateError::Parse(_))));
    assert!(matches!(parse_fragment("<div>"), Err(TemplateError::Parse(_))));
}

#[test]
fn normalize_removes_blank_text_between_branches() {
    let nodes = normalized("<div><p t-if=\"a\">A</p>\n  <p t-elif=\"b\">B</p> <p t-else=\"\">C</p></div>").unwrap();
    let div = nodes[0].as_element().unwrap();
    assert_eq!(div.children.len(), 3);
    assert!(div.children.iter().all(|c| c.as_element().is_some()));
}

#[test]
fn normalize_keeps_blank_text_outside_branches() {
    let nodes = normalized("<div> <p>a</p> <p>b</p> </div>").unwrap();
    assert_eq!(nodes[0].as_element().unwrap().children.len(), 5);
}

#[test]
fn normalize_rejects_if_with_foreach() {
    let err = normalized(r#"<ul><li t-if="x" t-foreach="items" t-as="i"/></ul>"#).unwrap_err();
    assert!(matches!(err, TemplateError::Syntax(_)));
}

#[test]
fn normalize_rejects_orphan_else() {
    assert!(matches!(normalized(r#"<div><p t-else="">x</p></div>"#), Err(TemplateError::Syntax(_))));
    assert!(matches!(
        normalized(r#"<div><p>a</p><p t-elif="b">x</p></div>"#),
        Err(TemplateError::Syntax(_))
    ));
}

#[test]
fn normalize_rejects_text_between_branches() {
    let err = normalized(r#"<div><p t-if="a">A</p> oops <p t-else="">B</p></div>"#).unwrap_err();
    assert!(matches!(err, TemplateError::Syntax(_)));
}

#[test]
fn normalize_rejects_several_branch_directives() {
    let err = normalized(r#"<div><p t-if="a">A</p><p t-elif="b" t-else="">B</p></div>"#).unwrap_err();
    assert!(matches!(err, TemplateError::Syntax(_)));
}

#[test]
fn normalize_checks_nested_children() {
    let err = normalized(r#"<div><section><p t-else="">x</p></section></div>"#).unwrap_err();
    assert!(matches!(err, TemplateError::Syntax(_)));
}
