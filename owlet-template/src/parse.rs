use pest::Parser;
use pest::iterators::Pair;

use crate::ast::{Attr, Element, Node};
use crate::error::{TemplateError, TemplateResult};

#[derive(pest_derive::Parser)]
#[grammar = "template.pest"]
struct TemplateParser;

/// Parses template markup into its top-level nodes.
///
/// Comments and `<?...?>` declarations are dropped; text keeps its whitespace.
pub fn parse_fragment(source: &str) -> TemplateResult<Vec<Node>> {
    let mut pairs = TemplateParser::parse(Rule::fragment, source).map_err(|e| TemplateError::Parse(e.to_string()))?;
    let fragment = pairs.next().ok_or_else(|| TemplateError::Parse("empty template".into()))?;

    let mut nodes = Vec::new();
    for pair in fragment.into_inner() {
        if let Some(node) = build_node(pair)? {
            nodes.push(node);
        }
    }
    Ok(nodes)
}

fn build_node(pair: Pair<Rule>) -> TemplateResult<Option<Node>> {
    match pair.as_rule() {
        Rule::element => build_element(pair).map(|el| Some(Node::Element(el))),
        Rule::text => Ok(Some(Node::Text(decode_entities(pair.as_str())))),
        _ => Ok(None),
    }
}

fn build_element(pair: Pair<Rule>) -> TemplateResult<Element> {
    let mut inner = pair.into_inner();
    let tag_pair = inner
        .next()
        .ok_or_else(|| TemplateError::Parse("element without a tag".into()))?;

    let mut el = Element::new("");
    for part in tag_pair.into_inner() {
        match part.as_rule() {
            Rule::name => el.tag = part.as_str().to_string(),
            Rule::attribute => el.attrs.push(build_attr(part)),
            _ => {}
        }
    }

    for pair in inner {
        if pair.as_rule() == Rule::close_tag {
            let closing = pair.into_inner().next().map(|n| n.as_str()).unwrap_or_default();
            if closing != el.tag {
                return Err(TemplateError::Parse(format!("<{}> closed by </{closing}>", el.tag)));
            }
        } else if let Some(child) = build_node(pair)? {
            el.children.push(child);
        }
    }
    Ok(el)
}

fn build_attr(pair: Pair<Rule>) -> Attr {
    let mut attr = Attr {
        name: String::new(),
        value: String::new(),
    };
    for part in pair.into_inner() {
        match part.as_rule() {
            Rule::name => attr.name = part.as_str().to_string(),
            Rule::dq_value | Rule::sq_value => attr.value = decode_entities(part.as_str()),
            _ => {}
        }
    }
    attr
}

fn decode_entities(s: &str) -> String {
    if !s.contains('&') {
        return s.to_string();
    }
    s.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}
