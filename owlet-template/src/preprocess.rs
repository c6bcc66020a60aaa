//! Validation and cleanup of `t-if`/`t-elif`/`t-else` chains, done once at registration.

use crate::ast::{Element, Node};
use crate::error::{TemplateError, TemplateResult};

const BRANCHES: [&str; 3] = ["t-if", "t-elif", "t-else"];

fn branch_of(el: &Element) -> TemplateResult<Option<&'static str>> {
    let found: Vec<&'static str> = BRANCHES.iter().copied().filter(|b| el.has_attr(b)).collect();
    match found.as_slice() {
        [] => Ok(None),
        [one] => {
            if el.has_attr("t-foreach") {
                return Err(TemplateError::Syntax(format!(
                    "<{}> cannot combine {one} with t-foreach; wrap one of them in a <t>",
                    el.tag
                )));
            }
            Ok(Some(one))
        }
        many => Err(TemplateError::Syntax(format!(
            "<{}> carries several branch directives: {}",
            el.tag,
            many.join(", ")
        ))),
    }
}

/// Normalizes a node list in place and recurses into every element.
pub fn normalize(nodes: &mut Vec<Node>) -> TemplateResult<()> {
    let mut i = 0;
    while i < nodes.len() {
        let branch = match &nodes[i] {
            Node::Element(el) => branch_of(el)?,
            Node::Text(_) => None,
        };

        if let Some(branch @ ("t-elif" | "t-else")) = branch {
            let mut prev = i;
            while prev > 0 && matches!(nodes[prev - 1], Node::Text(_)) {
                if !nodes[prev - 1].is_blank() {
                    return Err(TemplateError::Syntax(format!("text found between {branch} and its preceding branch")));
                }
                prev -= 1;
            }
            let follows_branch = prev > 0
                && nodes[prev - 1]
                    .as_element()
                    .is_some_and(|el| el.has_attr("t-if") || el.has_attr("t-elif"));
            if !follows_branch {
                return Err(TemplateError::Syntax(format!(
                    "{branch} must directly follow an element with t-if or t-elif"
                )));
            }
            nodes.drain(prev..i);
            i = prev;
        }

        if let Node::Element(el) = &mut nodes[i] {
            normalize(&mut el.children)?;
        }
        i += 1;
    }
    Ok(())
}
