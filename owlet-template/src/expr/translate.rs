//! Rewrites raw template expressions so every free identifier reads from the data context.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

/// Prefix qualified identifiers are rewritten with.
pub const CONTEXT_PREFIX: &str = "ctx";

/// Identifiers that keep their global meaning.
const RESERVED: &[&str] = &[
    "true", "false", "null", "undefined", "this", "typeof", "in", "of", "new", "Math", "JSON", "Object", "Array",
    "Number", "String", "Boolean", "parseInt", "parseFloat", "isNaN",
];

fn word_operator(word: &str) -> Option<&'static str> {
    Some(match word {
        "and" => "&&",
        "or" => "||",
        "gt" => ">",
        "gte" => ">=",
        "lt" => "<",
        "lte" => "<=",
        _ => return None,
    })
}

fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_' || c == '$'
}

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '$'
}

/// Qualifies every free identifier of `expr` as `ctx.<name>`.
///
/// Reserved globals, property names after a `.`, object literal keys and the
/// contents of string literals are left alone; `and or gt gte lt lte` become operators.
pub fn translate(expr: &str) -> String {
    let chars: Vec<char> = expr.chars().collect();
    let mut out = String::with_capacity(expr.len() + 16);
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        if c == '\'' || c == '"' {
            let start = i;
            i += 1;
            while i < chars.len() && chars[i] != c {
                if chars[i] == '\\' {
                    i += 1;
                }
                i += 1;
            }
            i = (i + 1).min(chars.len());
            out.extend(&chars[start..i]);
        } else if c.is_ascii_digit() {
            while i < chars.len() && (chars[i].is_ascii_alphanumeric() || chars[i] == '.') {
                out.push(chars[i]);
                i += 1;
            }
        } else if is_ident_start(c) {
            let start = i;
            while i < chars.len() && is_ident_char(chars[i]) {
                i += 1;
            }
            let word: String = chars[start..i].iter().collect();
            let prev = chars[..start].iter().rev().find(|c| !c.is_whitespace()).copied();
            let next = chars[i..].iter().find(|c| !c.is_whitespace()).copied();

            if prev == Some('.') || RESERVED.contains(&word.as_str()) {
                out.push_str(&word);
            } else if let Some(op) = word_operator(&word) {
                out.push(' ');
                out.push_str(op);
                out.push(' ');
            } else if matches!(prev, Some('{') | Some(',')) && next == Some(':') {
                out.push_str(&word);
            } else {
                out.push_str(CONTEXT_PREFIX);
                out.push('.');
                out.push_str(&word);
            }
        } else {
            out.push(c);
            i += 1;
        }
    }
    out
}

/// Memoizes [`translate`] per raw expression text.
#[derive(Debug, Default)]
pub struct Translator {
    enabled: bool,
    cache: RefCell<HashMap<String, Rc<str>>>,
}

impl Translator {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            cache: RefCell::default(),
        }
    }

    pub fn translate(&self, expr: &str) -> Rc<str> {
        if !self.enabled {
            return translate(expr).into();
        }
        if let Some(hit) = self.cache.borrow().get(expr) {
            return hit.clone();
        }
        let translated: Rc<str> = translate(expr).into();
        self.cache.borrow_mut().insert(expr.to_string(), translated.clone());
        translated
    }

    pub fn cached(&self) -> usize {
        self.cache.borrow().len()
    }
}
