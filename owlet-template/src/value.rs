//! Dynamic values flowing through template expressions.

use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;
use owlet_dom::Key;

use crate::expr::EvalError;

pub type ValueMap = IndexMap<String, Value>;

/// A native function callable from expressions.
#[derive(Clone)]
pub struct NativeFn(Rc<dyn Fn(&[Value]) -> Result<Value, EvalError>>);

impl NativeFn {
    pub fn new(f: impl Fn(&[Value]) -> Result<Value, EvalError> + 'static) -> Self {
        NativeFn(Rc::new(f))
    }

    pub fn call(&self, args: &[Value]) -> Result<Value, EvalError> {
        (self.0)(args)
    }

    pub fn ptr_eq(&self, other: &NativeFn) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for NativeFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NativeFn({:p})", Rc::as_ptr(&self.0))
    }
}

#[derive(Debug, Clone, Default)]
pub enum Value {
    #[default]
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    Str(Rc<str>),
    List(Rc<Vec<Value>>),
    Map(Rc<ValueMap>),
    Func(NativeFn),
}

impl Value {
    pub fn str(s: impl Into<Rc<str>>) -> Self {
        Value::Str(s.into())
    }

    pub fn list(items: impl IntoIterator<Item = Value>) -> Self {
        Value::List(Rc::new(items.into_iter().collect()))
    }

    pub fn map<K: Into<String>>(entries: impl IntoIterator<Item = (K, Value)>) -> Self {
        Value::Map(Rc::new(entries.into_iter().map(|(k, v)| (k.into(), v)).collect()))
    }

    pub fn is_nullish(&self) -> bool {
        matches!(self, Value::Undefined | Value::Null)
    }

    pub fn truthy(&self) -> bool {
        match self {
            Value::Undefined | Value::Null => false,
            Value::Bool(b) => *b,
            Value::Number(n) => *n != 0.0 && !n.is_nan(),
            Value::Str(s) => !s.is_empty(),
            Value::List(_) | Value::Map(_) | Value::Func(_) => true,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Undefined => "undefined",
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Number(_) => "number",
            Value::Str(_) => "string",
            Value::List(_) => "list",
            Value::Map(_) => "object",
            Value::Func(_) => "function",
        }
    }

    pub fn to_number(&self) -> f64 {
        match self {
            Value::Null => 0.0,
            Value::Bool(b) => f64::from(u8::from(*b)),
            Value::Number(n) => *n,
            Value::Str(s) => {
                let s = s.trim();
                if s.is_empty() { 0.0 } else { s.parse().unwrap_or(f64::NAN) }
            }
            Value::Undefined | Value::List(_) | Value::Map(_) | Value::Func(_) => f64::NAN,
        }
    }

    /// Reads a property the way member access does: map fields, `length`, list indices.
    pub fn get(&self, prop: &str) -> Value {
        match self {
            Value::Map(m) => m.get(prop).cloned().unwrap_or_default(),
            Value::List(items) if prop == "length" => Value::Number(items.len() as f64),
            Value::List(items) => prop.parse::<usize>().ok().and_then(|i| items.get(i).cloned()).unwrap_or_default(),
            Value::Str(s) if prop == "length" => Value::Number(s.chars().count() as f64),
            _ => Value::Undefined,
        }
    }

    pub fn index(&self, key: &Value) -> Value {
        match (self, key) {
            (Value::List(items), Value::Number(n)) if *n >= 0.0 && n.fract() == 0.0 => {
                items.get(*n as usize).cloned().unwrap_or_default()
            }
            (Value::Str(s), Value::Number(n)) if *n >= 0.0 && n.fract() == 0.0 => s
                .chars()
                .nth(*n as usize)
                .map(|c| Value::str(c.to_string()))
                .unwrap_or_default(),
            _ => self.get(&key.to_string()),
        }
    }

    /// Strict equality. Lists, maps and functions compare by identity.
    pub fn strict_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Undefined, Value::Undefined) | (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::List(a), Value::List(b)) => Rc::ptr_eq(a, b),
            (Value::Map(a), Value::Map(b)) => Rc::ptr_eq(a, b),
            (Value::Func(a), Value::Func(b)) => a.ptr_eq(b),
            _ => false,
        }
    }

    /// Loose equality with the usual nullish and numeric coercions.
    pub fn loose_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (a, b) if a.is_nullish() || b.is_nullish() => a.is_nullish() && b.is_nullish(),
            (Value::Number(_) | Value::Bool(_), Value::Str(_) | Value::Bool(_) | Value::Number(_))
            | (Value::Str(_), Value::Number(_) | Value::Bool(_)) => self.to_number() == other.to_number(),
            _ => self.strict_eq(other),
        }
    }

    pub fn to_key(&self) -> Key {
        match self {
            Value::Number(n) if n.fract() == 0.0 && n.abs() < 9.0e15 => Key::Int(*n as i64),
            Value::Str(s) => Key::Str(s.clone()),
            other => Key::from(other.to_string()),
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Undefined | Value::Null | Value::Func(_) => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Number(n) => serde_json::Number::from_f64(*n).map_or(serde_json::Value::Null, serde_json::Value::Number),
            Value::Str(s) => serde_json::Value::String(s.to_string()),
            Value::List(items) => serde_json::Value::Array(items.iter().map(Value::to_json).collect()),
            Value::Map(m) => serde_json::Value::Object(m.iter().map(|(k, v)| (k.clone(), v.to_json())).collect()),
        }
    }
}

/// Structural equality, used to compare widget props between renders.
impl PartialEq for Value {
    fn eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::List(a), Value::List(b)) => Rc::ptr_eq(a, b) || a == b,
            (Value::Map(a), Value::Map(b)) => Rc::ptr_eq(a, b) || a == b,
            _ => self.strict_eq(other),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Undefined => f.write_str("undefined"),
            Value::Null => f.write_str("null"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Number(n) => fmt_number(*n, f),
            Value::Str(s) => f.write_str(s),
            Value::List(items) => {
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(",")?;
                    }
                    if !item.is_nullish() {
                        write!(f, "{item}")?;
                    }
                }
                Ok(())
            }
            Value::Map(_) => f.write_str("[object Object]"),
            Value::Func(_) => f.write_str("function"),
        }
    }
}

fn fmt_number(n: f64, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    if n.is_nan() {
        f.write_str("NaN")
    } else if n.is_infinite() {
        f.write_str(if n > 0.0 { "Infinity" } else { "-Infinity" })
    } else if n.fract() == 0.0 && n.abs() < 1e21 {
        write!(f, "{}", n as i64)
    } else {
        write!(f, "{n}")
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Number(n as f64)
    }
}

impl From<usize> for Value {
    fn from(n: usize) -> Self {
        Value::Number(n as f64)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.into())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s.into())
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::List(Rc::new(items))
    }
}

impl From<ValueMap> for Value {
    fn from(map: ValueMap) -> Self {
        Value::Map(Rc::new(map))
    }
}

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => Value::Number(n.as_f64().unwrap_or(f64::NAN)),
            serde_json::Value::String(s) => Value::from(s),
            serde_json::Value::Array(items) => Value::list(items.into_iter().map(Value::from)),
            serde_json::Value::Object(fields) => Value::map(fields.into_iter().map(|(k, v)| (k, Value::from(v)))),
        }
    }
}
