use std::cmp::Ordering;
use std::rc::Rc;

use super::{BinaryOp, EvalError, Expr, LogicalOp, UnaryOp};
use crate::value::{NativeFn, Value, ValueMap};

/// Largest precision `toFixed` accepts.
const MAX_FIXED_DIGITS: f64 = 100.0;

/// Resolves context variables during evaluation.
pub trait Lookup {
    fn lookup(&self, name: &str) -> Value;
}

impl Lookup for Value {
    fn lookup(&self, name: &str) -> Value {
        self.get(name)
    }
}

pub fn eval(expr: &Expr, scope: &dyn Lookup) -> Result<Value, EvalError> {
    Ok(match expr {
        Expr::Lit(v) => v.clone(),
        Expr::Var(name) => scope.lookup(name),
        Expr::Global(name) => global(name),
        Expr::Array(items) => Value::list(items.iter().map(|e| eval(e, scope)).collect::<Result<Vec<_>, _>>()?),
        Expr::Object(fields) => {
            let mut map = ValueMap::with_capacity(fields.len());
            for (k, e) in fields {
                map.insert(k.clone(), eval(e, scope)?);
            }
            Value::from(map)
        }
        Expr::Member(obj, prop) => eval(obj, scope)?.get(prop),
        Expr::Index(obj, idx) => {
            let obj = eval(obj, scope)?;
            obj.index(&eval(idx, scope)?)
        }
        Expr::Call(callee, args) => {
            let args = args.iter().map(|e| eval(e, scope)).collect::<Result<Vec<_>, _>>()?;
            match &**callee {
                Expr::Member(obj, method) => {
                    let receiver = eval(obj, scope)?;
                    match receiver.get(method) {
                        Value::Func(f) => f.call(&args)?,
                        _ => call_method(&receiver, method, &args)?,
                    }
                }
                other => match eval(other, scope)? {
                    Value::Func(f) => f.call(&args)?,
                    v => return Err(EvalError::NotCallable(v.to_string())),
                },
            }
        }
        Expr::Unary(op, operand) => {
            let v = eval(operand, scope)?;
            match op {
                UnaryOp::Not => Value::Bool(!v.truthy()),
                UnaryOp::Neg => Value::Number(-v.to_number()),
                UnaryOp::Plus => Value::Number(v.to_number()),
                UnaryOp::TypeOf => Value::from(match v {
                    Value::Null | Value::List(_) | Value::Map(_) => "object",
                    other => other.type_name(),
                }),
            }
        }
        Expr::Logical(op, lhs, rhs) => {
            let l = eval(lhs, scope)?;
            let short_circuits = match op {
                LogicalOp::And => !l.truthy(),
                LogicalOp::Or => l.truthy(),
                LogicalOp::Nullish => !l.is_nullish(),
            };
            if short_circuits { l } else { eval(rhs, scope)? }
        }
        Expr::Binary(op, lhs, rhs) => binary(*op, &eval(lhs, scope)?, &eval(rhs, scope)?),
        Expr::Cond(test, then, otherwise) => {
            if eval(test, scope)?.truthy() {
                eval(then, scope)?
            } else {
                eval(otherwise, scope)?
            }
        }
    })
}

fn binary(op: BinaryOp, l: &Value, r: &Value) -> Value {
    let num = |f: fn(f64, f64) -> f64| Value::Number(f(l.to_number(), r.to_number()));
    match op {
        BinaryOp::Add => match (l, r) {
            (Value::Number(_) | Value::Bool(_) | Value::Null | Value::Undefined, Value::Number(_) | Value::Bool(_) | Value::Null | Value::Undefined) => {
                num(|a, b| a + b)
            }
            _ => Value::from(format!("{l}{r}")),
        },
        BinaryOp::Sub => num(|a, b| a - b),
        BinaryOp::Mul => num(|a, b| a * b),
        BinaryOp::Div => num(|a, b| a / b),
        BinaryOp::Rem => num(|a, b| a % b),
        BinaryOp::Lt => Value::Bool(compare(l, r) == Some(Ordering::Less)),
        BinaryOp::Lte => Value::Bool(matches!(compare(l, r), Some(Ordering::Less | Ordering::Equal))),
        BinaryOp::Gt => Value::Bool(compare(l, r) == Some(Ordering::Greater)),
        BinaryOp::Gte => Value::Bool(matches!(compare(l, r), Some(Ordering::Greater | Ordering::Equal))),
        BinaryOp::Eq => Value::Bool(l.loose_eq(r)),
        BinaryOp::NotEq => Value::Bool(!l.loose_eq(r)),
        BinaryOp::StrictEq => Value::Bool(l.strict_eq(r)),
        BinaryOp::StrictNotEq => Value::Bool(!l.strict_eq(r)),
    }
}

fn compare(l: &Value, r: &Value) -> Option<Ordering> {
    match (l, r) {
        (Value::Str(a), Value::Str(b)) => Some(a.cmp(b)),
        _ => l.to_number().partial_cmp(&r.to_number()),
    }
}

fn arg(args: &[Value], i: usize) -> Value {
    args.get(i).cloned().unwrap_or_default()
}

fn call_method(receiver: &Value, method: &str, args: &[Value]) -> Result<Value, EvalError> {
    let v = match (receiver, method) {
        (Value::Str(s), "toUpperCase") => Value::from(s.to_uppercase()),
        (Value::Str(s), "toLowerCase") => Value::from(s.to_lowercase()),
        (Value::Str(s), "trim") => Value::from(s.trim()),
        (Value::Str(s), "includes") => Value::Bool(s.contains(&*arg(args, 0).to_string())),
        (Value::Str(s), "startsWith") => Value::Bool(s.starts_with(&*arg(args, 0).to_string())),
        (Value::Str(s), "endsWith") => Value::Bool(s.ends_with(&*arg(args, 0).to_string())),
        (Value::Str(s), "split") => {
            let sep = arg(args, 0).to_string();
            Value::list(s.split(sep.as_str()).map(Value::from))
        }
        (Value::List(items), "includes") => Value::Bool(items.iter().any(|v| v.strict_eq(&arg(args, 0)))),
        (Value::List(items), "indexOf") => {
            let needle = arg(args, 0);
            Value::Number(items.iter().position(|v| v.strict_eq(&needle)).map_or(-1.0, |i| i as f64))
        }
        (Value::List(items), "join") => {
            let sep = match arg(args, 0) {
                Value::Undefined => ",".to_string(),
                other => other.to_string(),
            };
            Value::from(items.iter().map(Value::to_string).collect::<Vec<_>>().join(&sep))
        }
        (Value::List(items), "slice") => {
            let len = items.len() as f64;
            let bound = |v: Value, default: f64| match v {
                Value::Undefined => default,
                v => {
                    let n = v.to_number();
                    if n < 0.0 { (len + n).max(0.0) } else { n.min(len) }
                }
            };
            let start = bound(arg(args, 0), 0.0) as usize;
            let end = bound(arg(args, 1), len) as usize;
            Value::list(items.get(start..end.max(start)).unwrap_or_default().iter().cloned())
        }
        (Value::Number(n), "toFixed") => {
            let digits = match arg(args, 0).to_number() {
                d if d.is_nan() => 0.0,
                d => d.trunc(),
            };
            if !(0.0..=MAX_FIXED_DIGITS).contains(&digits) {
                return Err(EvalError::Native(format!("toFixed() digits must be between 0 and 100, got {digits}")));
            }
            let digits = digits as usize;
            Value::from(format!("{n:.digits$}"))
        }
        _ => return Err(EvalError::NotCallable(format!("{}.{method}", receiver.type_name()))),
    };
    Ok(v)
}

fn math(f: fn(f64) -> f64) -> Value {
    Value::Func(NativeFn::new(move |args| Ok(Value::Number(f(arg(args, 0).to_number())))))
}

fn fold(init: f64, f: fn(f64, f64) -> f64) -> Value {
    Value::Func(NativeFn::new(move |args| {
        Ok(Value::Number(args.iter().fold(init, |acc, v| {
            let n = v.to_number();
            if acc.is_nan() || n.is_nan() { f64::NAN } else { f(acc, n) }
        })))
    }))
}

fn build_globals() -> ValueMap {
    let mut g = ValueMap::new();
    g.insert(
        "Math".into(),
        Value::map([
            ("max", fold(f64::NEG_INFINITY, f64::max)),
            ("min", fold(f64::INFINITY, f64::min)),
            ("floor", math(f64::floor)),
            ("ceil", math(f64::ceil)),
            ("round", math(|n| (n + 0.5).floor())),
            ("abs", math(f64::abs)),
        ]),
    );
    g.insert(
        "JSON".into(),
        Value::map([(
            "stringify",
            Value::Func(NativeFn::new(|args| Ok(Value::from(arg(args, 0).to_json().to_string())))),
        )]),
    );
    g.insert(
        "parseInt".into(),
        Value::Func(NativeFn::new(|args| {
            let text = arg(args, 0).to_string();
            let text = text.trim();
            let end = text
                .char_indices()
                .find(|&(i, c)| !(c.is_ascii_digit() || (i == 0 && (c == '-' || c == '+'))))
                .map_or(text.len(), |(i, _)| i);
            Ok(Value::Number(text[..end].parse::<i64>().map_or(f64::NAN, |n| n as f64)))
        })),
    );
    g.insert(
        "parseFloat".into(),
        Value::Func(NativeFn::new(|args| Ok(Value::Number(arg(args, 0).to_number())))),
    );
    g.insert(
        "isNaN".into(),
        Value::Func(NativeFn::new(|args| Ok(Value::Bool(arg(args, 0).to_number().is_nan())))),
    );
    g.insert(
        "Number".into(),
        Value::Func(NativeFn::new(|args| Ok(Value::Number(arg(args, 0).to_number())))),
    );
    g.insert(
        "String".into(),
        Value::Func(NativeFn::new(|args| Ok(Value::from(arg(args, 0).to_string())))),
    );
    g.insert(
        "Boolean".into(),
        Value::Func(NativeFn::new(|args| Ok(Value::Bool(arg(args, 0).truthy())))),
    );
    g.insert(
        "Object".into(),
        Value::map([(
            "keys",
            Value::Func(NativeFn::new(|args| {
                Ok(match arg(args, 0) {
                    Value::Map(m) => Value::list(m.keys().map(|k| Value::from(k.as_str()))),
                    Value::List(items) => Value::list((0..items.len()).map(|i| Value::from(i.to_string()))),
                    _ => Value::list([]),
                })
            })),
        )]),
    );
    g.insert(
        "Array".into(),
        Value::map([(
            "isArray",
            Value::Func(NativeFn::new(|args| Ok(Value::Bool(matches!(arg(args, 0), Value::List(_)))))),
        )]),
    );
    g
}

thread_local! {
    static GLOBALS: Rc<ValueMap> = Rc::new(build_globals());
}

fn global(name: &str) -> Value {
    GLOBALS.with(|g| g.get(name).cloned().unwrap_or_default())
}
