use std::rc::Rc;

use super::translate::CONTEXT_PREFIX;
use super::{BinaryOp, Expr, LogicalOp, UnaryOp};
use crate::value::Value;

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Num(f64),
    Str(String),
    Ident(String),
    Punct(&'static str),
}

const PUNCTUATION: &[&str] = &[
    "===", "!==", "==", "!=", "<=", ">=", "&&", "||", "??", "(", ")", "[", "]", "{", "}", ",", ".", "?", ":", "!", "+",
    "-", "*", "/", "%", "<", ">",
];

fn tokenize(src: &str) -> Result<Vec<Token>, String> {
    let chars: Vec<char> = src.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;
    'outer: while i < chars.len() {
        let c = chars[i];
        if c.is_whitespace() {
            i += 1;
        } else if c.is_ascii_digit() || (c == '.' && chars.get(i + 1).is_some_and(char::is_ascii_digit)) {
            let start = i;
            while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                i += 1;
            }
            let text: String = chars[start..i].iter().collect();
            let n = text.parse().map_err(|_| format!("invalid number '{text}'"))?;
            tokens.push(Token::Num(n));
        } else if c == '\'' || c == '"' {
            i += 1;
            let mut s = String::new();
            loop {
                match chars.get(i) {
                    None => return Err("unterminated string".into()),
                    Some(&q) if q == c => break,
                    Some('\\') => {
                        i += 1;
                        match chars.get(i) {
                            Some('n') => s.push('\n'),
                            Some('t') => s.push('\t'),
                            Some(&other) => s.push(other),
                            None => return Err("unterminated string".into()),
                        }
                    }
                    Some(&other) => s.push(other),
                }
                i += 1;
            }
            i += 1;
            tokens.push(Token::Str(s));
        } else if c.is_ascii_alphabetic() || c == '_' || c == '$' {
            let start = i;
            while i < chars.len() && (chars[i].is_ascii_alphanumeric() || chars[i] == '_' || chars[i] == '$') {
                i += 1;
            }
            tokens.push(Token::Ident(chars[start..i].iter().collect()));
        } else {
            for p in PUNCTUATION {
                if p.chars().enumerate().all(|(k, pc)| chars.get(i + k) == Some(&pc)) {
                    tokens.push(Token::Punct(*p));
                    i += p.len();
                    continue 'outer;
                }
            }
            return Err(format!("unexpected character '{c}'"));
        }
    }
    Ok(tokens)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

/// Binding power of infix operators; higher binds tighter.
fn infix_power(tok: &Token) -> Option<u8> {
    let Token::Punct(p) = tok else {
        return None;
    };
    Some(match *p {
        "?" => 1,
        "??" => 2,
        "||" => 3,
        "&&" => 4,
        "==" | "!=" | "===" | "!==" => 5,
        "<" | "<=" | ">" | ">=" => 6,
        "+" | "-" => 7,
        "*" | "/" | "%" => 8,
        _ => return None,
    })
}

const PREFIX_POWER: u8 = 9;

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let tok = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        tok
    }

    fn eat(&mut self, punct: &str) -> bool {
        if matches!(self.peek(), Some(Token::Punct(p)) if *p == punct) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, punct: &str) -> Result<(), String> {
        if self.eat(punct) {
            Ok(())
        } else {
            Err(format!("expected '{punct}', found {}", describe(self.peek())))
        }
    }

    fn ident(&mut self) -> Result<String, String> {
        match self.next() {
            Some(Token::Ident(name)) => Ok(name),
            other => Err(format!("expected a name, found {}", describe(other.as_ref()))),
        }
    }

    fn expr(&mut self, min_power: u8) -> Result<Expr, String> {
        let mut lhs = self.prefix()?;
        while let Some(power) = self.peek().and_then(infix_power) {
            if power < min_power {
                break;
            }
            let Some(Token::Punct(op)) = self.next() else {
                break;
            };
            lhs = if op == "?" {
                let then = self.expr(0)?;
                self.expect(":")?;
                let otherwise = self.expr(power)?;
                Expr::Cond(Box::new(lhs), Box::new(then), Box::new(otherwise))
            } else {
                let rhs = self.expr(power + 1)?;
                binary(op, lhs, rhs)
            };
        }
        Ok(lhs)
    }

    fn prefix(&mut self) -> Result<Expr, String> {
        let op = match self.peek() {
            Some(Token::Punct("!")) => Some(UnaryOp::Not),
            Some(Token::Punct("-")) => Some(UnaryOp::Neg),
            Some(Token::Punct("+")) => Some(UnaryOp::Plus),
            Some(Token::Ident(w)) if w == "typeof" => Some(UnaryOp::TypeOf),
            _ => None,
        };
        if let Some(op) = op {
            self.pos += 1;
            let operand = self.expr(PREFIX_POWER)?;
            return Ok(Expr::Unary(op, Box::new(operand)));
        }
        let primary = self.primary()?;
        self.postfix(primary)
    }

    fn postfix(&mut self, mut e: Expr) -> Result<Expr, String> {
        loop {
            if self.eat(".") {
                let prop = self.ident()?;
                e = Expr::Member(Box::new(e), prop.into());
            } else if self.eat("[") {
                let index = self.expr(0)?;
                self.expect("]")?;
                e = Expr::Index(Box::new(e), Box::new(index));
            } else if self.eat("(") {
                let args = self.list(")")?;
                e = Expr::Call(Box::new(e), args);
            } else {
                return Ok(e);
            }
        }
    }

    fn list(&mut self, close: &str) -> Result<Vec<Expr>, String> {
        let mut items = Vec::new();
        while !self.eat(close) {
            items.push(self.expr(0)?);
            if !self.eat(",") {
                self.expect(close)?;
                break;
            }
        }
        Ok(items)
    }

    fn primary(&mut self) -> Result<Expr, String> {
        match self.next() {
            Some(Token::Num(n)) => Ok(Expr::Lit(Value::Number(n))),
            Some(Token::Str(s)) => Ok(Expr::Lit(Value::from(s))),
            Some(Token::Punct("(")) => {
                let e = self.expr(0)?;
                self.expect(")")?;
                Ok(e)
            }
            Some(Token::Punct("[")) => Ok(Expr::Array(self.list("]")?)),
            Some(Token::Punct("{")) => {
                let mut fields = Vec::new();
                while !self.eat("}") {
                    let key = match self.next() {
                        Some(Token::Ident(k) | Token::Str(k)) => k,
                        other => return Err(format!("expected an object key, found {}", describe(other.as_ref()))),
                    };
                    self.expect(":")?;
                    fields.push((key, self.expr(0)?));
                    if !self.eat(",") {
                        self.expect("}")?;
                        break;
                    }
                }
                Ok(Expr::Object(fields))
            }
            Some(Token::Ident(word)) => match word.as_str() {
                "true" => Ok(Expr::Lit(Value::Bool(true))),
                "false" => Ok(Expr::Lit(Value::Bool(false))),
                "null" => Ok(Expr::Lit(Value::Null)),
                "undefined" | "this" => Ok(Expr::Lit(Value::Undefined)),
                w if w == CONTEXT_PREFIX => {
                    self.expect(".")?;
                    Ok(Expr::Var(self.ident()?.into()))
                }
                "in" | "of" | "new" => Err(format!("'{word}' is not supported")),
                _ => Ok(Expr::Global(Rc::from(word))),
            },
            other => Err(format!("unexpected {}", describe(other.as_ref()))),
        }
    }
}

fn binary(op: &str, lhs: Expr, rhs: Expr) -> Expr {
    let (l, r) = (Box::new(lhs), Box::new(rhs));
    let logical = match op {
        "&&" => Some(LogicalOp::And),
        "||" => Some(LogicalOp::Or),
        "??" => Some(LogicalOp::Nullish),
        _ => None,
    };
    if let Some(op) = logical {
        return Expr::Logical(op, l, r);
    }
    let op = match op {
        "+" => BinaryOp::Add,
        "-" => BinaryOp::Sub,
        "*" => BinaryOp::Mul,
        "/" => BinaryOp::Div,
        "%" => BinaryOp::Rem,
        "<" => BinaryOp::Lt,
        "<=" => BinaryOp::Lte,
        ">" => BinaryOp::Gt,
        ">=" => BinaryOp::Gte,
        "==" => BinaryOp::Eq,
        "!=" => BinaryOp::NotEq,
        "===" => BinaryOp::StrictEq,
        _ => BinaryOp::StrictNotEq,
    };
    Expr::Binary(op, l, r)
}

fn describe(tok: Option<&Token>) -> String {
    match tok {
        None => "end of input".into(),
        Some(Token::Num(n)) => format!("number {n}"),
        Some(Token::Str(s)) => format!("string '{s}'"),
        Some(Token::Ident(w)) => format!("'{w}'"),
        Some(Token::Punct(p)) => format!("'{p}'"),
    }
}

/// Parses translated expression text into an [`Expr`].
pub fn parse(src: &str) -> Result<Expr, String> {
    let tokens = tokenize(src)?;
    if tokens.is_empty() {
        return Err("empty expression".into());
    }
    let mut parser = Parser { tokens, pos: 0 };
    let expr = parser.expr(0)?;
    match parser.peek() {
        None => Ok(expr),
        Some(tok) => Err(format!("unexpected {} after expression", describe(Some(tok)))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn var(name: &str) -> Box<Expr> {
        Box::new(Expr::Var(name.into()))
    }

    #[test]
    fn precedence_and_member_access() {
        let e = parse("ctx.a + ctx.b.c * 2").unwrap();
        assert_eq!(
            e,
            Expr::Binary(
                BinaryOp::Add,
                var("a"),
                Box::new(Expr::Binary(
                    BinaryOp::Mul,
                    Box::new(Expr::Member(var("b"), "c".into())),
                    Box::new(Expr::Lit(Value::Number(2.0)))
                ))
            )
        );
    }

    #[test]
    fn ternary_is_right_associative() {
        let e = parse("ctx.a ? 1 : ctx.b ? 2 : 3").unwrap();
        let Expr::Cond(_, _, otherwise) = e else {
            panic!("expected a conditional");
        };
        assert!(matches!(*otherwise, Expr::Cond(..)));
    }

    #[test]
    fn rejects_trailing_tokens() {
        assert!(parse("ctx.a ctx.b").is_err());
        assert!(parse("").is_err());
        assert!(parse("'open").is_err());
    }
}
