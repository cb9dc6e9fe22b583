//! Expression lexer, AST, parser and evaluator.
//!
//! One hook body is one expression.  Operator precedence (lowest first):
//!
//! | Level | Operators |
//! |-------|-----------|
//! | comma | `,` |
//! | assign | `=` `+=` `-=` `*=` `/=` `%=` (right assoc.) |
//! | ternary | `?:` |
//! | or | `\|\|` |
//! | and | `&&` |
//! | relational | `==` `!=` `<` `<=` `>` `>=` `=~` `!~` `=/` `!/` |
//! | additive | `+` `-` |
//! | multiplicative | `*` `/` `%` |
//! | unary | `-` `!` |
//! | primary | literal, variable, call, `( … )` |
//!
//! `=~` matches a glob (`*`, `?`), `=/` a regular expression.

use regex::Regex;

use super::value::Value;

// ── EvalContext ───────────────────────────────────────────────────────────────

/// What the evaluator needs from its host: variables and functions.
pub trait EvalContext {
    fn get_var(&self, name: &str) -> Option<Value>;

    fn set_var(&mut self, name: &str, value: Value);

    /// Invoke a built-in or host function.
    fn call_fn(&mut self, name: &str, args: Vec<Value>) -> Result<Value, String>;
}

// ── Token ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Int(i64),
    Float(f64),
    Str(String),
    Ident(String),
    /// Operator or punctuation, by its source spelling.
    Op(&'static str),
    Eof,
}

/// Operators, longest spelling first so that `==` is not read as `=` `=`.
const OPERATORS: &[&str] = &[
    "==", "!=", "<=", ">=", "=~", "!~", "=/", "!/", "&&", "||", "+=", "-=", "*=", "/=", "%=", "+",
    "-", "*", "/", "%", "!", "<", ">", "=", "?", ":", ",", "(", ")",
];

// ── Lexer ─────────────────────────────────────────────────────────────────────

struct Lexer<'a> {
    src: &'a str,
    pos: usize,
}

impl<'a> Lexer<'a> {
    fn new(src: &'a str) -> Self {
        Lexer { src, pos: 0 }
    }

    fn rest(&self) -> &'a str {
        &self.src[self.pos..]
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn take_while(&mut self, pred: impl Fn(char) -> bool) -> &'a str {
        let start = self.pos;
        while self.peek().is_some_and(&pred) {
            self.bump();
        }
        &self.src[start..self.pos]
    }

    fn number(&mut self) -> Result<Token, String> {
        let start = self.pos;
        if self.rest().starts_with("0x") || self.rest().starts_with("0X") {
            self.pos += 2;
            let digits = self.take_while(|c| c.is_ascii_hexdigit());
            return i64::from_str_radix(digits, 16)
                .map(Token::Int)
                .map_err(|e| format!("bad hex literal: {e}"));
        }

        self.take_while(|c| c.is_ascii_digit());
        let mut float = false;
        let mut after = self.rest().chars();
        if after.next() == Some('.') && after.next().is_some_and(|c| c.is_ascii_digit()) {
            float = true;
            self.bump();
            self.take_while(|c| c.is_ascii_digit());
        }
        if matches!(self.peek(), Some('e' | 'E')) {
            float = true;
            self.bump();
            if matches!(self.peek(), Some('+' | '-')) {
                self.bump();
            }
            self.take_while(|c| c.is_ascii_digit());
        }

        let text = &self.src[start..self.pos];
        if float {
            text.parse().map(Token::Float).map_err(|e| format!("bad number {text}: {e}"))
        } else {
            text.parse().map(Token::Int).map_err(|e| format!("bad number {text}: {e}"))
        }
    }

    fn string(&mut self, quote: char) -> Result<Token, String> {
        let mut s = String::new();
        loop {
            match self.bump() {
                None => return Err("unterminated string".into()),
                Some('\\') => match self.bump() {
                    Some('n') => s.push('\n'),
                    Some('t') => s.push('\t'),
                    Some('r') => s.push('\r'),
                    Some('0') => s.push('\0'),
                    Some(c) => s.push(c),
                    None => return Err("unterminated string".into()),
                },
                Some(c) if c == quote => return Ok(Token::Str(s)),
                Some(c) => s.push(c),
            }
        }
    }

    fn next_token(&mut self) -> Result<Token, String> {
        self.take_while(char::is_whitespace);
        let Some(c) = self.peek() else {
            return Ok(Token::Eof);
        };

        if c.is_ascii_digit() {
            return self.number();
        }
        if c == '"' || c == '\'' {
            self.bump();
            return self.string(c);
        }
        if c.is_alphabetic() || c == '_' {
            let ident = self.take_while(|c| c.is_alphanumeric() || c == '_');
            return Ok(Token::Ident(ident.to_owned()));
        }
        if let Some(op) = OPERATORS.iter().find(|op| self.rest().starts_with(**op)) {
            self.pos += op.len();
            return Ok(Token::Op(*op));
        }
        Err(format!("unexpected character {c:?}"))
    }

    fn tokenize(mut self) -> Result<Vec<Token>, String> {
        let mut tokens = Vec::new();
        loop {
            let t = self.next_token()?;
            let done = t == Token::Eof;
            tokens.push(t);
            if done {
                return Ok(tokens);
            }
        }
    }
}

// ── AST ───────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
    GlobMatch,
    NotGlobMatch,
    RegexMatch,
    NotRegexMatch,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Not,
}

/// `=` or a compound assignment's arithmetic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignOp {
    Set,
    Add,
    Sub,
    Mul,
    Div,
    Rem,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Value),
    Var(String),
    Unary(UnaryOp, Box<Expr>),
    Binary(BinOp, Box<Expr>, Box<Expr>),
    Ternary(Box<Expr>, Box<Expr>, Box<Expr>),
    Assign(String, AssignOp, Box<Expr>),
    Call(String, Vec<Expr>),
    Comma(Vec<Expr>),
}

impl Expr {
    /// `true` for an assignment (or a comma list ending in one), whose value
    /// is not written to the output.
    pub fn is_assignment(&self) -> bool {
        match self {
            Expr::Assign(..) => true,
            Expr::Comma(list) => list.last().is_some_and(Expr::is_assignment),
            _ => false,
        }
    }
}

fn binop(op: &str) -> Option<(BinOp, u8)> {
    Some(match op {
        "||" => (BinOp::Or, 1),
        "&&" => (BinOp::And, 2),
        "==" => (BinOp::Eq, 3),
        "!=" => (BinOp::Ne, 3),
        "<" => (BinOp::Lt, 3),
        "<=" => (BinOp::Le, 3),
        ">" => (BinOp::Gt, 3),
        ">=" => (BinOp::Ge, 3),
        "=~" => (BinOp::GlobMatch, 3),
        "!~" => (BinOp::NotGlobMatch, 3),
        "=/" => (BinOp::RegexMatch, 3),
        "!/" => (BinOp::NotRegexMatch, 3),
        "+" => (BinOp::Add, 4),
        "-" => (BinOp::Sub, 4),
        "*" => (BinOp::Mul, 5),
        "/" => (BinOp::Div, 5),
        "%" => (BinOp::Rem, 5),
        _ => return None,
    })
}

fn assign_op(op: &str) -> Option<AssignOp> {
    Some(match op {
        "=" => AssignOp::Set,
        "+=" => AssignOp::Add,
        "-=" => AssignOp::Sub,
        "*=" => AssignOp::Mul,
        "/=" => AssignOp::Div,
        "%=" => AssignOp::Rem,
        _ => return None,
    })
}

// ── Parser ────────────────────────────────────────────────────────────────────

static EOF: Token = Token::Eof;

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> &Token {
        self.tokens.get(self.pos).unwrap_or(&EOF)
    }

    fn peek_op(&self) -> Option<&'static str> {
        match self.peek() {
            Token::Op(op) => Some(*op),
            _ => None,
        }
    }

    fn advance(&mut self) -> Token {
        let t = self.peek().clone();
        self.pos += 1;
        t
    }

    fn eat_op(&mut self, op: &str) -> bool {
        if self.peek_op() == Some(op) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect_op(&mut self, op: &str, context: &str) -> Result<(), String> {
        if self.eat_op(op) {
            Ok(())
        } else {
            Err(format!("expected '{op}' {context}, found {}", describe(self.peek())))
        }
    }

    fn comma(&mut self) -> Result<Expr, String> {
        let first = self.assign()?;
        if self.peek_op() != Some(",") {
            return Ok(first);
        }
        let mut list = vec![first];
        while self.eat_op(",") {
            list.push(self.assign()?);
        }
        Ok(Expr::Comma(list))
    }

    fn assign(&mut self) -> Result<Expr, String> {
        if let Token::Ident(name) = self.peek() {
            let op = match self.tokens.get(self.pos + 1) {
                Some(Token::Op(op)) => assign_op(op),
                _ => None,
            };
            if let Some(op) = op {
                let name = name.clone();
                self.pos += 2;
                let rhs = self.assign()?;
                return Ok(Expr::Assign(name, op, Box::new(rhs)));
            }
        }
        self.ternary()
    }

    fn ternary(&mut self) -> Result<Expr, String> {
        let cond = self.binary(1)?;
        if !self.eat_op("?") {
            return Ok(cond);
        }
        let then = self.assign()?;
        self.expect_op(":", "in ternary")?;
        let otherwise = self.assign()?;
        Ok(Expr::Ternary(Box::new(cond), Box::new(then), Box::new(otherwise)))
    }

    /// Precedence climbing over the left-associative binary operators.
    fn binary(&mut self, min_prec: u8) -> Result<Expr, String> {
        let mut lhs = self.unary()?;
        while let Some((op, prec)) = self.peek_op().and_then(binop) {
            if prec < min_prec {
                break;
            }
            self.pos += 1;
            let rhs = self.binary(prec + 1)?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn unary(&mut self) -> Result<Expr, String> {
        let op = match self.peek_op() {
            Some("-") => UnaryOp::Neg,
            Some("!") => UnaryOp::Not,
            Some("+") => {
                self.pos += 1;
                return self.unary();
            }
            _ => return self.primary(),
        };
        self.pos += 1;
        Ok(Expr::Unary(op, Box::new(self.unary()?)))
    }

    fn primary(&mut self) -> Result<Expr, String> {
        match self.advance() {
            Token::Int(n) => Ok(Expr::Literal(Value::Int(n))),
            Token::Float(x) => Ok(Expr::Literal(Value::Float(x))),
            Token::Str(s) => Ok(Expr::Literal(Value::Str(s))),
            Token::Ident(name) => {
                if !self.eat_op("(") {
                    return Ok(Expr::Var(name));
                }
                let mut args = Vec::new();
                if !self.eat_op(")") {
                    loop {
                        args.push(self.assign()?);
                        if self.eat_op(")") {
                            break;
                        }
                        self.expect_op(",", &format!("in arguments to {name}"))?;
                    }
                }
                Ok(Expr::Call(name, args))
            }
            Token::Op("(") => {
                let inner = self.comma()?;
                self.expect_op(")", "to close '('")?;
                Ok(inner)
            }
            other => Err(format!("unexpected {}", describe(&other))),
        }
    }
}

fn describe(t: &Token) -> String {
    match t {
        Token::Int(n) => format!("number {n}"),
        Token::Float(x) => format!("number {x}"),
        Token::Str(s) => format!("string {s:?}"),
        Token::Ident(s) => format!("name {s}"),
        Token::Op(op) => format!("'{op}'"),
        Token::Eof => "end of expression".into(),
    }
}

/// Parse an expression.  The whole input must be consumed.
pub fn parse_expr(src: &str) -> Result<Expr, String> {
    let tokens = Lexer::new(src).tokenize()?;
    let mut parser = Parser { tokens, pos: 0 };
    let expr = parser.comma()?;
    if *parser.peek() != Token::Eof {
        return Err(format!("unexpected {} after expression", describe(parser.peek())));
    }
    Ok(expr)
}

// ── Evaluator ─────────────────────────────────────────────────────────────────

pub fn eval_expr(expr: &Expr, ctx: &mut dyn EvalContext) -> Result<Value, String> {
    match expr {
        Expr::Literal(v) => Ok(v.clone()),

        Expr::Var(name) => ctx.get_var(name).ok_or_else(|| format!("undefined variable {name}")),

        Expr::Unary(op, inner) => {
            let v = eval_expr(inner, ctx)?;
            Ok(match op {
                UnaryOp::Neg => v.arith_neg(),
                UnaryOp::Not => Value::from(!v.as_bool()),
            })
        }

        Expr::Binary(BinOp::And, lhs, rhs) => {
            let ok = eval_expr(lhs, ctx)?.as_bool() && eval_expr(rhs, ctx)?.as_bool();
            Ok(Value::from(ok))
        }
        Expr::Binary(BinOp::Or, lhs, rhs) => {
            let ok = eval_expr(lhs, ctx)?.as_bool() || eval_expr(rhs, ctx)?.as_bool();
            Ok(Value::from(ok))
        }
        Expr::Binary(op, lhs, rhs) => {
            let l = eval_expr(lhs, ctx)?;
            let r = eval_expr(rhs, ctx)?;
            eval_binop(*op, &l, &r)
        }

        Expr::Ternary(cond, then, otherwise) => {
            if eval_expr(cond, ctx)?.as_bool() {
                eval_expr(then, ctx)
            } else {
                eval_expr(otherwise, ctx)
            }
        }

        Expr::Assign(name, op, rhs) => {
            let rval = eval_expr(rhs, ctx)?;
            let value = match op {
                AssignOp::Set => rval,
                _ => {
                    let cur = ctx.get_var(name).unwrap_or_default();
                    match op {
                        AssignOp::Add => cur.arith_add(&rval),
                        AssignOp::Sub => cur.arith_sub(&rval),
                        AssignOp::Mul => cur.arith_mul(&rval),
                        AssignOp::Div => cur.arith_div(&rval)?,
                        AssignOp::Rem => cur.arith_rem(&rval)?,
                        AssignOp::Set => rval,
                    }
                }
            };
            ctx.set_var(name, value.clone());
            Ok(value)
        }

        Expr::Call(name, arg_exprs) => {
            let args = arg_exprs.iter().map(|e| eval_expr(e, ctx)).collect::<Result<Vec<_>, _>>()?;
            ctx.call_fn(name, args)
        }

        Expr::Comma(list) => {
            let mut last = Value::default();
            for e in list {
                last = eval_expr(e, ctx)?;
            }
            Ok(last)
        }
    }
}

fn eval_binop(op: BinOp, l: &Value, r: &Value) -> Result<Value, String> {
    use std::cmp::Ordering::{Equal, Greater, Less};

    let ord = || l.cmp_value(r);
    Ok(match op {
        BinOp::Add => l.arith_add(r),
        BinOp::Sub => l.arith_sub(r),
        BinOp::Mul => l.arith_mul(r),
        BinOp::Div => l.arith_div(r)?,
        BinOp::Rem => l.arith_rem(r)?,
        BinOp::Eq => Value::from(ord() == Equal),
        BinOp::Ne => Value::from(ord() != Equal),
        BinOp::Lt => Value::from(ord() == Less),
        BinOp::Le => Value::from(ord() != Greater),
        BinOp::Gt => Value::from(ord() == Greater),
        BinOp::Ge => Value::from(ord() != Less),
        BinOp::GlobMatch => Value::from(glob_match(&r.as_str(), &l.as_str())),
        BinOp::NotGlobMatch => Value::from(!glob_match(&r.as_str(), &l.as_str())),
        BinOp::RegexMatch => Value::from(regex_match(&r.as_str(), &l.as_str())?),
        BinOp::NotRegexMatch => Value::from(!regex_match(&r.as_str(), &l.as_str())?),
        BinOp::And | BinOp::Or => unreachable!("short-circuit operators are evaluated lazily"),
    })
}

// ── Matching ──────────────────────────────────────────────────────────────────

/// Whole-string glob match: `*` any run, `?` any one character.
pub fn glob_match(pattern: &str, text: &str) -> bool {
    let p: Vec<char> = pattern.chars().collect();
    let t: Vec<char> = text.chars().collect();
    let (mut pi, mut ti) = (0, 0);
    // Last `*` seen and the text position it is currently absorbing up to.
    let mut star: Option<(usize, usize)> = None;

    while ti < t.len() {
        match p.get(pi) {
            Some('*') => {
                star = Some((pi, ti));
                pi += 1;
            }
            Some(&c) if c == '?' || c == t[ti] => {
                pi += 1;
                ti += 1;
            }
            _ => match star {
                Some((sp, st)) => {
                    pi = sp + 1;
                    ti = st + 1;
                    star = Some((sp, st + 1));
                }
                None => return false,
            },
        }
    }
    p[pi..].iter().all(|&c| c == '*')
}

/// Unanchored regular expression search.
pub fn regex_match(pattern: &str, text: &str) -> Result<bool, String> {
    let re = Regex::new(pattern).map_err(|e| format!("bad regex {pattern:?}: {e}"))?;
    Ok(re.is_match(text))
}

/// Parse and evaluate in one step.
pub fn eval_str(src: &str, ctx: &mut dyn EvalContext) -> Result<Value, String> {
    let expr = parse_expr(src)?;
    eval_expr(&expr, ctx)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
