//! Arithmetic expressions carried by symbolic instruction parameters.
//!
//! A string parameter such as `"2*theta + pi/4"` is parsed into an [`Expr`]
//! tree and evaluated against a [`SymbolTable`] binding the declared
//! variables of a function to concrete values.

use std::fmt;

use logos::Logos;
use rustc_hash::FxHashMap;

use crate::error::{IrError, IrResult};

/// Tokens of the expression language.
#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\r\n]+")]
enum Token {
    #[regex(r"[0-9]+(\.[0-9]*)?([eE][+-]?[0-9]+)?", |lex| lex.slice().parse::<f64>().ok())]
    #[regex(r"\.[0-9]+([eE][+-]?[0-9]+)?", |lex| lex.slice().parse::<f64>().ok())]
    Number(f64),

    #[regex(r"[a-zA-Z_][a-zA-Z0-9_]*", |lex| lex.slice().to_string())]
    Identifier(String),

    #[token("+")]
    Plus,

    #[token("-")]
    Minus,

    #[token("*")]
    Star,

    #[token("/")]
    Slash,

    #[token("^")]
    #[token("**")]
    Caret,

    #[token("(")]
    LParen,

    #[token(")")]
    RParen,
}

/// Built-in unary functions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Func {
    Sin,
    Cos,
    Tan,
    Exp,
    Ln,
    Log,
    Sqrt,
    Abs,
}

impl Func {
    fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "sin" => Func::Sin,
            "cos" => Func::Cos,
            "tan" => Func::Tan,
            "exp" => Func::Exp,
            "ln" => Func::Ln,
            "log" => Func::Log,
            "sqrt" => Func::Sqrt,
            "abs" => Func::Abs,
            _ => return None,
        })
    }

    fn name(self) -> &'static str {
        match self {
            Func::Sin => "sin",
            Func::Cos => "cos",
            Func::Tan => "tan",
            Func::Exp => "exp",
            Func::Ln => "ln",
            Func::Log => "log",
            Func::Sqrt => "sqrt",
            Func::Abs => "abs",
        }
    }

    fn apply(self, x: f64) -> f64 {
        match self {
            Func::Sin => x.sin(),
            Func::Cos => x.cos(),
            Func::Tan => x.tan(),
            Func::Exp => x.exp(),
            Func::Ln => x.ln(),
            Func::Log => x.log10(),
            Func::Sqrt => x.sqrt(),
            Func::Abs => x.abs(),
        }
    }
}

/// A parsed arithmetic expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// A numeric literal or named constant.
    Constant(f64),
    /// A free variable.
    Symbol(String),
    /// Negation.
    Neg(Box<Expr>),
    /// Addition.
    Add(Box<Expr>, Box<Expr>),
    /// Subtraction.
    Sub(Box<Expr>, Box<Expr>),
    /// Multiplication.
    Mul(Box<Expr>, Box<Expr>),
    /// Division.
    Div(Box<Expr>, Box<Expr>),
    /// Exponentiation.
    Pow(Box<Expr>, Box<Expr>),
    /// Built-in function call.
    Call(Func, Box<Expr>),
}

/// Variable bindings used during evaluation.
#[derive(Debug, Clone, Default)]
pub struct SymbolTable {
    values: FxHashMap<String, f64>,
}

impl SymbolTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `name` to `value`, replacing any previous binding.
    pub fn insert(&mut self, name: impl Into<String>, value: f64) {
        self.values.insert(name.into(), value);
    }

    /// Look up a binding.
    pub fn get(&self, name: &str) -> Option<f64> {
        self.values.get(name).copied()
    }

    /// Number of bindings.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// True if nothing is bound.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl<S: Into<String>> FromIterator<(S, f64)> for SymbolTable {
    fn from_iter<I: IntoIterator<Item = (S, f64)>>(iter: I) -> Self {
        let mut table = SymbolTable::new();
        for (name, value) in iter {
            table.insert(name, value);
        }
        table
    }
}

impl Expr {
    /// Parse an expression from text.
    pub fn parse(source: &str) -> IrResult<Expr> {
        let mut tokens = Vec::new();
        let mut lexer = Token::lexer(source);
        while let Some(result) = lexer.next() {
            match result {
                Ok(token) => tokens.push(token),
                Err(()) => {
                    return Err(IrError::expression(
                        source,
                        format!("invalid token '{}'", lexer.slice()),
                    ));
                }
            }
        }

        let mut parser = Parser {
            source,
            tokens,
            pos: 0,
        };
        let expr = parser.parse_binary_expr(0)?;
        if let Some(token) = parser.peek() {
            return Err(IrError::expression(
                source,
                format!("unexpected trailing token {token:?}"),
            ));
        }
        Ok(expr)
    }

    /// Free variables in first-occurrence order, without duplicates.
    pub fn symbols(&self) -> Vec<String> {
        let mut out = Vec::new();
        self.collect_symbols(&mut out);
        out
    }

    fn collect_symbols(&self, out: &mut Vec<String>) {
        match self {
            Expr::Constant(_) => {}
            Expr::Symbol(name) => {
                if !out.iter().any(|s| s == name) {
                    out.push(name.clone());
                }
            }
            Expr::Neg(e) | Expr::Call(_, e) => e.collect_symbols(out),
            Expr::Add(a, b)
            | Expr::Sub(a, b)
            | Expr::Mul(a, b)
            | Expr::Div(a, b)
            | Expr::Pow(a, b) => {
                a.collect_symbols(out);
                b.collect_symbols(out);
            }
        }
    }

    /// Evaluate against `table`. Unbound symbols are an error.
    pub fn evaluate(&self, table: &SymbolTable) -> IrResult<f64> {
        self.eval(table)
            .map_err(|message| IrError::expression(&self.to_string(), message))
    }

    fn eval(&self, table: &SymbolTable) -> Result<f64, String> {
        Ok(match self {
            Expr::Constant(v) => *v,
            Expr::Symbol(name) => table
                .get(name)
                .ok_or_else(|| format!("unknown symbol '{name}'"))?,
            Expr::Neg(e) => -e.eval(table)?,
            Expr::Add(a, b) => a.eval(table)? + b.eval(table)?,
            Expr::Sub(a, b) => a.eval(table)? - b.eval(table)?,
            Expr::Mul(a, b) => a.eval(table)? * b.eval(table)?,
            Expr::Div(a, b) => a.eval(table)? / b.eval(table)?,
            Expr::Pow(a, b) => a.eval(table)?.powf(b.eval(table)?),
            Expr::Call(func, e) => func.apply(e.eval(table)?),
        })
    }
}

/// Parse and evaluate `source` in one step.
pub fn evaluate(source: &str, table: &SymbolTable) -> IrResult<f64> {
    Expr::parse(source)?
        .eval(table)
        .map_err(|message| IrError::expression(source, message))
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Constant(v) => write!(f, "{v}"),
            Expr::Symbol(name) => write!(f, "{name}"),
            Expr::Neg(e) => write!(f, "-({e})"),
            Expr::Add(a, b) => write!(f, "({a} + {b})"),
            Expr::Sub(a, b) => write!(f, "({a} - {b})"),
            Expr::Mul(a, b) => write!(f, "({a} * {b})"),
            Expr::Div(a, b) => write!(f, "({a} / {b})"),
            Expr::Pow(a, b) => write!(f, "({a} ^ {b})"),
            Expr::Call(func, e) => write!(f, "{}({e})", func.name()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Pow,
}

const POW_PRECEDENCE: u8 = 3;

fn op_precedence(op: BinOp) -> u8 {
    match op {
        BinOp::Add | BinOp::Sub => 1,
        BinOp::Mul | BinOp::Div => 2,
        BinOp::Pow => POW_PRECEDENCE,
    }
}

struct Parser<'a> {
    source: &'a str,
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser<'_> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        token
    }

    fn consume(&mut self, expected: &Token) -> bool {
        if self.peek() == Some(expected) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, expected: &Token) -> IrResult<()> {
        if self.consume(expected) {
            Ok(())
        } else {
            Err(IrError::expression(
                self.source,
                format!("expected {expected:?}, found {:?}", self.peek()),
            ))
        }
    }

    fn peek_binary_op(&self) -> Option<BinOp> {
        match self.peek()? {
            Token::Plus => Some(BinOp::Add),
            Token::Minus => Some(BinOp::Sub),
            Token::Star => Some(BinOp::Mul),
            Token::Slash => Some(BinOp::Div),
            Token::Caret => Some(BinOp::Pow),
            _ => None,
        }
    }

    /// Precedence climbing; `^` is right-associative.
    fn parse_binary_expr(&mut self, min_prec: u8) -> IrResult<Expr> {
        let mut left = self.parse_unary_expr()?;

        while let Some(op) = self.peek_binary_op() {
            let prec = op_precedence(op);
            if prec < min_prec {
                break;
            }
            self.advance();

            let next_min = if op == BinOp::Pow { prec } else { prec + 1 };
            let right = Box::new(self.parse_binary_expr(next_min)?);
            let l = Box::new(left);
            left = match op {
                BinOp::Add => Expr::Add(l, right),
                BinOp::Sub => Expr::Sub(l, right),
                BinOp::Mul => Expr::Mul(l, right),
                BinOp::Div => Expr::Div(l, right),
                BinOp::Pow => Expr::Pow(l, right),
            };
        }

        Ok(left)
    }

    fn parse_unary_expr(&mut self) -> IrResult<Expr> {
        if self.consume(&Token::Minus) {
            // -x^2 is -(x^2)
            let expr = self.parse_binary_expr(POW_PRECEDENCE)?;
            return Ok(Expr::Neg(Box::new(expr)));
        }
        if self.consume(&Token::Plus) {
            return self.parse_unary_expr();
        }
        self.parse_primary_expr()
    }

    fn parse_primary_expr(&mut self) -> IrResult<Expr> {
        let token = self
            .advance()
            .ok_or_else(|| IrError::expression(self.source, "unexpected end of expression"))?;

        match token {
            Token::Number(v) => Ok(Expr::Constant(v)),
            Token::Identifier(name) => {
                if let Some(func) = Func::from_name(&name) {
                    self.expect(&Token::LParen)?;
                    let arg = self.parse_binary_expr(0)?;
                    self.expect(&Token::RParen)?;
                    return Ok(Expr::Call(func, Box::new(arg)));
                }
                Ok(match name.as_str() {
                    "pi" => Expr::Constant(std::f64::consts::PI),
                    "e" => Expr::Constant(std::f64::consts::E),
                    _ => Expr::Symbol(name),
                })
            }
            Token::LParen => {
                let expr = self.parse_binary_expr(0)?;
                self.expect(&Token::RParen)?;
                Ok(expr)
            }
            other => Err(IrError::expression(
                self.source,
                format!("unexpected token {other:?}"),
            )),
        }
    }
}
