//! Safe evaluation of user-authored scoring formulas.
//!
//! Formulas are a restricted arithmetic language: decimal numbers, `+ - * /`,
//! parentheses, named variables (`x1`, `x2`, ...), named single-argument
//! lookup functions (`f1`, `f2`, ...) and a fixed set of math built-ins. The
//! display sign `×` reads as `*`. The text is tokenized and parsed into an
//! AST which is interpreted directly, so nothing in a formula can reach
//! outside the passed-in bindings: unknown identifiers refuse to evaluate
//! instead of resolving anywhere else.

use std::collections::BTreeMap;

use thiserror::Error;
use tracing::debug;

use crate::consts::MATH_KEYWORDS;

/// A named callable usable from formulas. The column calculator injects
/// lookup tables here; diagnostics inject identity mocks.
pub type NamedFunction = Box<dyn Fn(f64) -> f64>;

/// Function bindings for one evaluation.
pub type FunctionMap = BTreeMap<String, NamedFunction>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum FormulaError {
    #[error("parse error at position {pos}: {msg}")]
    Parse { pos: usize, msg: String },

    #[error("unknown variable '{0}'")]
    UnknownVariable(String),

    #[error("unknown function '{0}'")]
    UnknownFunction(String),

    #[error("function '{name}' called with {got} argument(s)")]
    Arity { name: String, got: usize },
}

/// Evaluate for the render path: empty input and any parse or binding
/// failure degrade to 0 instead of propagating. Math results are returned
/// raw, including `Infinity`/`NaN`; callers decide how to display those.
pub fn evaluate_formula(
    formula: &str,
    variables: &BTreeMap<String, f64>,
    functions: &FunctionMap,
) -> f64 {
    match try_evaluate(formula, variables, functions) {
        Ok(value) => value,
        Err(err) => {
            debug!("formula '{}' refused: {}", formula, err);
            0.0
        }
    }
}

/// Checked evaluation, used by the auto-column diagnostic.
pub fn try_evaluate(
    formula: &str,
    variables: &BTreeMap<String, f64>,
    functions: &FunctionMap,
) -> Result<f64, FormulaError> {
    if formula.trim().is_empty() {
        return Ok(0.0);
    }
    let tokens = tokenize(formula)?;
    let mut parser = Parser { tokens, pos: 0 };
    let expr = parser.expression()?;
    if parser.pos != parser.tokens.len() {
        return Err(FormulaError::Parse {
            pos: parser.pos,
            msg: "unexpected trailing input".to_string(),
        });
    }
    eval(&expr, variables, functions)
}

/// Identifiers found in a formula, split into lookup-function names and
/// variables.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Identifiers {
    pub vars: Vec<String>,
    pub funcs: Vec<String>,
}

/// Scan a (possibly unfinished) formula for identifier tokens. Math
/// built-ins are dropped; `f` + digits (case-insensitive) classifies as a
/// function, everything else as a variable, deduplicated in first-seen
/// order. Template editors use this to pre-populate the variable map; the
/// scoring path never calls it.
pub fn extract_identifiers(formula: &str) -> Identifiers {
    let mut out = Identifiers::default();
    let chars: Vec<char> = formula.chars().collect();
    let mut i = 0;
    while i < chars.len() {
        if !chars[i].is_ascii_alphabetic() {
            i += 1;
            continue;
        }
        let start = i;
        while i < chars.len() && chars[i].is_ascii_alphanumeric() {
            i += 1;
        }
        let ident: String = chars[start..i].iter().collect();
        let lower = ident.to_ascii_lowercase();
        if MATH_KEYWORDS.contains(&lower.as_str()) {
            continue;
        }
        if is_function_name(&lower) {
            if !out.funcs.contains(&ident) {
                out.funcs.push(ident);
            }
        } else if !out.vars.contains(&ident) {
            out.vars.push(ident);
        }
    }
    out
}

/// `f` followed by one or more digits.
fn is_function_name(lower: &str) -> bool {
    let mut chars = lower.chars();
    chars.next() == Some('f') && {
        let rest = chars.as_str();
        !rest.is_empty() && rest.chars().all(|c| c.is_ascii_digit())
    }
}

// --- tokenizer ---

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Number(f64),
    Ident(String),
    Plus,
    Minus,
    Star,
    Slash,
    LParen,
    RParen,
    Comma,
}

fn tokenize(input: &str) -> Result<Vec<Token>, FormulaError> {
    let chars: Vec<char> = input.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        match c {
            c if c.is_whitespace() => i += 1,
            '+' => {
                tokens.push(Token::Plus);
                i += 1;
            }
            '-' => {
                tokens.push(Token::Minus);
                i += 1;
            }
            '*' | '×' => {
                tokens.push(Token::Star);
                i += 1;
            }
            '/' => {
                tokens.push(Token::Slash);
                i += 1;
            }
            '(' => {
                tokens.push(Token::LParen);
                i += 1;
            }
            ')' => {
                tokens.push(Token::RParen);
                i += 1;
            }
            ',' => {
                tokens.push(Token::Comma);
                i += 1;
            }
            c if c.is_ascii_digit() || c == '.' => {
                let start = i;
                while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                    i += 1;
                }
                let text: String = chars[start..i].iter().collect();
                let value = text.parse::<f64>().map_err(|_| FormulaError::Parse {
                    pos: start,
                    msg: format!("invalid number '{text}'"),
                })?;
                tokens.push(Token::Number(value));
            }
            c if c.is_ascii_alphabetic() => {
                let start = i;
                while i < chars.len() && chars[i].is_ascii_alphanumeric() {
                    i += 1;
                }
                tokens.push(Token::Ident(chars[start..i].iter().collect()));
            }
            _ => {
                return Err(FormulaError::Parse {
                    pos: i,
                    msg: format!("unexpected character '{c}'"),
                })
            }
        }
    }
    Ok(tokens)
}

// --- parser ---

#[derive(Debug, Clone, Copy, PartialEq)]
enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
}

#[derive(Debug, Clone, PartialEq)]
enum Expr {
    Number(f64),
    Variable(String),
    Negate(Box<Expr>),
    Binary(BinOp, Box<Expr>, Box<Expr>),
    Call(String, Vec<Expr>),
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next_token(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn expression(&mut self) -> Result<Expr, FormulaError> {
        let mut lhs = self.term()?;
        loop {
            let op = match self.peek() {
                Some(Token::Plus) => BinOp::Add,
                Some(Token::Minus) => BinOp::Sub,
                _ => break,
            };
            self.pos += 1;
            let rhs = self.term()?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn term(&mut self) -> Result<Expr, FormulaError> {
        let mut lhs = self.unary()?;
        loop {
            let op = match self.peek() {
                Some(Token::Star) => BinOp::Mul,
                Some(Token::Slash) => BinOp::Div,
                _ => break,
            };
            self.pos += 1;
            let rhs = self.unary()?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn unary(&mut self) -> Result<Expr, FormulaError> {
        if matches!(self.peek(), Some(Token::Minus)) {
            self.pos += 1;
            return Ok(Expr::Negate(Box::new(self.unary()?)));
        }
        self.primary()
    }

    fn primary(&mut self) -> Result<Expr, FormulaError> {
        match self.next_token() {
            Some(Token::Number(value)) => Ok(Expr::Number(value)),
            Some(Token::LParen) => {
                let inner = self.expression()?;
                match self.next_token() {
                    Some(Token::RParen) => Ok(inner),
                    _ => Err(self.error("expected ')'")),
                }
            }
            Some(Token::Ident(name)) => {
                if matches!(self.peek(), Some(Token::LParen)) {
                    self.pos += 1;
                    let args = self.call_args()?;
                    Ok(Expr::Call(name, args))
                } else {
                    Ok(Expr::Variable(name))
                }
            }
            _ => Err(self.error("expected a value")),
        }
    }

    fn call_args(&mut self) -> Result<Vec<Expr>, FormulaError> {
        let mut args = Vec::new();
        if matches!(self.peek(), Some(Token::RParen)) {
            self.pos += 1;
            return Ok(args);
        }
        loop {
            args.push(self.expression()?);
            match self.next_token() {
                Some(Token::Comma) => continue,
                Some(Token::RParen) => break,
                _ => return Err(self.error("expected ',' or ')'")),
            }
        }
        Ok(args)
    }

    fn error(&self, msg: &str) -> FormulaError {
        FormulaError::Parse {
            pos: self.pos,
            msg: msg.to_string(),
        }
    }
}

// --- interpreter ---

fn eval(
    expr: &Expr,
    variables: &BTreeMap<String, f64>,
    functions: &FunctionMap,
) -> Result<f64, FormulaError> {
    match expr {
        Expr::Number(value) => Ok(*value),
        Expr::Variable(name) => {
            if let Some(value) = variables.get(name) {
                return Ok(*value);
            }
            match name.as_str() {
                "pi" => Ok(std::f64::consts::PI),
                "e" => Ok(std::f64::consts::E),
                _ => Err(FormulaError::UnknownVariable(name.clone())),
            }
        }
        Expr::Negate(inner) => Ok(-eval(inner, variables, functions)?),
        Expr::Binary(op, lhs, rhs) => {
            let l = eval(lhs, variables, functions)?;
            let r = eval(rhs, variables, functions)?;
            Ok(match op {
                BinOp::Add => l + r,
                BinOp::Sub => l - r,
                BinOp::Mul => l * r,
                BinOp::Div => l / r,
            })
        }
        Expr::Call(name, args) => {
            let values = args
                .iter()
                .map(|arg| eval(arg, variables, functions))
                .collect::<Result<Vec<_>, _>>()?;
            call(name, &values, functions)
        }
    }
}

fn call(name: &str, args: &[f64], functions: &FunctionMap) -> Result<f64, FormulaError> {
    // Built-ins first: user tables never shadow them.
    match name {
        "min" | "max" => {
            if args.is_empty() {
                return Err(arity(name, 0));
            }
            let fold: fn(f64, f64) -> f64 = if name == "min" { f64::min } else { f64::max };
            return Ok(args.iter().copied().reduce(fold).unwrap_or(0.0));
        }
        "pow" => {
            if args.len() != 2 {
                return Err(arity(name, args.len()));
            }
            return Ok(args[0].powf(args[1]));
        }
        "floor" | "ceil" | "round" | "abs" | "sqrt" | "sin" | "cos" | "tan" | "log" => {
            if args.len() != 1 {
                return Err(arity(name, args.len()));
            }
            let x = args[0];
            return Ok(match name {
                "floor" => x.floor(),
                "ceil" => x.ceil(),
                "round" => x.round(),
                "abs" => x.abs(),
                "sqrt" => x.sqrt(),
                "sin" => x.sin(),
                "cos" => x.cos(),
                "tan" => x.tan(),
                _ => x.ln(),
            });
        }
        _ => {}
    }

    match functions.get(name) {
        Some(function) => {
            if args.len() != 1 {
                return Err(arity(name, args.len()));
            }
            Ok(function(args[0]))
        }
        None => Err(FormulaError::UnknownFunction(name.to_string())),
    }
}

fn arity(name: &str, got: usize) -> FormulaError {
    FormulaError::Arity {
        name: name.to_string(),
        got,
    }
}
