//! Recursive-descent parser and variable extraction.
//!
//! Precedence, lowest first: `or`, `and`, `not`, comparisons,
//! additive, multiplicative, unary minus, postfix (`.attr`, `[index]`).

use crate::error::Fault;
use crate::lexer::{tokenize, Token};
use serde_json::Value;

/// Deepest expression tree the parser will build.
const MAX_DEPTH: usize = 128;

/// Functions whose arguments are evaluated against the context.
const CONTEXT_FUNCTIONS: [&str; 3] = ["ctx", "len", "str"];

/// Unary operator.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum UnaryOp {
    Not,
    Neg,
}

/// Binary operator.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum BinaryOp {
    And,
    Or,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    In,
    Add,
    Sub,
    Mul,
    Div,
}

/// Parsed expression tree.
#[derive(Clone, Debug, PartialEq)]
pub(crate) enum Expr {
    Literal(Value),
    List(Vec<Expr>),
    Var(String),
    Root,
    Attr(Box<Expr>, String),
    Index(Box<Expr>, Box<Expr>),
    Call(String, Vec<Expr>),
    Unary(UnaryOp, Box<Expr>),
    Binary(BinaryOp, Box<Expr>, Box<Expr>),
}

impl Expr {
    /// True for `ctx()` with no arguments.
    pub(crate) fn is_context_root(&self) -> bool {
        matches!(self, Expr::Root) || matches!(self, Expr::Call(name, args) if name == "ctx" && args.is_empty())
    }
}

/// Parses an expression body (delimiters already stripped).
pub(crate) fn parse(source: &str) -> Result<Expr, Fault> {
    let tokens = tokenize(source)?;
    if tokens.is_empty() {
        return Err(Fault::Syntax("empty expression".to_string()));
    }
    let mut parser = Parser {
        tokens,
        pos: 0,
        depth: 0,
    };
    let expr = parser.parse_or()?;
    if let Some(token) = parser.peek() {
        return Err(Fault::Syntax(format!("unexpected token {:?}", token)));
    }
    Ok(expr)
}

/// Collects the context variable names referenced by an expression,
/// in order of first appearance.
///
/// Bare identifiers passed to functions outside [`CONTEXT_FUNCTIONS`]
/// name things such as tasks, so they are not context variables.
pub(crate) fn referenced_variables(expr: &Expr) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    let mut stack = vec![expr];

    while let Some(node) = stack.pop() {
        let found = match node {
            Expr::Var(name) => Some(name.clone()),
            Expr::Attr(base, name) if base.is_context_root() => Some(name.clone()),
            Expr::Call(func, args) if func == "ctx" && args.len() == 1 => match &args[0] {
                Expr::Var(name) => Some(name.clone()),
                Expr::Literal(Value::String(name)) => Some(name.clone()),
                _ => None,
            },
            _ => None,
        };

        if let Some(name) = found {
            if !names.contains(&name) {
                names.push(name);
            }
            continue;
        }

        // Children are pushed in reverse so the leftmost is visited first.
        match node {
            Expr::List(items) => stack.extend(items.iter().rev()),
            Expr::Call(func, args) if CONTEXT_FUNCTIONS.contains(&func.as_str()) => {
                stack.extend(args.iter().rev())
            }
            Expr::Call(_, args) => stack.extend(
                args.iter()
                    .rev()
                    .filter(|arg| !matches!(arg, Expr::Var(_))),
            ),
            Expr::Attr(base, _) => stack.push(base),
            Expr::Index(base, index) => {
                stack.push(index);
                stack.push(base);
            }
            Expr::Unary(_, operand) => stack.push(operand),
            Expr::Binary(_, left, right) => {
                stack.push(right);
                stack.push(left);
            }
            Expr::Literal(_) | Expr::Var(_) | Expr::Root => {}
        }
    }

    names
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    /// Depth of the tree under construction
    depth: usize,
}

impl Parser {
    fn descend(&mut self) -> Result<(), Fault> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            return Err(Fault::Syntax(format!(
                "expression nests deeper than {} levels",
                MAX_DEPTH
            )));
        }
        Ok(())
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn eat(&mut self, expected: &Token) -> bool {
        if self.peek() == Some(expected) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, expected: Token) -> Result<(), Fault> {
        match self.advance() {
            Some(ref token) if *token == expected => Ok(()),
            Some(token) => Err(Fault::Syntax(format!(
                "expected {:?}, found {:?}",
                expected, token
            ))),
            None => Err(Fault::Syntax(format!(
                "expected {:?}, found end of expression",
                expected
            ))),
        }
    }

    fn parse_or(&mut self) -> Result<Expr, Fault> {
        let entry = self.depth;
        self.descend()?;
        let mut left = self.parse_and()?;
        while self.eat(&Token::Or) {
            self.descend()?;
            let right = self.parse_and()?;
            left = Expr::Binary(BinaryOp::Or, Box::new(left), Box::new(right));
        }
        self.depth = entry;
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Expr, Fault> {
        let entry = self.depth;
        let mut left = self.parse_not()?;
        while self.eat(&Token::And) {
            self.descend()?;
            let right = self.parse_not()?;
            left = Expr::Binary(BinaryOp::And, Box::new(left), Box::new(right));
        }
        self.depth = entry;
        Ok(left)
    }

    fn parse_not(&mut self) -> Result<Expr, Fault> {
        if self.eat(&Token::Not) {
            let entry = self.depth;
            self.descend()?;
            let operand = self.parse_not()?;
            self.depth = entry;
            return Ok(Expr::Unary(UnaryOp::Not, Box::new(operand)));
        }
        self.parse_comparison()
    }

    fn parse_comparison(&mut self) -> Result<Expr, Fault> {
        let left = self.parse_additive()?;
        let op = match self.peek() {
            Some(Token::Eq) => BinaryOp::Eq,
            Some(Token::Ne) => BinaryOp::Ne,
            Some(Token::Lt) => BinaryOp::Lt,
            Some(Token::Le) => BinaryOp::Le,
            Some(Token::Gt) => BinaryOp::Gt,
            Some(Token::Ge) => BinaryOp::Ge,
            Some(Token::In) => BinaryOp::In,
            _ => return Ok(left),
        };
        self.pos += 1;
        let right = self.parse_additive()?;
        Ok(Expr::Binary(op, Box::new(left), Box::new(right)))
    }

    fn parse_additive(&mut self) -> Result<Expr, Fault> {
        let entry = self.depth;
        let mut left = self.parse_multiplicative()?;
        loop {
            let op = match self.peek() {
                Some(Token::Plus) => BinaryOp::Add,
                Some(Token::Minus) => BinaryOp::Sub,
                _ => break,
            };
            self.pos += 1;
            self.descend()?;
            let right = self.parse_multiplicative()?;
            left = Expr::Binary(op, Box::new(left), Box::new(right));
        }
        self.depth = entry;
        Ok(left)
    }

    fn parse_multiplicative(&mut self) -> Result<Expr, Fault> {
        let entry = self.depth;
        let mut left = self.parse_unary()?;
        loop {
            let op = match self.peek() {
                Some(Token::Star) => BinaryOp::Mul,
                Some(Token::Slash) => BinaryOp::Div,
                _ => break,
            };
            self.pos += 1;
            self.descend()?;
            let right = self.parse_unary()?;
            left = Expr::Binary(op, Box::new(left), Box::new(right));
        }
        self.depth = entry;
        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<Expr, Fault> {
        if self.eat(&Token::Minus) {
            let entry = self.depth;
            self.descend()?;
            let operand = self.parse_unary()?;
            self.depth = entry;
            return Ok(Expr::Unary(UnaryOp::Neg, Box::new(operand)));
        }
        self.parse_postfix()
    }

    fn parse_postfix(&mut self) -> Result<Expr, Fault> {
        let entry = self.depth;
        let mut expr = self.parse_primary()?;
        loop {
            if matches!(self.peek(), Some(Token::Dot | Token::LBracket)) {
                self.descend()?;
            }
            if self.eat(&Token::Dot) {
                match self.advance() {
                    Some(Token::Ident(name)) => expr = Expr::Attr(Box::new(expr), name),
                    Some(token) => {
                        return Err(Fault::Syntax(format!(
                            "expected attribute name, found {:?}",
                            token
                        )))
                    }
                    None => {
                        return Err(Fault::Syntax(
                            "expected attribute name, found end of expression".to_string(),
                        ))
                    }
                }
            } else if self.eat(&Token::LBracket) {
                let index = self.parse_or()?;
                self.expect(Token::RBracket)?;
                expr = Expr::Index(Box::new(expr), Box::new(index));
            } else {
                self.depth = entry;
                return Ok(expr);
            }
        }
    }

    fn parse_primary(&mut self) -> Result<Expr, Fault> {
        match self.advance() {
            Some(Token::Int(n)) => Ok(Expr::Literal(Value::from(n))),
            Some(Token::Float(f)) => Ok(Expr::Literal(Value::from(f))),
            Some(Token::Str(s)) => Ok(Expr::Literal(Value::String(s))),
            Some(Token::True) => Ok(Expr::Literal(Value::Bool(true))),
            Some(Token::False) => Ok(Expr::Literal(Value::Bool(false))),
            Some(Token::Null) => Ok(Expr::Literal(Value::Null)),
            Some(Token::Dollar) => Ok(Expr::Root),
            Some(Token::LParen) => {
                let inner = self.parse_or()?;
                self.expect(Token::RParen)?;
                Ok(inner)
            }
            Some(Token::LBracket) => {
                let items = self.parse_items(Token::RBracket)?;
                Ok(Expr::List(items))
            }
            Some(Token::Ident(name)) => {
                if self.eat(&Token::LParen) {
                    let args = self.parse_items(Token::RParen)?;
                    Ok(Expr::Call(name, args))
                } else {
                    Ok(Expr::Var(name))
                }
            }
            Some(token) => Err(Fault::Syntax(format!("unexpected token {:?}", token))),
            None => Err(Fault::Syntax("unexpected end of expression".to_string())),
        }
    }

    /// Parses a comma separated list up to and including `close`.
    fn parse_items(&mut self, close: Token) -> Result<Vec<Expr>, Fault> {
        let mut items = Vec::new();
        if self.eat(&close) {
            return Ok(items);
        }
        loop {
            items.push(self.parse_or()?);
            if self.eat(&Token::Comma) {
                continue;
            }
            self.expect(close)?;
            return Ok(items);
        }
    }
}
