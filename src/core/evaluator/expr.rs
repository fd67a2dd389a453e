// src/core/evaluator/expr.rs

//! Tokenizer and recursive-descent parser for the calculator's statements.
//!
//! Grammar:
//!
//! ```text
//! statement := IDENT '=' expr | expr
//! expr      := term (('+' | '-') term)*
//! term      := unary (('*' | '/' | '%') unary)*
//! unary     := '-' unary | '+' unary | power
//! power     := atom ('^' unary)?
//! atom      := NUMBER | IDENT | '(' expr ')'
//! ```
//!
//! Parsing, evaluation and dropping of the tree all recurse, so input is
//! bounded in both nesting depth and token count before it can exhaust the
//! loop task's stack.

use thiserror::Error;

/// Maximum nesting of unary operators and parentheses.
pub const MAX_DEPTH: usize = 256;

/// Maximum number of tokens in one statement. Bounds the height of flat
/// operator chains, which the parser builds as left-leaning trees.
pub const MAX_TOKENS: usize = 4096;

/// Errors raised while parsing or evaluating an expression.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExprError {
    #[error("unexpected character '{0}'")]
    UnexpectedChar(char),

    #[error("invalid number '{0}'")]
    InvalidNumber(String),

    #[error("unexpected end of input")]
    UnexpectedEnd,

    #[error("unexpected token '{0}'")]
    UnexpectedToken(String),

    #[error("name '{0}' is not defined")]
    UndefinedVariable(String),

    #[error("division by zero")]
    DivisionByZero,

    #[error("expression is nested too deeply (limit {})", MAX_DEPTH)]
    TooDeep,

    #[error("expression is too long (limit {} tokens)", MAX_TOKENS)]
    TooLong,
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Number(f64),
    Ident(String),
    Op(char),
    LParen,
    RParen,
    Assign,
}

impl Token {
    fn describe(&self) -> String {
        match self {
            Token::Number(n) => n.to_string(),
            Token::Ident(s) => s.clone(),
            Token::Op(c) => c.to_string(),
            Token::LParen => "(".to_string(),
            Token::RParen => ")".to_string(),
            Token::Assign => "=".to_string(),
        }
    }
}

/// A parsed expression tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Number(f64),
    Var(String),
    Neg(Box<Expr>),
    Binary(Box<Expr>, char, Box<Expr>),
}

/// A full input statement.
#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    Assign(String, Expr),
    Expr(Expr),
}

fn tokenize(src: &str) -> Result<Vec<Token>, ExprError> {
    let mut tokens = Vec::new();
    let chars: Vec<char> = src.chars().collect();
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        match c {
            c if c.is_whitespace() => i += 1,
            '0'..='9' | '.' => {
                let start = i;
                while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                    i += 1;
                }
                let text: String = chars[start..i].iter().collect();
                let value = text
                    .parse::<f64>()
                    .map_err(|_| ExprError::InvalidNumber(text.clone()))?;
                tokens.push(Token::Number(value));
            }
            c if c.is_alphabetic() || c == '_' => {
                let start = i;
                while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_') {
                    i += 1;
                }
                tokens.push(Token::Ident(chars[start..i].iter().collect()));
            }
            '+' | '-' | '*' | '/' | '%' | '^' => {
                tokens.push(Token::Op(c));
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
            '=' => {
                tokens.push(Token::Assign);
                i += 1;
            }
            other => return Err(ExprError::UnexpectedChar(other)),
        }
        if tokens.len() > MAX_TOKENS {
            return Err(ExprError::TooLong);
        }
    }
    Ok(tokens)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    depth: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let tok = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        tok
    }

    /// Runs `f` one nesting level deeper, failing once `MAX_DEPTH` is reached.
    fn nested<T>(
        &mut self,
        f: impl FnOnce(&mut Self) -> Result<T, ExprError>,
    ) -> Result<T, ExprError> {
        if self.depth >= MAX_DEPTH {
            return Err(ExprError::TooDeep);
        }
        self.depth += 1;
        let result = f(self);
        self.depth -= 1;
        result
    }

    fn expr(&mut self) -> Result<Expr, ExprError> {
        let mut lhs = self.term()?;
        while let Some(Token::Op(op @ ('+' | '-'))) = self.peek().cloned() {
            self.pos += 1;
            let rhs = self.term()?;
            lhs = Expr::Binary(Box::new(lhs), op, Box::new(rhs));
        }
        Ok(lhs)
    }

    fn term(&mut self) -> Result<Expr, ExprError> {
        let mut lhs = self.unary()?;
        while let Some(Token::Op(op @ ('*' | '/' | '%'))) = self.peek().cloned() {
            self.pos += 1;
            let rhs = self.unary()?;
            lhs = Expr::Binary(Box::new(lhs), op, Box::new(rhs));
        }
        Ok(lhs)
    }

    fn unary(&mut self) -> Result<Expr, ExprError> {
        self.nested(|p| match p.peek() {
            Some(Token::Op('-')) => {
                p.pos += 1;
                Ok(Expr::Neg(Box::new(p.unary()?)))
            }
            Some(Token::Op('+')) => {
                p.pos += 1;
                p.unary()
            }
            _ => p.power(),
        })
    }

    fn power(&mut self) -> Result<Expr, ExprError> {
        let base = self.atom()?;
        if let Some(Token::Op('^')) = self.peek() {
            self.pos += 1;
            let exponent = self.unary()?;
            return Ok(Expr::Binary(Box::new(base), '^', Box::new(exponent)));
        }
        Ok(base)
    }

    fn atom(&mut self) -> Result<Expr, ExprError> {
        match self.next() {
            Some(Token::Number(n)) => Ok(Expr::Number(n)),
            Some(Token::Ident(name)) => Ok(Expr::Var(name)),
            Some(Token::LParen) => self.nested(|p| {
                let inner = p.expr()?;
                match p.next() {
                    Some(Token::RParen) => Ok(inner),
                    Some(tok) => Err(ExprError::UnexpectedToken(tok.describe())),
                    None => Err(ExprError::UnexpectedEnd),
                }
            }),
            Some(tok) => Err(ExprError::UnexpectedToken(tok.describe())),
            None => Err(ExprError::UnexpectedEnd),
        }
    }
}

/// Parses one statement: an assignment or a bare expression.
pub fn parse_statement(src: &str) -> Result<Statement, ExprError> {
    let tokens = tokenize(src)?;
    let is_assignment = matches!(
        (tokens.first(), tokens.get(1)),
        (Some(Token::Ident(_)), Some(Token::Assign))
    );

    let (name, start) = if is_assignment {
        match &tokens[0] {
            Token::Ident(name) => (Some(name.clone()), 2),
            _ => (None, 0),
        }
    } else {
        (None, 0)
    };

    let mut parser = Parser {
        tokens,
        pos: start,
        depth: 0,
    };
    let expr = parser.expr()?;
    if let Some(tok) = parser.next() {
        return Err(ExprError::UnexpectedToken(tok.describe()));
    }

    Ok(match name {
        Some(name) => Statement::Assign(name, expr),
        None => Statement::Expr(expr),
    })
}

/// Evaluates `expr`, resolving variables through `lookup`.
pub fn evaluate(expr: &Expr, lookup: &dyn Fn(&str) -> Option<f64>) -> Result<f64, ExprError> {
    match expr {
        Expr::Number(n) => Ok(*n),
        Expr::Var(name) => lookup(name).ok_or_else(|| ExprError::UndefinedVariable(name.clone())),
        Expr::Neg(inner) => Ok(-evaluate(inner, lookup)?),
        Expr::Binary(lhs, op, rhs) => {
            let a = evaluate(lhs, lookup)?;
            let b = evaluate(rhs, lookup)?;
            match op {
                '+' => Ok(a + b),
                '-' => Ok(a - b),
                '*' => Ok(a * b),
                '/' if b == 0.0 => Err(ExprError::DivisionByZero),
                '/' => Ok(a / b),
                '%' if b == 0.0 => Err(ExprError::DivisionByZero),
                '%' => Ok(a % b),
                '^' => Ok(a.powf(b)),
                other => Err(ExprError::UnexpectedChar(*other)),
            }
        }
    }
}

/// Net count of unclosed parentheses in `src`. Negative when there are stray closers.
pub fn paren_depth(src: &str) -> i64 {
    src.chars().fold(0, |depth, c| match c {
        '(' => depth + 1,
        ')' => depth - 1,
        _ => depth,
    })
}

/// Prints integral values without a fractional part.
pub fn format_number(value: f64) -> String {
    if value.is_finite() && value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{value}")
    }
}
