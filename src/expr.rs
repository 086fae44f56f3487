//! Integer expressions: shunting-yard to postfix, then a stack evaluation.
//!
//! Every failure mode resolves to `0`: a missing variable or field, an
//! operator short of operands and division by zero.

use std::fmt;

use crate::{
    lexer::Lexer,
    store::{split_dotted, Env},
    token::{Token, TokenKind},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl BinOp {
    fn from_token(kind: TokenKind) -> Option<BinOp> {
        match kind {
            TokenKind::Plus => Some(BinOp::Add),
            TokenKind::Minus => Some(BinOp::Sub),
            TokenKind::Star => Some(BinOp::Mul),
            TokenKind::Slash => Some(BinOp::Div),
            TokenKind::EqualEqual => Some(BinOp::Eq),
            TokenKind::BangEqual => Some(BinOp::Ne),
            TokenKind::Lesser => Some(BinOp::Lt),
            TokenKind::LesserEqual => Some(BinOp::Le),
            TokenKind::Greater => Some(BinOp::Gt),
            TokenKind::GreaterEqual => Some(BinOp::Ge),
            _ => None,
        }
    }

    /// All operators are left associative.
    fn prec(&self) -> u8 {
        match self {
            Self::Mul | Self::Div => 3,
            Self::Add | Self::Sub => 2,
            Self::Eq | Self::Ne | Self::Lt | Self::Le | Self::Gt | Self::Ge => 1,
        }
    }

    pub fn apply(&self, left: i64, right: i64) -> i64 {
        match self {
            Self::Add => left.wrapping_add(right),
            Self::Sub => left.wrapping_sub(right),
            Self::Mul => left.wrapping_mul(right),
            Self::Div => {
                if right == 0 {
                    0
                } else {
                    left.wrapping_div(right)
                }
            }
            Self::Eq => (left == right) as i64,
            Self::Ne => (left != right) as i64,
            Self::Lt => (left < right) as i64,
            Self::Le => (left <= right) as i64,
            Self::Gt => (left > right) as i64,
            Self::Ge => (left >= right) as i64,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Term {
    Int(i64),
    Var(String),
    Field { object: String, field: String },
    Op(BinOp),
}

#[derive(Debug, Clone, Copy)]
enum Pending {
    Op(BinOp),
    LeftParen,
}

/// A compiled expression: its source text and its postfix form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Expr {
    pub source: String,
    postfix: Vec<Term>,
}

impl Expr {
    pub fn parse(source: &str) -> Expr {
        let tokens = Lexer::from_str(source).lex();
        Expr::from_tokens(source.trim().to_string(), &tokens)
    }

    pub fn from_tokens(source: String, tokens: &[Token]) -> Expr {
        let mut postfix = Vec::new();
        let mut pending: Vec<Pending> = Vec::new();

        for token in tokens {
            match token.kind {
                TokenKind::Number => postfix.push(Term::Int(token.number)),
                TokenKind::True => postfix.push(Term::Int(1)),
                TokenKind::False => postfix.push(Term::Int(0)),
                TokenKind::Ident => postfix.push(match split_dotted(&token.text) {
                    Some((object, field)) => Term::Field {
                        object: object.to_string(),
                        field: field.to_string(),
                    },
                    None => Term::Var(token.text.clone()),
                }),
                TokenKind::LeftParen => pending.push(Pending::LeftParen),
                TokenKind::RightParen => {
                    while let Some(top) = pending.pop() {
                        match top {
                            Pending::Op(op) => postfix.push(Term::Op(op)),
                            Pending::LeftParen => break,
                        }
                    }
                }
                kind => {
                    let Some(op) = BinOp::from_token(kind) else {
                        // strings, stray symbols and the like carry no value
                        continue;
                    };
                    while let Some(Pending::Op(top)) = pending.last() {
                        if top.prec() < op.prec() {
                            break;
                        }
                        postfix.push(Term::Op(*top));
                        pending.pop();
                    }
                    pending.push(Pending::Op(op));
                }
            }
        }

        while let Some(top) = pending.pop() {
            if let Pending::Op(op) = top {
                postfix.push(Term::Op(op));
            }
        }

        Expr { source, postfix }
    }

    pub fn postfix(&self) -> &[Term] {
        &self.postfix
    }

    pub fn eval(&self, env: &dyn Env) -> i64 {
        let mut stack: Vec<i64> = Vec::new();

        for term in &self.postfix {
            let value = match term {
                Term::Int(value) => *value,
                Term::Var(name) => match env.boolean(name) {
                    Some(flag) => flag as i64,
                    None => env.int(name).unwrap_or(0),
                },
                Term::Field { object, field } => env.field(object, field).unwrap_or(0),
                Term::Op(op) => {
                    let (Some(right), Some(left)) = (stack.pop(), stack.pop()) else {
                        return 0;
                    };
                    op.apply(left, right)
                }
            };
            stack.push(value);
        }

        stack.last().copied().unwrap_or(0)
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

pub fn evaluate(source: &str, env: &dyn Env) -> i64 {
    Expr::parse(source).eval(env)
}
