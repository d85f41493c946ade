//! Recursive-descent parser for constraint expressions.
//!
//! Grammar, loosest binding first:
//!
//! ```text
//! expr       := or
//! or         := and ("||" and)*
//! and        := comparison ("&&" comparison)*
//! comparison := unary (("==" | "!=" | "<" | "<=" | ">" | ">=") unary)?
//! unary      := "!" unary | primary
//! primary    := literal | identifier | "(" expr ")"
//! ```

use super::ContextValue;
use super::ExpressionError;
use super::lexer::{Token, TokenKind};

/// Comparison operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

/// Abstract syntax tree of a compiled expression.
#[derive(Debug, Clone, PartialEq)]
pub(super) enum Expr {
    Literal(ContextValue),
    Variable { name: String, offset: usize },
    Not(Box<Expr>),
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Compare {
        op: CompareOp,
        offset: usize,
        left: Box<Expr>,
        right: Box<Expr>,
    },
}

/// Nesting cap; expressions deeper than this are rejected as unbounded.
const MAX_DEPTH: usize = 32;

/// Parses a token stream into an expression tree.
pub(super) fn parse(tokens: &[Token]) -> Result<Expr, ExpressionError> {
    let mut parser = Parser { tokens, pos: 0 };
    let expr = parser.or_expr(0)?;
    parser.expect_eof()?;
    Ok(expr)
}

struct Parser<'a> {
    tokens: &'a [Token],
    pos: usize,
}

impl Parser<'_> {
    fn peek(&self) -> &Token {
        // The token stream always ends with Eof, so the index is in range.
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        token
    }

    fn or_expr(&mut self, depth: usize) -> Result<Expr, ExpressionError> {
        check_depth(depth, self.peek().offset)?;

        let mut left = self.and_expr(depth + 1)?;
        while self.peek().kind == TokenKind::OrOr {
            self.advance();
            let right = self.and_expr(depth + 1)?;
            left = Expr::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn and_expr(&mut self, depth: usize) -> Result<Expr, ExpressionError> {
        check_depth(depth, self.peek().offset)?;

        let mut left = self.comparison(depth + 1)?;
        while self.peek().kind == TokenKind::AndAnd {
            self.advance();
            let right = self.comparison(depth + 1)?;
            left = Expr::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn comparison(&mut self, depth: usize) -> Result<Expr, ExpressionError> {
        check_depth(depth, self.peek().offset)?;

        let left = self.unary(depth + 1)?;
        let op = match self.peek().kind {
            TokenKind::EqEq => CompareOp::Eq,
            TokenKind::NotEq => CompareOp::Ne,
            TokenKind::Lt => CompareOp::Lt,
            TokenKind::Le => CompareOp::Le,
            TokenKind::Gt => CompareOp::Gt,
            TokenKind::Ge => CompareOp::Ge,
            _ => return Ok(left),
        };

        let offset = self.advance().offset;
        let right = self.unary(depth + 1)?;
        Ok(Expr::Compare {
            op,
            offset,
            left: Box::new(left),
            right: Box::new(right),
        })
    }

    fn unary(&mut self, depth: usize) -> Result<Expr, ExpressionError> {
        check_depth(depth, self.peek().offset)?;

        if self.peek().kind == TokenKind::Bang {
            self.advance();
            let inner = self.unary(depth + 1)?;
            return Ok(Expr::Not(Box::new(inner)));
        }

        self.primary(depth + 1)
    }

    fn primary(&mut self, depth: usize) -> Result<Expr, ExpressionError> {
        check_depth(depth, self.peek().offset)?;

        let token = self.advance();
        match token.kind {
            TokenKind::True => Ok(Expr::Literal(ContextValue::Bool(true))),
            TokenKind::False => Ok(Expr::Literal(ContextValue::Bool(false))),
            TokenKind::IntLiteral => token
                .text
                .parse::<i64>()
                .map(|value| Expr::Literal(ContextValue::Int(value)))
                .map_err(|_| {
                    ExpressionError::new(
                        token.offset,
                        format!("integer literal '{}' is out of range", token.text),
                    )
                }),
            TokenKind::StringLiteral => Ok(Expr::Literal(ContextValue::Text(token.text))),
            TokenKind::Identifier => Ok(Expr::Variable {
                name: token.text,
                offset: token.offset,
            }),
            TokenKind::OpenParen => {
                let inner = self.or_expr(depth + 1)?;
                let close = self.advance();
                if close.kind != TokenKind::CloseParen {
                    return Err(ExpressionError::new(close.offset, "expected ')'"));
                }
                Ok(inner)
            }
            TokenKind::Eof => Err(ExpressionError::new(
                token.offset,
                "unexpected end of expression",
            )),
            _ => Err(ExpressionError::new(
                token.offset,
                format!("unexpected token '{}'", token.text),
            )),
        }
    }

    fn expect_eof(&mut self) -> Result<(), ExpressionError> {
        let token = self.peek();
        if token.kind != TokenKind::Eof {
            return Err(ExpressionError::new(
                token.offset,
                format!("unexpected trailing token '{}'", token.text),
            ));
        }
        Ok(())
    }
}

fn check_depth(depth: usize, offset: usize) -> Result<(), ExpressionError> {
    if depth > MAX_DEPTH {
        return Err(ExpressionError::new(offset, "expression nests too deeply"));
    }
    Ok(())
}
