//! Tokenizer for constraint expressions.

use super::ExpressionError;

/// Token types of the expression language.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum TokenKind {
    Identifier,
    IntLiteral,
    StringLiteral,
    True,
    False,
    AndAnd,
    OrOr,
    Bang,
    EqEq,
    NotEq,
    Lt,
    Le,
    Gt,
    Ge,
    OpenParen,
    CloseParen,
    Eof,
}

/// A token with its raw text and byte offset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) struct Token {
    pub(super) kind: TokenKind,
    pub(super) text: String,
    pub(super) offset: usize,
}

impl Token {
    fn new(kind: TokenKind, text: impl Into<String>, offset: usize) -> Self {
        Self {
            kind,
            text: text.into(),
            offset,
        }
    }
}

/// Tokenizes an expression.
pub(super) fn tokenize(input: &str) -> Result<Vec<Token>, ExpressionError> {
    let chars: Vec<char> = input.chars().collect();
    let mut tokens = Vec::new();
    let mut pos = 0;

    while pos < chars.len() {
        let ch = chars[pos];

        if ch.is_whitespace() {
            pos += 1;
            continue;
        }

        if ch.is_ascii_alphabetic() || ch == '_' {
            let start = pos;
            while pos < chars.len()
                && (chars[pos].is_ascii_alphanumeric() || chars[pos] == '_' || chars[pos] == '.')
            {
                pos += 1;
            }
            let text: String = chars[start..pos].iter().collect();
            let kind = match text.as_str() {
                "true" => TokenKind::True,
                "false" => TokenKind::False,
                _ => TokenKind::Identifier,
            };
            tokens.push(Token::new(kind, text, start));
            continue;
        }

        if ch.is_ascii_digit() {
            let start = pos;
            while pos < chars.len() && chars[pos].is_ascii_digit() {
                pos += 1;
            }
            let text: String = chars[start..pos].iter().collect();
            tokens.push(Token::new(TokenKind::IntLiteral, text, start));
            continue;
        }

        if ch == '\'' || ch == '"' {
            let quote = ch;
            let start = pos;
            pos += 1;
            let mut text = String::new();
            loop {
                match chars.get(pos) {
                    None => {
                        return Err(ExpressionError::new(start, "unterminated string literal"));
                    }
                    Some(&c) if c == quote => {
                        pos += 1;
                        break;
                    }
                    Some(&c) => {
                        text.push(c);
                        pos += 1;
                    }
                }
            }
            tokens.push(Token::new(TokenKind::StringLiteral, text, start));
            continue;
        }

        let start = pos;
        let two: String = chars[pos..chars.len().min(pos + 2)].iter().collect();
        let (kind, width) = match two.as_str() {
            "&&" => (TokenKind::AndAnd, 2),
            "||" => (TokenKind::OrOr, 2),
            "==" => (TokenKind::EqEq, 2),
            "!=" => (TokenKind::NotEq, 2),
            "<=" => (TokenKind::Le, 2),
            ">=" => (TokenKind::Ge, 2),
            _ => match ch {
                '!' => (TokenKind::Bang, 1),
                '<' => (TokenKind::Lt, 1),
                '>' => (TokenKind::Gt, 1),
                '(' => (TokenKind::OpenParen, 1),
                ')' => (TokenKind::CloseParen, 1),
                _ => {
                    return Err(ExpressionError::new(
                        start,
                        format!("unexpected character '{ch}'"),
                    ));
                }
            },
        };

        let text: String = chars[pos..pos + width].iter().collect();
        tokens.push(Token::new(kind, text, start));
        pos += width;
    }

    tokens.push(Token::new(TokenKind::Eof, "", chars.len()));
    Ok(tokens)
}
