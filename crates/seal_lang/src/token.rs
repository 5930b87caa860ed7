//! Token catalogue for the SEAL surface language.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of a lexed token
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TokenKind {
    /// Unrecognised input
    Illegal,
    /// End of input
    Eof,
    /// Double-quoted string literal (quotes stripped)
    Literal,
    /// `#` comment (text after the hash)
    Comment,
    /// Bare identifier
    Ident,
    /// Integer literal
    Int,
    /// `group.name`-shaped identifier, optionally indexed
    TypePattern,
    /// `;`
    Delimiter,
    /// `,`
    Comma,
    /// `(`
    OpenParen,
    /// `)`
    CloseParen,
    /// `{`
    OpenBlock,
    /// `}`
    CloseBlock,
    /// `[`
    OpenSq,
    /// `]`
    CloseSq,

    /// `==`
    EqualTo,
    /// `!=`
    NotEqual,
    /// `<`
    LessThan,
    /// `>`
    GreaterThan,
    /// `<=`
    LessEqual,
    /// `>=`
    GreaterEqual,
    /// `=~`
    Match,
    /// `in`
    In,

    /// `not`
    Not,
    /// `and`
    And,
    /// `or`
    Or,

    /// `with`
    With,
    /// `subject`
    Subject,
    /// `group`
    Group,
    /// `user`
    User,
    /// `to`
    To,
    /// `where`
    Where,
    /// `context`
    Context,
}

impl TokenKind {
    /// Canonical spelling of the token kind, as used in diagnostics.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Illegal => "ILLEGAL",
            Self::Eof => "EOF",
            Self::Literal => "LITERAL",
            Self::Comment => "#",
            Self::Ident => "IDENT",
            Self::Int => "INT",
            Self::TypePattern => "TYPE_PATTERN",
            Self::Delimiter => ";",
            Self::Comma => ",",
            Self::OpenParen => "(",
            Self::CloseParen => ")",
            Self::OpenBlock => "{",
            Self::CloseBlock => "}",
            Self::OpenSq => "[",
            Self::CloseSq => "]",
            Self::EqualTo => "==",
            Self::NotEqual => "!=",
            Self::LessThan => "<",
            Self::GreaterThan => ">",
            Self::LessEqual => "<=",
            Self::GreaterEqual => ">=",
            Self::Match => "=~",
            Self::In => "in",
            Self::Not => "not",
            Self::And => "and",
            Self::Or => "or",
            Self::With => "with",
            Self::Subject => "subject",
            Self::Group => "group",
            Self::User => "user",
            Self::To => "to",
            Self::Where => "where",
            Self::Context => "context",
        }
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A lexed token: kind plus the original literal text
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    /// Token kind
    pub kind: TokenKind,
    /// Original literal
    pub literal: String,
}

impl Token {
    /// Create a new token
    #[must_use]
    pub fn new(kind: TokenKind, literal: impl Into<String>) -> Self {
        Self {
            kind,
            literal: literal.into(),
        }
    }
}

/// Classify an identifier: exact keyword lookup, otherwise `IDENT`.
#[must_use]
pub fn lookup_ident(ident: &str) -> TokenKind {
    match ident {
        "with" => TokenKind::With,
        "subject" => TokenKind::Subject,
        "user" => TokenKind::User,
        "group" => TokenKind::Group,
        "to" => TokenKind::To,
        "where" => TokenKind::Where,
        "context" => TokenKind::Context,
        "not" => TokenKind::Not,
        "and" => TokenKind::And,
        "or" => TokenKind::Or,
        ";" => TokenKind::Delimiter,
        _ => TokenKind::Ident,
    }
}

/// Look up a comparison operator spelling; unknown spellings are `ILLEGAL`.
#[must_use]
pub fn lookup_operator_comparison(op: &str) -> TokenKind {
    match op {
        "==" => TokenKind::EqualTo,
        "!=" => TokenKind::NotEqual,
        "<" => TokenKind::LessThan,
        ">" => TokenKind::GreaterThan,
        "<=" => TokenKind::LessEqual,
        ">=" => TokenKind::GreaterEqual,
        "=~" => TokenKind::Match,
        _ => TokenKind::Illegal,
    }
}

/// Look up a logical operator spelling; unknown spellings are `ILLEGAL`.
#[must_use]
pub fn lookup_operator_logical(op: &str) -> TokenKind {
    match op {
        "not" => TokenKind::Not,
        "and" => TokenKind::And,
        "or" => TokenKind::Or,
        _ => TokenKind::Illegal,
    }
}

/// Look up any operator spelling, comparison first, then logical.
#[must_use]
pub fn lookup_operator(op: &str) -> TokenKind {
    let kind = lookup_operator_comparison(op);
    if kind != TokenKind::Illegal {
        return kind;
    }
    lookup_operator_logical(op)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_operator() {
        let cases = [
            ("", TokenKind::Illegal),
            ("==", TokenKind::EqualTo),
            ("!=", TokenKind::NotEqual),
            ("<", TokenKind::LessThan),
            (">", TokenKind::GreaterThan),
            ("<=", TokenKind::LessEqual),
            (">=", TokenKind::GreaterEqual),
            ("=~", TokenKind::Match),
            ("not", TokenKind::Not),
            ("and", TokenKind::And),
            ("or", TokenKind::Or),
            ("===", TokenKind::Illegal),
        ];
        for (op, expected) in cases {
            assert_eq!(lookup_operator(op), expected, "operator {:?}", op);
        }
    }

    #[test]
    fn test_lookup_ident_keywords() {
        assert_eq!(lookup_ident("subject"), TokenKind::Subject);
        assert_eq!(lookup_ident("context"), TokenKind::Context);
        assert_eq!(lookup_ident("where"), TokenKind::Where);
        assert_eq!(lookup_ident("allow"), TokenKind::Ident);
        assert_eq!(lookup_ident("Subject"), TokenKind::Ident);
    }

    #[test]
    fn test_kind_display_matches_literal() {
        assert_eq!(TokenKind::Delimiter.to_string(), ";");
        assert_eq!(TokenKind::TypePattern.to_string(), "TYPE_PATTERN");
        assert_eq!(TokenKind::To.to_string(), "to");
    }
}
