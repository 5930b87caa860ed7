//! Byte scanner producing SEAL tokens.
//!
//! The lexer never fails: malformed input surfaces as `ILLEGAL` tokens and
//! is reported by the parser. End of input yields `EOF` indefinitely.

use crate::token::{lookup_ident, lookup_operator, Token, TokenKind};
use regex::Regex;
use std::fmt;
use std::sync::OnceLock;

/// Characters an indexed identifier contains
const INDEXED_IDENTIFIER_CHARS: [char; 3] = ['[', '"', ']'];

fn type_pattern_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"^[A-Za-z_][A-Za-z0-9_]*\.([A-Za-z_][A-Za-z0-9_]*|\*+)?(\["[A-Za-z0-9_]*"\])?$"#)
            .expect("type pattern regex")
    })
}

/// Lexer over SEAL policy source
pub struct Lexer {
    input: Vec<u8>,
    position: usize,
    read_position: usize,
    ch: u8,
}

impl Lexer {
    /// Create a lexer over the given source
    #[must_use]
    pub fn new(input: &str) -> Self {
        let mut l = Self {
            input: input.as_bytes().to_vec(),
            position: 0,
            read_position: 0,
            ch: 0,
        };
        l.read_char();
        l
    }

    fn read_char(&mut self) {
        self.ch = self.input.get(self.read_position).copied().unwrap_or(0);
        self.position = self.read_position;
        self.read_position += 1;
    }

    fn skip_whitespace(&mut self) {
        while matches!(self.ch, b' ' | b'\t' | b'\n' | b'\r') {
            self.read_char();
        }
    }

    /// Produce the next token
    pub fn next_token(&mut self) -> Token {
        self.skip_whitespace();

        let tok = match self.ch {
            b'#' => {
                return Token::new(TokenKind::Comment, self.read_comment());
            }
            b',' => Token::new(TokenKind::Comma, ","),
            b';' => Token::new(TokenKind::Delimiter, ";"),
            b'(' => Token::new(TokenKind::OpenParen, "("),
            b')' => Token::new(TokenKind::CloseParen, ")"),
            b'{' => Token::new(TokenKind::OpenBlock, "{"),
            b'}' => Token::new(TokenKind::CloseBlock, "}"),
            b'[' => Token::new(TokenKind::OpenSq, "["),
            b']' => Token::new(TokenKind::CloseSq, "]"),
            b'"' => Token::new(TokenKind::Literal, self.read_literal()),
            0 => Token::new(TokenKind::Eof, ""),
            ch if is_letter(ch) => {
                let literal = self.read_identifier();
                let mut kind = lookup_ident(&literal);
                if is_type_pattern(&literal) {
                    kind = TokenKind::TypePattern;
                } else if kind == TokenKind::Ident && literal == "in" {
                    kind = TokenKind::In;
                }
                return Token::new(kind, literal);
            }
            ch if ch.is_ascii_digit() => {
                return Token::new(TokenKind::Int, self.read_number());
            }
            ch if is_operator(ch) => {
                let literal = self.read_operator();
                let kind = lookup_operator(&literal);
                return Token::new(kind, literal);
            }
            ch => Token::new(TokenKind::Illegal, (ch as char).to_string()),
        };
        self.read_char();
        tok
    }

    fn read_identifier(&mut self) -> String {
        let start = self.position;
        while is_identifier_char(self.ch) {
            self.read_char();
        }
        String::from_utf8_lossy(&self.input[start..self.position]).into_owned()
    }

    fn read_number(&mut self) -> String {
        let start = self.position;
        while self.ch.is_ascii_digit() {
            self.read_char();
        }
        String::from_utf8_lossy(&self.input[start..self.position]).into_owned()
    }

    fn read_operator(&mut self) -> String {
        let start = self.position;
        while is_operator(self.ch) {
            self.read_char();
        }
        String::from_utf8_lossy(&self.input[start..self.position]).into_owned()
    }

    fn read_literal(&mut self) -> String {
        self.read_char();
        let start = self.position;
        while self.ch != b'"' && self.ch != 0 {
            self.read_char();
        }
        String::from_utf8_lossy(&self.input[start..self.position]).into_owned()
    }

    fn read_comment(&mut self) -> String {
        self.read_char();
        let start = self.position;
        while self.ch != b'\n' && self.ch != 0 {
            self.read_char();
        }
        let mut end = self.position;
        if end > start && self.input[end - 1] == b'\r' {
            end -= 1;
        }
        String::from_utf8_lossy(&self.input[start..end]).into_owned()
    }
}

fn is_letter(ch: u8) -> bool {
    ch.is_ascii_lowercase() || ch.is_ascii_uppercase() || ch == b'_'
}

fn is_identifier_char(ch: u8) -> bool {
    is_letter(ch)
        || ch.is_ascii_digit()
        || matches!(ch, b'.' | b'*' | b'@' | b'[' | b']' | b'"')
}

fn is_operator(ch: u8) -> bool {
    matches!(ch, b'=' | b'!' | b'<' | b'>' | b'~')
}

fn is_type_pattern(s: &str) -> bool {
    let Some(first) = s.bytes().next() else {
        return false;
    };
    if !is_letter(first) {
        return false;
    }
    type_pattern_regex().is_match(s)
}

/// Returns true if `id` carries an index, e.g. `table.field["key"]` or
/// `field[key]`.
#[must_use]
pub fn is_indexed_identifier(id: &str) -> bool {
    id.contains(INDEXED_IDENTIFIER_CHARS)
}

/// Components of a split identifier.
///
/// Unsplit forms look like `table.field["key"]`, `table.field`, `field[key]`
/// or plain `field`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct IdentifierParts {
    /// Component before the first dot, if any
    pub table: Option<String>,
    /// Field component
    pub field: String,
    /// Index key with surrounding brackets and quotes stripped, if any
    pub key: Option<String>,
}

/// Split an identifier into `{table, field, key}` parts.
///
/// The first `.` separates the table from the field; the first bracketed
/// segment inside the field becomes the key.
#[must_use]
pub fn split_identifier(id: &str) -> IdentifierParts {
    let mut parts = IdentifierParts::default();

    match id.split_once('.') {
        Some((table, field)) => {
            parts.table = Some(table.to_string());
            parts.field = field.to_string();
        }
        None => parts.field = id.to_string(),
    }

    if let Some(key_idx) = parts.field.find(INDEXED_IDENTIFIER_CHARS) {
        if key_idx > 0 {
            let field_and_key = parts.field.clone();
            parts.field = field_and_key[..key_idx].to_string();
            let key = field_and_key[key_idx..]
                .trim_matches(|c| INDEXED_IDENTIFIER_CHARS.contains(&c));
            parts.key = Some(key.to_string());
        }
    }

    parts
}

/// Components of a split swagger type, e.g. `app.type` or bare `type`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SwaggerTypeParts {
    /// Component before the first dot, if any
    pub app: Option<String>,
    /// Type component
    pub type_name: String,
}

/// Split a swagger type into `{app, type}` on the first dot.
#[must_use]
pub fn split_swagger_type(swtype: &str) -> SwaggerTypeParts {
    match swtype.split_once('.') {
        Some((app, type_name)) => SwaggerTypeParts {
            app: Some(app.to_string()),
            type_name: type_name.to_string(),
        },
        None => SwaggerTypeParts {
            app: None,
            type_name: swtype.to_string(),
        },
    }
}

impl fmt::Display for SwaggerTypeParts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.app {
            Some(app) => write!(f, "{}.{}", app, self.type_name),
            None => f.write_str(&self.type_name),
        }
    }
}
