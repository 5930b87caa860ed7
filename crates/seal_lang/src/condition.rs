//! Pratt parser for where-clause conditions.
//!
//! Top-down operator precedence over the condition grammar; lowest to
//! highest: `or` < `and` < `not` < equality < comparison < prefix.

use crate::ast::{Condition, Identifier, WhereClause};
use crate::lexer::Lexer;
use crate::parser::Parser;
use crate::token::TokenKind;
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt;

pub(crate) const PRECEDENCE_LOWEST: u8 = 1;
const PRECEDENCE_OR: u8 = 2;
const PRECEDENCE_AND: u8 = 3;
const PRECEDENCE_NOT: u8 = 4;
const PRECEDENCE_EQUALS: u8 = 5;
const PRECEDENCE_LESSGREATER: u8 = 6;
const PRECEDENCE_PREFIX: u8 = 9;

fn token_precedence(kind: TokenKind) -> u8 {
    match kind {
        TokenKind::Or => PRECEDENCE_OR,
        TokenKind::And => PRECEDENCE_AND,
        TokenKind::Not => PRECEDENCE_NOT,
        TokenKind::EqualTo | TokenKind::NotEqual => PRECEDENCE_EQUALS,
        TokenKind::LessThan
        | TokenKind::GreaterThan
        | TokenKind::LessEqual
        | TokenKind::GreaterEqual
        | TokenKind::Match
        | TokenKind::In => PRECEDENCE_LESSGREATER,
        _ => PRECEDENCE_LOWEST,
    }
}

fn has_infix(kind: TokenKind) -> bool {
    matches!(
        kind,
        TokenKind::EqualTo
            | TokenKind::NotEqual
            | TokenKind::LessThan
            | TokenKind::GreaterThan
            | TokenKind::LessEqual
            | TokenKind::GreaterEqual
            | TokenKind::Match
            | TokenKind::In
            | TokenKind::And
            | TokenKind::Or
    )
}

impl Parser {
    pub(crate) fn parse_where_clause(&mut self) -> WhereClause {
        let token = self.cur_token.clone();
        self.next_token();
        let condition = self.parse_condition(PRECEDENCE_LOWEST);
        let wc = WhereClause { token, condition };
        tracing::trace!(where_clause = %wc, "parsed where clause");
        wc
    }

    pub(crate) fn parse_condition(&mut self, precedence: u8) -> Option<Condition> {
        let mut left = match self.cur_token.kind {
            TokenKind::TypePattern | TokenKind::Literal => Some(Condition::Identifier(
                Identifier::from_token(self.cur_token.clone()),
            )),
            TokenKind::Int => self.parse_integer_literal(),
            TokenKind::Not => self.parse_prefix_condition(),
            TokenKind::OpenParen => self.parse_grouped_condition(),
            TokenKind::OpenSq => self.parse_array_literal(),
            _ => {
                self.errors.push(format!(
                    "no prefix condition parse function for {} found",
                    self.cur_token.kind
                ));
                return None;
            }
        };

        while !self.peek_token_is(TokenKind::Delimiter)
            && precedence < token_precedence(self.peek_token.kind)
        {
            if !has_infix(self.peek_token.kind) {
                break;
            }
            self.next_token();
            left = self.parse_infix_condition(left);
        }
        left
    }

    fn parse_integer_literal(&mut self) -> Option<Condition> {
        let token = self.cur_token.clone();
        match token.literal.parse::<i64>() {
            Ok(value) => Some(Condition::Integer { token, value }),
            Err(_) => {
                self.errors
                    .push(format!("could not parse {:?} as integer", token.literal));
                None
            }
        }
    }

    fn parse_prefix_condition(&mut self) -> Option<Condition> {
        let token = self.cur_token.clone();
        let operator = token.literal.clone();
        self.next_token();
        let right = match token.kind {
            TokenKind::Not => self.parse_condition(PRECEDENCE_NOT),
            _ => self.parse_condition(PRECEDENCE_PREFIX),
        };
        Some(Condition::Prefix {
            token,
            operator,
            right: right.map(Box::new),
        })
    }

    fn parse_infix_condition(&mut self, left: Option<Condition>) -> Option<Condition> {
        let token = self.cur_token.clone();
        let operator = token.literal.clone();
        let precedence = token_precedence(token.kind);
        self.next_token();
        let right = self.parse_condition(precedence);

        let condition = Condition::Infix {
            token: token.clone(),
            left: left.map(Box::new),
            operator,
            right: right.map(Box::new),
        };

        if token.kind == TokenKind::Or {
            self.errors.push(format!(
                "OR-operator not supported yet for condition '{}'",
                condition
            ));
            return None;
        }
        Some(condition)
    }

    fn parse_grouped_condition(&mut self) -> Option<Condition> {
        self.next_token();
        let condition = self.parse_condition(PRECEDENCE_LOWEST);
        if !self.expect_peek(TokenKind::CloseParen) {
            return None;
        }
        condition
    }

    fn parse_array_literal(&mut self) -> Option<Condition> {
        let token = self.cur_token.clone();
        let mut items = Vec::new();

        self.next_token();
        while !self.cur_token_is(TokenKind::CloseSq) {
            match self.cur_token.kind {
                TokenKind::Eof | TokenKind::Delimiter => {
                    self.errors.push(format!(
                        "unexpected end of array literal {:?}",
                        self.cur_token.literal
                    ));
                    return None;
                }
                TokenKind::Int => {
                    if let Some(item) = self.parse_integer_literal() {
                        items.push(item);
                    }
                }
                TokenKind::Literal => {
                    items.push(Condition::Identifier(Identifier::from_token(
                        self.cur_token.clone(),
                    )));
                }
                _ => {
                    self.errors.push(format!(
                        "unexpected {:?} in array literal, only integer or string literals currently supported",
                        self.cur_token.literal
                    ));
                    return None;
                }
            }

            self.next_token();
            if self.cur_token_is(TokenKind::Comma) {
                self.next_token();
            }
        }

        Some(Condition::Array { token, items })
    }
}

/// Failure of [`parse_condition_str`]: the joined parser diagnostics
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConditionParseError {
    message: String,
}

impl fmt::Display for ConditionParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl Error for ConditionParseError {}

/// Parse a bare condition string (no statements) into its AST.
///
/// Used by back ends that compile standalone predicates.
///
/// # Errors
///
/// Returns the joined parser diagnostics when the condition is malformed.
pub fn parse_condition_str(input: &str) -> Result<Condition, ConditionParseError> {
    let mut parser = Parser::new(Lexer::new(input), Vec::new());
    let condition = parser.parse_condition(PRECEDENCE_LOWEST);
    if !parser.errors().is_empty() {
        return Err(ConditionParseError {
            message: parser.errors().join("\n"),
        });
    }
    condition.ok_or_else(|| ConditionParseError {
        message: format!("unknown error parsing condition: {}", input),
    })
}

/// Split a leading `k1:v1, k2:v2;` annotation map off a condition string.
///
/// Returns the annotation map and the remaining portion. Without a
/// semicolon the map is empty and the whole input is the remainder.
#[must_use]
pub fn split_key_value_annotations(input: &str) -> (BTreeMap<String, String>, String) {
    let Some((head, rest)) = input.split_once(';') else {
        return (BTreeMap::new(), input.to_string());
    };

    let mut annotations = BTreeMap::new();
    for pair in head.split(',') {
        let pair = pair.trim();
        if pair.is_empty() {
            continue;
        }
        let (key, value) = match pair.split_once(':') {
            Some((key, value)) => (key.trim(), value.trim()),
            None => (pair, ""),
        };
        if key.is_empty() {
            continue;
        }
        annotations.insert(key.to_string(), value.to_string());
    }
    (annotations, rest.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{Policies, Statement};

    const TYPES: &str = r#"
openapi: "3.0.0"
components:
  schemas:
    allow:
      type: object
      properties:
        log:
          type: boolean
      x-seal-type: action
    petstore.pet:
      type: object
      x-seal-actions:
      - allow
      - deny
      x-seal-verbs:
        inspect:
        read:
        use:
        manage:
        buy:
      x-seal-default-action: deny
      properties:
        id:
          type: string
        name:
          type: string
        status:
          type: string
        age:
          type: integer
          format: int32
        is_healthy:
          type: bool
    iam.user:
      type: object
      x-seal-actions:
      - allow
      - deny
      x-seal-verbs:
        inspect:
        read:
        use:
        manage:
        sign_in:
      x-seal-default-action: deny
      properties:
        id:
          type: string
        email:
          type: string
"#;

    fn parse_policies(input: &str) -> Policies {
        let types = seal_schema::types_from_openapi(TYPES).unwrap();
        let mut parser = Parser::new(Lexer::new(input), types);
        let policies = parser.parse_policies();
        assert!(
            parser.errors().is_empty(),
            "unexpected errors for {:?}: {:?}",
            input,
            parser.errors()
        );
        policies
    }

    #[test]
    fn test_where_clause_canonical_forms() {
        let cases = [
            (
                "allow subject user cto@acme.com to manage petstore.pet;",
                "allow subject user cto@acme.com to manage petstore.pet;",
            ),
            (
                "allow subject group managers to manage iam.*;",
                "allow subject group managers to manage iam.*;",
            ),
            (
                "allow subject group customers to buy petstore.pet where ctx.status == \"available\";",
                "allow subject group customers to buy petstore.pet where (ctx.status == \"available\");",
            ),
            (
                "allow subject group customers to buy petstore.pet where ctx.status != \"available\";",
                "allow subject group customers to buy petstore.pet where (ctx.status != \"available\");",
            ),
            (
                "allow subject group customers to buy petstore.pet where ctx.age > 2;",
                "allow subject group customers to buy petstore.pet where (ctx.age > 2);",
            ),
            (
                "allow subject group customers to buy petstore.pet where ctx.status == \"available\" and ctx.is_healthy == \"true\";",
                "allow subject group customers to buy petstore.pet where ((ctx.status == \"available\") and (ctx.is_healthy == \"true\"));",
            ),
            (
                "allow subject group customers to buy petstore.pet where ctx.status == \"available\" and ctx.is_healthy == \"true\" and ctx.name == \"fido\";",
                "allow subject group customers to buy petstore.pet where (((ctx.status == \"available\") and (ctx.is_healthy == \"true\")) and (ctx.name == \"fido\"));",
            ),
            (
                "allow subject group customers to buy petstore.pet where not (ctx.status == \"available\" and ctx.is_healthy == \"true\");",
                "allow subject group customers to buy petstore.pet where (not ((ctx.status == \"available\") and (ctx.is_healthy == \"true\")));",
            ),
            (
                "allow to manage petstore.pet where ctx.status in [ \"available\", 2 ];",
                "allow to manage petstore.pet where (ctx.status in [\"available\",2,]);",
            ),
        ];
        for (input, expected) in cases {
            let policies = parse_policies(input);
            assert_eq!(policies.to_string(), expected, "input {:?}", input);
        }
    }

    #[test]
    fn test_not_binds_tighter_than_and() {
        let policies = parse_policies(
            "allow to buy petstore.pet where not ctx.id == \"bar\" and not ctx.name == \"foo\";",
        );
        assert_eq!(
            policies.to_string(),
            "allow to buy petstore.pet where ((not (ctx.id == \"bar\")) and (not (ctx.name == \"foo\")));"
        );
    }

    #[test]
    fn test_or_operator_is_rejected() {
        let types = seal_schema::types_from_openapi(TYPES).unwrap();
        let mut parser = Parser::new(
            Lexer::new(
                "allow to buy petstore.pet where ctx.id == \"bar\" or ctx.name == \"foo\";",
            ),
            types,
        );
        parser.parse_policies();
        assert!(
            parser
                .errors()
                .iter()
                .any(|e| e.contains("OR-operator not supported yet")),
            "errors: {:?}",
            parser.errors()
        );
    }

    #[test]
    fn test_parse_condition_str() {
        let cases = [
            ("ctx.age > 65", "(ctx.age > 65)"),
            ("(ctx.age > 65)", "(ctx.age > 65)"),
            ("((ctx.age > 65))", "(ctx.age > 65)"),
        ];
        for (input, expected) in cases {
            let cond = parse_condition_str(input).unwrap();
            assert_eq!(cond.to_string(), expected, "input {:?}", input);
        }

        assert!(parse_condition_str("(((ctx.age > 65))").is_err());
        assert!(parse_condition_str("age > 65").is_err());
    }

    #[test]
    fn test_statement_round_trip() {
        let inputs = [
            "allow subject group customers to buy petstore.pet where ((ctx.status == \"available\") and (ctx.is_healthy == \"true\"));",
            "allow to manage petstore.pet where (ctx.status in [\"available\",2,]);",
            "allow to buy petstore.pet where (not (ctx.age > 2));",
        ];
        for input in inputs {
            let first = parse_policies(input);
            let second = parse_policies(&first.to_string());
            assert_eq!(first, second, "round trip failed for {:?}", input);
            match (&first.statements[0], &second.statements[0]) {
                (Statement::Action(a), Statement::Action(b)) => assert_eq!(a, b),
                _ => panic!("expected action statements"),
            }
        }
    }

    #[test]
    fn test_split_key_value_annotations() {
        let cases: &[(&str, &str, &[(&str, &str)])] = &[
            (" a b c d ", " a b c d ", &[]),
            (" ; a b c d ", " a b c d ", &[]),
            (" , ; a b c d ", " a b c d ", &[]),
            ("k1; a b c d ", " a b c d ", &[("k1", "")]),
            ("k1: v1 ; a b c d ", " a b c d ", &[("k1", "v1")]),
            ("k1: v1 , ; a b c d ", " a b c d ", &[("k1", "v1")]),
            (
                "k1: v1 , k2 : v2 ; a b c d ",
                " a b c d ",
                &[("k1", "v1"), ("k2", "v2")],
            ),
            (
                "k 1: v 1 , k 2 : v 2 ; a b c d ",
                " a b c d ",
                &[("k 1", "v 1"), ("k 2", "v 2")],
            ),
        ];
        for (input, remaining, pairs) in cases {
            let (map, rest) = split_key_value_annotations(input);
            assert_eq!(rest, *remaining, "remainder for {:?}", input);
            let expected: BTreeMap<String, String> = pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect();
            assert_eq!(map, expected, "map for {:?}", input);
        }
    }
}
