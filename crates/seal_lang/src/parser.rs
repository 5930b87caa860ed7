//! Recursive-descent parser for SEAL policy statements.
//!
//! The parser never aborts: diagnostics accumulate in a per-parse list and
//! the main loop re-synchronises by advancing to the next statement start.
//! Name resolution against the schema catalogue runs as a semantic pass as
//! each statement is completed.

use crate::ast::{
    ActionStatement, ContextActionRule, ContextCondition, ContextStatement, Identifier, Policies,
    Statement, Subject,
};
use crate::lexer::Lexer;
use crate::token::{Token, TokenKind};
use seal_schema::{is_valid_subject, ResourceType};
use std::collections::BTreeMap;

/// SEAL statement parser
pub struct Parser {
    lexer: Lexer,
    pub(crate) cur_token: Token,
    pub(crate) peek_token: Token,
    pub(crate) domain_types: BTreeMap<String, ResourceType>,
    pub(crate) errors: Vec<String>,
}

impl Parser {
    /// Create a parser over a lexer, resolving names against the given
    /// catalogue
    #[must_use]
    pub fn new(lexer: Lexer, domain_types: Vec<ResourceType>) -> Self {
        let mut parser = Self {
            lexer,
            cur_token: Token::new(TokenKind::Eof, ""),
            peek_token: Token::new(TokenKind::Eof, ""),
            domain_types: domain_types
                .into_iter()
                .map(|t| (t.to_string(), t))
                .collect(),
            errors: Vec::new(),
        };
        // prime cur_token and peek_token
        parser.next_token();
        parser.next_token();
        parser
    }

    /// Diagnostics accumulated so far
    #[must_use]
    pub fn errors(&self) -> &[String] {
        &self.errors
    }

    pub(crate) fn next_token(&mut self) {
        self.cur_token = std::mem::replace(&mut self.peek_token, self.lexer.next_token());
    }

    pub(crate) fn cur_token_is(&self, kind: TokenKind) -> bool {
        self.cur_token.kind == kind
    }

    pub(crate) fn peek_token_is(&self, kind: TokenKind) -> bool {
        self.peek_token.kind == kind
    }

    pub(crate) fn expect_peek(&mut self, kind: TokenKind) -> bool {
        if self.peek_token_is(kind) {
            self.next_token();
            return true;
        }
        self.peek_error(kind);
        false
    }

    fn peek_error(&mut self, kind: TokenKind) {
        self.errors.push(format!(
            "expected next token to be {}, got {} instead",
            kind, self.peek_token.kind
        ));
    }

    /// Parse the whole input into a policy tree
    pub fn parse_policies(&mut self) -> Policies {
        let mut policies = Policies::default();
        while !self.cur_token_is(TokenKind::Eof) {
            if let Some(stmt) = self.parse_statement() {
                policies.statements.push(stmt);
            }
            self.next_token();
        }
        policies
    }

    fn parse_statement(&mut self) -> Option<Statement> {
        tracing::trace!(token = %self.cur_token.kind, "parse statement");
        match self.cur_token.kind {
            TokenKind::Ident => self.parse_action_statement().map(Statement::Action),
            TokenKind::Context => self.parse_context_statement().map(Statement::Context),
            _ => None,
        }
    }

    /// Parse the subject clause `subject (group|user) IDENT`
    fn parse_subject(&mut self) -> Option<Subject> {
        self.next_token();

        match self.cur_token.kind {
            TokenKind::Group => {
                if !self.expect_peek(TokenKind::Ident) {
                    return None;
                }
                Some(Subject::Group {
                    name: self.cur_token.literal.clone(),
                })
            }
            TokenKind::User => {
                if !self.expect_peek(TokenKind::Ident) {
                    return None;
                }
                Some(Subject::User {
                    email: self.cur_token.literal.clone(),
                })
            }
            _ => {
                self.errors.push(format!(
                    "expected next token to be user or group, got {} instead",
                    self.cur_token.kind
                ));
                None
            }
        }
    }

    fn parse_action_statement(&mut self) -> Option<ActionStatement> {
        let token = self.cur_token.clone();
        let mut stmt = ActionStatement {
            action: Identifier::from_token(token.clone()),
            token,
            subject: None,
            verb: None,
            type_pattern: None,
            where_clause: None,
        };

        // subject is optional
        if self.peek_token_is(TokenKind::Subject) {
            self.next_token();
            stmt.subject = self.parse_subject();
        }

        // "to" verb is required
        if !self.expect_peek(TokenKind::To) {
            return None;
        }
        if !self.expect_peek(TokenKind::Ident) {
            return None;
        }
        stmt.verb = Some(Identifier::from_token(self.cur_token.clone()));

        // resource is required
        if !self.expect_peek(TokenKind::TypePattern) {
            return None;
        }
        stmt.type_pattern = Some(Identifier::from_token(self.cur_token.clone()));

        // where clause is optional
        if self.peek_token_is(TokenKind::Where) {
            self.next_token();
            stmt.where_clause = Some(self.parse_where_clause());
        }

        if let Err(msg) = self.validate_action_statement(&stmt) {
            tracing::trace!(statement = %stmt, error = %msg, "action statement failed validation");
            self.errors.push(msg);
            return None;
        }
        tracing::trace!(statement = %stmt, "parsed action statement");
        Some(stmt)
    }

    fn parse_context_statement(&mut self) -> Option<ContextStatement> {
        let mut stmt = ContextStatement {
            token: self.cur_token.clone(),
            conditions: Vec::new(),
            verb: None,
            type_pattern: None,
            action_rules: Vec::new(),
        };

        // conditions block
        if !self.expect_peek(TokenKind::OpenBlock) {
            return None;
        }
        self.next_token();
        while !self.cur_token_is(TokenKind::CloseBlock) && !self.cur_token_is(TokenKind::Eof) {
            if self.cur_token_is(TokenKind::Delimiter) || self.cur_token_is(TokenKind::Comment) {
                self.next_token();
                continue;
            }

            let mut cond = ContextCondition::default();
            if self.cur_token_is(TokenKind::Subject) {
                cond.subject = self.parse_subject();
                self.next_token();
            }
            if self.cur_token_is(TokenKind::Where) {
                cond.where_clause = Some(self.parse_where_clause());
                self.next_token();
            }

            if cond.is_empty() {
                self.errors.push(format!(
                    "expected subject or where, got token type {}",
                    self.cur_token.kind
                ));
                return None;
            }
            stmt.conditions.push(cond);
        }

        // an empty conditions block still produces one (empty) condition
        if stmt.conditions.is_empty() {
            stmt.conditions.push(ContextCondition::default());
        }

        if self.peek_token_is(TokenKind::To) {
            self.next_token();
            if !self.expect_peek(TokenKind::Ident) {
                return None;
            }
            stmt.verb = Some(Identifier::from_token(self.cur_token.clone()));
        }

        if self.peek_token_is(TokenKind::TypePattern) {
            self.next_token();
            stmt.type_pattern = Some(Identifier::from_token(self.cur_token.clone()));
        }

        // rules block
        if !self.expect_peek(TokenKind::OpenBlock) {
            return None;
        }
        self.next_token();
        while !self.cur_token_is(TokenKind::CloseBlock) && !self.cur_token_is(TokenKind::Eof) {
            if self.cur_token_is(TokenKind::Delimiter) || self.cur_token_is(TokenKind::Comment) {
                self.next_token();
                continue;
            }

            let mut rule = ContextActionRule::default();
            if self.cur_token_is(TokenKind::Context) {
                rule.context = Some(self.parse_context_statement()?);
            } else {
                rule.action = Some(Identifier::from_token(self.cur_token.clone()));

                if self.peek_token_is(TokenKind::Subject) {
                    self.next_token();
                    rule.subject = self.parse_subject();
                }
                if self.peek_token_is(TokenKind::To) {
                    self.next_token();
                    if !self.expect_peek(TokenKind::Ident) {
                        return None;
                    }
                    rule.verb = Some(Identifier::from_token(self.cur_token.clone()));
                }
                if self.peek_token_is(TokenKind::TypePattern) {
                    self.next_token();
                    rule.type_pattern = Some(Identifier::from_token(self.cur_token.clone()));
                }
                if self.peek_token_is(TokenKind::Where) {
                    self.next_token();
                    rule.where_clause = Some(self.parse_where_clause());
                }
            }

            stmt.action_rules.push(rule);
            self.next_token();
        }

        if stmt.action_rules.is_empty() {
            self.errors.push(format!(
                "no actions in context at {}",
                self.cur_token.kind
            ));
            return None;
        }

        if let Err(msg) = self.validate_context_statement(&stmt) {
            self.errors.push(msg);
            return None;
        }
        tracing::trace!(statement = %stmt, "parsed context statement");
        Some(stmt)
    }

    fn validate_action_statement(&self, stmt: &ActionStatement) -> Result<(), String> {
        let Some(type_pattern) = &stmt.type_pattern else {
            return Ok(());
        };
        let Some(verb) = &stmt.verb else {
            return Err(format!(
                "verb must be specified for type {}",
                type_pattern.value
            ));
        };

        for (key, typ) in &self.domain_types {
            if !glob_match(&type_pattern.value, key)? {
                continue;
            }
            if !typ.is_valid_verb(&verb.value) {
                tracing::debug!(verb = %verb.value, type_name = %key, "verb is not valid for type");
                continue;
            }
            if !typ.is_valid_action(&stmt.action.value) {
                tracing::debug!(action = %stmt.action.value, type_name = %key, "action is not valid for type");
                continue;
            }

            if let Some(wc) = &stmt.where_clause {
                for id in wc.get_types() {
                    if !self.is_known_property(typ, &id.value) {
                        return Err(format!(
                            "property {} is not valid for type {} in where clause '{}'",
                            id.value, key, wc
                        ));
                    }
                }
            }

            // at least one type matched
            return Ok(());
        }

        Err(format!(
            "type pattern {} did not match any registered types",
            type_pattern.token.literal
        ))
    }

    fn validate_context_statement(&self, stmt: &ContextStatement) -> Result<(), String> {
        if stmt.verb.is_none() {
            // allowed only when every flat rule carries its own verb
            for rule in &stmt.action_rules {
                if rule.context.is_none() && rule.verb.is_none() {
                    return Err("verb must be specified for context or for action".to_string());
                }
            }
        }

        for rule in &stmt.action_rules {
            if rule.context.is_some() {
                continue;
            }
            for cond in &stmt.conditions {
                let mut unmatched: Option<String> = None;
                for (key, typ) in &self.domain_types {
                    let Some(type_pattern) =
                        rule.type_pattern.as_ref().or(stmt.type_pattern.as_ref())
                    else {
                        return Err(
                            "type pattern must be specified for context or for action".to_string()
                        );
                    };
                    if !glob_match(&type_pattern.value, key)? {
                        unmatched = Some(format!(
                            "type pattern {} did not match any registered types",
                            type_pattern.token.literal
                        ));
                        continue;
                    }
                    unmatched = None;

                    if let Some(verb) = rule.verb.as_ref().or(stmt.verb.as_ref()) {
                        if !typ.is_valid_verb(&verb.value) {
                            return Err(format!(
                                "verb {} is not valid for type {}",
                                verb.value, type_pattern.value
                            ));
                        }
                    }
                    if let Some(action) = &rule.action {
                        if !typ.is_valid_action(&action.value) {
                            return Err(format!(
                                "action {} is not valid for type {}",
                                action.value, type_pattern.value
                            ));
                        }
                    }

                    if let Some(wc) = &cond.where_clause {
                        for id in wc.get_types() {
                            if !self.is_known_property(typ, &id.value) {
                                return Err(format!(
                                    "property {} is not valid for type {} in where clause '{}'",
                                    id.value, key, wc
                                ));
                            }
                        }
                    }
                    break;
                }

                if let Some(msg) = unmatched {
                    return Err(msg);
                }
            }
        }
        Ok(())
    }

    /// A where-clause reference resolves as a type property, a subject
    /// property, or a tag-map index.
    fn is_known_property(&self, typ: &ResourceType, reference: &str) -> bool {
        typ.is_valid_property(reference)
            || is_valid_subject(&self.domain_types, reference)
            || typ.is_valid_tag(reference)
    }
}

fn glob_match(pattern: &str, name: &str) -> Result<bool, String> {
    glob::Pattern::new(pattern)
        .map(|p| p.matches(name))
        .map_err(|err| err.to_string())
}
