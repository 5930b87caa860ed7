//! Abstract syntax tree for SEAL policies.
//!
//! Every node renders a canonical surface form through `Display`; parsing
//! that form back yields a structurally equal tree. Condition nodes also
//! expose `get_types`, collecting the `TYPE_PATTERN` identifiers inside —
//! the validator walks where clauses with it.

use crate::token::{Token, TokenKind};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A parsed set of policy statements
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Policies {
    /// Statements in source order
    pub statements: Vec<Statement>,
}

impl fmt::Display for Policies {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for stmt in &self.statements {
            write!(f, "{}", stmt)?;
        }
        Ok(())
    }
}

/// A top-level statement
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Statement {
    /// `action-id [subject] to verb type-pattern [where …];`
    Action(ActionStatement),
    /// `context { … } [to verb] [type-pattern] { … }`
    Context(ContextStatement),
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Action(stmt) => write!(f, "{}", stmt),
            Self::Context(stmt) => write!(f, "{}", stmt),
        }
    }
}

/// An identifier together with its token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identifier {
    /// The identifier's token
    pub token: Token,
    /// Identifier value
    pub value: String,
}

impl Identifier {
    /// Create an identifier from a token, mirroring its literal
    #[must_use]
    pub fn from_token(token: Token) -> Self {
        let value = token.literal.clone();
        Self { token, value }
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.token.kind == TokenKind::Literal {
            write!(f, "\"{}\"", self.token.literal)
        } else {
            f.write_str(&self.token.literal)
        }
    }
}

/// The requestor clause of a statement
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Subject {
    /// `subject group <name>`
    Group {
        /// Group name
        name: String,
    },
    /// `subject user <email>`
    User {
        /// User identity
        email: String,
    },
}

impl fmt::Display for Subject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Group { name } => write!(f, "subject group {}", name),
            Self::User { email } => write!(f, "subject user {}", email),
        }
    }
}

/// A `where` clause wrapping a condition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WhereClause {
    /// The `where` token
    pub token: Token,
    /// The condition, absent when parsing failed mid-clause
    pub condition: Option<Condition>,
}

impl WhereClause {
    /// Collect `TYPE_PATTERN` identifiers inside the clause
    #[must_use]
    pub fn get_types(&self) -> Vec<&Identifier> {
        match &self.condition {
            Some(cond) => cond.get_types(),
            None => Vec::new(),
        }
    }
}

impl fmt::Display for WhereClause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.condition {
            Some(cond) => write!(f, "where {}", cond),
            None => Ok(()),
        }
    }
}

/// A where-clause condition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Condition {
    /// Identifier or string literal
    Identifier(Identifier),
    /// Integer literal
    Integer {
        /// The integer's token
        token: Token,
        /// Parsed value
        value: i64,
    },
    /// Bracketed array of integer and string literals
    Array {
        /// The `[` token
        token: Token,
        /// Array items
        items: Vec<Condition>,
    },
    /// Prefix operator application, e.g. `not <right>`
    Prefix {
        /// The operator token
        token: Token,
        /// Operator spelling
        operator: String,
        /// Operand
        right: Option<Box<Condition>>,
    },
    /// Infix operator application
    Infix {
        /// The operator token
        token: Token,
        /// Left operand
        left: Option<Box<Condition>>,
        /// Operator spelling
        operator: String,
        /// Right operand
        right: Option<Box<Condition>>,
    },
}

impl Condition {
    /// Collect `TYPE_PATTERN` identifiers inside the condition
    #[must_use]
    pub fn get_types(&self) -> Vec<&Identifier> {
        match self {
            Self::Identifier(id) => {
                if id.token.kind == TokenKind::TypePattern {
                    vec![id]
                } else {
                    Vec::new()
                }
            }
            Self::Integer { .. } | Self::Array { .. } => Vec::new(),
            Self::Prefix { right, .. } => right
                .as_deref()
                .map(Condition::get_types)
                .unwrap_or_default(),
            Self::Infix { left, right, .. } => {
                let mut out = Vec::new();
                if let Some(left) = left {
                    out.extend(left.get_types());
                }
                if let Some(right) = right {
                    out.extend(right.get_types());
                }
                out
            }
        }
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Identifier(id) => write!(f, "{}", id),
            Self::Integer { token, .. } => f.write_str(&token.literal),
            Self::Array { items, .. } => {
                f.write_str("[")?;
                for item in items {
                    write!(f, "{},", item)?;
                }
                f.write_str("]")
            }
            Self::Prefix { operator, right, .. } => {
                write!(f, "({}", operator)?;
                if let Some(right) = right {
                    write!(f, " {}", right)?;
                }
                f.write_str(")")
            }
            Self::Infix {
                left,
                operator,
                right,
                ..
            } => {
                f.write_str("(")?;
                if let Some(left) = left {
                    write!(f, "{}", left)?;
                }
                write!(f, " {} ", operator)?;
                if let Some(right) = right {
                    write!(f, "{}", right)?;
                }
                f.write_str(")")
            }
        }
    }
}

/// `action-id [subject] to verb type-pattern [where …];`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionStatement {
    /// The statement's leading token
    pub token: Token,
    /// Action identifier (`allow`, `deny`, …)
    pub action: Identifier,
    /// Optional subject clause
    pub subject: Option<Subject>,
    /// Verb identifier
    pub verb: Option<Identifier>,
    /// Resource type pattern
    pub type_pattern: Option<Identifier>,
    /// Optional where clause
    pub where_clause: Option<WhereClause>,
}

impl fmt::Display for ActionStatement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ", self.token.literal)?;
        if let Some(subject) = &self.subject {
            write!(f, "{} ", subject)?;
        }
        if let Some(verb) = &self.verb {
            write!(f, "to {} ", verb.token.literal)?;
        }
        if let Some(tp) = &self.type_pattern {
            f.write_str(&tp.token.literal)?;
        }
        if let Some(wc) = &self.where_clause {
            write!(f, " {}", wc)?;
        }
        f.write_str(";")
    }
}

/// One condition entry of a context statement
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ContextCondition {
    /// Optional subject clause
    pub subject: Option<Subject>,
    /// Optional where clause
    pub where_clause: Option<WhereClause>,
}

impl ContextCondition {
    /// Whether neither a subject nor a where clause is present
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.subject.is_none() && self.where_clause.is_none()
    }
}

impl fmt::Display for ContextCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(subject) = &self.subject {
            write!(f, "{} ", subject)?;
        }
        if let Some(wc) = &self.where_clause {
            write!(f, "{} ", wc)?;
        }
        f.write_str(";")
    }
}

/// One rule entry of a context statement; either a nested context or a flat
/// action head
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ContextActionRule {
    /// Nested context, exclusive with the flat fields
    pub context: Option<ContextStatement>,
    /// Action identifier
    pub action: Option<Identifier>,
    /// Optional subject clause
    pub subject: Option<Subject>,
    /// Optional verb override
    pub verb: Option<Identifier>,
    /// Optional type-pattern override
    pub type_pattern: Option<Identifier>,
    /// Optional where clause
    pub where_clause: Option<WhereClause>,
}

impl fmt::Display for ContextActionRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(ctx) = &self.context {
            write!(f, "{} {{ ", ctx)?;
        }
        if let Some(action) = &self.action {
            write!(f, "{} ", action)?;
        }
        if let Some(subject) = &self.subject {
            write!(f, "{} ", subject)?;
        }
        if let Some(verb) = &self.verb {
            write!(f, "to {} ", verb)?;
        }
        if let Some(tp) = &self.type_pattern {
            write!(f, "{} ", tp)?;
        }
        if let Some(wc) = &self.where_clause {
            write!(f, "{} ", wc)?;
        }
        if self.context.is_some() {
            f.write_str("}")
        } else {
            f.write_str(";")
        }
    }
}

/// `context { conditions } [to verb] [type-pattern] { rules }`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextStatement {
    /// The `context` token
    pub token: Token,
    /// Condition entries; an empty block is synthesised to one empty entry
    pub conditions: Vec<ContextCondition>,
    /// Optional verb shared by the rules
    pub verb: Option<Identifier>,
    /// Optional type pattern shared by the rules
    pub type_pattern: Option<Identifier>,
    /// Rule entries
    pub action_rules: Vec<ContextActionRule>,
}

impl fmt::Display for ContextStatement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {{ ", self.token.literal)?;
        for cond in &self.conditions {
            write!(f, "{} ", cond)?;
        }
        f.write_str("} ")?;
        if let Some(verb) = &self.verb {
            write!(f, "to {} ", verb)?;
        }
        if let Some(tp) = &self.type_pattern {
            write!(f, "{} ", tp)?;
        }
        f.write_str("{ ")?;
        for rule in &self.action_rules {
            write!(f, "{} ", rule)?;
        }
        f.write_str("}")
    }
}
