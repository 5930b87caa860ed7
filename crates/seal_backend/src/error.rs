//! Code-generation errors.
//!
//! Back ends fail fast on the first error: later rules may reuse
//! unique-name counters and would produce confusing cascading output.

use thiserror::Error;

/// Error from a backend compiler
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompileError {
    /// No backend language was given
    #[error("invalid empty language")]
    EmptyLanguage,

    /// The requested backend language has no registered constructor
    #[error("invalid compiler language: {0}")]
    UnknownLanguage(String),

    /// The policy set contains no statements
    #[error("invalid empty policies")]
    EmptyPolicies,

    /// A statement carries no verb
    #[error("invalid empty verb")]
    EmptyVerb,

    /// A statement carries no type pattern
    #[error("invalid empty type-pattern")]
    EmptyTypePattern,

    /// `or` in a where clause
    #[error("OR operator not supported yet")]
    OrNotSupported,

    /// A where clause references a property the matched type lacks
    #[error("unknown property '{property}' of type '{type_name}'")]
    UnknownProperty {
        /// The property referenced
        property: String,
        /// The resolved type
        type_name: String,
    },

    /// An `x-seal-obligation` extension value is not a boolean
    #[error("bad bool value '{value}' for property '{property}' of type '{type_name}'")]
    BadObligationFlag {
        /// The extension value
        value: String,
        /// The property carrying it
        property: String,
        /// The resolved type
        type_name: String,
    },

    /// A statement failed to compile; carries its index and surface form
    #[error("at #{index} {statement} due to error: {source}")]
    Statement {
        /// Underlying failure
        source: Box<CompileError>,
        /// Zero-based statement index
        index: usize,
        /// Canonical statement text
        statement: String,
    },
}

impl CompileError {
    /// Wrap an error with the failing statement's index and surface form
    #[must_use]
    pub fn at_statement(self, index: usize, statement: String) -> Self {
        Self::Statement {
            source: Box::new(self),
            index,
            statement,
        }
    }
}
