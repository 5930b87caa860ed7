//! SQL translation errors.

use crate::dialect::SqlDialect;
use thiserror::Error;

/// Error translating a SEAL condition into SQL
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SqlError {
    /// The condition failed to parse
    #[error("{0}")]
    Parse(String),

    /// An identifier kept its index after all mapping ran
    #[error("do not know how to SQL-convert indexed-identifier: {0}")]
    UnsupportedIndexed(String),

    /// `in` whose right-hand side is not an array literal
    #[error("IN operator requires an array literal: {0}")]
    UnsupportedIn(String),

    /// A condition form with no SQL rendering
    #[error("do not know how to SQL-convert condition: {0}")]
    UnsupportedCondition(String),

    /// `=~` under a dialect without regex matching
    #[error("SQL dialect {dialect} does not support regex match")]
    RegexDialect {
        /// Configured dialect
        dialect: SqlDialect,
    },

    /// JSONB conversion under a dialect without JSONB
    #[error("SQL dialect {dialect} does not support JSONB conversion of type/id: {swtype}/{id}")]
    JsonbDialect {
        /// Configured dialect
        dialect: SqlDialect,
        /// Swagger type of the identifier
        swtype: String,
        /// The identifier
        id: String,
    },

    /// Integer-key JSONB mapping with a non-integer key
    #[error("JSONB index key is not unsigned-integer for type/id: {swtype}/{id}")]
    JsonbIntKey {
        /// Swagger type of the identifier
        swtype: String,
        /// The identifier
        id: String,
    },

    /// An identifier replacer failed; carries its position and input
    #[error("replacer {index} on identifier '{id}' failed: {message}")]
    IdentifierReplacer {
        /// Replacer position in the chain
        index: usize,
        /// Identifier passed to the replacer
        id: String,
        /// Underlying message
        message: String,
    },

    /// A literal replacer failed; carries its position and input
    #[error("replacer {index} on literal '{literal}' failed: {message}")]
    LiteralReplacer {
        /// Replacer position in the chain
        index: usize,
        /// Literal passed to the replacer
        literal: String,
        /// Underlying message
        message: String,
    },
}
