//! Catalogue construction errors.
//!
//! Schema parsing aborts on the first structural error; a partial catalogue
//! is never exposed.

use thiserror::Error;

/// Error building the resource-type catalogue
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    /// Document failed to parse as YAML/JSON
    #[error("could not load swagger yaml: {0}")]
    Load(String),

    /// Document declared no usable schemas
    #[error("no schemas found")]
    NoSchemas,

    /// A schema entry does not deserialize
    #[error("swagger model {name} has errors: {message}")]
    InvalidModel {
        /// Schema key
        name: String,
        /// Underlying message
        message: String,
    },

    /// A resource type declares no actions
    #[error("no actions defined for type {name}")]
    NoActions {
        /// Type key
        name: String,
    },

    /// A resource type declares no verbs
    #[error("no verbs defined for type {name}")]
    NoVerbs {
        /// Type key
        name: String,
    },

    /// A resource type declares no default action
    #[error("no default action defined for type {name}")]
    NoDefaultAction {
        /// Type key
        name: String,
    },

    /// A schema carries neither properties nor `additionalProperties`
    #[error("no properties defined for type {name}")]
    NoProperties {
        /// Type key
        name: String,
    },
}
