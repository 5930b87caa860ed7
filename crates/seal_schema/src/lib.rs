//! SEAL resource-type catalogue.
//!
//! Builds the compiler's view of the world from OpenAPI-v3 documents:
//! resource types (`group.name`), their verbs and actions, their properties
//! with `x-seal-*` extension flags, and the `unknown.subject` pseudo-type
//! holding JWT claims.

#![warn(missing_docs)]
#![warn(clippy::all)]

mod error;
mod property;
mod types;

pub use error::SchemaError;
pub use property::Property;
pub use types::{
    is_valid_subject, merge_openapi, types_from_openapi, types_from_openapi_docs, ResourceType,
    SUBJECT, SUBJECT_TYPE,
};
