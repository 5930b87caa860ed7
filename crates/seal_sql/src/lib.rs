//! SQL back end for SEAL predicates.
//!
//! Compiles standalone SEAL conditions (optionally prefixed with a
//! `type:<resource>;` annotation) into SQL `WHERE`-clause fragments, so
//! policy predicates can be pushed into data-store queries. Identifiers map
//! through configurable type/property mappers and replacer chains; indexed
//! tag-map properties become JSONB accessors on PostgreSQL.

#![warn(missing_docs)]
#![warn(clippy::all)]

mod condition;
mod dialect;
mod error;
mod jsonb;
mod mapper;

pub use condition::{IdentifierReplacerFn, LiteralReplacerFn, SqlCompiler};
pub use dialect::SqlDialect;
pub use error::SqlError;
pub use jsonb::JsonbReplacer;
pub use mapper::{
    PropertyMapper, TypeMapper, JSONB_EXISTS_OPERATOR, JSONB_OBJECT_OPERATOR, JSONB_TEXT_OPERATOR,
};
