//! SQL dialect selection.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Target SQL dialect
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SqlDialect {
    /// No dialect chosen; JSONB and regex forms are rejected
    #[default]
    Unknown,
    /// PostgreSQL
    Postgres,
}

impl fmt::Display for SqlDialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unknown => f.write_str("DialectUnknown"),
            Self::Postgres => f.write_str("DialectPostgres"),
        }
    }
}
