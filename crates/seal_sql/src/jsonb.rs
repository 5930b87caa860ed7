//! Standalone JSONB rewriting for indexed identifiers.
//!
//! A lighter alternative to [`crate::TypeMapper`] for callers that only
//! need `table.field["key"]` rewritten to `table.field->'key'`, without
//! table or column renaming.

use crate::dialect::SqlDialect;
use crate::error::SqlError;
use crate::mapper::JSONB_OBJECT_OPERATOR;
use seal_lang::IdentifierParts;
use serde::{Deserialize, Serialize};

/// JSONB conversion parameters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JsonbReplacer {
    operator: String,
    numeric_key: bool,
}

impl JsonbReplacer {
    /// Create a replacer using the `->` operator and quoted keys
    #[must_use]
    pub fn new() -> Self {
        Self {
            operator: JSONB_OBJECT_OPERATOR.to_string(),
            numeric_key: false,
        }
    }

    /// Use this JSONB operator
    #[must_use]
    pub fn with_operator(mut self, operator: impl Into<String>) -> Self {
        self.operator = operator.into();
        self
    }

    /// Treat index keys as unquoted unsigned integers
    #[must_use]
    pub fn with_numeric_key(mut self, numeric: bool) -> Self {
        self.numeric_key = numeric;
        self
    }

    /// Rewrite an indexed identifier into its JSONB form.
    ///
    /// Identifiers without a key pass through unchanged.
    ///
    /// # Errors
    ///
    /// Fails under a dialect without JSONB, and under numeric-key mode when
    /// the key is not an unsigned integer.
    pub fn replace(
        &self,
        dialect: SqlDialect,
        parts: &IdentifierParts,
        id: &str,
    ) -> Result<String, SqlError> {
        if dialect != SqlDialect::Postgres {
            return Err(SqlError::JsonbDialect {
                dialect,
                swtype: String::new(),
                id: id.to_string(),
            });
        }

        let Some(key) = parts.key.as_deref().filter(|key| !key.is_empty()) else {
            return Ok(id.to_string());
        };
        if self.numeric_key && key.parse::<u64>().is_err() {
            return Err(SqlError::JsonbIntKey {
                swtype: String::new(),
                id: id.to_string(),
            });
        }

        let mut out = String::new();
        if let Some(table) = &parts.table {
            out.push_str(table);
            out.push('.');
        }
        out.push_str(&parts.field);
        out.push_str(&self.operator);
        if self.numeric_key {
            out.push_str(key);
        } else {
            out.push('\'');
            out.push_str(key);
            out.push('\'');
        }
        Ok(out)
    }
}

impl Default for JsonbReplacer {
    fn default() -> Self {
        Self::new()
    }
}
