//! Type and property mapping from SEAL identifiers to SQL tables/columns.

use crate::dialect::SqlDialect;
use crate::error::SqlError;
use seal_lang::{split_identifier, split_swagger_type};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// JSONB object accessor, `->`
pub const JSONB_OBJECT_OPERATOR: &str = "->";
/// JSONB text accessor, `->>`
pub const JSONB_TEXT_OPERATOR: &str = "->>";
/// JSONB existence test, `?`
pub const JSONB_EXISTS_OPERATOR: &str = "?";

/// Mapping parameters for one property of a swagger type.
///
/// The property name can be `*` to match any property when no specific
/// mapper exists; a column name of `*` keeps whatever property name matched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyMapper {
    seal_property: String,
    sql_column: String,
    jsonb_operator: String,
    jsonb_int_key: bool,
}

impl PropertyMapper {
    /// Create a mapper for the named property; the column defaults to the
    /// property name and the JSONB operator to `->`
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            sql_column: name.clone(),
            seal_property: name,
            jsonb_operator: JSONB_OBJECT_OPERATOR.to_string(),
            jsonb_int_key: false,
        }
    }

    /// Map the property to this column; `*` keeps the matched property name
    #[must_use]
    pub fn to_sql_column(mut self, name: impl Into<String>) -> Self {
        self.sql_column = name.into();
        self
    }

    /// Use this JSONB operator for indexed properties
    #[must_use]
    pub fn use_jsonb_operator(mut self, operator: impl Into<String>) -> Self {
        self.jsonb_operator = operator.into();
        self
    }

    /// Treat JSONB index keys as unquoted unsigned integers
    #[must_use]
    pub fn use_jsonb_int_key(mut self, flag: bool) -> Self {
        self.jsonb_int_key = flag;
        self
    }

    /// Property name this mapper applies to
    #[must_use]
    pub fn seal_property(&self) -> &str {
        &self.seal_property
    }
}

/// Mapping parameters for a swagger type.
///
/// The type name can be `app.*` to match any type of an application when no
/// specific mapper exists; a table name of `*` keeps the matched type name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeMapper {
    swagger_type: String,
    sql_table: String,
    properties: BTreeMap<String, PropertyMapper>,
}

impl TypeMapper {
    /// Create a mapper for the named swagger type; the table defaults to
    /// the type name
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            sql_table: name.clone(),
            swagger_type: name,
            properties: BTreeMap::new(),
        }
    }

    /// Map the type to this table; `*` keeps the matched type name
    #[must_use]
    pub fn to_sql_table(mut self, name: impl Into<String>) -> Self {
        self.sql_table = name.into();
        self
    }

    /// Add a property mapper; adding the same property again replaces it
    #[must_use]
    pub fn with_property_mapper(mut self, mapper: PropertyMapper) -> Self {
        self.properties
            .insert(mapper.seal_property().to_string(), mapper);
        self
    }

    /// Rewrite `id` to its SQL table/column form when this mapper matches
    /// `swtype` and the identifier's property.
    ///
    /// Unmatched types and properties return `id` unchanged; a more
    /// specific mapper always takes precedence over a `*` fallback.
    ///
    /// # Errors
    ///
    /// Indexed identifiers fail under a dialect without JSONB, and under an
    /// integer-key mapping when the key is not an unsigned integer.
    pub fn replace_identifier(
        &self,
        dialect: SqlDialect,
        swtype: &str,
        id: &str,
    ) -> Result<String, SqlError> {
        if swtype != self.swagger_type {
            let mut wildcard = split_swagger_type(swtype);
            wildcard.type_name = "*".to_string();
            if wildcard.to_string() != self.swagger_type {
                return Ok(id.to_string());
            }
        }

        let id_parts = split_identifier(id);
        let Some(mapper) = self
            .properties
            .get(&id_parts.field)
            .or_else(|| self.properties.get("*"))
        else {
            return Ok(id.to_string());
        };

        let key = id_parts.key.as_deref().filter(|key| !key.is_empty());
        if let Some(key) = key {
            if dialect != SqlDialect::Postgres {
                return Err(SqlError::JsonbDialect {
                    dialect,
                    swtype: swtype.to_string(),
                    id: id.to_string(),
                });
            }
            if mapper.jsonb_int_key && key.parse::<u64>().is_err() {
                return Err(SqlError::JsonbIntKey {
                    swtype: swtype.to_string(),
                    id: id.to_string(),
                });
            }
        }

        let mut out = String::new();
        if self.sql_table == "*" {
            out.push_str(&split_swagger_type(swtype).type_name);
        } else {
            out.push_str(&self.sql_table);
        }
        out.push('.');
        if mapper.sql_column == "*" {
            out.push_str(&id_parts.field);
        } else {
            out.push_str(&mapper.sql_column);
        }

        if let Some(key) = key {
            out.push_str(&mapper.jsonb_operator);
            if mapper.jsonb_int_key {
                out.push_str(key);
            } else {
                out.push('\'');
                out.push_str(key);
                out.push('\'');
            }
        }

        Ok(out)
    }
}
