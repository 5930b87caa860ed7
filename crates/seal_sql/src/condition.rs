//! SEAL condition to SQL boolean expression.

use crate::dialect::SqlDialect;
use crate::error::SqlError;
use crate::mapper::TypeMapper;
use seal_lang::ast::Condition;
use seal_lang::token::TokenKind;
use seal_lang::{
    is_indexed_identifier, parse_condition_str, split_identifier, split_key_value_annotations,
    IdentifierParts,
};

/// Identifier replacer hook; receives the configured dialect, the split
/// identifier and the identifier text produced so far
pub type IdentifierReplacerFn =
    Box<dyn Fn(SqlDialect, &IdentifierParts, &str) -> Result<String, SqlError> + Send + Sync>;

/// Literal replacer hook; receives the configured dialect and the literal
/// body
pub type LiteralReplacerFn =
    Box<dyn Fn(SqlDialect, &str) -> Result<String, SqlError> + Send + Sync>;

/// SQL condition compiler.
///
/// Parses a (possibly `type:`-annotated) condition string and walks the AST
/// into a parenthesised SQL boolean expression, mapping identifiers through
/// type mappers first and then through the replacer chain, in order.
#[derive(Default)]
pub struct SqlCompiler {
    dialect: SqlDialect,
    type_mappers: Vec<TypeMapper>,
    identifier_replacers: Vec<IdentifierReplacerFn>,
    literal_replacers: Vec<LiteralReplacerFn>,
}

impl SqlCompiler {
    /// Create a compiler with no dialect and no mappings
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Target this SQL dialect
    #[must_use]
    pub fn with_dialect(mut self, dialect: SqlDialect) -> Self {
        self.dialect = dialect;
        self
    }

    /// Add a type mapper; mappers run in the order added
    #[must_use]
    pub fn with_type_mapper(mut self, mapper: TypeMapper) -> Self {
        self.type_mappers.push(mapper);
        self
    }

    /// Add an identifier replacer; replacers run in the order added
    #[must_use]
    pub fn with_identifier_replacer(
        mut self,
        replacer: impl Fn(SqlDialect, &IdentifierParts, &str) -> Result<String, SqlError>
            + Send
            + Sync
            + 'static,
    ) -> Self {
        self.identifier_replacers.push(Box::new(replacer));
        self
    }

    /// Add a literal replacer; replacers run in the order added
    #[must_use]
    pub fn with_literal_replacer(
        mut self,
        replacer: impl Fn(SqlDialect, &str) -> Result<String, SqlError> + Send + Sync + 'static,
    ) -> Self {
        self.literal_replacers.push(Box::new(replacer));
        self
    }

    /// Compile an annotated condition string into a SQL boolean expression.
    ///
    /// A leading `type:<resource>;` annotation names the swagger type the
    /// identifiers belong to; it steers type-mapper matching.
    ///
    /// # Errors
    ///
    /// Propagates parse errors and translation failures; the message always
    /// names the offending identifier or condition.
    pub fn compile_condition(&self, annotated_condition: &str) -> Result<String, SqlError> {
        let (annotations, condition) = split_key_value_annotations(annotated_condition);
        let swtype = annotations.get("type").cloned().unwrap_or_default();

        let ast =
            parse_condition_str(&condition).map_err(|err| SqlError::Parse(err.to_string()))?;

        let sql = self.condition_to_sql(&swtype, &ast)?;
        tracing::trace!(condition = %condition, sql = %sql, "compiled sql condition");
        Ok(sql)
    }

    fn condition_to_sql(&self, swtype: &str, condition: &Condition) -> Result<String, SqlError> {
        match condition {
            Condition::Identifier(id) => {
                if id.token.kind == TokenKind::Literal {
                    return self.quote_literal(&id.token.literal);
                }

                let mut text = id.token.literal.clone();
                for mapper in &self.type_mappers {
                    text = mapper.replace_identifier(self.dialect, swtype, &text)?;
                }
                text = self.apply_identifier_replacers(text)?;

                if is_indexed_identifier(&text) {
                    return Err(SqlError::UnsupportedIndexed(text));
                }
                Ok(text)
            }

            Condition::Integer { token, .. } => self.apply_literal_replacers(&token.literal),

            Condition::Array { .. } => {
                Err(SqlError::UnsupportedCondition(condition.to_string()))
            }

            Condition::Prefix { token, right, .. } => {
                let rhs = match right {
                    Some(right) => self.condition_to_sql(swtype, right)?,
                    None => String::new(),
                };
                match token.kind {
                    TokenKind::Not => Ok(format!("(NOT {rhs})")),
                    _ => Ok(format!("({} {})", token.literal, rhs)),
                }
            }

            Condition::Infix {
                token, left, right, ..
            } => {
                let lhs = match left {
                    Some(left) => self.condition_to_sql(swtype, left)?,
                    None => String::new(),
                };

                if token.kind == TokenKind::In {
                    let Some(Condition::Array { items, .. }) = right.as_deref() else {
                        return Err(SqlError::UnsupportedIn(condition.to_string()));
                    };
                    let mut rendered = Vec::with_capacity(items.len());
                    for item in items {
                        match item {
                            Condition::Identifier(id)
                                if id.token.kind == TokenKind::Literal =>
                            {
                                rendered.push(self.quote_literal(&id.token.literal)?);
                            }
                            Condition::Integer { token, .. } => {
                                rendered.push(self.apply_literal_replacers(&token.literal)?);
                            }
                            _ => {
                                return Err(SqlError::UnsupportedIn(condition.to_string()));
                            }
                        }
                    }
                    return Ok(format!("({} IN ({}))", lhs, rendered.join(", ")));
                }

                let rhs = match right {
                    Some(right) => self.condition_to_sql(swtype, right)?,
                    None => String::new(),
                };
                match token.kind {
                    TokenKind::And => Ok(format!("({lhs} AND {rhs})")),
                    TokenKind::Or => Ok(format!("({lhs} OR {rhs})")),
                    TokenKind::EqualTo => Ok(format!("({lhs} = {rhs})")),
                    TokenKind::Match => {
                        if self.dialect != SqlDialect::Postgres {
                            return Err(SqlError::RegexDialect {
                                dialect: self.dialect,
                            });
                        }
                        Ok(format!("({lhs} ~ {rhs})"))
                    }
                    _ => Ok(format!("{} {} {}", lhs, token.literal, rhs)),
                }
            }
        }
    }

    fn apply_identifier_replacers(&self, mut id: String) -> Result<String, SqlError> {
        for (index, replacer) in self.identifier_replacers.iter().enumerate() {
            let parts = split_identifier(&id);
            id = replacer(self.dialect, &parts, &id).map_err(|err| {
                SqlError::IdentifierReplacer {
                    index,
                    id: id.clone(),
                    message: err.to_string(),
                }
            })?;
        }
        Ok(id)
    }

    fn apply_literal_replacers(&self, literal: &str) -> Result<String, SqlError> {
        let mut literal = literal.to_string();
        for (index, replacer) in self.literal_replacers.iter().enumerate() {
            literal = replacer(self.dialect, &literal).map_err(|err| SqlError::LiteralReplacer {
                index,
                literal: literal.clone(),
                message: err.to_string(),
            })?;
        }
        Ok(literal)
    }

    /// Single-quote a string literal body, doubling embedded quotes
    fn quote_literal(&self, body: &str) -> Result<String, SqlError> {
        let replaced = self.apply_literal_replacers(body)?;
        Ok(format!("'{}'", replaced.replace('\'', "''")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jsonb::JsonbReplacer;
    use crate::mapper::{
        PropertyMapper, JSONB_OBJECT_OPERATOR, JSONB_TEXT_OPERATOR,
    };

    fn test_compiler(dialect: SqlDialect, jsonb_operator: &str, numeric_key: bool) -> SqlCompiler {
        let jsonb = JsonbReplacer::new()
            .with_operator(jsonb_operator)
            .with_numeric_key(numeric_key);
        SqlCompiler::new()
            .with_dialect(dialect)
            .with_identifier_replacer(move |dialect, parts, id| {
                if parts.field != "tags" {
                    return Ok(id.to_string());
                }
                jsonb.replace(dialect, parts, id)
            })
            .with_identifier_replacer(|_, _, id| {
                Ok(id.replace("ctx.", "mytable.").replace("subject.", "mytable."))
            })
            .with_literal_replacer(|_, literal| {
                Ok(literal.replace("foo", "bar").replace("314159", "271828"))
            })
    }

    #[test]
    fn test_compile_condition() {
        let ok_cases = [
            (
                "type:contacts.profile; foobar.qwerty == \"there's a single-quote in this string\"",
                "(foobar.qwerty = 'there''s a single-quote in this string')",
            ),
            (
                "subject.nbf < 123 and ctx.description == \"string with subject. in it\"",
                "(mytable.nbf < 123 AND (mytable.description = 'string with subject. in it'))",
            ),
            (
                "not subject.iss == \"string with ctx. in it\" and ctx.name =~ \".*goofy.*\"",
                "((NOT (mytable.iss = 'string with ctx. in it')) AND (mytable.name ~ '.*goofy.*'))",
            ),
            (
                "ctx.tags[\"endangered\"] == \"true\"",
                "(mytable.tags->'endangered' = 'true')",
            ),
            (
                "ctx.tags[\"endangered\"] == 123",
                "(mytable.tags->'endangered' = 123)",
            ),
            (
                "ctx.tags[\"endangered\"] == \"foo in the foobar\"",
                "(mytable.tags->'endangered' = 'bar in the barbar')",
            ),
            (
                "ctx.tags[\"endangered\"] == 314159",
                "(mytable.tags->'endangered' = 271828)",
            ),
        ];
        for (input, expected) in ok_cases {
            let sqlc = test_compiler(SqlDialect::Postgres, JSONB_OBJECT_OPERATOR, false);
            assert_eq!(
                sqlc.compile_condition(input).unwrap(),
                expected,
                "input {:?}",
                input
            );
        }
    }

    #[test]
    fn test_text_operator() {
        let sqlc = test_compiler(SqlDialect::Postgres, JSONB_TEXT_OPERATOR, false);
        assert_eq!(
            sqlc.compile_condition("ctx.tags[\"endangered\"] == \"true\"")
                .unwrap(),
            "(mytable.tags->>'endangered' = 'true')"
        );
    }

    #[test]
    fn test_error_cases() {
        let err_cases = [
            // bare identifiers are not parseable conditions
            (SqlDialect::Postgres, JSONB_OBJECT_OPERATOR, false, "age > 18"),
            // dialect without JSONB
            (SqlDialect::Unknown, JSONB_OBJECT_OPERATOR, false, "ctx.tags[\"endangered\"] == \"true\""),
            // non-numeric key under numeric-key mode
            (SqlDialect::Postgres, JSONB_OBJECT_OPERATOR, true, "ctx.tags[\"zero\"] == \"true\""),
            // unquoted index keys fail the TYPE_PATTERN token rule
            (SqlDialect::Postgres, JSONB_OBJECT_OPERATOR, false, "ctx.tags[0] == \"true\""),
            // unquoted bareword literal
            (SqlDialect::Postgres, JSONB_OBJECT_OPERATOR, false, "ctx.tags[\"endangered\"] == qwerty"),
            // unmapped indexed identifier
            (SqlDialect::Postgres, JSONB_OBJECT_OPERATOR, false, "ctx.tagz[\"endangered\"] == \"true\""),
            // in without an array literal
            (SqlDialect::Postgres, JSONB_OBJECT_OPERATOR, false, "ctx.id in \"tag-manage\""),
        ];
        for (dialect, operator, numeric, input) in err_cases {
            let sqlc = test_compiler(dialect, operator, numeric);
            assert!(sqlc.compile_condition(input).is_err(), "input {:?}", input);
        }
    }

    #[test]
    fn test_in_with_array_literal() {
        let sqlc = test_compiler(SqlDialect::Postgres, JSONB_OBJECT_OPERATOR, false);
        assert_eq!(
            sqlc.compile_condition("ctx.id in [ \"tag-manage\", \"tag-view\", 3 ]")
                .unwrap(),
            "(mytable.id IN ('tag-manage', 'tag-view', 3))"
        );
    }

    #[test]
    fn test_regex_requires_postgres() {
        let sqlc = SqlCompiler::new().with_dialect(SqlDialect::Unknown);
        let err = sqlc
            .compile_condition("ctx.name =~ \"pattern\"")
            .unwrap_err();
        assert_eq!(
            err,
            SqlError::RegexDialect {
                dialect: SqlDialect::Unknown
            }
        );
    }

    #[test]
    fn test_type_mapper_with_annotation() {
        let sqlc = SqlCompiler::new()
            .with_dialect(SqlDialect::Postgres)
            .with_type_mapper(
                TypeMapper::new("contacts.profile")
                    .to_sql_table("profile")
                    .with_property_mapper(
                        PropertyMapper::new("tags")
                            .to_sql_column("tagz")
                            .use_jsonb_operator(JSONB_OBJECT_OPERATOR),
                    ),
            );
        assert_eq!(
            sqlc.compile_condition("type:contacts.profile; ctx.tags[\"endangered\"] == \"true\"")
                .unwrap(),
            "(profile.tagz->'endangered' = 'true')"
        );

        let sqlc = SqlCompiler::new().with_dialect(SqlDialect::Unknown).with_type_mapper(
            TypeMapper::new("contacts.profile")
                .to_sql_table("profile")
                .with_property_mapper(PropertyMapper::new("tags").to_sql_column("tagz")),
        );
        assert!(sqlc
            .compile_condition("type:contacts.profile; ctx.tags[\"endangered\"] == \"true\"")
            .is_err());
    }
}
