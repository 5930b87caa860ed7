//! Statement-to-Rego compilation.

use crate::linearize::linearize_context;
use crate::prettify::prettify;
use seal_backend::{CompileError, Compiler};
use seal_lang::ast::{ActionStatement, Condition, Statement, Subject, WhereClause};
use seal_lang::token::TokenKind;
use seal_lang::Policies;
use seal_schema::ResourceType;
use std::collections::BTreeMap;

/// Backend language name
pub const LANGUAGE: &str = "rego";

/// Sentinel marking a spot where `some i` may be required; a post-pass per
/// rule body keeps the first one when the body touches `input.ctx[i]` and
/// removes the rest.
const SOME_I: &str = "some.i";

/// Canned helper rules appended to every module
pub const COMPILED_REGO_HELPERS: &str = "
# rego functions defined by seal

# Helper to get the token payload.
seal_subject = payload {
    [header, payload, signature] := io.jwt.decode(input.jwt)
}

# seal_list_contains returns true if elem exists in list
seal_list_contains(list, elem) {
    list[_] = elem
}
";

/// The Rego code generator
pub struct RegoCompiler;

impl RegoCompiler {
    /// Create a new generator
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Default for RegoCompiler {
    fn default() -> Self {
        Self::new()
    }
}

impl Compiler for RegoCompiler {
    fn compile(
        &self,
        package_name: &str,
        policies: &Policies,
        types: &[ResourceType],
    ) -> Result<String, CompileError> {
        if policies.statements.is_empty() {
            return Err(CompileError::EmptyPolicies);
        }

        let type_map: BTreeMap<String, &ResourceType> =
            types.iter().map(|t| (t.to_string(), t)).collect();

        let mut compiled = vec![String::new(), format!("package {package_name}")];
        compiled.extend(set_defaults("false", &["allow", "deny"]));
        compiled.extend(base_verbs_block(types));

        let mut obligations = Vec::new();
        let mut line_num = 0usize;
        for (idx, stmt) in policies.statements.iter().enumerate() {
            line_num += 1;
            let result = match stmt {
                Statement::Action(action) => compile_statement(&type_map, action, line_num),
                Statement::Context(context) => {
                    compile_context_statement(&type_map, context, &mut line_num)
                }
            };
            let (text, stmt_obligations) =
                result.map_err(|err| err.at_statement(idx, stmt.to_string()))?;
            compiled.push(text);
            obligations.extend(stmt_obligations);
        }

        compiled.push(String::new());
        compiled.push("obligations := [".to_string());
        for obligation in &obligations {
            compiled.push(format!("`{obligation}`,"));
        }
        compiled.push("]".to_string());

        compiled.push(COMPILED_REGO_HELPERS.to_string());

        Ok(prettify(&compiled.join("\n")))
    }
}

fn set_defaults(value: &str, ids: &[&str]) -> Vec<String> {
    let mut out = vec![String::new()];
    for id in ids {
        out.push(format!("default {id} = {value}"));
    }
    out
}

/// Emit the `base_verbs` table: types in sorted order, verbs sorted within
/// each type, base verbs in declared order. Types without verbs are
/// omitted.
fn base_verbs_block(types: &[ResourceType]) -> Vec<String> {
    let mut out = vec![String::new(), "base_verbs := {".to_string()];
    for typ in types {
        if typ.verbs().is_empty() {
            continue;
        }
        out.push(format!("\"{typ}\": {{"));
        for (verb, base_verbs) in typ.verbs() {
            out.push(format!("\"{verb}\": ["));
            for base_verb in base_verbs {
                out.push(format!("\"{base_verb}\","));
            }
            out.push("],".to_string());
        }
        out.push("},".to_string());
    }
    out.push("}".to_string());
    out
}

fn compile_context_statement(
    type_map: &BTreeMap<String, &ResourceType>,
    stmt: &seal_lang::ast::ContextStatement,
    line_num: &mut usize,
) -> Result<(String, Vec<String>), CompileError> {
    let mut text = String::from("\n");
    let mut obligations = Vec::new();

    for flat in linearize_context(stmt) {
        *line_num += 1;
        let (stmt_text, stmt_obligations) = compile_statement(type_map, &flat, *line_num)?;
        text.push_str(&stmt_text);
        text.push('\n');
        obligations.extend(stmt_obligations);
    }

    Ok((text, obligations))
}

fn compile_statement(
    type_map: &BTreeMap<String, &ResourceType>,
    stmt: &ActionStatement,
    line_num: usize,
) -> Result<(String, Vec<String>), CompileError> {
    let mut lines = vec![format!("{} {{", stmt.token.literal)];

    if let Some(subject) = &stmt.subject {
        lines.push(compile_subject(subject));
    }
    lines.push(compile_verb(stmt.verb.as_ref())?);

    let (tp_line, swtype) = compile_type_pattern(type_map, stmt.type_pattern.as_ref())?;
    lines.push(tp_line);

    let (conditions, helpers, obligations) =
        compile_where_clause(swtype, stmt.where_clause.as_ref(), line_num)?;
    if !conditions.is_empty() {
        lines.push(conditions);
    }
    lines.push("}".to_string());

    let mut text = lines.join("\n");
    for helper in helpers {
        text.push('\n');
        text.push_str(&helper);
    }

    Ok((inject_some_i(&text), obligations))
}

fn compile_subject(subject: &Subject) -> String {
    match subject {
        Subject::Group { name } => {
            format!("    seal_list_contains(seal_subject.groups, `{name}`)")
        }
        Subject::User { email } => format!("    seal_subject.sub == `{email}`"),
    }
}

fn compile_verb(verb: Option<&seal_lang::Identifier>) -> Result<String, CompileError> {
    let Some(verb) = verb else {
        return Err(CompileError::EmptyVerb);
    };
    Ok(format!(
        "    seal_list_contains(base_verbs[input.type][`{}`], input.verb)",
        verb.value
    ))
}

fn compile_type_pattern<'a>(
    type_map: &BTreeMap<String, &'a ResourceType>,
    type_pattern: Option<&seal_lang::Identifier>,
) -> Result<(String, Option<&'a ResourceType>), CompileError> {
    let Some(type_pattern) = type_pattern else {
        return Err(CompileError::EmptyTypePattern);
    };

    // SEAL `*` becomes a regex wildcard; a doubled dot-star collapses
    let quoted = type_pattern.value.replace('*', ".*").replace("..*", ".*");
    let swtype = type_map.get(&type_pattern.value).copied();

    tracing::debug!(
        pattern = %type_pattern.value,
        quoted = %quoted,
        resolved = %swtype.map(ToString::to_string).unwrap_or_default(),
        "compiled type pattern"
    );

    Ok((format!("    re_match(`{quoted}`, input.type)"), swtype))
}

fn compile_where_clause(
    swtype: Option<&ResourceType>,
    where_clause: Option<&WhereClause>,
    line_num: usize,
) -> Result<(String, Vec<String>, Vec<String>), CompileError> {
    let Some(condition) = where_clause.and_then(|wc| wc.condition.as_ref()) else {
        return Ok((String::new(), Vec::new(), Vec::new()));
    };

    let mut nots = 0usize;
    let compiled = compile_condition(swtype, condition, line_num, &mut nots)?;

    if compiled.is_obligation {
        let mut obligations = compiled.obligations;
        obligations.push(condition.to_string());
        return Ok((String::new(), Vec::new(), obligations));
    }
    Ok((compiled.text, compiled.helpers, compiled.obligations))
}

#[derive(Debug, Default)]
struct CompiledCondition {
    text: String,
    helpers: Vec<String>,
    obligations: Vec<String>,
    is_obligation: bool,
}

impl CompiledCondition {
    fn plain(text: String) -> Self {
        Self {
            text,
            ..Self::default()
        }
    }
}

fn compile_condition(
    swtype: Option<&ResourceType>,
    condition: &Condition,
    line_num: usize,
    nots: &mut usize,
) -> Result<CompiledCondition, CompileError> {
    match condition {
        Condition::Identifier(id) => {
            if id.token.kind == TokenKind::Literal {
                return Ok(CompiledCondition::plain(id.to_string()));
            }

            let mut text = id.token.literal.clone();
            let mut is_obligation = false;

            if text.starts_with("ctx.") {
                let path = text["ctx.".len()..]
                    .replacen("\"]", "", 1)
                    .replacen("[\"", ".", 1);

                // With a resolved type, the head component must be a known
                // property; its obligation flag decides extraction.
                if let Some(swtype) = swtype {
                    let head = path.split('.').next().unwrap_or_default();
                    let Some(prop) = swtype.property(head) else {
                        return Err(CompileError::UnknownProperty {
                            property: head.to_string(),
                            type_name: swtype.to_string(),
                        });
                    };
                    if let Some(value) = prop.extension("x-seal-obligation") {
                        is_obligation =
                            value
                                .parse::<bool>()
                                .map_err(|_| CompileError::BadObligationFlag {
                                    value: value.to_string(),
                                    property: head.to_string(),
                                    type_name: swtype.to_string(),
                                })?;
                    }
                }

                let segments: Vec<&str> = path.split('.').collect();
                text = format!("input.ctx[i][\"{}\"]", segments.join("\"][\""));
            } else if text.starts_with("subject.") {
                text = text.replacen("subject", "seal_subject", 1);
            }

            Ok(CompiledCondition {
                text,
                is_obligation,
                ..CompiledCondition::default()
            })
        }

        Condition::Integer { token, .. } => Ok(CompiledCondition::plain(token.literal.clone())),

        // arrays appear as `in` operands and keep their surface form
        Condition::Array { .. } => Ok(CompiledCondition::plain(condition.to_string())),

        Condition::Prefix { token, right, .. } => {
            let rhs = match right {
                Some(right) => compile_condition(swtype, right, line_num, nots)?,
                None => CompiledCondition::default(),
            };

            match token.kind {
                TokenKind::Not => {
                    *nots += 1;
                    let reference = format!("line{line_num}_not{nots}_cnd");
                    let mut helpers = rhs.helpers;
                    helpers.push(format!("{reference} {{\n{SOME_I}\n{}\n}}", rhs.text));
                    Ok(CompiledCondition {
                        text: format!("not {reference}"),
                        helpers,
                        obligations: rhs.obligations,
                        is_obligation: rhs.is_obligation,
                    })
                }
                _ => Ok(CompiledCondition {
                    text: format!("{} {}", token.literal, rhs.text),
                    helpers: rhs.helpers,
                    obligations: rhs.obligations,
                    is_obligation: rhs.is_obligation,
                }),
            }
        }

        Condition::Infix {
            token, left, right, ..
        } => {
            let lhs = match left {
                Some(left) => compile_condition(swtype, left, line_num, nots)?,
                None => CompiledCondition::default(),
            };
            let rhs = match right {
                Some(right) => compile_condition(swtype, right, line_num, nots)?,
                None => CompiledCondition::default(),
            };

            let touches_ctx = lhs.text.contains("ctx[i]") || rhs.text.contains("ctx[i]");
            let mut helpers = Vec::new();
            let mut obligations = Vec::new();
            obligations.extend(lhs.obligations.iter().cloned());
            obligations.extend(rhs.obligations.iter().cloned());
            let mut is_obligation = false;

            let mut text = match token.kind {
                TokenKind::And => {
                    // An obligation side leaves the rule body; its surface
                    // form is published for downstream enforcement instead.
                    let mut parts = Vec::new();
                    if lhs.is_obligation {
                        if let Some(left) = left {
                            obligations.push(left.to_string());
                        }
                    } else {
                        parts.push(lhs.text.clone());
                        helpers.extend(lhs.helpers);
                    }
                    if rhs.is_obligation {
                        if let Some(right) = right {
                            obligations.push(right.to_string());
                        }
                    } else {
                        parts.push(rhs.text.clone());
                        helpers.extend(rhs.helpers);
                    }
                    parts.retain(|part| !part.is_empty());
                    parts.join("\n")
                }
                TokenKind::Or => return Err(CompileError::OrNotSupported),
                TokenKind::Match => {
                    helpers.extend(lhs.helpers);
                    helpers.extend(rhs.helpers);
                    is_obligation = lhs.is_obligation || rhs.is_obligation;
                    format!("re_match(`{}`, {})", rhs.text.trim_matches('"'), lhs.text)
                }
                TokenKind::In => {
                    helpers.extend(lhs.helpers);
                    helpers.extend(rhs.helpers);
                    is_obligation = lhs.is_obligation || rhs.is_obligation;
                    let element = if lhs.text.starts_with('"') && lhs.text.ends_with('"') {
                        format!("`{}`", lhs.text.trim_matches('"'))
                    } else {
                        lhs.text.clone()
                    };
                    format!("seal_list_contains({}, {})", rhs.text, element)
                }
                _ => {
                    helpers.extend(lhs.helpers);
                    helpers.extend(rhs.helpers);
                    is_obligation = lhs.is_obligation || rhs.is_obligation;
                    format!("{} {} {}", lhs.text, token.literal, rhs.text)
                }
            };

            if touches_ctx {
                text = format!("{SOME_I}\n{text}");
            }

            Ok(CompiledCondition {
                text,
                helpers,
                obligations,
                is_obligation,
            })
        }
    }
}

/// Resolve `some.i` sentinels: per rule body, the first sentinel becomes
/// `some i` when the body indexes `input.ctx[i]`, every other sentinel is
/// dropped, and a kept `some i` gets a blank line before it unless it opens
/// the body.
fn inject_some_i(text: &str) -> String {
    let mut segments: Vec<String> = text.split('{').map(str::to_string).collect();
    for segment in &mut segments {
        if segment.contains("[i]") {
            *segment = segment.replacen(SOME_I, "some i", 1);
        }
        *segment = segment.replace("some.i\n", "");
    }
    let mut out = segments.join("{");
    out = out.replace("some i", "\nsome i");
    out = out.replace("{\n\nsome i", "{\nsome i");
    out
}
