//! Context statement linearisation.
//!
//! A context statement is sugar: its conditions block and its rules block
//! expand into the Cartesian product of flat action statements. Rule-level
//! verb, subject and type pattern override the context's; a rule where
//! clause combines with the condition's by conjunction, rule side first.

use seal_lang::ast::{ActionStatement, Condition, ContextStatement, WhereClause};
use seal_lang::token::{Token, TokenKind};

pub(crate) fn linearize_context(stmt: &ContextStatement) -> Vec<ActionStatement> {
    let mut flat = Vec::new();

    for (cond_idx, cond) in stmt.conditions.iter().enumerate() {
        for rule in &stmt.action_rules {
            if let Some(nested) = &rule.context {
                // A nested context expands once, with the parent's non-empty
                // conditions appended to its own.
                if cond_idx == 0 {
                    let mut nested = nested.clone();
                    for parent in &stmt.conditions {
                        if !parent.is_empty() {
                            nested.conditions.push(parent.clone());
                        }
                    }
                    flat.extend(linearize_context(&nested));
                }
                continue;
            }

            let Some(action) = rule.action.clone() else {
                continue;
            };
            let mut stmt_out = ActionStatement {
                token: action.token.clone(),
                action,
                verb: stmt.verb.clone(),
                type_pattern: stmt.type_pattern.clone(),
                subject: cond.subject.clone(),
                where_clause: cond.where_clause.clone(),
            };

            if rule.verb.is_some() {
                stmt_out.verb = rule.verb.clone();
            }
            if rule.subject.is_some() {
                stmt_out.subject = rule.subject.clone();
            }
            if rule.type_pattern.is_some() {
                stmt_out.type_pattern = rule.type_pattern.clone();
            }
            if let Some(rule_where) = &rule.where_clause {
                stmt_out.where_clause = Some(match &cond.where_clause {
                    None => rule_where.clone(),
                    Some(cond_where) => WhereClause {
                        token: rule_where.token.clone(),
                        condition: Some(Condition::Infix {
                            token: Token::new(TokenKind::And, "and"),
                            left: rule_where.condition.clone().map(Box::new),
                            operator: "and".to_string(),
                            right: cond_where.condition.clone().map(Box::new),
                        }),
                    },
                });
            }

            flat.push(stmt_out);
        }
    }

    tracing::debug!(rules = flat.len(), "linearized context statement");
    flat
}
