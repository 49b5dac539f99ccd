//! Filter trees to search query DSL.
//!
//! | Operator | DSL |
//! |----------|-----|
//! | EQ | `term` |
//! | NE | `bool.must_not` of `term` |
//! | LT/GT/LE/GE | `range` with `lt`/`gt`/`lte`/`gte` |
//! | IN | `bool.should` of `match_phrase` |
//! | NOT_IN | `bool.must_not` of the IN clause |
//! | LIKE | `wildcard` (`%` → `*`, `_` → `?`) |
//! | EXISTS | `exists` |

use serde_json::{json, Map, Value};

use crate::cube::CubeSchema;
use crate::error::{CubeError, CubeResult};
use crate::query::{Connector, Filter, FilterGroup, Operator, SimpleFilter};

/// Build the `query` object for an optional filter tree.
pub fn query_object(schema: &CubeSchema, filter: Option<&Filter>) -> CubeResult<Value> {
    match filter {
        None => Ok(match_all()),
        Some(Filter::Group(group)) if group.is_empty() => Ok(match_all()),
        Some(Filter::Group(group)) => group_object(schema, group),
        Some(Filter::Leaf(leaf)) => leaf_object(schema, leaf),
    }
}

fn match_all() -> Value {
    json!({"match_all": {}})
}

fn group_object(schema: &CubeSchema, group: &FilterGroup) -> CubeResult<Value> {
    let mut clauses = Vec::with_capacity(group.filters.len());
    for child in &group.filters {
        let clause = match child {
            Filter::Group(inner) if inner.is_empty() => match group.connector {
                Connector::And => match_all(),
                Connector::Or => json!({"match_none": {}}),
            },
            Filter::Group(inner) => group_object(schema, inner)?,
            Filter::Leaf(leaf) => leaf_object(schema, leaf)?,
        };
        clauses.push(clause);
    }
    let occur = match group.connector {
        Connector::And => "must",
        Connector::Or => "should",
    };
    Ok(json!({"bool": {occur: clauses}}))
}

/// Backend field a filter name refers to.
///
/// Limit filters may name raw fields, which pass through unchanged.
pub fn field_name<'a>(schema: &'a CubeSchema, name: &'a str) -> &'a str {
    schema.column_for(name).map(|c| c.expr()).unwrap_or(name)
}

fn leaf_object(schema: &CubeSchema, leaf: &SimpleFilter) -> CubeResult<Value> {
    let field = field_name(schema, &leaf.name);
    let value = leaf.value.clone();
    let clause = match leaf.operator {
        Operator::Eq => term(field, value),
        Operator::Ne => must_not(term(field, value)),
        Operator::Lt | Operator::Gt | Operator::Le | Operator::Ge => {
            let key = range_key(leaf.operator)?;
            json!({"range": {field: {key: value}}})
        }
        Operator::In => in_clause(schema, leaf, field)?,
        Operator::NotIn => must_not(in_clause(schema, leaf, field)?),
        Operator::Like => {
            let pattern = value.as_str().ok_or_else(|| {
                CubeError::invalid_query(
                    schema.name(),
                    format!("LIKE on [{}] requires a string pattern", leaf.name),
                )
            })?;
            json!({"wildcard": {field: {"value": wildcard(pattern)}}})
        }
        Operator::Exists => json!({"exists": {"field": field}}),
    };
    Ok(clause)
}

fn term(field: &str, value: Value) -> Value {
    json!({"term": {field: value}})
}

fn must_not(clause: Value) -> Value {
    json!({"bool": {"must_not": [clause]}})
}

fn in_clause(schema: &CubeSchema, leaf: &SimpleFilter, field: &str) -> CubeResult<Value> {
    let values = leaf.list_values().ok_or_else(|| {
        CubeError::invalid_query(
            schema.name(),
            format!("{} on [{}] requires a list value", leaf.operator, leaf.name),
        )
    })?;
    let should: Vec<Value> = values
        .iter()
        .map(|v| {
            let mut phrase = Map::new();
            phrase.insert(field.to_string(), v.clone());
            json!({"match_phrase": phrase})
        })
        .collect();
    Ok(json!({"bool": {"should": should}}))
}

fn range_key(operator: Operator) -> CubeResult<&'static str> {
    match operator {
        Operator::Lt => Ok("lt"),
        Operator::Gt => Ok("gt"),
        Operator::Le => Ok("lte"),
        Operator::Ge => Ok("gte"),
        other => Err(CubeError::UnsupportedOperator {
            operator: other,
            context: "in a range clause",
        }),
    }
}

/// SQL LIKE pattern to wildcard syntax.
fn wildcard(pattern: &str) -> String {
    pattern
        .chars()
        .map(|c| match c {
            '%' => '*',
            '_' => '?',
            other => other,
        })
        .collect()
}
