//! In-memory evaluation of measure filters over projected rows.
//!
//! Measures are aggregates, so filters on them cannot be pushed into a
//! backend WHERE clause. Leaves naming a requested measure are evaluated
//! here; every other leaf is skipped because the backend already applied it.
//!
//! An OR group with no measure leaf of its own is vacuously true, even when
//! it holds dimension leaves or nested groups.

use serde_json::Value;

use crate::error::{describe_value, CubeError, CubeResult};
use crate::model::Row;
use crate::query::{CodeSet, Connector, Filter, FilterGroup, SimpleFilter};

/// Keep the rows that satisfy every measure filter in `filter`.
pub fn filter_rows(
    rows: Vec<Row>,
    filter: Option<&Filter>,
    measures: &CodeSet,
) -> CubeResult<Vec<Row>> {
    let group = match filter {
        Some(filter) => filter.to_group(),
        None => return Ok(rows),
    };
    if rows.is_empty() {
        return Ok(rows);
    }
    let mut kept = Vec::with_capacity(rows.len());
    for row in rows {
        if group_matches(&row, &group, measures)? {
            kept.push(row);
        }
    }
    Ok(kept)
}

fn group_matches(row: &Row, group: &FilterGroup, measures: &CodeSet) -> CubeResult<bool> {
    if group.is_empty() {
        return Ok(true);
    }
    let mut has_measure_leaf = false;
    for child in &group.filters {
        match child {
            Filter::Leaf(leaf) => {
                if !measures.contains(&leaf.name) {
                    continue;
                }
                has_measure_leaf = true;
                let passed = leaf_matches(row, leaf)?;
                match group.connector {
                    Connector::And if !passed => return Ok(false),
                    Connector::Or if passed => return Ok(true),
                    _ => {}
                }
            }
            Filter::Group(inner) => {
                let passed = group_matches(row, inner, measures)?;
                match group.connector {
                    Connector::And if !passed => return Ok(false),
                    Connector::Or if passed => return Ok(true),
                    _ => {}
                }
            }
        }
    }
    Ok(match group.connector {
        Connector::And => true,
        Connector::Or => !has_measure_leaf,
    })
}

fn leaf_matches(row: &Row, leaf: &SimpleFilter) -> CubeResult<bool> {
    let expected = leaf.value.as_f64().ok_or_else(|| CubeError::TypeMismatch {
        field: leaf.name.clone(),
        found: describe_value(&leaf.value),
    })?;
    let actual = match row.value(&leaf.name) {
        Value::Null => 0.0,
        value => value.as_f64().ok_or_else(|| CubeError::TypeMismatch {
            field: leaf.name.clone(),
            found: describe_value(value),
        })?,
    };
    leaf.operator
        .compare(actual, expected)
        .ok_or(CubeError::UnsupportedOperator {
            operator: leaf.operator,
            context: "in a measure filter",
        })
}
