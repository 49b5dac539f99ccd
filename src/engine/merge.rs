//! Key-based numeric merge of row lists.

use std::collections::HashMap;

use serde_json::{Number, Value};

use crate::error::{describe_value, CubeError, CubeResult};
use crate::model::Row;

/// Default separator joining key values into a composite key.
pub const DEFAULT_SEPARATOR: &str = "#";

/// Merge `right` into `left` by the composite key built from `keys`.
///
/// Rows of `right` with an unseen key are appended. Rows sharing a key are
/// unioned: non-key fields present on both sides are summed, fields present
/// on one side are copied. Summing anything but two numbers is a
/// [`CubeError::TypeMismatch`].
pub fn merge_rows(
    left: Vec<Row>,
    right: Vec<Row>,
    keys: &[String],
    separator: &str,
) -> CubeResult<Vec<Row>> {
    let mut merged = left;
    let mut index: HashMap<String, usize> = HashMap::with_capacity(merged.len());
    for (i, row) in merged.iter().enumerate() {
        index.entry(composite_key(row, keys, separator)).or_insert(i);
    }

    for row in right {
        let key = composite_key(&row, keys, separator);
        match index.get(&key) {
            Some(&i) => combine(&mut merged[i], &row, keys)?,
            None => {
                index.insert(key, merged.len());
                merged.push(row);
            }
        }
    }
    Ok(merged)
}

/// Fold row lists pairwise, left to right.
pub fn merge_all(lists: Vec<Vec<Row>>, keys: &[String], separator: &str) -> CubeResult<Vec<Row>> {
    let mut lists = lists.into_iter();
    let first = lists.next().unwrap_or_default();
    lists.try_fold(first, |acc, next| merge_rows(acc, next, keys, separator))
}

pub fn composite_key(row: &Row, keys: &[String], separator: &str) -> String {
    keys.iter()
        .map(|key| key_text(row.value(key)))
        .collect::<Vec<_>>()
        .join(separator)
}

fn key_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn combine(target: &mut Row, other: &Row, keys: &[String]) -> CubeResult<()> {
    for (field, value) in other.iter() {
        if keys.iter().any(|k| k.eq_ignore_ascii_case(field)) {
            continue;
        }
        let summed = match target.get(field) {
            None | Some(Value::Null) => value.clone(),
            Some(_) if value.is_null() => continue,
            Some(existing) => add(field, existing, value)?,
        };
        target.insert(field, summed);
    }
    Ok(())
}

fn add(field: &str, a: &Value, b: &Value) -> CubeResult<Value> {
    let (Value::Number(x), Value::Number(y)) = (a, b) else {
        let culprit = if a.is_number() { b } else { a };
        return Err(CubeError::TypeMismatch {
            field: field.to_string(),
            found: describe_value(culprit),
        });
    };
    if let (Some(x), Some(y)) = (x.as_i64(), y.as_i64()) {
        if let Some(sum) = x.checked_add(y) {
            return Ok(Value::from(sum));
        }
    }
    let sum = x.as_f64().unwrap_or(0.0) + y.as_f64().unwrap_or(0.0);
    Ok(Number::from_f64(sum).map(Value::Number).unwrap_or(Value::Null))
}
