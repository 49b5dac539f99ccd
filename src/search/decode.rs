//! Search responses to flat rows.
//!
//! Aggregation responses are walked depth first. Each bucket level adds
//! `{aggregation name: bucket key}` to the group being built; a level
//! without sub-buckets closes the row with its metric values, or with
//! `COUNT = doc_count` when it carries no metrics at all.

use serde_json::{Map, Value};

use crate::model::Row;

/// Key holding a bucket's document count on terminal buckets.
pub const COUNT_KEY: &str = "COUNT";
/// Key holding a hit's relevance score.
pub const SCORE_KEY: &str = "_score";

/// Rows from the `aggregations` object of a response.
pub fn decode_aggregations(aggregations: &Value) -> Vec<Row> {
    let mut rows = Vec::new();
    if let Value::Object(level) = aggregations {
        walk(level, &Row::new(), &mut rows);
    }
    rows
}

fn walk(level: &Map<String, Value>, group: &Row, out: &mut Vec<Row>) {
    let mut current = group.clone();
    let mut has_metric = false;
    let mut bucket_aggs = Vec::new();

    for (name, agg) in level {
        let Value::Object(body) = agg else { continue };
        if let Some(buckets) = body.get("buckets") {
            bucket_aggs.push((name.as_str(), buckets));
        } else if let Some(value) = metric_value(body) {
            current.insert(name, value);
            has_metric = true;
        }
    }

    if bucket_aggs.is_empty() {
        if has_metric {
            out.push(current);
        } else if let Some(count) = level.get("doc_count") {
            out.push(current.with(COUNT_KEY, count.clone()));
        }
        return;
    }

    for (name, buckets) in bucket_aggs {
        match buckets {
            Value::Array(list) if list.is_empty() => out.push(current.clone()),
            Value::Array(list) => {
                for bucket in list {
                    let Value::Object(bucket) = bucket else { continue };
                    let key = bucket.get("key").cloned().unwrap_or(Value::Null);
                    walk(bucket, &current.clone().with(name, key), out);
                }
            }
            Value::Object(keyed) if keyed.is_empty() => out.push(current.clone()),
            Value::Object(keyed) => {
                for (key, bucket) in keyed {
                    let Value::Object(bucket) = bucket else { continue };
                    walk(bucket, &current.clone().with(name, key.as_str()), out);
                }
            }
            _ => {}
        }
    }
}

/// Value of a metric aggregation result.
///
/// `{"value": x}` for single-value metrics; `{"values": ...}` for
/// percentiles, where the single requested percentile is taken.
fn metric_value(body: &Map<String, Value>) -> Option<Value> {
    if let Some(value) = body.get("value") {
        return Some(value.clone());
    }
    match body.get("values")? {
        Value::Object(values) => Some(values.values().next().cloned().unwrap_or(Value::Null)),
        Value::Array(values) => Some(
            values
                .first()
                .and_then(|v| v.get("value"))
                .cloned()
                .unwrap_or(Value::Null),
        ),
        _ => None,
    }
}

/// Flatten a hit's `_source` into dotted keys and carry its `_score`.
pub fn flatten_hit(hit: &Value) -> Row {
    let mut row = Row::new();
    if let Some(Value::Object(source)) = hit.get("_source") {
        flatten_into("", source, &mut row);
    }
    row.insert(SCORE_KEY, hit.get("_score").cloned().unwrap_or(Value::Null));
    row
}

fn flatten_into(prefix: &str, object: &Map<String, Value>, row: &mut Row) {
    for (key, value) in object {
        let path = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{}.{}", prefix, key)
        };
        match value {
            Value::Object(inner) if inner.is_empty() => {
                row.insert(&path, Value::Null);
            }
            Value::Object(inner) => flatten_into(&path, inner, row),
            other => {
                row.insert(&path, other.clone());
            }
        }
    }
}
