//! Multi-key row ordering.

use std::cmp::Ordering;

use serde_json::Value;

use crate::model::Row;
use crate::query::{parse_order, Direction};

/// Stable multi-key comparator built from `+code` / `-code` specs.
///
/// Per key: two absent values fall through, a present value sorts before an
/// absent one, numbers compare as doubles, strings lexicographically, and
/// anything else by its JSON text. Descending keys reverse the result.
#[derive(Debug, Clone, Default)]
pub struct RowOrder {
    keys: Vec<(String, Direction)>,
    pad_numbers: bool,
}

impl RowOrder {
    pub fn parse<'a>(specs: impl IntoIterator<Item = &'a str>) -> Self {
        let keys = specs
            .into_iter()
            .filter(|s| !s.trim().is_empty())
            .map(|s| {
                let (code, direction) = parse_order(s);
                (code.to_string(), direction)
            })
            .collect();
        Self {
            keys,
            pad_numbers: false,
        }
    }

    /// Compare numbers as zero-padded strings of equal integer width.
    #[must_use = "builders have no effect until used"]
    pub fn padded(mut self) -> Self {
        self.pad_numbers = true;
        self
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn compare(&self, a: &Row, b: &Row) -> Ordering {
        for (key, direction) in &self.keys {
            let ord = compare_present(a.value(key), b.value(key), self.pad_numbers);
            let ord = match direction {
                Direction::Asc => ord,
                Direction::Desc => ord.reverse(),
            };
            if ord != Ordering::Equal {
                return ord;
            }
        }
        Ordering::Equal
    }

    pub fn sort(&self, rows: &mut [Row]) {
        if self.keys.is_empty() {
            return;
        }
        rows.sort_by(|a, b| self.compare(a, b));
    }
}

fn compare_present(a: &Value, b: &Value, pad: bool) -> Ordering {
    match (a.is_null(), b.is_null()) {
        (true, true) => Ordering::Equal,
        (false, true) => Ordering::Less,
        (true, false) => Ordering::Greater,
        (false, false) => compare_values(a, b, pad),
    }
}

fn compare_values(a: &Value, b: &Value, pad: bool) -> Ordering {
    if a == b {
        return Ordering::Equal;
    }
    match (a, b) {
        (Value::Number(x), Value::Number(y)) if pad => {
            let (x, y) = (x.to_string(), y.to_string());
            let width = x.len().max(y.len());
            zero_pad(&x, width).cmp(&zero_pad(&y, width))
        }
        (Value::Number(x), Value::Number(y)) => {
            let (x, y) = (x.as_f64().unwrap_or(0.0), y.as_f64().unwrap_or(0.0));
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Value::String(x), Value::String(y)) => x.cmp(y),
        _ => text(a).cmp(&text(b)),
    }
}

fn text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Left-pad the integer part of `number` with zeros to `width` digits.
fn zero_pad(number: &str, width: usize) -> String {
    let (int_part, frac_part) = match number.split_once('.') {
        Some((i, f)) => (i, Some(f)),
        None => (number, None),
    };
    let mut out = format!("{:0>width$}", int_part, width = width);
    if let Some(frac) = frac_part {
        out.push('.');
        out.push_str(frac);
    }
    out
}
