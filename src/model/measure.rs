//! Measures and the calculators that derive their values.

use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use super::column::Column;
use super::cube_map::Row;
use crate::error::{describe_value, CubeError, CubeResult};
use crate::query::normalize_code;

/// Derives a measure's value from one raw row.
///
/// Implementations must be total over missing keys (absent numeric fields
/// read as zero) and fail only on type mismatches.
pub trait Calculator: Send + Sync {
    fn value(&self, row: &Row) -> CubeResult<f64>;
}

impl<F> Calculator for F
where
    F: Fn(&Row) -> CubeResult<f64> + Send + Sync,
{
    fn value(&self, row: &Row) -> CubeResult<f64> {
        self(row)
    }
}

/// Read `key` from `row` as a number.
///
/// Absent and null values are 0; numeric strings are parsed.
pub fn number_value(row: &Row, key: &str) -> CubeResult<f64> {
    let value = row.value(key);
    match value {
        Value::Null => Ok(0.0),
        Value::Number(n) => n.as_f64().ok_or_else(|| mismatch(key, value)),
        Value::String(s) => s.trim().parse::<f64>().map_err(|_| mismatch(key, value)),
        _ => Err(mismatch(key, value)),
    }
}

fn mismatch(key: &str, value: &Value) -> CubeError {
    CubeError::TypeMismatch {
        field: key.to_string(),
        found: describe_value(value),
    }
}

/// Reads a single column alias as a number.
#[derive(Debug, Clone)]
pub struct ColumnCalculator {
    alias: String,
}

impl ColumnCalculator {
    pub fn new(alias: impl Into<String>) -> Self {
        Self {
            alias: alias.into(),
        }
    }
}

impl Calculator for ColumnCalculator {
    fn value(&self, row: &Row) -> CubeResult<f64> {
        number_value(row, &self.alias)
    }
}

/// `numerator * scale / denominator`, rounded half-up to `precision` places.
///
/// A zero denominator yields 0.
#[derive(Debug, Clone)]
pub struct DivideCalculator {
    numerator: String,
    denominator: String,
    scale: f64,
    precision: u32,
}

impl DivideCalculator {
    pub fn new(numerator: impl Into<String>, denominator: impl Into<String>) -> Self {
        Self {
            numerator: numerator.into(),
            denominator: denominator.into(),
            scale: 1.0,
            precision: 2,
        }
    }

    #[must_use = "builders have no effect until used"]
    pub fn scale(mut self, scale: f64) -> Self {
        self.scale = scale;
        self
    }

    #[must_use = "builders have no effect until used"]
    pub fn precision(mut self, precision: u32) -> Self {
        self.precision = precision;
        self
    }
}

impl Calculator for DivideCalculator {
    fn value(&self, row: &Row) -> CubeResult<f64> {
        let numerator = number_value(row, &self.numerator)?;
        let denominator = number_value(row, &self.denominator)?;
        if denominator == 0.0 {
            return Ok(0.0);
        }
        Ok(round_half_up(numerator * self.scale / denominator, self.precision))
    }
}

/// Round away from zero at the half, to `places` decimals.
pub fn round_half_up(x: f64, places: u32) -> f64 {
    if !x.is_finite() {
        return x;
    }
    let factor = 10f64.powi(places as i32);
    let rounded = (x * factor).round() / factor;
    if rounded == 0.0 {
        0.0
    } else {
        rounded
    }
}

/// A computed metric exposed under a stable code.
///
/// Always has at least one column; without an explicit calculator the value
/// is the first column's alias read as a number.
#[derive(Clone)]
pub struct Measure {
    code: String,
    columns: Vec<Column>,
    calculator: Option<Arc<dyn Calculator>>,
}

impl Measure {
    pub fn new(code: impl AsRef<str>, column: impl Into<Column>) -> Self {
        Self {
            code: normalize_code(code.as_ref()),
            columns: vec![column.into()],
            calculator: None,
        }
    }

    /// Add a further backend column (e.g. the operands of a ratio).
    #[must_use = "builders have no effect until used"]
    pub fn column(mut self, column: impl Into<Column>) -> Self {
        self.columns.push(column.into());
        self
    }

    #[must_use = "builders have no effect until used"]
    pub fn calculator(mut self, calculator: impl Calculator + 'static) -> Self {
        self.calculator = Some(Arc::new(calculator));
        self
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn primary(&self) -> &Column {
        &self.columns[0]
    }

    pub fn value(&self, row: &Row) -> CubeResult<f64> {
        match &self.calculator {
            Some(calculator) => calculator.value(row),
            None => number_value(row, self.primary().alias()),
        }
    }
}

impl fmt::Debug for Measure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Measure")
            .field("code", &self.code)
            .field("columns", &self.columns)
            .field("calculator", &self.calculator.as_ref().map(|_| "custom"))
            .finish()
    }
}
