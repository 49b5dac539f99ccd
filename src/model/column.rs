//! Backend field references.

use std::fmt;

use serde::{Deserialize, Serialize};

/// How a column is aggregated by the backend.
///
/// Unknown names parse as [`Aggregation::Avg`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Aggregation {
    #[default]
    Sum,
    Avg,
    Max,
    Min,
    Count,
    UniqueCount,
    Median,
    /// Time-bucketed rate; only meaningful under a date histogram.
    Rate,
    /// Difference to the previous time bucket of a sibling metric.
    Derivative,
}

impl Aggregation {
    pub fn parse(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "sum" => Aggregation::Sum,
            "avg" | "average" => Aggregation::Avg,
            "max" => Aggregation::Max,
            "min" => Aggregation::Min,
            "count" => Aggregation::Count,
            "unique_count" => Aggregation::UniqueCount,
            "median" => Aggregation::Median,
            "rate" => Aggregation::Rate,
            "derivative" => Aggregation::Derivative,
            _ => Aggregation::Avg,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Aggregation::Sum => "sum",
            Aggregation::Avg => "avg",
            Aggregation::Max => "max",
            Aggregation::Min => "min",
            Aggregation::Count => "count",
            Aggregation::UniqueCount => "unique_count",
            Aggregation::Median => "median",
            Aggregation::Rate => "rate",
            Aggregation::Derivative => "derivative",
        }
    }
}

impl From<String> for Aggregation {
    fn from(name: String) -> Self {
        Aggregation::parse(&name)
    }
}

impl From<Aggregation> for String {
    fn from(agg: Aggregation) -> Self {
        agg.as_str().to_string()
    }
}

impl fmt::Display for Aggregation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A backend expression with its output alias.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    expr: String,
    alias: String,
    aggregation: Aggregation,
    pre_aggregated: bool,
}

impl Column {
    /// Column whose alias is the expression itself.
    pub fn new(expr: impl Into<String>) -> Self {
        let expr = expr.into();
        Self {
            alias: expr.clone(),
            expr,
            aggregation: Aggregation::default(),
            pre_aggregated: false,
        }
    }

    /// Column with an explicit alias; a blank alias falls back to the expression.
    pub fn aliased(expr: impl Into<String>, alias: impl Into<String>) -> Self {
        let column = Self::new(expr);
        let alias = alias.into();
        if alias.trim().is_empty() {
            column
        } else {
            Self { alias, ..column }
        }
    }

    #[must_use = "builders have no effect until used"]
    pub fn aggregation(mut self, aggregation: Aggregation) -> Self {
        self.aggregation = aggregation;
        self
    }

    /// Mark the expression as already aggregated (e.g. `sum(x)`).
    #[must_use = "builders have no effect until used"]
    pub fn pre_aggregated(mut self) -> Self {
        self.pre_aggregated = true;
        self
    }

    pub fn expr(&self) -> &str {
        &self.expr
    }

    pub fn alias(&self) -> &str {
        &self.alias
    }

    pub fn agg(&self) -> Aggregation {
        self.aggregation
    }

    pub fn is_pre_aggregated(&self) -> bool {
        self.pre_aggregated
    }
}

impl From<&str> for Column {
    fn from(expr: &str) -> Self {
        Column::new(expr)
    }
}

impl From<String> for Column {
    fn from(expr: String) -> Self {
        Column::new(expr)
    }
}
