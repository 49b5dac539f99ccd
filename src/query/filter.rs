//! Filter trees: comparisons combined with AND/OR groups.
//!
//! A filter serializes as an externally tagged enum:
//!
//! ```json
//! {"group": {"connector": "AND", "filters": [
//!     {"leaf": {"name": "region", "operator": "EQ", "value": "emea"}},
//!     {"leaf": {"name": "revenue", "operator": "GT", "value": 100}}
//! ]}}
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Comparison kind of a [`SimpleFilter`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Operator {
    Eq,
    Ne,
    Lt,
    Gt,
    Le,
    Ge,
    In,
    #[serde(alias = "NIN")]
    NotIn,
    Like,
    #[serde(alias = "EXIST")]
    Exists,
}

impl Operator {
    pub fn as_str(self) -> &'static str {
        match self {
            Operator::Eq => "EQ",
            Operator::Ne => "NE",
            Operator::Lt => "LT",
            Operator::Gt => "GT",
            Operator::Le => "LE",
            Operator::Ge => "GE",
            Operator::In => "IN",
            Operator::NotIn => "NOT_IN",
            Operator::Like => "LIKE",
            Operator::Exists => "EXISTS",
        }
    }

    /// IN and NOT_IN take a list value.
    pub fn takes_list(self) -> bool {
        matches!(self, Operator::In | Operator::NotIn)
    }

    pub fn is_range(self) -> bool {
        matches!(self, Operator::Lt | Operator::Gt | Operator::Le | Operator::Ge)
    }

    /// Evaluate `actual <op> expected` numerically.
    ///
    /// Returns `None` for operators without numeric semantics.
    pub fn compare(self, actual: f64, expected: f64) -> Option<bool> {
        let result = match self {
            Operator::Eq => actual == expected,
            Operator::Ne => actual != expected,
            Operator::Lt => actual < expected,
            Operator::Gt => actual > expected,
            Operator::Le => actual <= expected,
            Operator::Ge => actual >= expected,
            Operator::In | Operator::NotIn | Operator::Like | Operator::Exists => return None,
        };
        Some(result)
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Boolean connector of a [`FilterGroup`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Connector {
    #[default]
    And,
    Or,
}

impl Connector {
    pub fn as_str(self) -> &'static str {
        match self {
            Connector::And => "AND",
            Connector::Or => "OR",
        }
    }
}

impl fmt::Display for Connector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One comparison: `name <operator> value`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimpleFilter {
    pub name: String,
    pub operator: Operator,
    #[serde(default)]
    pub value: Value,
}

impl SimpleFilter {
    pub fn new(name: impl Into<String>, operator: Operator, value: impl Into<Value>) -> Self {
        Self {
            name: name.into(),
            operator,
            value: value.into(),
        }
    }

    pub fn eq(name: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(name, Operator::Eq, value)
    }

    pub fn ne(name: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(name, Operator::Ne, value)
    }

    pub fn lt(name: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(name, Operator::Lt, value)
    }

    pub fn gt(name: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(name, Operator::Gt, value)
    }

    pub fn le(name: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(name, Operator::Le, value)
    }

    pub fn ge(name: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(name, Operator::Ge, value)
    }

    pub fn like(name: impl Into<String>, pattern: impl Into<String>) -> Self {
        Self::new(name, Operator::Like, pattern.into())
    }

    pub fn exists(name: impl Into<String>) -> Self {
        Self::new(name, Operator::Exists, Value::Null)
    }

    pub fn in_list<V: Into<Value>>(
        name: impl Into<String>,
        values: impl IntoIterator<Item = V>,
    ) -> Self {
        let list: Vec<Value> = values.into_iter().map(Into::into).collect();
        Self::new(name, Operator::In, Value::Array(list))
    }

    pub fn not_in<V: Into<Value>>(
        name: impl Into<String>,
        values: impl IntoIterator<Item = V>,
    ) -> Self {
        let list: Vec<Value> = values.into_iter().map(Into::into).collect();
        Self::new(name, Operator::NotIn, Value::Array(list))
    }

    /// The value as a list, if it is one.
    pub fn list_values(&self) -> Option<&[Value]> {
        self.value.as_array().map(Vec::as_slice)
    }
}

/// Ordered AND/OR combination of filters.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FilterGroup {
    #[serde(default)]
    pub connector: Connector,
    #[serde(default)]
    pub filters: Vec<Filter>,
}

impl FilterGroup {
    pub fn new(connector: Connector) -> Self {
        Self {
            connector,
            filters: Vec::new(),
        }
    }

    pub fn and() -> Self {
        Self::new(Connector::And)
    }

    pub fn or() -> Self {
        Self::new(Connector::Or)
    }

    #[must_use = "builders have no effect until used"]
    pub fn with(mut self, filter: impl Into<Filter>) -> Self {
        self.filters.push(filter.into());
        self
    }

    pub fn push(&mut self, filter: impl Into<Filter>) {
        self.filters.push(filter.into());
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    /// Append `filter` under `connector`.
    ///
    /// With a matching connector the filter joins this group; otherwise this
    /// group and the filter become the two children of a new group.
    #[must_use]
    pub fn append(mut self, connector: Connector, filter: impl Into<Filter>) -> Self {
        if self.connector == connector {
            self.filters.push(filter.into());
            self
        } else {
            FilterGroup::new(connector).with(self).with(filter)
        }
    }

    #[must_use]
    pub fn and_with(self, filter: impl Into<Filter>) -> Self {
        self.append(Connector::And, filter)
    }

    #[must_use]
    pub fn or_with(self, filter: impl Into<Filter>) -> Self {
        self.append(Connector::Or, filter)
    }
}

/// A filter tree node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Filter {
    Leaf(SimpleFilter),
    Group(FilterGroup),
}

impl Filter {
    /// AND-combine two filters into a new group.
    #[must_use]
    pub fn and(self, other: impl Into<Filter>) -> Filter {
        Filter::Group(FilterGroup::and().with(self).with(other))
    }

    /// View this filter as a group; a lone leaf becomes a one-element AND group.
    pub fn to_group(&self) -> FilterGroup {
        match self {
            Filter::Group(group) => group.clone(),
            Filter::Leaf(leaf) => FilterGroup::and().with(leaf.clone()),
        }
    }

    /// All leaves, depth first.
    pub fn leaves(&self) -> Vec<&SimpleFilter> {
        let mut out = Vec::new();
        collect_leaves(self, &mut out);
        out
    }
}

fn collect_leaves<'a>(filter: &'a Filter, out: &mut Vec<&'a SimpleFilter>) {
    match filter {
        Filter::Leaf(leaf) => out.push(leaf),
        Filter::Group(group) => {
            for child in &group.filters {
                collect_leaves(child, out);
            }
        }
    }
}

impl From<SimpleFilter> for Filter {
    fn from(leaf: SimpleFilter) -> Self {
        Filter::Leaf(leaf)
    }
}

impl From<FilterGroup> for Filter {
    fn from(group: FilterGroup) -> Self {
        Filter::Group(group)
    }
}
