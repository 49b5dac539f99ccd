//! Grouping axes.

use serde_json::Value;

use super::column::Column;
use super::cube_map::Row;
use crate::query::normalize_code;

/// A grouping axis exposed under a stable, case-insensitive code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dimension {
    code: String,
    column: Column,
}

impl Dimension {
    pub fn new(code: impl AsRef<str>, column: impl Into<Column>) -> Self {
        Self {
            code: normalize_code(code.as_ref()),
            column: column.into(),
        }
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn column(&self) -> &Column {
        &self.column
    }

    /// Raw-row value under this dimension's alias.
    pub fn value<'a>(&self, row: &'a Row) -> &'a Value {
        row.value(self.column.alias())
    }
}
