//! SELECT statement builder.

use std::fmt;

use super::dialect::{Dialect, SqlDialect};
use crate::query::Direction;

/// A single-table aggregate SELECT.
#[derive(Debug, Clone, PartialEq, Default)]
#[must_use = "builders have no effect until used"]
pub struct SelectStatement {
    hints: Vec<String>,
    columns: Vec<String>,
    from: String,
    filter: Option<String>,
    group_by: Vec<String>,
    order_by: Vec<(String, Direction)>,
    limit: Option<(u64, u64)>,
}

impl SelectStatement {
    pub fn new(from: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            ..Self::default()
        }
    }

    pub fn hints(mut self, hints: &[String]) -> Self {
        self.hints = hints.to_vec();
        self
    }

    /// Append a select-list item, optionally aliased.
    pub fn column(mut self, expr: impl Into<String>, alias: Option<&str>) -> Self {
        let expr = expr.into();
        self.columns.push(match alias {
            Some(alias) => format!("{} AS {}", expr, alias),
            None => expr,
        });
        self
    }

    pub fn filter(mut self, condition: Option<String>) -> Self {
        self.filter = condition;
        self
    }

    pub fn group_by(mut self, expr: impl Into<String>) -> Self {
        self.group_by.push(expr.into());
        self
    }

    pub fn order_by(mut self, expr: impl Into<String>, direction: Direction) -> Self {
        self.order_by.push((expr.into(), direction));
        self
    }

    pub fn limit(mut self, limit: u64, offset: u64) -> Self {
        self.limit = Some((limit, offset));
        self
    }

    /// `SELECT COUNT(1)` over the same source and filter.
    pub fn to_count(&self) -> SelectStatement {
        SelectStatement {
            columns: vec!["COUNT(1)".to_string()],
            from: self.from.clone(),
            filter: self.filter.clone(),
            ..SelectStatement::default()
        }
    }

    pub fn to_sql(&self, dialect: Dialect) -> String {
        let mut sql = String::from("SELECT ");
        if !self.hints.is_empty() {
            sql.push_str(&dialect.emit_hints(&self.hints));
            sql.push(' ');
        }
        sql.push_str(&self.columns.join(", "));
        sql.push_str(" FROM ");
        sql.push_str(&self.from);
        if let Some(filter) = &self.filter {
            sql.push_str(" WHERE ");
            sql.push_str(filter);
        }
        if !self.group_by.is_empty() {
            sql.push_str(" GROUP BY ");
            sql.push_str(&self.group_by.join(", "));
        }
        if !self.order_by.is_empty() {
            let items: Vec<String> = self
                .order_by
                .iter()
                .map(|(expr, dir)| match dir {
                    Direction::Asc => format!("{} ASC", expr),
                    Direction::Desc => format!("{} DESC", expr),
                })
                .collect();
            sql.push_str(" ORDER BY ");
            sql.push_str(&items.join(", "));
        }
        if let Some((limit, offset)) = self.limit {
            sql.push(' ');
            sql.push_str(&dialect.emit_limit_offset(limit, offset));
        }
        sql
    }
}

impl fmt::Display for SelectStatement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_sql(Dialect::default()))
    }
}
