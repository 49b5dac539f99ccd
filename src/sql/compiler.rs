//! Compile a [`Query`] against a [`CubeSchema`] into parameterized SQL.
//!
//! Filter values never reach the SQL text; each is bound under a synthetic
//! `vN` name and referenced through the dialect's placeholder syntax.

use serde_json::Value;

use super::dialect::{Dialect, SqlDialect};
use super::statement::SelectStatement;
use crate::cube::CubeSchema;
use crate::error::{CubeError, CubeResult};
use crate::query::{parse_order, Connector, Filter, FilterGroup, Operator, Query, SimpleFilter};

/// Default upper bound on page size.
pub const MAX_PAGE_SIZE: u64 = 100;

/// Bound values, in binding order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SqlParams {
    values: Vec<(String, Value)>,
}

impl SqlParams {
    /// Bind a value and return its parameter name.
    fn bind(&mut self, value: Value) -> String {
        let name = format!("v{}", self.values.len() + 1);
        self.values.push((name.clone(), value));
        name
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.values.iter().map(|(n, v)| (n.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Everything needed to run one compiled query.
#[derive(Debug, Clone, PartialEq)]
pub struct SqlPlan {
    pub sql: String,
    /// Total-count query, present when paging an ungrouped query.
    pub count_sql: Option<String>,
    pub params: SqlParams,
    /// Row offset of the requested page (0 when not paging).
    pub offset: u64,
    pub page_size: Option<u64>,
}

impl SqlPlan {
    /// True when a page starting at `offset` lies beyond `total` rows.
    pub fn page_out_of_range(&self, total: u64) -> bool {
        self.offset > 0 && total <= self.offset
    }
}

/// SQL compiler bound to one cube's table.
#[derive(Debug, Clone, Copy)]
pub struct SqlCompiler<'a> {
    schema: &'a CubeSchema,
    table: &'a str,
    dialect: Dialect,
    max_page_size: u64,
}

impl<'a> SqlCompiler<'a> {
    pub fn new(schema: &'a CubeSchema, table: &'a str) -> Self {
        Self {
            schema,
            table,
            dialect: Dialect::default(),
            max_page_size: MAX_PAGE_SIZE,
        }
    }

    #[must_use = "builders have no effect until used"]
    pub fn dialect(mut self, dialect: Dialect) -> Self {
        self.dialect = dialect;
        self
    }

    #[must_use = "builders have no effect until used"]
    pub fn max_page_size(mut self, max_page_size: u64) -> Self {
        self.max_page_size = max_page_size.max(1);
        self
    }

    pub fn compile(&self, query: &Query) -> CubeResult<SqlPlan> {
        let mut params = SqlParams::default();
        let mut stmt = SelectStatement::new(self.table).hints(&query.hints);

        for code in query.dimensions.iter() {
            let column = self.dimension_column(code)?;
            stmt = stmt.column(column.expr(), Some(column.alias()));
        }
        for range in &query.range_dimensions {
            let column = self.dimension_column(&range.dimension)?;
            stmt = stmt.column(case_expression(column.expr(), &range.splits), Some(column.alias()));
        }
        for code in query.measures.iter() {
            let measure = self.schema.get_measure(code).ok_or_else(|| self.unknown(code))?;
            for column in measure.columns() {
                let expr = if column.is_pre_aggregated() {
                    column.expr().to_string()
                } else {
                    format!("SUM({})", column.expr())
                };
                stmt = stmt.column(expr, Some(column.alias()));
            }
        }
        for code in query.fields.iter() {
            let column = self.dimension_column(code)?;
            stmt = stmt.column(column.expr(), Some(column.alias()));
        }

        let condition = match &query.filter {
            Some(filter) => self.render_root(filter, &mut params)?,
            None => None,
        };
        stmt = stmt.filter(condition);

        for code in query.dimensions.iter() {
            stmt = stmt.group_by(self.dimension_column(code)?.expr());
        }
        for range in &query.range_dimensions {
            let column = self.dimension_column(&range.dimension)?;
            stmt = stmt.group_by(case_expression(column.expr(), &range.splits));
        }

        for spec in query.orders.iter() {
            let (code, direction) = parse_order(spec);
            let column = self.schema.column_for(code).ok_or_else(|| self.unknown(code))?;
            stmt = stmt.order_by(column.alias(), direction);
        }

        let mut offset = 0;
        let mut page_size = None;
        let mut count_sql = None;
        if let Some(pageable) = &query.pageable {
            let (page_offset, size) = pageable.offset_and_size(self.max_page_size);
            offset = page_offset;
            page_size = Some(size);
            if !query.is_grouped() {
                count_sql = Some(stmt.to_count().to_sql(self.dialect));
            }
            stmt = stmt.limit(size, page_offset);
        }

        Ok(SqlPlan {
            sql: stmt.to_sql(self.dialect),
            count_sql,
            params,
            offset,
            page_size,
        })
    }

    fn dimension_column(&self, code: &str) -> CubeResult<&'a crate::model::Column> {
        self.schema
            .get_dimension(code)
            .map(|d| d.column())
            .ok_or_else(|| self.unknown(code))
    }

    fn unknown(&self, code: &str) -> CubeError {
        CubeError::invalid_query(self.schema.name(), format!("[{}] is not defined", code))
    }

    /// WHERE body for the root filter, or `None` when there is nothing to apply.
    fn render_root(&self, filter: &Filter, params: &mut SqlParams) -> CubeResult<Option<String>> {
        match filter {
            Filter::Group(group) if group.is_empty() => Ok(None),
            Filter::Group(group) => self.render_group(group, params).map(Some),
            Filter::Leaf(leaf) => self.render_leaf(leaf, params).map(Some),
        }
    }

    fn render_group(&self, group: &FilterGroup, params: &mut SqlParams) -> CubeResult<String> {
        let mut parts = Vec::with_capacity(group.filters.len());
        for child in &group.filters {
            let part = match child {
                Filter::Leaf(leaf) => self.render_leaf(leaf, params)?,
                Filter::Group(inner) if inner.is_empty() => match group.connector {
                    Connector::And => "(1=1)".to_string(),
                    Connector::Or => "(1>1)".to_string(),
                },
                Filter::Group(inner) => self.render_group(inner, params)?,
            };
            parts.push(part);
        }
        let separator = format!(" {} ", group.connector);
        Ok(format!("({})", parts.join(&separator)))
    }

    fn render_leaf(&self, leaf: &SimpleFilter, params: &mut SqlParams) -> CubeResult<String> {
        if self.schema.get_measure(&leaf.name).is_some() {
            return Ok("1=1".to_string());
        }
        // Limit filters may name raw columns that are not dimensions.
        let column = match self.schema.get_dimension(&leaf.name) {
            Some(dim) => dim.column().expr().to_string(),
            None => leaf.name.clone(),
        };
        let op = leaf.operator;
        let fragment = match op {
            Operator::In | Operator::NotIn => {
                let values = leaf.list_values().ok_or_else(|| {
                    CubeError::invalid_query(
                        self.schema.name(),
                        format!("{} on [{}] requires a list value", op, leaf.name),
                    )
                })?;
                if values.is_empty() {
                    return Ok(if op == Operator::In { "1>1" } else { "1=1" }.to_string());
                }
                let placeholders: Vec<String> = values
                    .iter()
                    .map(|v| self.dialect.placeholder(&params.bind(v.clone())))
                    .collect();
                let keyword = if op == Operator::In { "IN" } else { "NOT IN" };
                format!("{} {} ({})", column, keyword, placeholders.join(", "))
            }
            Operator::Exists => format!("{} IS NOT NULL", column),
            _ => {
                let symbol = match op {
                    Operator::Eq => "=",
                    Operator::Ne => "<>",
                    Operator::Lt => "<",
                    Operator::Gt => ">",
                    Operator::Le => "<=",
                    Operator::Ge => ">=",
                    Operator::Like => "LIKE",
                    Operator::In | Operator::NotIn | Operator::Exists => {
                        return Err(CubeError::UnsupportedOperator {
                            operator: op,
                            context: "as a scalar SQL comparison",
                        })
                    }
                };
                let name = params.bind(leaf.value.clone());
                format!("{} {} {}", column, symbol, self.dialect.placeholder(&name))
            }
        };
        Ok(fragment)
    }
}

/// `CASE WHEN col < s0 THEN 0 ... ELSE n END` over ascending splits.
fn case_expression(column: &str, splits: &[f64]) -> String {
    let mut sql = String::from("CASE");
    for (i, split) in splits.iter().enumerate() {
        sql.push_str(&format!(" WHEN {} < {} THEN {}", column, split, i));
    }
    sql.push_str(&format!(" ELSE {} END", splits.len()));
    sql
}
