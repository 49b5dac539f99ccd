//! Cube backed by a search cluster.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::debug;

use super::aggs::AggregationBuilder;
use super::decode::{decode_aggregations, flatten_hit};
use super::dsl::query_object;
use super::executor::SearchExecutor;
use crate::config::SearchSettings;
use crate::cube::{Cube, CubeSchema, RowOrder};
use crate::error::{CubeError, CubeResult};
use crate::model::{Aggregation, Row};
use crate::query::{parse_order, Direction, Query};

/// A compiled search request.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchRequest {
    pub path: String,
    pub body: Value,
    /// Flat requests page through every hit with scroll cursors.
    pub scroll: bool,
}

pub struct SearchCube {
    schema: CubeSchema,
    index: String,
    settings: SearchSettings,
    executor: Arc<dyn SearchExecutor>,
}

impl SearchCube {
    /// `index` may be a pattern such as `metricbeat-*`.
    pub fn new(
        schema: CubeSchema,
        index: impl Into<String>,
        executor: Arc<dyn SearchExecutor>,
    ) -> Self {
        Self {
            schema,
            index: index.into(),
            settings: SearchSettings::default(),
            executor,
        }
    }

    #[must_use = "builders have no effect until used"]
    pub fn settings(mut self, settings: SearchSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn index(&self) -> &str {
        &self.index
    }

    pub fn path(&self) -> String {
        format!("{}/_search", self.index)
    }

    /// Compile without executing; the limit filter is applied, validation is not.
    pub fn request(&self, query: &Query) -> CubeResult<SearchRequest> {
        self.build(&self.schema.with_limit(query))
    }

    fn build(&self, query: &Query) -> CubeResult<SearchRequest> {
        let filter = query_object(&self.schema, query.filter.as_ref())?;
        if query.is_grouped() {
            let aggs = AggregationBuilder::new(&self.schema, &self.settings).build(query)?;
            return Ok(SearchRequest {
                path: self.path(),
                body: json!({"size": 0, "query": filter, "aggs": aggs}),
                scroll: false,
            });
        }

        let mut body = json!({"size": self.settings.page_size, "query": filter});
        if !query.fields.is_empty() {
            body["_source"] = json!({"includes": self.source_includes(query)});
        }
        let sort = self.sort_clause(query);
        if !sort.is_empty() {
            body["sort"] = Value::Array(sort);
        }
        Ok(SearchRequest {
            path: self.path(),
            body,
            scroll: true,
        })
    }

    fn source_includes(&self, query: &Query) -> Vec<String> {
        let mut includes: Vec<String> = Vec::new();
        let fields = query
            .fields
            .iter()
            .filter_map(|code| self.schema.get_dimension(code))
            .map(|dim| dim.column());
        let measures = query
            .measures
            .iter()
            .filter_map(|code| self.schema.get_measure(code))
            .flat_map(|m| m.columns().iter())
            .filter(|c| c.agg() != Aggregation::Derivative);
        for column in fields.chain(measures) {
            let expr = column.expr().to_string();
            if !includes.contains(&expr) {
                includes.push(expr);
            }
        }
        includes
    }

    fn sort_clause(&self, query: &Query) -> Vec<Value> {
        query
            .orders
            .iter()
            .filter_map(|spec| {
                let (code, direction) = parse_order(spec);
                let column = self.schema.column_for(code)?;
                let order = match direction {
                    Direction::Asc => "asc",
                    Direction::Desc => "desc",
                };
                Some(json!({column.expr(): {"order": order}}))
            })
            .collect()
    }

    /// Re-key a flattened hit from backend field paths to column aliases.
    fn rename(&self, hit: Row, aliases: &HashMap<String, String>) -> Row {
        let mut row = Row::with_capacity(hit.len());
        for (key, value) in hit.iter() {
            let key = aliases.get(key).map(String::as_str).unwrap_or(key);
            row.insert(key, value.clone());
        }
        row
    }

    fn alias_map(&self) -> HashMap<String, String> {
        let dims = self.schema.dimensions().map(|d| d.column());
        let measures = self.schema.measures().flat_map(|m| m.columns().iter());
        dims.chain(measures)
            .filter(|c| !c.expr().eq_ignore_ascii_case(c.alias()))
            .map(|c| (c.expr().to_uppercase(), c.alias().to_string()))
            .collect()
    }

    /// Order raw rows by alias, comparing numbers as padded strings.
    fn sort_rows(&self, rows: &mut [Row], query: &Query) {
        let specs: Vec<String> = query
            .orders
            .iter()
            .filter_map(|spec| {
                let (code, direction) = parse_order(spec);
                let alias = self.schema.column_for(code)?.alias();
                Some(match direction {
                    Direction::Asc => format!("+{}", alias),
                    Direction::Desc => format!("-{}", alias),
                })
            })
            .collect();
        RowOrder::parse(specs.iter().map(String::as_str))
            .padded()
            .sort(rows);
    }
}

#[async_trait]
impl Cube for SearchCube {
    fn schema(&self) -> &CubeSchema {
        &self.schema
    }

    async fn fetch(&self, query: &Query) -> CubeResult<Vec<Row>> {
        let request = self.build(query)?;
        let cube = self.schema.name();
        debug!(cube, path = %request.path, body = %request.body, "executing search");

        let mut rows = if request.scroll {
            let hits = self
                .executor
                .search_all(&request.path, request.body, &self.settings.scroll)
                .await
                .map_err(|e| CubeError::backend(cube, e))?;
            let aliases = self.alias_map();
            hits.iter()
                .map(|hit| self.rename(flatten_hit(hit), &aliases))
                .collect::<Vec<_>>()
        } else {
            let response = self
                .executor
                .execute("POST", &request.path, request.body)
                .await
                .map_err(|e| CubeError::backend(cube, e))?;
            decode_aggregations(response.get("aggregations").unwrap_or(&Value::Null))
        };

        self.sort_rows(&mut rows, query);
        debug!(cube, rows = rows.len(), "search finished");
        Ok(rows)
    }
}
