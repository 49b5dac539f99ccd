//! Aggregation trees for grouped search queries.
//!
//! Dimensions become nested bucket aggregations, outermost first; the
//! innermost level carries one metric aggregation per measure column, named
//! by the column alias so the decoder can key rows directly.

use serde_json::{json, Map, Value};

use crate::config::SearchSettings;
use crate::cube::CubeSchema;
use crate::error::{CubeError, CubeResult};
use crate::model::{Aggregation, Column, Dimension};
use crate::query::{Query, RangeDimension};

/// Builds the `aggs` object of a grouped search request.
pub struct AggregationBuilder<'a> {
    schema: &'a CubeSchema,
    settings: &'a SearchSettings,
}

enum Level<'a> {
    Terms(&'a Dimension),
    Range(&'a Dimension, &'a RangeDimension),
}

impl<'a> AggregationBuilder<'a> {
    pub fn new(schema: &'a CubeSchema, settings: &'a SearchSettings) -> Self {
        Self { schema, settings }
    }

    pub fn build(&self, query: &Query) -> CubeResult<Value> {
        let mut metrics = Map::new();
        let mut visited = Vec::new();
        for code in query.measures.iter() {
            self.emit_measure(code, &mut visited, &mut metrics)?;
        }
        let has_pipeline = visited.iter().any(|code| {
            self.schema.get_measure(code).is_some_and(|m| {
                m.columns()
                    .iter()
                    .any(|c| self.is_pipeline(c, m.code()))
            })
        });

        let levels = self.levels(query);
        let mut inner = metrics;
        for (depth, level) in levels.iter().enumerate().rev() {
            let (name, mut body) = match level {
                Level::Terms(dim) => {
                    (dim.column().alias(), self.bucket_body(depth, dim, has_pipeline))
                }
                Level::Range(dim, range) => (dim.column().alias(), range_body(dim, range)),
            };
            if !inner.is_empty() {
                body.insert("aggs".to_string(), Value::Object(inner));
            }
            inner = Map::new();
            inner.insert(name.to_string(), Value::Object(body));
        }
        Ok(Value::Object(inner))
    }

    fn levels<'q>(&self, query: &'q Query) -> Vec<Level<'q>>
    where
        'a: 'q,
    {
        let terms = query
            .dimensions
            .iter()
            .filter_map(|code| self.schema.get_dimension(code))
            .map(Level::Terms);
        let ranges = query.range_dimensions.iter().filter_map(|range| {
            self.schema
                .get_dimension(&range.dimension)
                .map(|dim| Level::Range(dim, range))
        });
        terms.chain(ranges).collect()
    }

    fn bucket_body(
        &self,
        depth: usize,
        dim: &Dimension,
        has_pipeline: bool,
    ) -> Map<String, Value> {
        let field = dim.column().expr();
        let histogram = match self.schema.granularity_str() {
            Some(interval) if depth == 0 && is_time_field(field) => Some(interval),
            _ => None,
        };
        let min_doc_count = if has_pipeline { 0 } else { 1 };
        let body = match histogram {
            Some(interval) => json!({"date_histogram": {
                "field": field,
                "fixed_interval": interval,
                "time_zone": self.settings.time_zone,
                "min_doc_count": min_doc_count,
            }}),
            None => json!({"terms": {
                "field": field,
                "size": self.settings.terms_size,
                "order": {"_count": "desc"},
            }}),
        };
        into_map(body)
    }

    /// Emit the metrics of `code`, measures it refers to first.
    ///
    /// A column whose expression names another measure's alias pulls that
    /// measure in as a sibling before its own metric; `visited` breaks
    /// reference cycles.
    fn emit_measure(
        &self,
        code: &str,
        visited: &mut Vec<String>,
        out: &mut Map<String, Value>,
    ) -> CubeResult<()> {
        let Some(measure) = self.schema.get_measure(code) else {
            return Ok(());
        };
        if visited.iter().any(|seen| seen == measure.code()) {
            return Ok(());
        }
        visited.push(measure.code().to_string());

        for column in measure.columns() {
            let sibling = self.referenced_measure(column, measure.code());
            if let Some(target) = &sibling {
                self.emit_measure(target, visited, out)?;
            }
            out.insert(column.alias().to_string(), self.metric(column, sibling.is_some())?);
        }
        Ok(())
    }

    /// Derivatives, and rates over a sibling metric, read `buckets_path`.
    fn is_pipeline(&self, column: &Column, owner: &str) -> bool {
        match column.agg() {
            Aggregation::Derivative => true,
            Aggregation::Rate => self.referenced_measure(column, owner).is_some(),
            _ => false,
        }
    }

    fn referenced_measure(&self, column: &Column, owner: &str) -> Option<String> {
        self.schema
            .measures()
            .filter(|m| m.code() != owner)
            .find(|m| {
                m.columns()
                    .iter()
                    .any(|c| c.alias().eq_ignore_ascii_case(column.expr()))
            })
            .map(|m| m.code().to_string())
    }

    fn metric(&self, column: &Column, over_sibling: bool) -> CubeResult<Value> {
        let field = column.expr();
        let pipeline = column.agg() == Aggregation::Derivative
            || (column.agg() == Aggregation::Rate && over_sibling);
        if pipeline && self.schema.granularity_str().is_none() {
            return Err(CubeError::invalid_query(
                self.schema.name(),
                format!("{} [{}] requires a time granularity", column.agg(), column.alias()),
            ));
        }
        let metric = match column.agg() {
            Aggregation::Sum => json!({"sum": {"field": field}}),
            Aggregation::Avg => json!({"avg": {"field": field}}),
            Aggregation::Max => json!({"max": {"field": field}}),
            Aggregation::Min => json!({"min": {"field": field}}),
            Aggregation::Count => json!({"value_count": {"field": field}}),
            Aggregation::UniqueCount => json!({"cardinality": {"field": field}}),
            Aggregation::Median => json!({"percentiles": {"field": field, "percents": [50]}}),
            // Per-second change of the sibling metric between time buckets.
            Aggregation::Rate if over_sibling => {
                json!({"derivative": {"buckets_path": field, "unit": "1s"}})
            }
            Aggregation::Rate => json!({"rate": {"field": field}}),
            Aggregation::Derivative => json!({"derivative": {"buckets_path": field}}),
        };
        Ok(metric)
    }
}

/// Fields bucketed by time when the cube has a granularity.
fn is_time_field(field: &str) -> bool {
    let lower = field.to_ascii_lowercase();
    lower.contains("time") || lower.contains("date")
}

/// `range` aggregation whose bucket keys are the split indexes.
fn range_body(dim: &Dimension, range: &RangeDimension) -> Map<String, Value> {
    let mut ranges = Vec::with_capacity(range.splits.len() + 1);
    let mut from: Option<f64> = None;
    for (i, split) in range.splits.iter().enumerate() {
        let mut bucket = json!({"key": i.to_string(), "to": split});
        if let Some(lower) = from {
            bucket["from"] = json!(lower);
        }
        ranges.push(bucket);
        from = Some(*split);
    }
    let mut last = json!({"key": range.splits.len().to_string()});
    if let Some(lower) = from {
        last["from"] = json!(lower);
    }
    ranges.push(last);
    into_map(json!({"range": {"field": dim.column().expr(), "ranges": ranges}}))
}

fn into_map(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}
