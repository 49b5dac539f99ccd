//! Cube schema: the dimension and measure registries behind one cube.

use serde_json::Value;

use super::order::RowOrder;
use super::post_filter;
use crate::error::{CubeError, CubeResult, ReferenceKind};
use crate::model::{Column, CubeMap, Dimension, Measure, Row};
use crate::query::{parse_order, CodeSet, Filter, Query};

/// Named schema bound to one backend.
///
/// Built once at startup and read-only afterwards.
#[derive(Debug, Clone)]
pub struct CubeSchema {
    name: String,
    granularity: Option<String>,
    limit: Option<Filter>,
    dimensions: CubeMap<Dimension>,
    measures: CubeMap<Measure>,
}

impl CubeSchema {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            granularity: None,
            limit: None,
            dimensions: CubeMap::new(),
            measures: CubeMap::new(),
        }
    }

    #[must_use = "builders have no effect until used"]
    pub fn dimension(mut self, dimension: Dimension) -> Self {
        let code = dimension.code().to_string();
        self.dimensions.insert(&code, dimension);
        self
    }

    #[must_use = "builders have no effect until used"]
    pub fn measure(mut self, measure: Measure) -> Self {
        let code = measure.code().to_string();
        self.measures.insert(&code, measure);
        self
    }

    /// Time bucket width (e.g. `1h`) for date histograms.
    #[must_use = "builders have no effect until used"]
    pub fn granularity(mut self, granularity: impl Into<String>) -> Self {
        self.granularity = Some(granularity.into());
        self
    }

    /// Filter ANDed into every query before it reaches the backend.
    #[must_use = "builders have no effect until used"]
    pub fn limit(mut self, filter: impl Into<Filter>) -> Self {
        self.limit = Some(filter.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn granularity_str(&self) -> Option<&str> {
        self.granularity.as_deref().filter(|g| !g.trim().is_empty())
    }

    pub fn limit_filter(&self) -> Option<&Filter> {
        self.limit.as_ref()
    }

    pub fn get_dimension(&self, code: &str) -> Option<&Dimension> {
        self.dimensions.get(code)
    }

    pub fn get_measure(&self, code: &str) -> Option<&Measure> {
        self.measures.get(code)
    }

    pub fn dimensions(&self) -> impl Iterator<Item = &Dimension> {
        self.dimensions.values()
    }

    pub fn measures(&self) -> impl Iterator<Item = &Measure> {
        self.measures.values()
    }

    /// Backend column of a dimension, or the first column of a measure.
    pub fn column_for(&self, code: &str) -> Option<&Column> {
        self.get_dimension(code)
            .map(Dimension::column)
            .or_else(|| self.get_measure(code).map(Measure::primary))
    }

    /// Check that every code in `query` resolves in this cube.
    pub fn validate(&self, query: &Query) -> CubeResult<()> {
        if let Some(filter) = &query.filter {
            self.validate_filter(filter)?;
        }
        for code in query.dimensions.iter() {
            if self.get_dimension(code).is_none() {
                return Err(self.invalid(ReferenceKind::Dimension, code));
            }
        }
        for range in &query.range_dimensions {
            if self.get_dimension(&range.dimension).is_none() {
                return Err(self.invalid(ReferenceKind::RangeDimension, &range.dimension));
            }
            if !range.is_ascending() {
                return Err(CubeError::invalid_query(
                    &self.name,
                    format!("splits for [{}] must be strictly ascending", range.dimension),
                ));
            }
        }
        for code in query.measures.iter() {
            if self.get_measure(code).is_none() {
                return Err(self.invalid(ReferenceKind::Measure, code));
            }
        }
        for code in query.fields.iter() {
            if self.get_dimension(code).is_none() {
                return Err(self.invalid(ReferenceKind::Field, code));
            }
        }
        for spec in query.orders.iter() {
            let (code, _) = parse_order(spec);
            if self.column_for(code).is_none() {
                return Err(self.invalid(ReferenceKind::Order, code));
            }
        }
        Ok(())
    }

    fn validate_filter(&self, filter: &Filter) -> CubeResult<()> {
        for leaf in filter.leaves() {
            if self.column_for(&leaf.name).is_none() {
                return Err(self.invalid(ReferenceKind::Filter, &leaf.name));
            }
            if leaf.operator.takes_list() && leaf.list_values().is_none() {
                return Err(CubeError::invalid_query(
                    &self.name,
                    format!("{} on [{}] requires a list value", leaf.operator, leaf.name),
                ));
            }
        }
        Ok(())
    }

    fn invalid(&self, kind: ReferenceKind, code: &str) -> CubeError {
        CubeError::invalid_reference(&self.name, kind, code.trim().to_uppercase())
    }

    /// The query as sent to the backend: the cube's limit filter ANDed in.
    pub fn with_limit(&self, query: &Query) -> Query {
        let mut effective = query.clone_basic();
        if let Some(limit) = &self.limit {
            effective.and_filter(limit.clone());
        }
        effective
    }

    /// Project raw rows (keyed by backend alias) into rows keyed by code.
    pub fn to_metric(&self, raw: &[Row], query: &Query) -> CubeResult<Vec<Row>> {
        let mut out = Vec::with_capacity(raw.len());
        for raw_row in raw {
            let mut row = Row::with_capacity(
                query.dimensions.len() + query.measures.len() + query.fields.len(),
            );
            for code in query.dimensions.iter() {
                if let Some(dim) = self.get_dimension(code) {
                    row.insert(code, dim.value(raw_row).clone());
                }
            }
            for range in &query.range_dimensions {
                if let Some(dim) = self.get_dimension(&range.dimension) {
                    row.insert(&range.dimension, dim.value(raw_row).clone());
                }
            }
            for code in query.measures.iter() {
                if let Some(measure) = self.get_measure(code) {
                    row.insert(code, number(measure.value(raw_row)?));
                }
            }
            for code in query.fields.iter() {
                if let Some(dim) = self.get_dimension(code) {
                    row.insert(code, dim.value(raw_row).clone());
                }
            }
            out.push(row);
        }
        Ok(out)
    }

    /// Drop rows failing the query's measure filters.
    pub fn filter_metric(&self, rows: Vec<Row>, query: &Query) -> CubeResult<Vec<Row>> {
        post_filter::filter_rows(rows, query.filter.as_ref(), &query.measures)
    }

    /// Stable sort by `+code` / `-code` specs.
    pub fn order(&self, rows: &mut [Row], orders: &CodeSet) {
        RowOrder::parse(orders.iter()).sort(rows);
    }

    /// Project, post-filter and order raw rows for `query`.
    pub fn project(&self, raw: &[Row], query: &Query) -> CubeResult<Vec<Row>> {
        let rows = self.to_metric(raw, query)?;
        let mut rows = self.filter_metric(rows, query)?;
        self.order(&mut rows, &query.orders);
        Ok(rows)
    }

    /// Raw-row keys identifying a group: the aliases of the requested
    /// dimensions and range dimensions.
    pub fn dimension_aliases(&self, query: &Query) -> Vec<String> {
        let mut aliases = Vec::new();
        let codes = query
            .dimensions
            .iter()
            .chain(query.range_dimensions.iter().map(|r| r.dimension.as_str()));
        for code in codes {
            if let Some(dim) = self.get_dimension(code) {
                let alias = dim.column().alias().to_string();
                if !aliases.contains(&alias) {
                    aliases.push(alias);
                }
            }
        }
        aliases
    }
}

fn number(value: f64) -> Value {
    serde_json::Number::from_f64(value)
        .map(Value::Number)
        .unwrap_or(Value::Null)
}
