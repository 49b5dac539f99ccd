//! Declarative cube definitions.
//!
//! Each `[cubes.<name>]` table becomes a [`CubeSchema`] and, once executors
//! are supplied, a backend cube in a [`CubeRegistry`].

use std::collections::HashSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::settings::{expand_env_vars, SearchSettings, Settings, SettingsError, SqlSettings};
use crate::cube::{CubeRegistry, CubeSchema};
use crate::model::{Aggregation, Column, Dimension, DivideCalculator, Measure};
use crate::query::{normalize_code, Filter};
use crate::search::{SearchCube, SearchExecutor};
use crate::sql::{SqlCube, SqlExecutor};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    Sql,
    Search,
}

/// One `[cubes.<name>]` table.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CubeDefinition {
    pub backend: Backend,

    /// Table or view for SQL cubes (supports ${ENV_VAR} expansion).
    #[serde(default)]
    pub table: Option<String>,

    /// Index or index pattern for search cubes (supports ${ENV_VAR} expansion).
    #[serde(default)]
    pub index: Option<String>,

    #[serde(default)]
    pub granularity: Option<String>,

    /// Filter applied to every query of this cube.
    #[serde(default)]
    pub limit: Option<Filter>,

    #[serde(default)]
    pub dimensions: Vec<DimensionDefinition>,

    #[serde(default)]
    pub measures: Vec<MeasureDefinition>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DimensionDefinition {
    pub code: String,
    pub column: String,
    #[serde(default)]
    pub alias: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ColumnDefinition {
    pub column: String,
    #[serde(default)]
    pub alias: Option<String>,
    #[serde(default)]
    pub aggregation: Aggregation,
    #[serde(default)]
    pub pre_aggregated: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MeasureDefinition {
    pub code: String,
    pub columns: Vec<ColumnDefinition>,
    #[serde(default)]
    pub calculator: Option<CalculatorDefinition>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CalculatorDefinition {
    /// `numerator / denominator * scale`, rounded half-up.
    Divide {
        numerator: String,
        denominator: String,
        #[serde(default = "default_scale")]
        scale: f64,
        #[serde(default = "default_precision")]
        precision: u32,
    },
}

fn default_scale() -> f64 {
    1.0
}

fn default_precision() -> u32 {
    2
}

/// Executors available to the cubes being built.
#[derive(Clone, Default)]
pub struct Executors {
    pub sql: Option<Arc<dyn SqlExecutor>>,
    pub search: Option<Arc<dyn SearchExecutor>>,
}

impl Executors {
    #[must_use = "builders have no effect until used"]
    pub fn sql(mut self, executor: Arc<dyn SqlExecutor>) -> Self {
        self.sql = Some(executor);
        self
    }

    #[must_use = "builders have no effect until used"]
    pub fn search(mut self, executor: Arc<dyn SearchExecutor>) -> Self {
        self.search = Some(executor);
        self
    }
}

impl ColumnDefinition {
    fn to_column(&self) -> Column {
        let column = match &self.alias {
            Some(alias) => Column::aliased(&self.column, alias),
            None => Column::new(&self.column),
        };
        let column = column.aggregation(self.aggregation);
        if self.pre_aggregated {
            column.pre_aggregated()
        } else {
            column
        }
    }
}

impl CubeDefinition {
    /// Build the schema, rejecting blank or duplicate codes and measures
    /// without columns.
    pub fn schema(&self, name: &str) -> Result<CubeSchema, SettingsError> {
        let invalid =
            |msg: String| SettingsError::InvalidConfig(format!("cube [{}]: {}", name, msg));
        let mut schema = CubeSchema::new(name);
        let mut seen = HashSet::new();

        for dim in &self.dimensions {
            let code = normalize_code(&dim.code);
            if code.is_empty() || !seen.insert(code.clone()) {
                return Err(invalid(format!("blank or duplicate dimension code [{}]", dim.code)));
            }
            let column = match &dim.alias {
                Some(alias) => Column::aliased(&dim.column, alias),
                None => Column::new(&dim.column),
            };
            schema = schema.dimension(Dimension::new(&code, column));
        }

        seen.clear();
        for def in &self.measures {
            let code = normalize_code(&def.code);
            if code.is_empty() || !seen.insert(code.clone()) {
                return Err(invalid(format!("blank or duplicate measure code [{}]", def.code)));
            }
            let mut columns = def.columns.iter().map(ColumnDefinition::to_column);
            let Some(primary) = columns.next() else {
                return Err(invalid(format!("measure [{}] has no columns", def.code)));
            };
            let mut measure = columns.fold(Measure::new(&code, primary), |m, c| m.column(c));
            if let Some(CalculatorDefinition::Divide {
                numerator,
                denominator,
                scale,
                precision,
            }) = &def.calculator
            {
                measure = measure.calculator(
                    DivideCalculator::new(numerator, denominator)
                        .scale(*scale)
                        .precision(*precision),
                );
            }
            schema = schema.measure(measure);
        }

        if let Some(granularity) = &self.granularity {
            schema = schema.granularity(granularity);
        }
        if let Some(limit) = &self.limit {
            schema = schema.limit(limit.clone());
        }
        Ok(schema)
    }

    pub fn sql_cube(
        &self,
        name: &str,
        settings: &SqlSettings,
        executor: Arc<dyn SqlExecutor>,
    ) -> Result<SqlCube, SettingsError> {
        self.expect_backend(name, Backend::Sql)?;
        let table = required(name, "table", self.table.as_deref())?;
        Ok(SqlCube::new(self.schema(name)?, table, executor)
            .dialect(settings.dialect)
            .max_page_size(settings.max_page_size))
    }

    pub fn search_cube(
        &self,
        name: &str,
        settings: &SearchSettings,
        executor: Arc<dyn SearchExecutor>,
    ) -> Result<SearchCube, SettingsError> {
        self.expect_backend(name, Backend::Search)?;
        let index = required(name, "index", self.index.as_deref())?;
        Ok(SearchCube::new(self.schema(name)?, index, executor).settings(settings.clone()))
    }

    fn expect_backend(&self, name: &str, backend: Backend) -> Result<(), SettingsError> {
        if self.backend == backend {
            Ok(())
        } else {
            Err(SettingsError::InvalidConfig(format!(
                "cube [{}] uses the {:?} backend, not {:?}",
                name, self.backend, backend
            )))
        }
    }
}

fn required(name: &str, key: &str, value: Option<&str>) -> Result<String, SettingsError> {
    match value {
        Some(v) if !v.trim().is_empty() => expand_env_vars(v),
        _ => Err(SettingsError::InvalidConfig(format!(
            "cube [{}] requires `{}`",
            name, key
        ))),
    }
}

impl Settings {
    /// Build every configured cube with the given executors.
    ///
    /// A cube whose backend has no executor is a configuration error.
    pub fn registry(&self, executors: &Executors) -> Result<CubeRegistry, SettingsError> {
        let mut registry = CubeRegistry::new();
        for (name, def) in &self.cubes {
            match def.backend {
                Backend::Sql => {
                    let executor = executors
                        .sql
                        .clone()
                        .ok_or_else(|| missing_executor(name, "SQL"))?;
                    registry.register(Arc::new(def.sql_cube(name, &self.sql, executor)?));
                }
                Backend::Search => {
                    let executor = executors
                        .search
                        .clone()
                        .ok_or_else(|| missing_executor(name, "search"))?;
                    registry.register(Arc::new(def.search_cube(name, &self.search, executor)?));
                }
            }
        }
        Ok(registry)
    }
}

fn missing_executor(name: &str, kind: &str) -> SettingsError {
    SettingsError::InvalidConfig(format!("cube [{}] needs a {} executor", name, kind))
}
