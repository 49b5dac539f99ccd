//! Cube backed by a relational database.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use super::compiler::{SqlCompiler, SqlParams, SqlPlan, MAX_PAGE_SIZE};
use super::dialect::Dialect;
use crate::cube::{Cube, CubeSchema};
use crate::error::{BoxError, CubeError, CubeResult};
use crate::model::Row;
use crate::query::Query;

/// Statement execution supplied by the application (connection pooling,
/// retries and driver specifics live behind it).
#[async_trait]
pub trait SqlExecutor: Send + Sync {
    /// Run a single-value `COUNT` query.
    async fn count(&self, sql: &str, params: &SqlParams) -> Result<u64, BoxError>;

    /// Run a query and return its rows keyed by column name.
    async fn query(&self, sql: &str, params: &SqlParams) -> Result<Vec<Row>, BoxError>;
}

pub struct SqlCube {
    schema: CubeSchema,
    table: String,
    dialect: Dialect,
    max_page_size: u64,
    executor: Arc<dyn SqlExecutor>,
}

impl SqlCube {
    pub fn new(
        schema: CubeSchema,
        table: impl Into<String>,
        executor: Arc<dyn SqlExecutor>,
    ) -> Self {
        Self {
            schema,
            table: table.into(),
            dialect: Dialect::default(),
            max_page_size: MAX_PAGE_SIZE,
            executor,
        }
    }

    #[must_use = "builders have no effect until used"]
    pub fn dialect(mut self, dialect: Dialect) -> Self {
        self.dialect = dialect;
        self
    }

    #[must_use = "builders have no effect until used"]
    pub fn max_page_size(mut self, max_page_size: u64) -> Self {
        self.max_page_size = max_page_size;
        self
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    /// Compile without executing; the limit filter is applied, validation is not.
    pub fn compile(&self, query: &Query) -> CubeResult<SqlPlan> {
        let effective = self.schema.with_limit(query);
        self.compiler().compile(&effective)
    }

    fn compiler(&self) -> SqlCompiler<'_> {
        SqlCompiler::new(&self.schema, &self.table)
            .dialect(self.dialect)
            .max_page_size(self.max_page_size)
    }
}

#[async_trait]
impl Cube for SqlCube {
    fn schema(&self) -> &CubeSchema {
        &self.schema
    }

    async fn fetch(&self, query: &Query) -> CubeResult<Vec<Row>> {
        let plan = self.compiler().compile(query)?;
        let cube = self.schema.name();

        if let Some(count_sql) = &plan.count_sql {
            debug!(cube, sql = %count_sql, params = plan.params.len(), "counting rows");
            let total = self
                .executor
                .count(count_sql, &plan.params)
                .await
                .map_err(|e| CubeError::backend(cube, e))?;
            if plan.page_out_of_range(total) {
                debug!(cube, total, offset = plan.offset, "requested page is past the last row");
                return Ok(Vec::new());
            }
        }

        debug!(cube, sql = %plan.sql, params = plan.params.len(), "executing query");
        self.executor
            .query(&plan.sql, &plan.params)
            .await
            .map_err(|e| CubeError::backend(cube, e))
    }
}
