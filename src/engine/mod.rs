//! Concurrent batches over cubes and numeric merging of their results.
//!
//! ```text
//!  [Q1, Q2, Q3] ──► WorkerPool ──► [rows1, rows2, rows3]   (submission order)
//!                                        │
//!                                        ▼ merge_all (key = dimension aliases)
//!                                     merged raw rows ──► project with Q1
//! ```
//!
//! Every batch member runs on its own task. Results are awaited in
//! submission order with a per-member timeout; the first failure or timeout
//! fails the whole batch and cancels the members still running.

mod merge;
mod pool;

use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

pub use merge::{composite_key, merge_all, merge_rows, DEFAULT_SEPARATOR};
pub use pool::{RejectionPolicy, WorkerPool};

use crate::config::{EngineSettings, SettingsError};
use crate::cube::Cube;
use crate::error::{CubeError, CubeResult};
use crate::model::Row;
use crate::query::Query;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_MAX_CONCURRENCY: usize = 100;
pub const DEFAULT_MAX_PENDING: usize = 1000;

/// Runs batches of cube queries on a bounded pool.
#[derive(Debug, Clone)]
pub struct QueryEngine {
    pool: WorkerPool,
    separator: String,
}

impl Default for QueryEngine {
    fn default() -> Self {
        Self::new(
            DEFAULT_MAX_CONCURRENCY,
            DEFAULT_MAX_PENDING,
            RejectionPolicy::Block,
            DEFAULT_TIMEOUT,
        )
    }
}

impl QueryEngine {
    pub fn new(
        max_concurrency: usize,
        max_pending: usize,
        policy: RejectionPolicy,
        timeout: Duration,
    ) -> Self {
        Self {
            pool: WorkerPool::new(max_concurrency, max_pending, policy, timeout),
            separator: DEFAULT_SEPARATOR.to_string(),
        }
    }

    pub fn from_settings(settings: &EngineSettings) -> Result<Self, SettingsError> {
        let engine = Self::new(
            settings.max_concurrency,
            settings.max_pending,
            settings.rejection,
            settings.timeout_duration()?,
        );
        Ok(engine.separator(&settings.merge_key_separator))
    }

    #[must_use = "builders have no effect until used"]
    pub fn separator(mut self, separator: &str) -> Self {
        self.separator = separator.to_string();
        self
    }

    pub fn timeout(&self) -> Duration {
        self.pool.timeout()
    }

    /// Output rows of each query, in query order.
    pub async fn multi_query(
        &self,
        cube: Arc<dyn Cube>,
        queries: Vec<Query>,
    ) -> CubeResult<Vec<Vec<Row>>> {
        debug!(cube = cube.name(), queries = queries.len(), "running batch");
        let jobs = queries
            .into_iter()
            .map(|query| {
                let cube = Arc::clone(&cube);
                async move { cube.query(&query).await }
            })
            .collect();
        self.pool.run_all(jobs).await
    }

    /// Raw rows of each query, in query order.
    pub async fn multi_raw_query(
        &self,
        cube: Arc<dyn Cube>,
        queries: Vec<Query>,
    ) -> CubeResult<Vec<Vec<Row>>> {
        let jobs = queries
            .into_iter()
            .map(|query| {
                let cube = Arc::clone(&cube);
                async move { cube.raw_query(&query).await }
            })
            .collect();
        self.pool.run_all(jobs).await
    }

    /// One query per cube; results are paired with the cube name, in input order.
    pub async fn multi_cube_query(
        &self,
        batch: Vec<(Arc<dyn Cube>, Query)>,
    ) -> CubeResult<Vec<(String, Vec<Row>)>> {
        debug!(cubes = batch.len(), "running multi-cube batch");
        let jobs = batch
            .into_iter()
            .map(|(cube, query)| async move {
                let rows = cube.query(&query).await?;
                Ok::<_, CubeError>((cube.name().to_string(), rows))
            })
            .collect();
        self.pool.run_all(jobs).await
    }

    /// Raw rows of every query merged on the first query's dimension aliases.
    pub async fn multi_raw_query_and_merge(
        &self,
        cube: Arc<dyn Cube>,
        queries: Vec<Query>,
    ) -> CubeResult<Vec<Row>> {
        let keys = self.merge_keys(cube.as_ref(), first(cube.as_ref(), &queries)?);
        let lists = self.multi_raw_query(cube, queries).await?;
        merge_all(lists, &keys, &self.separator)
    }

    /// Merged rows projected, post-filtered and ordered as the first query.
    pub async fn multi_query_and_merge(
        &self,
        cube: Arc<dyn Cube>,
        queries: Vec<Query>,
    ) -> CubeResult<Vec<Row>> {
        let shape = first(cube.as_ref(), &queries)?.clone();
        let merged = self.multi_raw_query_and_merge(Arc::clone(&cube), queries).await?;
        cube.schema().project(&merged, &shape)
    }

    /// The merged result followed by each individual result, all shaped as
    /// the first query. An empty individual result becomes one empty row.
    pub async fn multi_query_and_merge_with_breakdown(
        &self,
        cube: Arc<dyn Cube>,
        queries: Vec<Query>,
    ) -> CubeResult<Vec<Vec<Row>>> {
        let shape = first(cube.as_ref(), &queries)?.clone();
        let keys = self.merge_keys(cube.as_ref(), &shape);
        let lists = self.multi_raw_query(Arc::clone(&cube), queries).await?;

        let schema = cube.schema();
        let merged = merge_all(lists.clone(), &keys, &self.separator)?;
        let mut out = Vec::with_capacity(lists.len() + 1);
        out.push(schema.project(&merged, &shape)?);
        for raw in lists {
            let rows = schema.project(&raw, &shape)?;
            out.push(if rows.is_empty() { vec![Row::new()] } else { rows });
        }
        Ok(out)
    }

    /// Merge each group, then merge the group results into one list shaped
    /// as the first query of the first group.
    pub async fn grouped_query_and_merge(
        &self,
        cube: Arc<dyn Cube>,
        groups: Vec<Vec<Query>>,
    ) -> CubeResult<Vec<Row>> {
        let shape = groups
            .iter()
            .flatten()
            .next()
            .cloned()
            .ok_or_else(|| empty_batch(cube.as_ref()))?;
        let keys = self.merge_keys(cube.as_ref(), &shape);
        let per_group = self.merge_groups(Arc::clone(&cube), groups, &keys).await?;
        let merged = merge_all(per_group, &keys, &self.separator)?;
        cube.schema().project(&merged, &shape)
    }

    /// One row list per group: each group merged and shaped by its own
    /// first query. Empty groups yield empty lists.
    pub async fn grouped_query(
        &self,
        cube: Arc<dyn Cube>,
        groups: Vec<Vec<Query>>,
    ) -> CubeResult<Vec<Vec<Row>>> {
        let shapes: Vec<Option<Query>> = groups.iter().map(|g| g.first().cloned()).collect();
        let lists = self.run_groups(Arc::clone(&cube), groups).await?;

        let schema = cube.schema();
        let mut out = Vec::with_capacity(lists.len());
        for (lists, shape) in lists.into_iter().zip(shapes) {
            let Some(shape) = shape else {
                out.push(Vec::new());
                continue;
            };
            let keys = self.merge_keys(cube.as_ref(), &shape);
            let merged = merge_all(lists, &keys, &self.separator)?;
            out.push(schema.project(&merged, &shape)?);
        }
        Ok(out)
    }

    async fn merge_groups(
        &self,
        cube: Arc<dyn Cube>,
        groups: Vec<Vec<Query>>,
        keys: &[String],
    ) -> CubeResult<Vec<Vec<Row>>> {
        self.run_groups(cube, groups)
            .await?
            .into_iter()
            .map(|lists| merge_all(lists, keys, &self.separator))
            .collect()
    }

    /// Run every query of every group in one batch and split the raw
    /// results back by group.
    async fn run_groups(
        &self,
        cube: Arc<dyn Cube>,
        groups: Vec<Vec<Query>>,
    ) -> CubeResult<Vec<Vec<Vec<Row>>>> {
        let sizes: Vec<usize> = groups.iter().map(Vec::len).collect();
        let flat: Vec<Query> = groups.into_iter().flatten().collect();
        let mut results = self.multi_raw_query(cube, flat).await?.into_iter();
        Ok(sizes
            .into_iter()
            .map(|size| results.by_ref().take(size).collect())
            .collect())
    }

    fn merge_keys(&self, cube: &dyn Cube, query: &Query) -> Vec<String> {
        cube.schema().dimension_aliases(query)
    }
}

fn first<'q>(cube: &dyn Cube, queries: &'q [Query]) -> CubeResult<&'q Query> {
    queries.first().ok_or_else(|| empty_batch(cube))
}

fn empty_batch(cube: &dyn Cube) -> CubeError {
    CubeError::invalid_query(cube.name(), "batch contains no queries")
}
