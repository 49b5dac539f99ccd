//! The cube contract and the behavior shared by every backend.
//!
//! A backend implements [`Cube::fetch`]; validation, the limit filter,
//! projection, measure post-filtering and ordering come from the provided
//! methods and [`CubeSchema`].
//!
//! ```text
//!  Query ──► validate ──► AND limit ──► fetch (backend) ──► raw rows
//!                                                             │
//!          rows ◄── order ◄── filter_metric ◄── to_metric ◄───┘
//! ```

mod order;
mod post_filter;
mod registry;
mod schema;

use async_trait::async_trait;
use tracing::debug;

pub use order::RowOrder;
pub use post_filter::filter_rows;
pub use registry::CubeRegistry;
pub use schema::CubeSchema;

use crate::error::CubeResult;
use crate::model::Row;
use crate::query::Query;

#[async_trait]
pub trait Cube: Send + Sync {
    fn schema(&self) -> &CubeSchema;

    /// Run an already validated query (limit filter applied) on the backend.
    ///
    /// Returns rows keyed by backend column alias.
    async fn fetch(&self, query: &Query) -> CubeResult<Vec<Row>>;

    fn name(&self) -> &str {
        self.schema().name()
    }

    /// Validated, backend-filtered rows keyed by column alias.
    async fn raw_query(&self, query: &Query) -> CubeResult<Vec<Row>> {
        let schema = self.schema();
        schema.validate(query)?;
        let effective = schema.with_limit(query);
        let rows = self.fetch(&effective).await?;
        debug!(cube = schema.name(), rows = rows.len(), "raw query finished");
        Ok(rows)
    }

    /// Rows keyed by dimension and measure code, post-filtered and ordered.
    async fn query(&self, query: &Query) -> CubeResult<Vec<Row>> {
        let raw = self.raw_query(query).await?;
        self.schema().project(&raw, query)
    }
}
