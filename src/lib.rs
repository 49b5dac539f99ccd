//! # quarry
//!
//! A backend-agnostic dimensional query engine.
//!
//! ## Architecture
//!
//! Callers describe a request as dimensions, measures, filters and ordering
//! against a named cube; the cube compiles it for its backend, executes it
//! through an application-supplied executor and reshapes the result into
//! rows keyed by dimension and measure codes:
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │          Query IR (filters, dimensions, measures)        │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [cube: validate + limit filter]
//! ┌───────────────────────────┬─────────────────────────────┐
//! │   SqlCompiler → SqlPlan   │  filter DSL + aggregations  │
//! │   (SqlExecutor)           │  (SearchExecutor)           │
//! └───────────────────────────┴─────────────────────────────┘
//!                          │ raw rows (keyed by alias)
//!                          ▼ [to_metric → filter_metric → order]
//! ┌─────────────────────────────────────────────────────────┐
//! │              Output rows (keyed by code)                 │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [engine: batches + key merge]
//! ┌─────────────────────────────────────────────────────────┐
//! │                 Merged / batched results                 │
//! └─────────────────────────────────────────────────────────┘
//! ```

pub mod config;
pub mod cube;
pub mod engine;
pub mod error;
pub mod model;
pub mod query;
pub mod search;
pub mod sql;

/// Re-exports for convenient usage.
pub mod prelude {
    pub use crate::config::{Executors, Settings};
    pub use crate::cube::{Cube, CubeRegistry, CubeSchema};
    pub use crate::engine::QueryEngine;
    pub use crate::error::{CubeError, CubeResult};
    pub use crate::model::{
        Aggregation, Calculator, Column, CubeMap, Dimension, DivideCalculator, Measure, Row,
    };
    pub use crate::query::{
        Connector, Filter, FilterGroup, Operator, Query, RangeDimension, SimpleFilter,
    };
    pub use crate::search::{SearchCube, SearchExecutor};
    pub use crate::sql::{Dialect, SqlCube, SqlExecutor};
}

// Also export at crate root for convenience
pub use cube::{Cube, CubeRegistry};
pub use error::{CubeError, CubeResult};
pub use query::{Filter, Query};
