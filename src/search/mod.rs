//! Search backend: compiles queries to a JSON query DSL.
//!
//! Grouped queries (dimensions or range dimensions) become a filter plus a
//! nested aggregation tree with `size: 0`; the response buckets are decoded
//! into one row per leaf bucket. Ungrouped queries fetch documents with
//! scroll paging and flatten each hit's source into dotted keys.

pub mod aggs;
pub mod cube;
pub mod decode;
pub mod dsl;
pub mod executor;

pub use aggs::AggregationBuilder;
pub use cube::{SearchCube, SearchRequest};
pub use decode::{decode_aggregations, flatten_hit, COUNT_KEY, SCORE_KEY};
pub use dsl::query_object;
pub use executor::{hits_of, SearchExecutor, SCROLL_PATH};
