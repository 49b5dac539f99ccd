//! Query intermediate representation.
//!
//! A [`Query`] names dimensions, measures and pass-through fields by code,
//! carries an optional [`Filter`] tree, sort specs, backend hints and paging.
//! Codes are case-normalized on insert, so `region` and `REGION` are the same.

mod filter;
#[allow(clippy::module_inception)]
mod query;

pub use filter::{Connector, Filter, FilterGroup, Operator, SimpleFilter};
pub use query::{
    normalize_code, parse_order, CodeSet, Direction, Pageable, Query, RangeDimension,
};
