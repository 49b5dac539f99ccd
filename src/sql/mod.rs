//! Relational backend: compiles queries to parameterized SQL.
//!
//! - [`SqlCompiler`] turns a validated query into a [`SqlPlan`]
//! - [`SqlCube`] runs plans through an application-supplied [`SqlExecutor`]
//!
//! Paging an ungrouped query first counts the matching rows; a page that
//! starts past the last row returns nothing without running the paged query.

pub mod compiler;
pub mod cube;
pub mod dialect;
pub mod statement;


pub use compiler::{SqlCompiler, SqlParams, SqlPlan, MAX_PAGE_SIZE};
pub use cube::{SqlCube, SqlExecutor};
pub use dialect::{Dialect, SqlDialect};
pub use statement::SelectStatement;
