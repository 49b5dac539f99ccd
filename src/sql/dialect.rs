//! SQL dialect rules for the handful of constructs the compiler emits.
//!
//! | Construct | MySQL | PostgreSQL | DuckDB |
//! |-----------|-------|------------|--------|
//! | Paging | `LIMIT off, n` | `LIMIT n OFFSET off` | `LIMIT n OFFSET off` |
//! | Hints | `/*+ a,b */` | `/* a,b */` | `/* a,b */` |
//! | Parameters | `:v1` | `:v1` | `:v1` |

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// How dialect-specific fragments are rendered.
pub trait SqlDialect: fmt::Debug + Send + Sync {
    /// Dialect name for display/logging.
    fn name(&self) -> &'static str;

    /// Named bind parameter reference.
    fn placeholder(&self, name: &str) -> String {
        format!(":{}", name)
    }

    /// Query hints placed right after `SELECT`.
    ///
    /// Dialects without optimizer hints keep them as a plain comment.
    fn emit_hints(&self, hints: &[String]) -> String {
        format!("/* {} */", hints.join(","))
    }

    /// `LIMIT`/`OFFSET` clause.
    fn emit_limit_offset(&self, limit: u64, offset: u64) -> String {
        if offset == 0 {
            format!("LIMIT {}", limit)
        } else {
            format!("LIMIT {} OFFSET {}", limit, offset)
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct MySql;

impl SqlDialect for MySql {
    fn name(&self) -> &'static str {
        "mysql"
    }

    fn emit_hints(&self, hints: &[String]) -> String {
        format!("/*+ {} */", hints.join(","))
    }

    fn emit_limit_offset(&self, limit: u64, offset: u64) -> String {
        format!("LIMIT {}, {}", offset, limit)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Postgres;

impl SqlDialect for Postgres {
    fn name(&self) -> &'static str {
        "postgres"
    }
}

#[derive(Debug, Clone, Copy)]
pub struct DuckDb;

impl SqlDialect for DuckDb {
    fn name(&self) -> &'static str {
        "duckdb"
    }
}

/// Supported SQL dialects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    #[default]
    MySql,
    Postgres,
    DuckDb,
}

impl Dialect {
    /// Get the dialect implementation.
    pub fn dialect(&self) -> &'static dyn SqlDialect {
        match self {
            Dialect::MySql => &MySql,
            Dialect::Postgres => &Postgres,
            Dialect::DuckDb => &DuckDb,
        }
    }
}

impl SqlDialect for Dialect {
    fn name(&self) -> &'static str {
        self.dialect().name()
    }

    fn placeholder(&self, name: &str) -> String {
        self.dialect().placeholder(name)
    }

    fn emit_hints(&self, hints: &[String]) -> String {
        self.dialect().emit_hints(hints)
    }

    fn emit_limit_offset(&self, limit: u64, offset: u64) -> String {
        self.dialect().emit_limit_offset(limit, offset)
    }
}

impl FromStr for Dialect {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "mysql" => Ok(Dialect::MySql),
            "postgres" | "postgresql" => Ok(Dialect::Postgres),
            "duckdb" => Ok(Dialect::DuckDb),
            other => Err(format!("unsupported SQL dialect: {}", other)),
        }
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
