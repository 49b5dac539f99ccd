//! Error types for cube validation, compilation and execution.
//!
//! Every failure surfaced by a cube or the batch engine is a [`CubeError`].
//! Callers branch on the variant (or the `is_*` helpers) instead of matching
//! message text.

use std::fmt;
use std::time::Duration;

use crate::query::Operator;

/// Boxed error returned by backend executors.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Result alias used throughout the crate.
pub type CubeResult<T> = Result<T, CubeError>;

/// Which part of a query referenced an unknown code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferenceKind {
    Dimension,
    Measure,
    RangeDimension,
    Field,
    Order,
    Filter,
}

impl fmt::Display for ReferenceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ReferenceKind::Dimension => "dimension",
            ReferenceKind::Measure => "measure",
            ReferenceKind::RangeDimension => "range dimension",
            ReferenceKind::Field => "field",
            ReferenceKind::Order => "order",
            ReferenceKind::Filter => "filter field",
        };
        f.write_str(name)
    }
}

/// Errors raised by cubes, compilers and the batch engine.
#[derive(Debug, thiserror::Error)]
pub enum CubeError {
    /// Query references a code the cube does not define.
    #[error("invalid {kind} [{code}] for cube [{cube}]")]
    InvalidReference {
        cube: String,
        kind: ReferenceKind,
        code: String,
    },

    /// Query is structurally malformed (e.g. IN without a list value).
    #[error("invalid query for cube [{cube}]: {message}")]
    InvalidQuery { cube: String, message: String },

    /// Operator has no translation in the active context.
    #[error("operator {operator} is not supported {context}")]
    UnsupportedOperator {
        operator: Operator,
        context: &'static str,
    },

    /// Numeric value required but something else was found.
    #[error("field [{field}] expected a number but found {found}")]
    TypeMismatch { field: String, found: String },

    /// Underlying executor failed.
    #[error("backend call for cube [{cube}] failed: {source}")]
    Backend {
        cube: String,
        #[source]
        source: BoxError,
    },

    /// A batch member did not finish in time.
    #[error("query #{index} did not finish within {timeout:?}")]
    Timeout { index: usize, timeout: Duration },

    /// Batch refused because the worker queue is full.
    #[error("query worker queue is full ({pending} pending)")]
    Rejected { pending: usize },

    /// A batch task panicked or was aborted.
    #[error("query task failed: {0}")]
    TaskFailed(String),

    /// No cube registered under this name.
    #[error("unknown cube [{0}]")]
    UnknownCube(String),
}

impl CubeError {
    pub fn invalid_reference(
        cube: impl Into<String>,
        kind: ReferenceKind,
        code: impl Into<String>,
    ) -> Self {
        CubeError::InvalidReference {
            cube: cube.into(),
            kind,
            code: code.into(),
        }
    }

    pub fn invalid_query(cube: impl Into<String>, message: impl Into<String>) -> Self {
        CubeError::InvalidQuery {
            cube: cube.into(),
            message: message.into(),
        }
    }

    pub fn backend(cube: impl Into<String>, source: BoxError) -> Self {
        CubeError::Backend {
            cube: cube.into(),
            source,
        }
    }

    /// True when the query was rejected before reaching a backend.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            CubeError::InvalidReference { .. } | CubeError::InvalidQuery { .. }
        )
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, CubeError::Timeout { .. })
    }

    pub fn is_backend(&self) -> bool {
        matches!(self, CubeError::Backend { .. })
    }
}

/// Short description of a JSON value's type, used in mismatch messages.
pub(crate) fn describe_value(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::Null => "null".to_string(),
        serde_json::Value::Bool(b) => format!("boolean {}", b),
        serde_json::Value::Number(n) => format!("number {}", n),
        serde_json::Value::String(s) => format!("string \"{}\"", s),
        serde_json::Value::Array(_) => "array".to_string(),
        serde_json::Value::Object(_) => "object".to_string(),
    }
}
