//! The request shape sent to a cube.

use serde::{Deserialize, Serialize};

use super::filter::Filter;

/// Insertion-ordered set of codes, case-normalized to uppercase.
///
/// Adding a code that is already present (in any case) has no effect.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<String>", into = "Vec<String>")]
pub struct CodeSet {
    codes: Vec<String>,
}

impl CodeSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a code; returns false if it was already present.
    pub fn insert(&mut self, code: impl AsRef<str>) -> bool {
        let code = normalize_code(code.as_ref());
        if code.is_empty() || self.codes.contains(&code) {
            return false;
        }
        self.codes.push(code);
        true
    }

    pub fn contains(&self, code: &str) -> bool {
        let code = normalize_code(code);
        self.codes.iter().any(|c| *c == code)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.codes.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.codes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }

    pub fn first(&self) -> Option<&str> {
        self.codes.first().map(String::as_str)
    }
}

impl From<Vec<String>> for CodeSet {
    fn from(codes: Vec<String>) -> Self {
        codes.into_iter().collect()
    }
}

impl From<CodeSet> for Vec<String> {
    fn from(set: CodeSet) -> Self {
        set.codes
    }
}

impl<S: AsRef<str>> FromIterator<S> for CodeSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut set = CodeSet::new();
        for code in iter {
            set.insert(code);
        }
        set
    }
}

/// Trim and uppercase a code.
pub fn normalize_code(code: &str) -> String {
    code.trim().to_uppercase()
}

/// Sort direction parsed from a `+code` / `-code` order spec.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Asc,
    Desc,
}

/// Split an order spec into its code and direction.
///
/// A single leading `+` or `-` is stripped; no sign means ascending.
pub fn parse_order(spec: &str) -> (&str, Direction) {
    let spec = spec.trim();
    if let Some(rest) = spec.strip_prefix('-') {
        (rest.trim(), Direction::Desc)
    } else if let Some(rest) = spec.strip_prefix('+') {
        (rest.trim(), Direction::Asc)
    } else {
        (spec, Direction::Asc)
    }
}

/// A dimension bucketed by ascending split points.
///
/// `splits = [10, 100]` yields buckets 0 (`< 10`), 1 (`< 100`) and 2 (the rest).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RangeDimension {
    pub dimension: String,
    pub splits: Vec<f64>,
}

impl RangeDimension {
    pub fn new(dimension: impl Into<String>, splits: impl Into<Vec<f64>>) -> Self {
        Self {
            dimension: dimension.into(),
            splits: splits.into(),
        }
    }

    pub fn is_ascending(&self) -> bool {
        self.splits.windows(2).all(|w| w[0] < w[1])
    }
}

/// 1-based page request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pageable {
    pub page_index: i64,
    pub page_size: i64,
}

impl Pageable {
    pub fn new(page_index: i64, page_size: i64) -> Self {
        Self {
            page_index,
            page_size,
        }
    }

    /// Clamp to a valid page: index at least 1, size in `1..=max_size`.
    pub fn clamp(&self, max_size: u64) -> (u64, u64) {
        let index = self.page_index.max(1) as u64;
        let size = if self.page_size < 1 || self.page_size as u64 > max_size {
            max_size
        } else {
            self.page_size as u64
        };
        (index, size)
    }

    /// Offset and size after clamping; the offset saturates on huge indexes.
    pub fn offset_and_size(&self, max_size: u64) -> (u64, u64) {
        let (index, size) = self.clamp(max_size);
        ((index - 1).saturating_mul(size), size)
    }
}

/// One request against a cube.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Query {
    pub filter: Option<Filter>,
    pub range_dimensions: Vec<RangeDimension>,
    pub fields: CodeSet,
    pub dimensions: CodeSet,
    pub measures: CodeSet,
    /// `+code` / `-code` sort specs.
    pub orders: CodeSet,
    /// Backend hints, passed through verbatim.
    pub hints: Vec<String>,
    pub pageable: Option<Pageable>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use = "builders have no effect until used"]
    pub fn dimension(mut self, code: impl AsRef<str>) -> Self {
        self.dimensions.insert(code);
        self
    }

    #[must_use = "builders have no effect until used"]
    pub fn measure(mut self, code: impl AsRef<str>) -> Self {
        self.measures.insert(code);
        self
    }

    #[must_use = "builders have no effect until used"]
    pub fn field(mut self, code: impl AsRef<str>) -> Self {
        self.fields.insert(code);
        self
    }

    #[must_use = "builders have no effect until used"]
    pub fn order(mut self, spec: impl AsRef<str>) -> Self {
        self.orders.insert(spec);
        self
    }

    #[must_use = "builders have no effect until used"]
    pub fn hint(mut self, hint: impl Into<String>) -> Self {
        let hint = hint.into();
        if !self.hints.contains(&hint) {
            self.hints.push(hint);
        }
        self
    }

    #[must_use = "builders have no effect until used"]
    pub fn range_dimension(mut self, range: RangeDimension) -> Self {
        self.range_dimensions.push(range);
        self
    }

    #[must_use = "builders have no effect until used"]
    pub fn filter(mut self, filter: impl Into<Filter>) -> Self {
        self.filter = Some(filter.into());
        self
    }

    #[must_use = "builders have no effect until used"]
    pub fn page(mut self, page_index: i64, page_size: i64) -> Self {
        self.pageable = Some(Pageable::new(page_index, page_size));
        self
    }

    /// AND an extra filter into the existing tree.
    pub fn and_filter(&mut self, extra: impl Into<Filter>) {
        let extra = extra.into();
        self.filter = Some(match self.filter.take() {
            Some(existing) => existing.and(extra),
            None => extra,
        });
    }

    /// Copy of the request shape, independent of later edits to `self`.
    pub fn clone_basic(&self) -> Query {
        self.clone()
    }

    /// True when the backend has to group rows.
    pub fn is_grouped(&self) -> bool {
        !self.dimensions.is_empty() || !self.range_dimensions.is_empty()
    }
}
