//! Shared fixtures: recording executors and a scripted cube.
#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use quarry::cube::{Cube, CubeSchema};
use quarry::error::{BoxError, CubeError, CubeResult};
use quarry::model::{Column, Dimension, Measure, Row};
use quarry::query::Query;
use quarry::search::SearchExecutor;
use quarry::sql::{SqlExecutor, SqlParams};
use serde_json::Value;

/// The index-statistics cube used across tests.
pub fn stats_schema() -> CubeSchema {
    CubeSchema::new("mysql_index_stats")
        .dimension(Dimension::new("database_name", Column::aliased("database_name", "db")))
        .dimension(Dimension::new("index_name", Column::aliased("index_name", "idx")))
        .measure(Measure::new(
            "stat_value",
            Column::aliased("stat_value", "statValue"),
        ))
}

/// SQL executor returning canned rows and recording every statement.
#[derive(Default)]
pub struct RecordingSql {
    pub total: u64,
    pub rows: Vec<Row>,
    calls: Mutex<Vec<(String, Vec<(String, Value)>)>>,
}

impl RecordingSql {
    pub fn new(total: u64, rows: Vec<Row>) -> Self {
        Self {
            total,
            rows,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Executed statements with their bound parameters.
    pub fn calls(&self) -> Vec<(String, Vec<(String, Value)>)> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, sql: &str, params: &SqlParams) {
        let params = params
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect();
        self.calls.lock().unwrap().push((sql.to_string(), params));
    }
}

#[async_trait]
impl SqlExecutor for RecordingSql {
    async fn count(&self, sql: &str, params: &SqlParams) -> Result<u64, BoxError> {
        self.record(sql, params);
        Ok(self.total)
    }

    async fn query(&self, sql: &str, params: &SqlParams) -> Result<Vec<Row>, BoxError> {
        self.record(sql, params);
        Ok(self.rows.clone())
    }
}

/// SQL executor that always fails.
pub struct BrokenSql;

#[async_trait]
impl SqlExecutor for BrokenSql {
    async fn count(&self, _sql: &str, _params: &SqlParams) -> Result<u64, BoxError> {
        Err("connection refused".into())
    }

    async fn query(&self, _sql: &str, _params: &SqlParams) -> Result<Vec<Row>, BoxError> {
        Err("connection refused".into())
    }
}

/// Search executor replaying queued responses and recording requests.
#[derive(Default)]
pub struct RecordingSearch {
    responses: Mutex<VecDeque<Value>>,
    calls: Mutex<Vec<(String, Value)>>,
}

impl RecordingSearch {
    pub fn new(responses: impl IntoIterator<Item = Value>) -> Self {
        Self {
            responses: Mutex::new(responses.into_iter().collect()),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Requested paths with their bodies.
    pub fn calls(&self) -> Vec<(String, Value)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl SearchExecutor for RecordingSearch {
    async fn execute(&self, _method: &str, path: &str, body: Value) -> Result<Value, BoxError> {
        self.calls.lock().unwrap().push((path.to_string(), body));
        Ok(self
            .responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Value::Null))
    }
}

/// Cube scripted through query hints:
///
/// - `delay_ms=N` sleeps before answering
/// - `tag=X` answers one row `{db: X, statValue: 1}`
/// - `rows=a:1,b:2` answers one row per `db:value` pair
/// - `fail` answers a backend error
pub struct ScriptedCube {
    schema: CubeSchema,
    pub finished: AtomicUsize,
}

impl ScriptedCube {
    pub fn new() -> Self {
        Self {
            schema: stats_schema(),
            finished: AtomicUsize::new(0),
        }
    }

    pub fn finished(&self) -> usize {
        self.finished.load(Ordering::SeqCst)
    }
}

fn hint<'q>(query: &'q Query, key: &str) -> Option<&'q str> {
    query
        .hints
        .iter()
        .find_map(|h| h.strip_prefix(key).and_then(|rest| rest.strip_prefix('=')))
}

#[async_trait]
impl Cube for ScriptedCube {
    fn schema(&self) -> &CubeSchema {
        &self.schema
    }

    async fn fetch(&self, query: &Query) -> CubeResult<Vec<Row>> {
        if let Some(ms) = hint(query, "delay_ms").and_then(|v| v.parse().ok()) {
            tokio::time::sleep(Duration::from_millis(ms)).await;
        }
        if query.hints.iter().any(|h| h == "fail") {
            return Err(CubeError::backend(self.schema.name(), "scripted failure".into()));
        }
        let mut rows = Vec::new();
        if let Some(tag) = hint(query, "tag") {
            rows.push(Row::new().with("db", tag).with("statValue", 1));
        }
        if let Some(spec) = hint(query, "rows") {
            for pair in spec.split(',') {
                if let Some((db, value)) = pair.split_once(':') {
                    let value: i64 = value.parse().unwrap_or(0);
                    rows.push(Row::new().with("db", db).with("statValue", value));
                }
            }
        }
        self.finished.fetch_add(1, Ordering::SeqCst);
        Ok(rows)
    }
}
