#[path = "../support/mod.rs"]
mod support;

use std::sync::Arc;
use std::time::Duration;

use quarry::config::{
    Backend, CalculatorDefinition, Executors, Settings, SettingsError,
};
use quarry::cube::Cube;
use quarry::engine::{QueryEngine, RejectionPolicy};
use quarry::query::{Filter, Query};
use quarry::sql::Dialect;
use serde_json::json;

use support::{RecordingSearch, RecordingSql};

const CONFIG: &str = r#"
[engine]
timeout = "250ms"
max_concurrency = 4
max_pending = 16
rejection = "reject"
merge_key_separator = "|"

[sql]
dialect = "postgres"
max_page_size = 50

[search]
page_size = 500
scroll = "30s"
time_zone = "Europe/Berlin"

[cubes.mysql_index_stats]
backend = "sql"
table = "innodb_index_stats"
limit = { leaf = { name = "database_name", operator = "NE", value = "sys" } }
dimensions = [
    { code = "database_name", column = "database_name", alias = "db" },
    { code = "index_name", column = "index_name", alias = "idx" },
]

[[cubes.mysql_index_stats.measures]]
code = "stat_value"
columns = [{ column = "stat_value", alias = "statValue" }]

[[cubes.mysql_index_stats.measures]]
code = "hit_rate"
columns = [
    { column = "sum(hits)", alias = "hits", pre_aggregated = true },
    { column = "sum(requests)", alias = "requests", pre_aggregated = true },
]
calculator = { divide = { numerator = "hits", denominator = "requests", scale = 100.0 } }

[cubes.traffic]
backend = "search"
index = "metrics-*"
granularity = "1h"
dimensions = [{ code = "host", column = "host.name", alias = "host" }]
measures = [
    { code = "bytes", columns = [{ column = "network.bytes", alias = "bytes", aggregation = "max" }] },
]
"#;

#[test]
fn test_parse_full_configuration() {
    let settings = Settings::from_toml(CONFIG).unwrap();

    assert_eq!(settings.engine.timeout_duration().unwrap(), Duration::from_millis(250));
    assert_eq!(settings.engine.rejection, RejectionPolicy::Reject);
    assert_eq!(settings.sql.dialect, Dialect::Postgres);
    assert_eq!(settings.search.page_size, 500);
    assert_eq!(settings.search.terms_size, 1000);
    assert_eq!(settings.cubes.len(), 2);

    let stats = settings.cube("mysql_index_stats").unwrap();
    assert_eq!(stats.backend, Backend::Sql);
    assert_eq!(stats.measures.len(), 2);
    assert_eq!(
        stats.measures[1].calculator,
        Some(CalculatorDefinition::Divide {
            numerator: "hits".to_string(),
            denominator: "requests".to_string(),
            scale: 100.0,
            precision: 2,
        })
    );
    assert!(matches!(stats.limit, Some(Filter::Leaf(_))));
    assert_eq!(settings.cube("traffic").unwrap().backend, Backend::Search);
}

#[test]
fn test_schema_from_definition() {
    let settings = Settings::from_toml(CONFIG).unwrap();
    let schema = settings
        .cube("mysql_index_stats")
        .unwrap()
        .schema("mysql_index_stats")
        .unwrap();

    assert!(schema.get_dimension("DATABASE_NAME").is_some());
    let hit_rate = schema.get_measure("hit_rate").unwrap();
    assert_eq!(hit_rate.columns().len(), 2);
    assert!(hit_rate.columns()[0].is_pre_aggregated());
    assert!(schema.limit_filter().is_some());
}

#[tokio::test]
async fn test_registry_runs_configured_cubes() {
    let settings = Settings::from_toml(CONFIG).unwrap();
    let sql = Arc::new(RecordingSql::new(
        0,
        vec![quarry::model::Row::new()
            .with("db", "sales")
            .with("hits", 1)
            .with("requests", 3)],
    ));
    let search = Arc::new(RecordingSearch::default());
    let executors = Executors::default().sql(sql.clone()).search(search);

    let registry = settings.registry(&executors).unwrap();
    assert_eq!(registry.names(), vec!["MYSQL_INDEX_STATS", "TRAFFIC"]);

    let cube = registry.require("mysql_index_stats").unwrap();
    let rows = cube
        .query(&Query::new().dimension("database_name").measure("hit_rate"))
        .await
        .unwrap();
    assert_eq!(rows[0].value("hit_rate"), &json!(33.33));

    let calls = sql.calls();
    assert_eq!(
        calls[0].0,
        "SELECT database_name AS db, sum(hits) AS hits, sum(requests) AS requests \
         FROM innodb_index_stats WHERE database_name <> :v1 GROUP BY database_name"
    );
}

#[test]
fn test_search_cube_uses_search_settings() {
    let settings = Settings::from_toml(CONFIG).unwrap();
    let cube = settings
        .cube("traffic")
        .unwrap()
        .search_cube("traffic", &settings.search, Arc::new(RecordingSearch::default()))
        .unwrap();

    let request = cube.request(&Query::new().field("host")).unwrap();
    assert_eq!(request.path, "metrics-*/_search");
    assert_eq!(request.body["size"], json!(500));
}

#[test]
fn test_missing_executor_is_config_error() {
    let settings = Settings::from_toml(CONFIG).unwrap();
    let executors = Executors::default().sql(Arc::new(RecordingSql::default()));

    let err = settings.registry(&executors).unwrap_err();
    assert!(matches!(err, SettingsError::InvalidConfig(ref msg) if msg.contains("traffic")));
}

#[test]
fn test_backend_mismatch_is_config_error() {
    let settings = Settings::from_toml(CONFIG).unwrap();
    let err = settings
        .cube("traffic")
        .unwrap()
        .sql_cube("traffic", &settings.sql, Arc::new(RecordingSql::default()))
        .err()
        .unwrap();
    assert!(matches!(err, SettingsError::InvalidConfig(_)));
}

#[test]
fn test_duplicate_codes_are_rejected() {
    let config = r#"
[cubes.dup]
backend = "sql"
table = "t"
dimensions = [
    { code = "region", column = "region" },
    { code = "REGION", column = "region_name" },
]
"#;
    let settings = Settings::from_toml(config).unwrap();
    let err = settings.cube("dup").unwrap().schema("dup").unwrap_err();
    assert!(matches!(err, SettingsError::InvalidConfig(ref msg) if msg.contains("duplicate")));
}

#[test]
fn test_table_env_expansion() {
    std::env::set_var("QUARRY_SETTINGS_TEST_SCHEMA", "perf");
    let config = r#"
[cubes.stats]
backend = "sql"
table = "${QUARRY_SETTINGS_TEST_SCHEMA}.index_stats"
dimensions = [{ code = "db", column = "database_name" }]
"#;
    let settings = Settings::from_toml(config).unwrap();
    let cube = settings
        .cube("stats")
        .unwrap()
        .sql_cube("stats", &settings.sql, Arc::new(RecordingSql::default()))
        .unwrap();
    assert_eq!(cube.table(), "perf.index_stats");
    std::env::remove_var("QUARRY_SETTINGS_TEST_SCHEMA");
}

#[test]
fn test_missing_env_var_is_reported() {
    let config = r#"
[cubes.stats]
backend = "sql"
table = "${QUARRY_SETTINGS_TEST_UNSET}.index_stats"
"#;
    let settings = Settings::from_toml(config).unwrap();
    let err = settings
        .cube("stats")
        .unwrap()
        .sql_cube("stats", &settings.sql, Arc::new(RecordingSql::default()))
        .err()
        .unwrap();
    assert!(matches!(
        err,
        SettingsError::MissingEnvVar(ref name) if name == "QUARRY_SETTINGS_TEST_UNSET"
    ));
}

#[test]
fn test_invalid_durations_are_rejected() {
    let err = Settings::from_toml("[engine]\ntimeout = \"soon\"").unwrap_err();
    assert!(matches!(err, SettingsError::InvalidDuration(_)));

    let err = Settings::from_toml("[search]\nscroll = \"1 week\"").unwrap_err();
    assert!(matches!(err, SettingsError::InvalidDuration(_)));
}

#[test]
fn test_unknown_cube_and_missing_file() {
    let settings = Settings::default();
    assert!(matches!(settings.cube("nope"), Err(SettingsError::CubeNotFound(_))));

    let err = Settings::from_file("/definitely/not/here/quarry.toml").unwrap_err();
    assert!(matches!(err, SettingsError::FileNotFound(_)));
}

#[test]
fn test_engine_from_settings() {
    let settings = Settings::from_toml(CONFIG).unwrap();
    let engine = QueryEngine::from_settings(&settings.engine).unwrap();
    assert_eq!(engine.timeout(), Duration::from_millis(250));
}
