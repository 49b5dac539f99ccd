#[path = "../support/mod.rs"]
mod support;

use std::sync::Arc;

use quarry::config::SearchSettings;
use quarry::cube::{Cube, CubeSchema};
use quarry::model::{Aggregation, Column, Dimension, Measure};
use quarry::query::{Query, RangeDimension, SimpleFilter};
use quarry::search::{SearchCube, SCROLL_PATH};
use serde_json::json;

use support::{stats_schema, RecordingSearch};

fn stats_cube(executor: Arc<RecordingSearch>) -> SearchCube {
    SearchCube::new(stats_schema(), "index-stats-*", executor)
}

fn traffic_schema() -> CubeSchema {
    CubeSchema::new("traffic")
        .dimension(Dimension::new("day", Column::aliased("@timestamp", "day")))
        .dimension(Dimension::new("host", Column::aliased("host.name", "host")))
        .measure(Measure::new("bytes", Column::aliased("network.bytes", "bytes")))
        .measure(Measure::new(
            "bytes_delta",
            Column::aliased("bytes", "bytesDelta").aggregation(Aggregation::Derivative),
        ))
        .granularity("1d")
}

#[tokio::test]
async fn test_grouped_query_decodes_buckets() {
    let response = json!({
        "took": 3,
        "aggregations": {
            "db": {
                "buckets": [
                    {"key": "mysql", "doc_count": 4, "statValue": {"value": 7.0}},
                    {"key": "sales", "doc_count": 9, "statValue": {"value": 21.0}}
                ]
            }
        }
    });
    let executor = Arc::new(RecordingSearch::new([response]));
    let cube = stats_cube(executor.clone());
    let query = Query::new()
        .dimension("database_name")
        .measure("stat_value")
        .filter(SimpleFilter::ne("index_name", "PRIMARY"))
        .order("-stat_value");

    let rows = cube.query(&query).await.unwrap();
    assert_eq!(
        serde_json::to_value(&rows).unwrap(),
        json!([
            {"DATABASE_NAME": "sales", "STAT_VALUE": 21.0},
            {"DATABASE_NAME": "mysql", "STAT_VALUE": 7.0}
        ])
    );

    let calls = executor.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].0, "index-stats-*/_search");
    assert_eq!(
        calls[0].1,
        json!({
            "size": 0,
            "query": {"bool": {"must_not": [{"term": {"index_name": "PRIMARY"}}]}},
            "aggs": {
                "db": {
                    "terms": {"field": "database_name", "size": 1000, "order": {"_count": "desc"}},
                    "aggs": {"statValue": {"sum": {"field": "stat_value"}}}
                }
            }
        })
    );
}

#[tokio::test]
async fn test_grouped_query_without_measures_counts_documents() {
    let response = json!({
        "aggregations": {
            "db": {"buckets": [
                {"key": "mysql", "doc_count": 4, "idx": {"buckets": [
                    {"key": "PRIMARY", "doc_count": 3},
                    {"key": "by_name", "doc_count": 1}
                ]}}
            ]}
        }
    });
    let executor = Arc::new(RecordingSearch::new([response]));
    let cube = stats_cube(executor);
    let query = Query::new().dimension("database_name").dimension("index_name");

    let rows = cube.raw_query(&query).await.unwrap();
    assert_eq!(
        serde_json::to_value(&rows).unwrap(),
        json!([
            {"DB": "mysql", "IDX": "PRIMARY", "COUNT": 3},
            {"DB": "mysql", "IDX": "by_name", "COUNT": 1}
        ])
    );
}

#[tokio::test]
async fn test_flat_query_scrolls_and_renames_fields() {
    let pages = [
        json!({"_scroll_id": "c1", "hits": {"hits": [
            {"_score": 1.0, "_source": {"database_name": "mysql", "stat_value": 3}}
        ]}}),
        json!({"_scroll_id": "c1", "hits": {"hits": [
            {"_score": 1.0, "_source": {"database_name": "sales", "stat_value": 8}}
        ]}}),
        json!({"_scroll_id": "c1", "hits": {"hits": []}}),
    ];
    let executor = Arc::new(RecordingSearch::new(pages));
    let cube = stats_cube(executor.clone());
    let query = Query::new()
        .field("database_name")
        .measure("stat_value")
        .order("-stat_value");

    let rows = cube.query(&query).await.unwrap();
    assert_eq!(
        serde_json::to_value(&rows).unwrap(),
        json!([
            {"STAT_VALUE": 8.0, "DATABASE_NAME": "sales"},
            {"STAT_VALUE": 3.0, "DATABASE_NAME": "mysql"}
        ])
    );

    let calls = executor.calls();
    assert_eq!(calls.len(), 3);
    assert_eq!(calls[0].0, "index-stats-*/_search?scroll=1m");
    assert_eq!(
        calls[0].1,
        json!({
            "size": 2000,
            "query": {"match_all": {}},
            "_source": {"includes": ["database_name", "stat_value"]},
            "sort": [{"stat_value": {"order": "desc"}}]
        })
    );
    assert_eq!(calls[1].0, SCROLL_PATH);
    assert_eq!(calls[1].1, json!({"scroll": "1m", "scroll_id": "c1"}));
}

#[test]
fn test_flat_query_without_fields_returns_whole_documents() {
    let cube = stats_cube(Arc::new(RecordingSearch::default()));
    let request = cube.request(&Query::new().measure("stat_value")).unwrap();

    assert!(request.scroll);
    assert!(request.body.get("_source").is_none());
}

#[test]
fn test_time_dimension_with_derivative() {
    let cube = SearchCube::new(traffic_schema(), "metrics-*", Arc::new(RecordingSearch::default()))
        .settings(SearchSettings {
            time_zone: "Europe/Berlin".to_string(),
            ..SearchSettings::default()
        });
    let query = Query::new()
        .dimension("day")
        .dimension("host")
        .measure("bytes_delta");

    let request = cube.request(&query).unwrap();
    assert!(!request.scroll);
    assert_eq!(
        request.body["aggs"],
        json!({
            "day": {
                "date_histogram": {
                    "field": "@timestamp",
                    "fixed_interval": "1d",
                    "time_zone": "Europe/Berlin",
                    "min_doc_count": 0
                },
                "aggs": {
                    "host": {
                        "terms": {"field": "host.name", "size": 1000, "order": {"_count": "desc"}},
                        "aggs": {
                            "bytes": {"sum": {"field": "network.bytes"}},
                            "bytesDelta": {"derivative": {"buckets_path": "bytes"}}
                        }
                    }
                }
            }
        })
    );
}

#[tokio::test]
async fn test_range_dimension_buckets_map_to_indexes() {
    let response = json!({
        "aggregations": {
            "idx": {"buckets": [
                {"key": "0", "doc_count": 2, "statValue": {"value": 1.0}},
                {"key": "1", "doc_count": 0, "statValue": {"value": null}},
                {"key": "2", "doc_count": 5, "statValue": {"value": 40.0}}
            ]}
        }
    });
    let executor = Arc::new(RecordingSearch::new([response]));
    let cube = stats_cube(executor.clone());
    let query = Query::new()
        .range_dimension(RangeDimension::new("index_name", vec![10.0, 20.0]))
        .measure("stat_value");

    let rows = cube.query(&query).await.unwrap();
    let values: Vec<_> = rows
        .iter()
        .map(|r| (r.value("index_name").clone(), r.value("stat_value").clone()))
        .collect();
    assert_eq!(
        values,
        vec![
            (json!("0"), json!(1.0)),
            (json!("1"), json!(0.0)),
            (json!("2"), json!(40.0)),
        ]
    );

    let body = &executor.calls()[0].1;
    assert_eq!(
        body["aggs"]["idx"]["range"]["ranges"],
        json!([
            {"key": "0", "to": 10.0},
            {"key": "1", "from": 10.0, "to": 20.0},
            {"key": "2", "from": 20.0}
        ])
    );
}

#[tokio::test]
async fn test_backend_error_surfaces() {
    struct Down;

    #[async_trait::async_trait]
    impl quarry::search::SearchExecutor for Down {
        async fn execute(
            &self,
            _method: &str,
            _path: &str,
            _body: serde_json::Value,
        ) -> Result<serde_json::Value, quarry::error::BoxError> {
            Err("cluster unavailable".into())
        }
    }

    let cube = SearchCube::new(stats_schema(), "index-stats-*", Arc::new(Down));
    let err = cube
        .query(&Query::new().dimension("database_name"))
        .await
        .unwrap_err();
    assert!(err.is_backend());
}
