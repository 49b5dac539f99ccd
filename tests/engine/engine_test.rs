#[path = "../support/mod.rs"]
mod support;

use std::sync::Arc;
use std::time::Duration;

use quarry::cube::Cube;
use quarry::engine::{QueryEngine, RejectionPolicy};
use quarry::error::CubeError;
use quarry::model::Row;
use quarry::query::Query;
use serde_json::{json, Value};

use support::ScriptedCube;

fn stats_query(hint: &str) -> Query {
    Query::new()
        .dimension("database_name")
        .measure("stat_value")
        .order("database_name")
        .hint(hint)
}

fn pairs(rows: &[Row]) -> Vec<(Value, Value)> {
    rows.iter()
        .map(|r| (r.value("database_name").clone(), r.value("stat_value").clone()))
        .collect()
}

fn engine(timeout: Duration) -> QueryEngine {
    QueryEngine::new(8, 64, RejectionPolicy::Block, timeout)
}

#[tokio::test]
async fn test_results_follow_submission_order() {
    let cube: Arc<dyn Cube> = Arc::new(ScriptedCube::new());
    let queries = vec![
        stats_query("delay_ms=60").hint("tag=q1"),
        stats_query("delay_ms=1").hint("tag=q2"),
        stats_query("delay_ms=30").hint("tag=q3"),
    ];

    let results = engine(Duration::from_secs(5)).multi_query(cube, queries).await.unwrap();
    let tags: Vec<_> = results
        .iter()
        .map(|rows| rows[0].value("database_name").clone())
        .collect();
    assert_eq!(tags, vec![json!("q1"), json!("q2"), json!("q3")]);
}

#[tokio::test]
async fn test_merge_sums_shared_keys_and_appends_new_ones() {
    let cube: Arc<dyn Cube> = Arc::new(ScriptedCube::new());
    let engine = engine(Duration::from_secs(5));

    let forward = engine
        .multi_query_and_merge(
            Arc::clone(&cube),
            vec![stats_query("rows=a:1"), stats_query("rows=a:2,b:3")],
        )
        .await
        .unwrap();
    let backward = engine
        .multi_query_and_merge(
            Arc::clone(&cube),
            vec![stats_query("rows=a:2,b:3"), stats_query("rows=a:1")],
        )
        .await
        .unwrap();

    let expected = vec![(json!("a"), json!(3.0)), (json!("b"), json!(3.0))];
    assert_eq!(pairs(&forward), expected);
    assert_eq!(pairs(&backward), expected);
}

#[tokio::test]
async fn test_raw_merge_keeps_aliases_and_integer_sums() {
    let cube: Arc<dyn Cube> = Arc::new(ScriptedCube::new());
    let merged = engine(Duration::from_secs(5))
        .multi_raw_query_and_merge(
            cube,
            vec![
                stats_query("rows=a:1,b:1"),
                stats_query("rows=b:4"),
                stats_query("rows=c:2"),
            ],
        )
        .await
        .unwrap();

    assert_eq!(
        serde_json::to_value(&merged).unwrap(),
        json!([
            {"DB": "a", "STATVALUE": 1},
            {"DB": "b", "STATVALUE": 5},
            {"DB": "c", "STATVALUE": 2}
        ])
    );
}

#[tokio::test]
async fn test_breakdown_lists_merged_then_each_query() {
    let cube: Arc<dyn Cube> = Arc::new(ScriptedCube::new());
    let results = engine(Duration::from_secs(5))
        .multi_query_and_merge_with_breakdown(
            cube,
            vec![
                stats_query("rows=a:1"),
                stats_query("rows=b:2"),
                stats_query("empty"),
            ],
        )
        .await
        .unwrap();

    assert_eq!(results.len(), 4);
    assert_eq!(
        pairs(&results[0]),
        vec![(json!("a"), json!(1.0)), (json!("b"), json!(2.0))]
    );
    assert_eq!(pairs(&results[1]), vec![(json!("a"), json!(1.0))]);
    assert_eq!(pairs(&results[2]), vec![(json!("b"), json!(2.0))]);
    assert_eq!(results[3], vec![Row::new()]);
}

#[tokio::test]
async fn test_grouped_query_merges_within_each_group() {
    let cube: Arc<dyn Cube> = Arc::new(ScriptedCube::new());
    let results = engine(Duration::from_secs(5))
        .grouped_query(
            cube,
            vec![
                vec![stats_query("rows=a:1"), stats_query("rows=a:2")],
                vec![stats_query("rows=b:5")],
                vec![],
            ],
        )
        .await
        .unwrap();

    assert_eq!(results.len(), 3);
    assert_eq!(pairs(&results[0]), vec![(json!("a"), json!(3.0))]);
    assert_eq!(pairs(&results[1]), vec![(json!("b"), json!(5.0))]);
    assert!(results[2].is_empty());
}

#[tokio::test]
async fn test_grouped_query_and_merge_merges_across_groups() {
    let cube: Arc<dyn Cube> = Arc::new(ScriptedCube::new());
    let rows = engine(Duration::from_secs(5))
        .grouped_query_and_merge(
            cube,
            vec![
                vec![stats_query("rows=a:1")],
                vec![stats_query("rows=a:2,b:1"), stats_query("rows=b:1")],
            ],
        )
        .await
        .unwrap();

    assert_eq!(
        pairs(&rows),
        vec![(json!("a"), json!(3.0)), (json!("b"), json!(2.0))]
    );
}

#[tokio::test]
async fn test_multi_cube_pairs_results_with_names() {
    let first: Arc<dyn Cube> = Arc::new(ScriptedCube::new());
    let second: Arc<dyn Cube> = Arc::new(ScriptedCube::new());
    let results = engine(Duration::from_secs(5))
        .multi_cube_query(vec![
            (first, stats_query("delay_ms=20").hint("tag=x")),
            (second, stats_query("tag=y")),
        ])
        .await
        .unwrap();

    assert_eq!(results.len(), 2);
    assert_eq!(results[0].0, "mysql_index_stats");
    assert_eq!(pairs(&results[0].1), vec![(json!("x"), json!(1.0))]);
    assert_eq!(pairs(&results[1].1), vec![(json!("y"), json!(1.0))]);
}

#[tokio::test]
async fn test_timeout_fails_batch_and_cancels_siblings() {
    let scripted = Arc::new(ScriptedCube::new());
    let cube: Arc<dyn Cube> = scripted.clone();
    let queries = vec![
        stats_query("delay_ms=5").hint("tag=fast"),
        stats_query("delay_ms=2000"),
        stats_query("delay_ms=2000"),
    ];

    let err = engine(Duration::from_millis(100))
        .multi_query(cube, queries)
        .await
        .unwrap_err();
    match err {
        CubeError::Timeout { index, timeout } => {
            assert_eq!(index, 1);
            assert_eq!(timeout, Duration::from_millis(100));
        }
        other => panic!("unexpected error: {other}"),
    }

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(scripted.finished(), 1);
}

#[tokio::test]
async fn test_member_failure_fails_batch() {
    let cube: Arc<dyn Cube> = Arc::new(ScriptedCube::new());
    let err = engine(Duration::from_secs(5))
        .multi_query(cube, vec![stats_query("tag=ok"), stats_query("fail")])
        .await
        .unwrap_err();
    assert!(err.is_backend());
}

#[tokio::test]
async fn test_invalid_member_fails_batch() {
    let cube: Arc<dyn Cube> = Arc::new(ScriptedCube::new());
    let err = engine(Duration::from_secs(5))
        .multi_query(cube, vec![stats_query("tag=ok"), Query::new().measure("n_rows")])
        .await
        .unwrap_err();
    assert!(err.is_validation());
}

#[tokio::test]
async fn test_full_queue_rejects_when_configured() {
    let cube: Arc<dyn Cube> = Arc::new(ScriptedCube::new());
    let engine = QueryEngine::new(1, 1, RejectionPolicy::Reject, Duration::from_secs(5));
    let queries = vec![stats_query("delay_ms=200"), stats_query("delay_ms=200")];

    let err = engine.multi_query(cube, queries).await.unwrap_err();
    assert!(matches!(err, CubeError::Rejected { pending: 1 }));
}

#[tokio::test]
async fn test_full_queue_blocks_by_default() {
    let cube: Arc<dyn Cube> = Arc::new(ScriptedCube::new());
    let engine = QueryEngine::new(1, 1, RejectionPolicy::Block, Duration::from_secs(5));
    let queries = vec![
        stats_query("delay_ms=10").hint("tag=a"),
        stats_query("delay_ms=10").hint("tag=b"),
    ];

    let results = engine.multi_query(cube, queries).await.unwrap();
    assert_eq!(results.len(), 2);
}

#[tokio::test]
async fn test_merge_of_empty_batch_is_invalid() {
    let cube: Arc<dyn Cube> = Arc::new(ScriptedCube::new());
    let err = QueryEngine::default()
        .multi_query_and_merge(cube, Vec::new())
        .await
        .unwrap_err();
    assert!(err.is_validation());
}
