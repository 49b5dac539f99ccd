use quarry::query::{Connector, Filter, FilterGroup, Operator, Pageable, Query, SimpleFilter};
use serde_json::json;

#[test]
fn test_filter_tree_from_json() {
    let filter: Filter = serde_json::from_value(json!({
        "group": {
            "connector": "OR",
            "filters": [
                {"leaf": {"name": "database_name", "operator": "EQ", "value": "sales"}},
                {"leaf": {"name": "index_name", "operator": "NOT_IN", "value": ["a", "b"]}},
                {"group": {"filters": []}}
            ]
        }
    }))
    .unwrap();

    let Filter::Group(group) = &filter else {
        panic!("expected a group");
    };
    assert_eq!(group.connector, Connector::Or);
    assert_eq!(group.filters.len(), 3);

    let leaves = filter.leaves();
    assert_eq!(leaves.len(), 2);
    assert_eq!(leaves[1].operator, Operator::NotIn);
    assert_eq!(leaves[1].list_values().map(|v| v.len()), Some(2));

    // Nested group without a connector defaults to AND
    let Filter::Group(inner) = &group.filters[2] else {
        panic!("expected a nested group");
    };
    assert_eq!(inner.connector, Connector::And);
    assert!(inner.is_empty());
}

#[test]
fn test_exists_leaf_needs_no_value() {
    let filter: Filter =
        serde_json::from_value(json!({"leaf": {"name": "db", "operator": "EXISTS"}})).unwrap();
    assert_eq!(filter, Filter::Leaf(SimpleFilter::exists("db")));
}

#[test]
fn test_and_with_same_connector_appends() {
    let group = FilterGroup::and()
        .with(SimpleFilter::eq("a", 1))
        .and_with(SimpleFilter::eq("b", 2));
    assert_eq!(group.connector, Connector::And);
    assert_eq!(group.filters.len(), 2);
}

#[test]
fn test_or_with_other_connector_wraps() {
    let group = FilterGroup::and()
        .with(SimpleFilter::eq("a", 1))
        .with(SimpleFilter::eq("b", 2))
        .or_with(SimpleFilter::eq("c", 3));

    assert_eq!(group.connector, Connector::Or);
    assert_eq!(group.filters.len(), 2);
    assert!(matches!(
        &group.filters[0],
        Filter::Group(g) if g.connector == Connector::And && g.filters.len() == 2
    ));
    assert_eq!(group.filters[1], Filter::Leaf(SimpleFilter::eq("c", 3)));
}

#[test]
fn test_query_builders_are_idempotent() {
    let query = Query::new()
        .dimension("database_name")
        .dimension(" DATABASE_NAME ")
        .measure("stat_value")
        .measure("Stat_Value")
        .order("-stat_value")
        .order("-STAT_VALUE")
        .hint("USE INDEX (idx)")
        .hint("USE INDEX (idx)");

    assert_eq!(query.dimensions.iter().collect::<Vec<_>>(), vec!["DATABASE_NAME"]);
    assert_eq!(query.measures.len(), 1);
    assert_eq!(query.orders.len(), 1);
    assert_eq!(query.hints.len(), 1);
}

#[test]
fn test_clone_basic_is_independent() {
    let base = Query::new().dimension("a").measure("m");
    let mut derived = base.clone_basic();
    derived.dimensions.insert("b");
    derived.and_filter(SimpleFilter::eq("a", "x"));

    assert_eq!(base.dimensions.len(), 1);
    assert!(base.filter.is_none());
    assert_eq!(derived.dimensions.len(), 2);
}

#[test]
fn test_and_filter_wraps_existing_tree() {
    let mut query = Query::new().filter(SimpleFilter::eq("a", 1));
    query.and_filter(SimpleFilter::eq("b", 2));

    let Some(Filter::Group(group)) = &query.filter else {
        panic!("expected a group");
    };
    assert_eq!(group.connector, Connector::And);
    assert_eq!(group.filters.len(), 2);
}

#[test]
fn test_query_from_json_defaults() {
    let query: Query = serde_json::from_value(json!({
        "dimensions": ["database_name"],
        "measures": ["stat_value"],
        "pageable": {"page_index": 2, "page_size": 10}
    }))
    .unwrap();

    assert!(query.filter.is_none());
    assert!(query.fields.is_empty());
    assert!(query.is_grouped());
    assert_eq!(query.pageable, Some(Pageable::new(2, 10)));
}

#[test]
fn test_pageable_clamps_to_max() {
    assert_eq!(Pageable::new(2, 10).offset_and_size(100), (10, 10));
    assert_eq!(Pageable::new(0, 10).offset_and_size(100), (0, 10));
    assert_eq!(Pageable::new(3, 500).offset_and_size(100), (200, 100));
    assert_eq!(Pageable::new(1, -1).offset_and_size(100), (0, 100));
}
