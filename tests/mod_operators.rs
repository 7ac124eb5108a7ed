use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use docsearch::{Callable, FaultKind, OperatorConfig, OperatorKind, Registry, Search, SearchError, Value, ValueType};
use serde_json::json;

fn check(search: &Search, d: serde_json::Value) -> bool {
    search.matches(&mut Value::from(d)).unwrap()
}

fn query(q: serde_json::Value) -> Search {
    Search::builder().match_query(q).build().unwrap()
}

#[test]
fn registry_exposes_kinds_and_defaults() {
    let registry = Registry::with_builtins("$").unwrap();
    assert_eq!(registry.len(), 34);
    for name in ["eq", "regex", "comp"] {
        assert_eq!(registry.get(name).unwrap().kind(), OperatorKind::LowLevel);
    }
    assert_eq!(registry.get("not_any").unwrap().kind(), OperatorKind::HighLevel);
    assert_eq!(registry.get("countlte").unwrap().kind(), OperatorKind::Array);
    assert_eq!(registry.get("where").unwrap().default_return(), &Value::List(vec![]));
    assert_eq!(registry.get("any").unwrap().default_return(), &Value::Bool(false));
}

#[test]
fn comparisons_on_mismatched_types_are_false_by_default() {
    let search = query(json!({"a": {"$gt": 1}}));
    assert!(!check(&search, json!({"a": "text"})));
    assert!(!check(&search, json!({"b": 1})));
}

#[test]
fn clearing_the_mapping_surfaces_type_faults() {
    let search = Search::builder()
        .match_query(json!({"a": {"$lt": 1}}))
        .configure("lt", OperatorConfig::default().clear_expected_faults())
        .build()
        .unwrap();
    let err = search.matches(&mut Value::from(json!({"a": "text"}))).unwrap_err();
    assert_eq!(err.as_fault().map(|f| f.kind), Some(FaultKind::Type));
}

#[test]
fn recovery_uses_the_most_specific_mapping() {
    let search = Search::builder()
        .match_query(json!({"a": {"$gt": 1}}))
        .configure("gt", OperatorConfig::default().expect(FaultKind::Error, false).expect(FaultKind::Type, true))
        .build()
        .unwrap();
    assert!(check(&search, json!({"a": "text"})));
}

#[test]
fn type_guards_short_circuit_before_the_call() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    let spy = Callable::predicate(move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
        true
    });
    let q: Value = [(
        "a".to_string(),
        [("$expr".to_string(), Value::from(spy))].into_iter().collect::<Value>(),
    )]
    .into_iter()
    .collect();
    let search = Search::builder()
        .match_query(q)
        .configure("expr", OperatorConfig::default().allowed_types(vec![ValueType::Int]).ignored_types(vec![ValueType::Null]))
        .build()
        .unwrap();
    assert!(!check(&search, json!({"a": "s"})));
    assert!(!check(&search, json!({"a": null})));
    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert!(check(&search, json!({"a": 7})));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[test]
fn defaults_can_be_overridden_with_the_declared_type() {
    let search = Search::builder()
        .match_query(json!({"a": {"$any": 1}}))
        .configure("any", OperatorConfig::default().default_value(true))
        .build()
        .unwrap();
    assert!(check(&search, json!({"a": "not a sequence"})));

    let err = Search::builder().configure("index", OperatorConfig::default().default_value(false)).build().unwrap_err();
    assert!(matches!(err, SearchError::DefaultTypeMismatch { .. }));
}

#[test]
fn regex_is_an_unanchored_search() {
    let search = query(json!({"name": {"$regex": "da"}}));
    assert!(check(&search, json!({"name": "ada"})));
    assert!(!check(&search, json!({"name": "bob"})));
    assert!(Search::builder().match_query(json!({"name": {"$regex": "("}})).build().is_err());
}

#[test]
fn inst_checks_runtime_types() {
    let q: Value = [(
        "a".to_string(),
        [("$inst".to_string(), Value::List(vec![ValueType::Int.into(), ValueType::Float.into()]))]
            .into_iter()
            .collect::<Value>(),
    )]
    .into_iter()
    .collect();
    let search = Search::builder().match_query(q).build().unwrap();
    assert!(check(&search, json!({"a": 1})));
    assert!(check(&search, json!({"a": 1.5})));
    assert!(!check(&search, json!({"a": "1"})));
}

#[test]
fn membership_operators() {
    assert!(check(&query(json!({"a": {"$in": [1, 2]}})), json!({"a": 2})));
    assert!(check(&query(json!({"a": {"$nin": [1, 2]}})), json!({"a": 3})));
    assert!(check(&query(json!({"a": {"$cont": "ell"}})), json!({"a": "hello"})));
    assert!(check(&query(json!({"a": {"$ncont": 9}})), json!({"a": [1, 2]})));
    assert!(check(&query(json!({"a": {"$cont": "k"}})), json!({"a": {"k": 1}})));
}

#[test]
fn not_and_not_any() {
    let d = json!({"a": 1, "b": 2});
    assert!(check(&query(json!({"$not": [{"a": 1}, {"b": 1}]})), d.clone()));
    assert!(!check(&query(json!({"$not": [{"a": 1}, {"b": 2}]})), d.clone()));
    assert!(!check(&query(json!({"$not_any": [{"a": 2}, {"b": 2}]})), d));
}

#[test]
fn count_family_short_circuits() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    let spy = Callable::predicate(move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
        true
    });
    let sub: Value = [("$expr".to_string(), Value::from(spy))].into_iter().collect();
    let threshold: Value = [("1".to_string(), sub)].into_iter().collect();
    let q: Value =
        [("xs".to_string(), [("$countlt".to_string(), threshold)].into_iter().collect::<Value>())].into_iter().collect();
    let search = Search::builder().match_query(q).build().unwrap();
    assert!(!check(&search, json!({"xs": [1, 2, 3, 4]})));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[test]
fn selectors_in_match_queries() {
    let d = json!({"xs": [3, 8, 1, 9]});
    assert!(check(&query(json!({"xs": {"$index": [1, 8]}})), d.clone()));
    assert!(check(&query(json!({"xs": {"$index": [[0, -1], [3, 9]]}})), d.clone()));
    assert!(check(&query(json!({"xs": {"$slice": ["-2:", {"$all": {"$lt": 10}}]}})), d.clone()));
    assert!(check(&query(json!({"xs": {"$where": [{"$gt": 2}, {"$countgte": {"3": {"$gte": 3}}}]}})), d.clone()));
    assert!(!check(&query(json!({"xs": {"$where": [{"$gt": 100}, {"$any": {"$gt": 0}}]}})), d));
}

#[test]
fn malformed_structural_arguments_fail_at_build() {
    for bad in [
        json!({"$and": []}),
        json!({"$or": 1}),
        json!({"$match": {"x": [{"a": 1}]}}),
        json!({"$matchgt": {"1": []}}),
        json!({"a": {"$count": {"1": 1, "2": 2}}}),
        json!({"a": {"$slice": ["1:2:0", 1]}}),
        json!({"a": {"$index": [0]}}),
        json!({"a": {"$comp": ["b"]}}),
        json!({"a": {"$expr": 1}}),
        json!({"a": {"$inst": "int"}}),
    ] {
        assert!(Search::builder().match_query(bad.clone()).build().is_err(), "accepted {bad}");
    }
}
