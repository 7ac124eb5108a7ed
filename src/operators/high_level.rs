//! Boolean combinators and the `match*` threshold family. Both evaluate a
//! list of sub-queries against the document at the current level.

use crate::document::Value;
use crate::errors::{SearchError, SearchResult};
use crate::query::{Compiler, Query};

use super::threshold::{self, Comparison};
use super::{Argument, Compiled, Context, Operator, OperatorKind, unexpected_argument};

#[derive(Debug, Clone, Copy)]
enum Logic {
    And,
    Or,
    Not,
    NotAny,
}

pub struct LogicOp {
    name: &'static str,
    logic: Logic,
}

fn compile_queries(op: &str, list: &Value, compiler: &Compiler<'_>) -> SearchResult<Vec<Query>> {
    let Value::List(items) = list else {
        return Err(SearchError::invalid(op, format!("expected a list of sub-queries, got {}", list.value_type())));
    };
    if items.is_empty() {
        return Err(SearchError::invalid(op, "sub-query list must not be empty"));
    }
    items.iter().map(|q| compiler.compile_sub(q)).collect()
}

impl Operator for LogicOp {
    fn name(&self) -> &str {
        self.name
    }

    fn kind(&self) -> OperatorKind {
        OperatorKind::HighLevel
    }

    fn default_return(&self) -> Value {
        Value::Bool(false)
    }

    fn compile(&self, argument: &Value, compiler: &Compiler<'_>) -> SearchResult<Compiled> {
        Ok(Compiled::new(Argument::Queries(compile_queries(self.name, argument, compiler)?)))
    }

    fn call(&self, value: &Value, argument: &Argument, ctx: &Context<'_>) -> SearchResult<Value> {
        let Argument::Queries(queries) = argument else {
            return Err(unexpected_argument(self.name, argument));
        };
        if queries.is_empty() {
            return Ok(Value::Bool(false));
        }
        let mut results = queries.iter().map(|q| ctx.matches(q, value));
        let out = match self.logic {
            Logic::And => all(&mut results)?,
            Logic::Or => any(&mut results)?,
            Logic::Not => !all(&mut results)?,
            Logic::NotAny => !any(&mut results)?,
        };
        Ok(Value::Bool(out))
    }
}

/// Short-circuiting `all` over fallible results.
pub(crate) fn all(results: impl Iterator<Item = SearchResult<bool>>) -> SearchResult<bool> {
    for r in results {
        if !r? {
            return Ok(false);
        }
    }
    Ok(true)
}

/// Short-circuiting `any` over fallible results.
pub(crate) fn any(results: impl Iterator<Item = SearchResult<bool>>) -> SearchResult<bool> {
    for r in results {
        if r? {
            return Ok(true);
        }
    }
    Ok(false)
}

/// `{threshold: [sub-query, ...]}`: counts sub-queries that match.
pub struct MatchOp {
    name: &'static str,
    cmp: Comparison,
}

impl Operator for MatchOp {
    fn name(&self) -> &str {
        self.name
    }

    fn kind(&self) -> OperatorKind {
        OperatorKind::HighLevel
    }

    fn default_return(&self) -> Value {
        Value::Bool(false)
    }

    fn compile(&self, argument: &Value, compiler: &Compiler<'_>) -> SearchResult<Compiled> {
        let (threshold, rest) = threshold::split_threshold(self.name, argument)?;
        let queries = match rest {
            Value::List(_) => compile_queries(self.name, rest, compiler)?,
            // a bare sub-query counts as a list of one
            single => vec![compiler.compile_sub(single)?],
        };
        Ok(Compiled::new(Argument::Threshold { threshold, queries }))
    }

    fn call(&self, value: &Value, argument: &Argument, ctx: &Context<'_>) -> SearchResult<Value> {
        let Argument::Threshold { threshold, queries } = argument else {
            return Err(unexpected_argument(self.name, argument));
        };
        let results = queries.iter().map(|q| ctx.matches(q, value));
        Ok(Value::Bool(threshold::count_until(self.cmp, *threshold, results)?))
    }
}

pub(crate) fn operators() -> Vec<Box<dyn Operator>> {
    vec![
        Box::new(LogicOp { name: "and", logic: Logic::And }),
        Box::new(LogicOp { name: "or", logic: Logic::Or }),
        Box::new(LogicOp { name: "not", logic: Logic::Not }),
        Box::new(LogicOp { name: "not_any", logic: Logic::NotAny }),
        Box::new(MatchOp { name: "match", cmp: Comparison::Eq }),
        Box::new(MatchOp { name: "matchgt", cmp: Comparison::Gt }),
        Box::new(MatchOp { name: "matchgte", cmp: Comparison::Gte }),
        Box::new(MatchOp { name: "matchlt", cmp: Comparison::Lt }),
        Box::new(MatchOp { name: "matchlte", cmp: Comparison::Lte }),
    ]
}

#[cfg(test)]
mod tests {
    use crate::document::{Callable, Value};
    use crate::errors::SearchError;
    use crate::search::Search;
    use serde_json::json;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn check(doc: serde_json::Value, query: serde_json::Value) -> bool {
        let search = Search::builder().match_query(query).build().unwrap();
        search.matches(&mut Value::from(doc)).unwrap()
    }

    #[test]
    fn boolean_combinators() {
        let doc = json!({"a": 1, "b": 2});
        assert!(check(doc.clone(), json!({"$and": [{"a": 1}, {"b": 2}]})));
        assert!(!check(doc.clone(), json!({"$and": [{"a": 1}, {"b": 3}]})));
        assert!(check(doc.clone(), json!({"$or": [{"a": 9}, {"b": 2}]})));
        assert!(check(doc.clone(), json!({"$not": [{"a": 1}, {"b": 3}]})));
        assert!(check(doc.clone(), json!({"$not_any": [{"a": 9}, {"b": 9}]})));
        assert!(!check(doc, json!({"$not_any": [{"a": 1}, {"b": 9}]})));
    }

    #[test]
    fn combinators_apply_at_the_current_level() {
        let doc = json!({"score": 7});
        assert!(check(doc.clone(), json!({"score": {"$or": [{"$gt": 5}, {"$lt": 0}]}})));
        assert!(!check(doc, json!({"score": {"$and": [{"$gt": 5}, {"$lt": 6}]}})));
    }

    #[test]
    fn structural_arguments_are_rejected() {
        let err = Search::builder().match_query(json!({"$and": {"a": 1}})).build().unwrap_err();
        assert!(matches!(err, SearchError::InvalidArgument { .. }));
        let err = Search::builder().match_query(json!({"$or": []})).build().unwrap_err();
        assert!(matches!(err, SearchError::InvalidArgument { .. }));
        let err = Search::builder().match_query(json!({"$match": {"x": [{"a": 1}]}})).build().unwrap_err();
        assert!(matches!(err, SearchError::InvalidThreshold { .. }));
    }

    #[test]
    fn threshold_family() {
        let doc = json!({"a": 1, "b": 2, "c": 3});
        let subs = json!([{"a": 1}, {"b": 2}, {"c": 0}]);
        assert!(check(doc.clone(), json!({"$match": {"2": subs}})));
        assert!(!check(doc.clone(), json!({"$matchgt": {"2": subs}})));
        assert!(check(doc.clone(), json!({"$matchgte": {"2": subs}})));
        assert!(check(doc.clone(), json!({"$matchlt": {"3": subs}})));
        assert!(check(doc.clone(), json!({"$matchlte": {"2": subs}})));
        assert!(!check(doc, json!({"$match": {"5": subs}})));
    }

    #[test]
    fn matchgt_stops_after_the_deciding_sub_query() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let spy = Callable::predicate(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            true
        });
        let sub = Value::from_iter([("$expr".to_string(), Value::from(spy))]);
        let query = Value::from_iter([(
            "$matchgt".to_string(),
            Value::from_iter([("1".to_string(), Value::List(vec![sub.clone(), sub.clone(), sub.clone(), sub]))]),
        )]);
        let search = Search::builder().match_query(query).build().unwrap();
        assert!(search.matches(&mut Value::from(json!({"a": 1}))).unwrap());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
