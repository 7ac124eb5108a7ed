//! Array operators: a sub-query applied to every element of a sequence.

use crate::document::{Value, ValueType};
use crate::errors::SearchResult;
use crate::query::Compiler;

use super::high_level::{all, any};
use super::threshold::{self, Comparison};
use super::{Argument, Compiled, Context, Guards, Operator, OperatorKind, unexpected_argument};

pub(crate) const SEQUENCES: &[ValueType] = &[ValueType::List, ValueType::Iter, ValueType::Range];

#[derive(Debug, Clone, Copy)]
enum Quantifier {
    All,
    Any,
}

pub struct QuantifierOp {
    name: &'static str,
    quantifier: Quantifier,
}

impl Operator for QuantifierOp {
    fn name(&self) -> &str {
        self.name
    }

    fn kind(&self) -> OperatorKind {
        OperatorKind::Array
    }

    fn default_return(&self) -> Value {
        Value::Bool(false)
    }

    fn default_guards(&self) -> Guards {
        Guards::default().allow(SEQUENCES)
    }

    fn compile(&self, argument: &Value, compiler: &Compiler<'_>) -> SearchResult<Compiled> {
        Ok(Compiled::new(Argument::Query(compiler.compile_sub(argument)?)))
    }

    fn call(&self, value: &Value, argument: &Argument, ctx: &Context<'_>) -> SearchResult<Value> {
        let Argument::Query(query) = argument else {
            return Err(unexpected_argument(self.name, argument));
        };
        let Some(items) = value.elements() else {
            return Ok(self.default_return());
        };
        // no vacuous truth: an empty sequence never satisfies either quantifier
        if items.is_empty() {
            return Ok(Value::Bool(false));
        }
        let results = items.iter().map(|item| ctx.matches(query, item));
        let out = match self.quantifier {
            Quantifier::All => all(results)?,
            Quantifier::Any => any(results)?,
        };
        Ok(Value::Bool(out))
    }
}

/// `{threshold: sub-query}`: counts elements that match.
pub struct CountOp {
    name: &'static str,
    cmp: Comparison,
}

impl Operator for CountOp {
    fn name(&self) -> &str {
        self.name
    }

    fn kind(&self) -> OperatorKind {
        OperatorKind::Array
    }

    fn default_return(&self) -> Value {
        Value::Bool(false)
    }

    fn default_guards(&self) -> Guards {
        Guards::default().allow(SEQUENCES)
    }

    fn compile(&self, argument: &Value, compiler: &Compiler<'_>) -> SearchResult<Compiled> {
        let (threshold, rest) = threshold::split_threshold(self.name, argument)?;
        Ok(Compiled::new(Argument::Count { threshold, query: compiler.compile_sub(rest)? }))
    }

    fn call(&self, value: &Value, argument: &Argument, ctx: &Context<'_>) -> SearchResult<Value> {
        let Argument::Count { threshold, query } = argument else {
            return Err(unexpected_argument(self.name, argument));
        };
        let Some(items) = value.elements() else {
            return Ok(self.default_return());
        };
        let results = items.iter().map(|item| ctx.matches(query, item));
        Ok(Value::Bool(threshold::count_until(self.cmp, *threshold, results)?))
    }
}

pub(crate) fn operators() -> Vec<Box<dyn Operator>> {
    vec![
        Box::new(QuantifierOp { name: "all", quantifier: Quantifier::All }),
        Box::new(QuantifierOp { name: "any", quantifier: Quantifier::Any }),
        Box::new(CountOp { name: "count", cmp: Comparison::Eq }),
        Box::new(CountOp { name: "countgt", cmp: Comparison::Gt }),
        Box::new(CountOp { name: "countgte", cmp: Comparison::Gte }),
        Box::new(CountOp { name: "countlt", cmp: Comparison::Lt }),
        Box::new(CountOp { name: "countlte", cmp: Comparison::Lte }),
    ]
}

#[cfg(test)]
mod tests {
    use crate::document::{LazyIter, Range, Value};
    use crate::search::Search;
    use serde_json::json;

    fn check(doc: Value, query: serde_json::Value) -> bool {
        let search = Search::builder().match_query(query).build().unwrap();
        search.matches(&mut doc.clone()).unwrap()
    }

    #[test]
    fn all_and_any_with_literals() {
        let doc = Value::from(json!({"a": [0, 1, 1]}));
        assert!(!check(doc.clone(), json!({"a": {"$all": 1}})));
        assert!(check(doc.clone(), json!({"a": {"$any": 1}})));
        assert!(check(doc, json!({"a": {"$all": {"$gte": 0}}})));
    }

    #[test]
    fn empty_sequences_are_false() {
        let doc = Value::from(json!({"a": []}));
        assert!(!check(doc.clone(), json!({"a": {"$all": {"$gt": 0}}})));
        assert!(!check(doc, json!({"a": {"$any": {"$gt": 0}}})));
    }

    #[test]
    fn non_sequences_fall_back_to_default() {
        let doc = Value::from(json!({"a": 5}));
        assert!(!check(doc.clone(), json!({"a": {"$any": 5}})));
        assert!(!check(doc, json!({"a": {"$countgte": {"0": 5}}})));
    }

    #[test]
    fn count_family() {
        let doc = Value::from(json!({"a": [0, 1, 1]}));
        assert!(!check(doc.clone(), json!({"a": {"$count": {"1": 1}}})));
        assert!(check(doc.clone(), json!({"a": {"$count": {"2": 1}}})));
        assert!(check(doc.clone(), json!({"a": {"$countgt": {"1": 1}}})));
        assert!(check(doc.clone(), json!({"a": {"$countgte": {"2": 1}}})));
        assert!(!check(doc.clone(), json!({"a": {"$countlt": {"2": 1}}})));
        assert!(check(doc, json!({"a": {"$countlte": {"2": 1}}})));
    }

    #[test]
    fn elements_may_be_documents() {
        let doc = Value::from(json!({"items": [{"qty": 5}, {"qty": 20}]}));
        assert!(check(doc.clone(), json!({"items": {"$any": {"qty": {"$gt": 10}}}})));
        assert!(!check(doc, json!({"items": {"$all": {"qty": {"$gt": 10}}}})));
    }

    #[test]
    fn lazy_sequences_are_iterated() {
        let mut m = crate::document::Map::new();
        m.insert("r".into(), Value::Range(Range::new(0, 5, 1).unwrap()));
        m.insert("it".into(), Value::Iter(LazyIter::new(vec![Value::Int(3)])));
        let doc = Value::Map(m);
        assert!(check(doc.clone(), json!({"r": {"$countgte": {"5": {"$gte": 0}}}})));
        assert!(check(doc, json!({"it": {"$any": 3}})));
    }
}
