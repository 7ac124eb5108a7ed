//! Array selectors narrow a sequence; matching or projection then continues
//! on the narrowed value.
//!
//! Every selector argument is a pair `[selection, continuation]`. The
//! continuation is compiled by the caller: as a sub-query when matching, as
//! a sub-select spec when projecting.

use std::sync::LazyLock;

use regex::Regex;

use crate::document::Value;
use crate::errors::{SearchError, SearchResult};
use crate::query::Compiler;

use super::array::SEQUENCES;
use super::{Argument, Compiled, Context, Guards, Operator, OperatorKind, unexpected_argument};

static SLICE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(-?\d+)?\s*:\s*(-?\d+)?\s*(?::\s*(-?\d+)?\s*)?$").unwrap_or_else(|e| {
        unreachable!("slice pattern is a valid regex: {e}")
    })
});

fn split_pair<'a>(op: &str, argument: &'a Value) -> SearchResult<(&'a Value, &'a Value)> {
    match argument.as_list().map(Vec::as_slice) {
        Some([selection, continuation]) => Ok((selection, continuation)),
        _ => Err(SearchError::invalid(op, "expected [selection, continuation]")),
    }
}

/// Resolves a possibly negative index against `len`.
pub(crate) fn normalize(index: i64, len: usize) -> Option<usize> {
    let len = i64::try_from(len).ok()?;
    let i = if index < 0 { index + len } else { index };
    if (0..len).contains(&i) { usize::try_from(i).ok() } else { None }
}

/// Positions of `items` picked by a list-valued selection, in selection
/// order. `None` for a single index, which selects an element rather than a
/// list.
///
/// # Errors
/// Propagates faults raised while matching a `$where` filter.
pub(crate) fn selected_positions(
    argument: &Argument,
    items: &[Value],
    ctx: &Context<'_>,
) -> SearchResult<Option<Vec<usize>>> {
    Ok(Some(match argument {
        Argument::Index(IndexArg::Many(indices)) => indices.iter().filter_map(|i| normalize(*i, items.len())).collect(),
        Argument::Slice(spec) => spec.positions(items.len()),
        Argument::Where(filter) => {
            let mut kept = Vec::new();
            for (pos, item) in items.iter().enumerate() {
                if ctx.matches(filter, item)? {
                    kept.push(pos);
                }
            }
            kept
        }
        _ => return Ok(None),
    }))
}

fn pick(items: &[Value], positions: Vec<usize>) -> Value {
    Value::List(positions.into_iter().map(|p| items[p].clone()).collect())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexArg {
    Single(i64),
    Many(Vec<i64>),
}

pub struct IndexOp;

impl Operator for IndexOp {
    fn name(&self) -> &str {
        "index"
    }

    fn kind(&self) -> OperatorKind {
        OperatorKind::ArraySelector
    }

    fn default_return(&self) -> Value {
        Value::List(Vec::new())
    }

    fn default_guards(&self) -> Guards {
        Guards::default().allow(SEQUENCES)
    }

    fn compile(&self, argument: &Value, _compiler: &Compiler<'_>) -> SearchResult<Compiled> {
        let (selection, continuation) = split_pair("index", argument)?;
        let index = match selection {
            Value::Int(i) => IndexArg::Single(*i),
            Value::List(items) => IndexArg::Many(
                items
                    .iter()
                    .map(|v| v.as_i64().ok_or_else(|| SearchError::invalid("index", format!("{v} is not an integer index"))))
                    .collect::<SearchResult<_>>()?,
            ),
            other => {
                return Err(SearchError::invalid("index", format!("expected an index or a list of indices, got {other}")));
            }
        };
        Ok(Compiled::selector(Argument::Index(index), continuation.clone()))
    }

    fn call(&self, value: &Value, argument: &Argument, ctx: &Context<'_>) -> SearchResult<Value> {
        let Argument::Index(index) = argument else {
            return Err(unexpected_argument("index", argument));
        };
        let Some(items) = value.elements() else {
            return Ok(self.default_return());
        };
        if let IndexArg::Single(i) = index {
            return Ok(normalize(*i, items.len()).map_or_else(|| self.default_return(), |pos| items[pos].clone()));
        }
        let positions = selected_positions(argument, &items, ctx)?.unwrap_or_default();
        Ok(pick(&items, positions))
    }
}

/// A validated `start:stop:step` pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SliceSpec {
    pub start: Option<i64>,
    pub stop: Option<i64>,
    pub step: i64,
}

impl SliceSpec {
    /// # Errors
    /// Returns [`SearchError::InvalidSlice`] when `pattern` does not follow
    /// the `start:stop[:step]` grammar or the step is zero.
    pub fn parse(pattern: &str) -> SearchResult<Self> {
        let caps = SLICE_PATTERN.captures(pattern).ok_or_else(|| SearchError::InvalidSlice(pattern.to_string()))?;
        let bound = |i: usize| -> SearchResult<Option<i64>> {
            caps.get(i)
                .map(|m| m.as_str().parse::<i64>().map_err(|_| SearchError::InvalidSlice(pattern.to_string())))
                .transpose()
        };
        let step = bound(3)?.unwrap_or(1);
        if step == 0 {
            return Err(SearchError::InvalidSlice(format!("{pattern} (step must not be zero)")));
        }
        Ok(Self { start: bound(1)?, stop: bound(2)?, step })
    }

    /// Positions selected from a sequence of `len` items, in slice order.
    #[must_use]
    pub fn positions(&self, len: usize) -> Vec<usize> {
        let len = i64::try_from(len).unwrap_or(i64::MAX);
        let step = self.step;
        let clamp = |bound: Option<i64>, default: i64| -> i64 {
            match bound {
                None => default,
                Some(b) if b < 0 => {
                    let b = b + len;
                    if b < 0 { if step < 0 { -1 } else { 0 } } else { b }
                }
                Some(b) if b >= len => {
                    if step < 0 { len - 1 } else { len }
                }
                Some(b) => b,
            }
        };
        let (start, stop) = if step > 0 {
            (clamp(self.start, 0), clamp(self.stop, len))
        } else {
            (clamp(self.start, len - 1), clamp(self.stop, -1))
        };
        let mut out = Vec::new();
        let mut i = start;
        while (step > 0 && i < stop) || (step < 0 && i > stop) {
            if let Ok(pos) = usize::try_from(i) {
                out.push(pos);
            }
            match i.checked_add(step) {
                Some(next) => i = next,
                None => break,
            }
        }
        out
    }
}

pub struct SliceOp;

impl Operator for SliceOp {
    fn name(&self) -> &str {
        "slice"
    }

    fn kind(&self) -> OperatorKind {
        OperatorKind::ArraySelector
    }

    fn default_return(&self) -> Value {
        Value::List(Vec::new())
    }

    fn default_guards(&self) -> Guards {
        Guards::default().allow(SEQUENCES)
    }

    fn compile(&self, argument: &Value, _compiler: &Compiler<'_>) -> SearchResult<Compiled> {
        let (selection, continuation) = split_pair("slice", argument)?;
        let Value::Str(pattern) = selection else {
            return Err(SearchError::InvalidSlice(selection.to_string()));
        };
        Ok(Compiled::selector(Argument::Slice(SliceSpec::parse(pattern)?), continuation.clone()))
    }

    fn call(&self, value: &Value, argument: &Argument, _ctx: &Context<'_>) -> SearchResult<Value> {
        let Argument::Slice(spec) = argument else {
            return Err(unexpected_argument("slice", argument));
        };
        let Some(items) = value.elements() else {
            return Ok(self.default_return());
        };
        Ok(pick(&items, spec.positions(items.len())))
    }
}

/// Keeps the elements matching a filter sub-query.
pub struct WhereOp;

impl Operator for WhereOp {
    fn name(&self) -> &str {
        "where"
    }

    fn kind(&self) -> OperatorKind {
        OperatorKind::ArraySelector
    }

    fn default_return(&self) -> Value {
        Value::List(Vec::new())
    }

    fn default_guards(&self) -> Guards {
        Guards::default().allow(SEQUENCES)
    }

    fn compile(&self, argument: &Value, compiler: &Compiler<'_>) -> SearchResult<Compiled> {
        let (filter, continuation) = split_pair("where", argument)?;
        Ok(Compiled::selector(Argument::Where(compiler.compile_sub(filter)?), continuation.clone()))
    }

    fn call(&self, value: &Value, argument: &Argument, ctx: &Context<'_>) -> SearchResult<Value> {
        if !matches!(argument, Argument::Where(_)) {
            return Err(unexpected_argument("where", argument));
        }
        let items = match value {
            Value::List(items) => items,
            Value::Iter(_) | Value::Range(_) => {
                return Err(SearchError::Structure(format!(
                    "$where needs a concrete sequence; declare '{}' consumable to match it",
                    value.value_type()
                )));
            }
            _ => return Ok(self.default_return()),
        };
        let positions = selected_positions(argument, items, ctx)?.unwrap_or_default();
        Ok(pick(items, positions))
    }
}

pub(crate) fn operators() -> Vec<Box<dyn Operator>> {
    vec![Box::new(IndexOp), Box::new(SliceOp), Box::new(WhereOp)]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{LazyIter, Map, ValueType};
    use crate::search::Search;
    use serde_json::json;

    fn slice(pattern: &str, len: usize) -> Vec<usize> {
        SliceSpec::parse(pattern).unwrap().positions(len)
    }

    #[test]
    fn slice_grammar() {
        assert!(SliceSpec::parse(":").is_ok());
        assert!(SliceSpec::parse("1:").is_ok());
        assert!(SliceSpec::parse(" -2 : ").is_ok());
        assert!(SliceSpec::parse("::2").is_ok());
        assert!(SliceSpec::parse("1").is_err());
        assert!(SliceSpec::parse("a:b").is_err());
        assert!(SliceSpec::parse("1:2:3:4").is_err());
        assert!(SliceSpec::parse("::0").is_err());
    }

    #[test]
    fn slice_positions_follow_python_semantics() {
        assert_eq!(slice(":", 3), vec![0, 1, 2]);
        assert_eq!(slice("1:", 4), vec![1, 2, 3]);
        assert_eq!(slice(":-1", 4), vec![0, 1, 2]);
        assert_eq!(slice("-2:", 4), vec![2, 3]);
        assert_eq!(slice("::2", 5), vec![0, 2, 4]);
        assert_eq!(slice("::-1", 3), vec![2, 1, 0]);
        assert_eq!(slice("5:1:-2", 4), vec![3, 1]);
        assert_eq!(slice("10:20", 4), Vec::<usize>::new());
        assert_eq!(slice(":", 0), Vec::<usize>::new());
    }

    #[test]
    fn extreme_steps_stop_instead_of_overflowing() {
        assert_eq!(slice("1::9223372036854775807", 3), vec![1]);
        assert_eq!(slice("-1::-9223372036854775808", 3), vec![2]);
        assert_eq!(slice("::-9223372036854775808", 0), Vec::<usize>::new());
        let search = Search::builder().match_query(json!({"a": {"$slice": ["1::9223372036854775807", [2]]}})).build().unwrap();
        assert!(search.matches(&mut Value::from(json!({"a": [1, 2, 3]}))).unwrap());
    }

    #[test]
    fn normalize_handles_negative_and_out_of_range() {
        assert_eq!(normalize(-1, 3), Some(2));
        assert_eq!(normalize(3, 3), None);
        assert_eq!(normalize(-4, 3), None);
    }

    fn check(doc: Value, query: serde_json::Value) -> bool {
        let search = Search::builder().match_query(query).build().unwrap();
        search.matches(&mut doc.clone()).unwrap()
    }

    #[test]
    fn index_continues_matching_on_the_element() {
        let doc = Value::from(json!({"a": [5, 10, 15]}));
        assert!(check(doc.clone(), json!({"a": {"$index": [0, 5]}})));
        assert!(check(doc.clone(), json!({"a": {"$index": [-1, {"$gt": 12}]}})));
        assert!(check(doc.clone(), json!({"a": {"$index": [[0, 2, 9], [5, 15]]}})));
        assert!(!check(doc, json!({"a": {"$index": [7, {"$gt": 0}]}})));
    }

    #[test]
    fn slice_and_where_narrow_before_matching() {
        let doc = Value::from(json!({"a": [1, 2, 3, 4]}));
        assert!(check(doc.clone(), json!({"a": {"$slice": ["1:3", [2, 3]]}})));
        assert!(check(doc.clone(), json!({"a": {"$where": [{"$gt": 2}, {"$all": {"$gt": 2}}]}})));
        assert!(check(doc, json!({"a": {"$where": [{"$gt": 2}, {"$count": {"2": {"$gte": 0}}}]}})));
    }

    #[test]
    fn selector_arguments_are_validated() {
        for bad in [
            json!({"a": {"$slice": ["1", 1]}}),
            json!({"a": {"$slice": [":", 1, 2]}}),
            json!({"a": {"$index": ["x", 1]}}),
            json!({"a": {"$where": {"$gt": 1}}}),
        ] {
            assert!(Search::builder().match_query(bad).build().is_err());
        }
    }

    #[test]
    fn where_rejects_unconsumed_iterators() {
        let mut m = Map::new();
        m.insert("a".into(), Value::Iter(LazyIter::new(vec![Value::Int(1)])));
        let query = json!({"a": {"$where": [{"$gt": 0}, {"$any": 1}]}});
        let search = Search::builder().match_query(query.clone()).build().unwrap();
        let err = search.matches(&mut Value::Map(m.clone())).unwrap_err();
        assert!(matches!(err, SearchError::Structure(_)));

        let mut m = Map::new();
        m.insert("a".into(), Value::Iter(LazyIter::new(vec![Value::Int(1)])));
        let search = Search::builder().match_query(query).consume(ValueType::Iter).build().unwrap();
        assert!(search.matches(&mut Value::Map(m)).unwrap());
    }
}
