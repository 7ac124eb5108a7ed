use std::cell::Cell;

use crate::document::Value;
use crate::errors::{SearchError, SearchResult};
use crate::operators::OperatorKind;
use crate::registry::Registry;

use super::types::{MAX_QUERY_DEPTH, MatchNode, Query, Term};

/// Turns raw query values into [`Query`] trees bound to one registry.
///
/// Operators call back into the compiler for their own sub-queries, so
/// nesting depth is tracked across those calls.
pub struct Compiler<'a> {
    registry: &'a Registry,
    depth: Cell<usize>,
}

impl<'a> Compiler<'a> {
    #[must_use]
    pub const fn new(registry: &'a Registry) -> Self {
        Self { registry, depth: Cell::new(0) }
    }

    #[must_use]
    pub const fn registry(&self) -> &'a Registry {
        self.registry
    }

    /// Compiles a top-level match query, which must be a mapping.
    ///
    /// # Errors
    /// Returns [`SearchError::NotAMapping`] for any other value, or the
    /// first configuration error found in the tree.
    pub fn compile(&self, query: &Value) -> SearchResult<Query> {
        if !query.is_map() {
            return Err(SearchError::NotAMapping(format!("match query, got {}", query.value_type())));
        }
        self.compile_sub(query)
    }

    /// Compiles a nested query. Non-mapping values become literals.
    ///
    /// # Errors
    /// Returns the first configuration error found in the tree.
    pub fn compile_sub(&self, query: &Value) -> SearchResult<Query> {
        let Value::Map(map) = query else {
            return Ok(Query::Literal(query.clone()));
        };
        let depth = self.depth.get() + 1;
        if depth > MAX_QUERY_DEPTH {
            return Err(SearchError::Structure(format!("query nested deeper than {MAX_QUERY_DEPTH} levels")));
        }
        self.depth.set(depth);
        let terms: SearchResult<Vec<Term>> = map.iter().map(|(key, value)| self.compile_term(key, value)).collect();
        self.depth.set(depth - 1);
        Ok(Query::Tree(terms?))
    }

    fn compile_term(&self, key: &str, value: &Value) -> SearchResult<Term> {
        let Some(id) = self.registry.resolve(key) else {
            if self.registry.is_reserved(key) {
                log::warn!("'{key}' is not a registered operator; matching it as a field");
            }
            return Ok(Term::Field { key: key.to_string(), query: self.compile_sub(value)? });
        };
        let op = self.registry.operator(id).ok_or_else(|| SearchError::UnknownOperator(key.to_string()))?;
        let compiled = op.inner().compile(value, self)?;
        let then = match (op.kind(), compiled.continuation) {
            (_, Some(rest)) => Some(Box::new(self.compile_sub(&rest)?)),
            (OperatorKind::ArraySelector, None) => {
                return Err(SearchError::invalid(op.name(), "array selector without a continuation"));
            }
            _ => None,
        };
        Ok(Term::Op(MatchNode { op: id, name: op.name().to_string(), argument: compiled.argument, then }))
    }
}
