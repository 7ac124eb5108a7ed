//! Operator framework.
//!
//! Every query primitive implements [`Operator`]. The registry wraps each one
//! in a [`GuardedOperator`], which owns the type filters and the
//! expected-fault mapping; implementations only provide the raw behavior.

pub mod array;
pub mod guard;
pub mod high_level;
pub mod low_level;
pub mod selectors;
pub mod threshold;

use std::fmt;

use crate::document::{ConsumptionPolicy, Value};
use crate::errors::SearchResult;
use crate::query::{Compiler, Query};
use crate::registry::Registry;

pub use guard::{Guards, GuardedOperator};
pub use selectors::{IndexArg, SliceSpec};
pub use threshold::Comparison;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperatorKind {
    /// Binary predicate over `(value, argument)`.
    LowLevel,
    /// Boolean combinator over sub-queries evaluated against the same document.
    HighLevel,
    /// Reduces a sub-query applied to every element of a sequence.
    Array,
    /// Narrows a sequence before matching or projection continues.
    ArraySelector,
}

/// Argument of an operator term after compilation.
#[derive(Debug, Clone)]
pub enum Argument {
    Value(Value),
    Pattern(regex::Regex),
    Queries(Vec<Query>),
    Threshold { threshold: i64, queries: Vec<Query> },
    Query(Query),
    Count { threshold: i64, query: Query },
    Index(IndexArg),
    Slice(SliceSpec),
    Where(Query),
}

impl Argument {
    /// Whether evaluating with this argument runs a `$where` filter anywhere
    /// below it.
    pub(crate) fn filters_elements(&self) -> bool {
        match self {
            Self::Where(_) => true,
            Self::Queries(queries) | Self::Threshold { queries, .. } => queries.iter().any(Query::filters_elements),
            Self::Query(query) | Self::Count { query, .. } => query.filters_elements(),
            _ => false,
        }
    }
}

/// Output of [`Operator::compile`]. Selectors hand back the raw continuation
/// so the caller can compile it as a sub-query or as a sub-select spec.
#[derive(Debug)]
pub struct Compiled {
    pub argument: Argument,
    pub continuation: Option<Value>,
}

impl Compiled {
    #[must_use]
    pub const fn new(argument: Argument) -> Self {
        Self { argument, continuation: None }
    }

    #[must_use]
    pub const fn selector(argument: Argument, continuation: Value) -> Self {
        Self { argument, continuation: Some(continuation) }
    }
}

/// State shared by every operator call during one evaluation.
#[derive(Clone, Copy)]
pub struct Context<'a> {
    pub registry: &'a Registry,
    /// The top-level document, for cross-field lookups.
    pub root: &'a Value,
    pub policy: &'a ConsumptionPolicy,
}

impl<'a> Context<'a> {
    #[must_use]
    pub const fn new(registry: &'a Registry, root: &'a Value, policy: &'a ConsumptionPolicy) -> Self {
        Self { registry, root, policy }
    }

    /// Runs a full nested match of `query` against `doc`.
    ///
    /// # Errors
    /// Propagates any unmapped operator fault.
    pub fn matches(&self, query: &Query, doc: &Value) -> SearchResult<bool> {
        crate::query::eval_query(query, doc, self)
    }
}

/// A named query primitive.
///
/// Implementations supply `name`, `kind`, `default_return` and the raw
/// behavior. Type filtering and fault recovery are applied by
/// [`GuardedOperator`] and cannot be replaced by an implementation.
pub trait Operator: Send + Sync {
    /// Token without the sentinel, e.g. `"gt"`.
    fn name(&self) -> &str;

    fn kind(&self) -> OperatorKind;

    /// Value returned when a guard short-circuits or a mapped fault is
    /// recovered. Its type is the operator's declared result type.
    fn default_return(&self) -> Value;

    /// Guards the operator ships with before any configuration is applied.
    fn default_guards(&self) -> Guards {
        Guards::default()
    }

    /// Validates and pre-parses the argument once per query.
    ///
    /// # Errors
    /// Returns a configuration error for a malformed argument.
    fn compile(&self, argument: &Value, _compiler: &Compiler<'_>) -> SearchResult<Compiled> {
        Ok(Compiled::new(Argument::Value(argument.clone())))
    }

    /// Raw implementation.
    ///
    /// # Errors
    /// Returns a fault for a failure the guard pipeline may recover, or a
    /// structural error that always propagates.
    fn call(&self, value: &Value, argument: &Argument, ctx: &Context<'_>) -> SearchResult<Value>;
}

impl fmt::Debug for dyn Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Operator").field("name", &self.name()).field("kind", &self.kind()).finish()
    }
}

/// Every built-in operator, in registration order.
#[must_use]
pub fn builtins() -> Vec<Box<dyn Operator>> {
    let mut ops = low_level::operators();
    ops.extend(high_level::operators());
    ops.extend(array::operators());
    ops.extend(selectors::operators());
    ops
}

/// Extracts the value argument of a low-level operator.
pub(crate) fn literal<'a>(op: &str, argument: &'a Argument) -> SearchResult<&'a Value> {
    match argument {
        Argument::Value(v) => Ok(v),
        other => Err(unexpected_argument(op, other)),
    }
}

pub(crate) fn unexpected_argument(op: &str, argument: &Argument) -> crate::errors::SearchError {
    crate::errors::SearchError::Structure(format!("{op} cannot evaluate argument {argument:?}"))
}
