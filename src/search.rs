//! Façade binding registry, matcher and projection.
//!
//! ```
//! use docsearch::{Search, Value};
//! use serde_json::json;
//!
//! let search = Search::builder()
//!     .match_query(json!({"fy": {"$gt": 2010}}))
//!     .select(json!({"fy": 1}))
//!     .build()?;
//! let out = search.evaluate(Value::from(json!({"fy": 2011, "cur": 3265})))?;
//! assert_eq!(out, Some(Value::from(json!({"fy": 2011}))));
//! # Ok::<(), docsearch::SearchError>(())
//! ```

use std::borrow::Borrow;

use indexmap::IndexMap;

use crate::config::{OperatorConfig, SearchConfig};
use crate::devtrace;
use crate::document::{ConsumptionPolicy, Value, ValueType, consume::Container};
use crate::errors::SearchResult;
use crate::operators::{Context, Operator};
use crate::query::{Compiler, Preparer, Query, eval_query, prepare_query};
use crate::registry::Registry;
use crate::utils::devlog::Event;
use crate::select::{self, SelectSpec, compile_select, prepare_select};

/// Collects configuration; every configuration error surfaces in
/// [`SearchBuilder::build`] before any document is seen.
pub struct SearchBuilder {
    sentinel: String,
    match_query: Option<Value>,
    select: Option<Value>,
    custom: Vec<Box<dyn Operator>>,
    ops: IndexMap<String, OperatorConfig>,
    policy: ConsumptionPolicy,
}

impl Default for SearchBuilder {
    fn default() -> Self {
        Self {
            sentinel: "$".to_string(),
            match_query: None,
            select: None,
            custom: Vec::new(),
            ops: IndexMap::new(),
            policy: ConsumptionPolicy::default(),
        }
    }
}

impl SearchBuilder {
    /// Starts from a loaded [`SearchConfig`].
    #[must_use]
    pub fn from_config(config: &SearchConfig) -> Self {
        let mut builder = Self::default().sentinel(config.sentinel.clone());
        for ty in &config.consumable {
            builder = builder.consume(*ty);
        }
        builder.ops.extend(config.ops.iter().map(|(k, v)| (k.clone(), v.clone())));
        builder
    }

    #[must_use]
    pub fn sentinel(mut self, sentinel: impl Into<String>) -> Self {
        self.sentinel = sentinel.into();
        self
    }

    #[must_use]
    pub fn match_query(mut self, query: impl Into<Value>) -> Self {
        self.match_query = Some(query.into());
        self
    }

    #[must_use]
    pub fn select(mut self, spec: impl Into<Value>) -> Self {
        self.select = Some(spec.into());
        self
    }

    #[must_use]
    pub fn custom_operator(mut self, op: impl Operator + 'static) -> Self {
        self.custom.push(Box::new(op));
        self
    }

    /// Overrides the guards or default of one operator. A later call for
    /// the same operator replaces the earlier one.
    #[must_use]
    pub fn configure(mut self, op: impl Into<String>, config: OperatorConfig) -> Self {
        self.ops.insert(op.into(), config);
        self
    }

    #[must_use]
    pub fn consume(mut self, ty: ValueType) -> Self {
        self.policy = self.policy.consume(ty);
        self
    }

    #[must_use]
    pub fn preserve(mut self, ty: ValueType) -> Self {
        self.policy = self.policy.preserve(ty);
        self
    }

    #[must_use]
    pub fn container(mut self, container: Container) -> Self {
        self.policy = self.policy.with_container(container);
        self
    }

    /// Builds the registry and compiles the match query and select spec.
    ///
    /// # Errors
    /// Returns the first configuration error: a bad sentinel, a duplicate or
    /// unknown operator, a rejected override, or a malformed query or spec.
    pub fn build(self) -> SearchResult<Search> {
        let mut registry = Registry::with_builtins(self.sentinel)?;
        for op in self.custom {
            registry.register(op)?;
        }
        for (name, config) in &self.ops {
            registry.configure(name, config)?;
        }
        let query = self.match_query.as_ref().map(|q| Compiler::new(&registry).compile(q)).transpose()?;
        let select = self.select.as_ref().map(|s| compile_select(&registry, s)).transpose()?;
        log::debug!(
            "search built: {} operators, query: {}, select: {}",
            registry.len(),
            query.is_some(),
            select.is_some()
        );
        Ok(Search { registry, query, select, policy: self.policy })
    }
}

/// A configured matcher and projector, reusable across documents and
/// shareable across threads for concurrent reads.
#[derive(Debug)]
pub struct Search {
    registry: Registry,
    query: Option<Query>,
    select: Option<SelectSpec>,
    policy: ConsumptionPolicy,
}

impl Search {
    #[must_use]
    pub fn builder() -> SearchBuilder {
        SearchBuilder::default()
    }

    #[must_use]
    pub const fn registry(&self) -> &Registry {
        &self.registry
    }

    #[must_use]
    pub const fn policy(&self) -> &ConsumptionPolicy {
        &self.policy
    }

    /// Tests `doc` against the match query. Without a query every document
    /// matches.
    ///
    /// Consumable lazy fields on the query's paths are materialized in
    /// `doc` first, so the caller sees the same elements the query saw.
    ///
    /// # Errors
    /// Propagates unmapped operator faults and structural errors.
    pub fn matches(&self, doc: &mut Value) -> SearchResult<bool> {
        let Some(query) = &self.query else {
            return Ok(true);
        };
        if !self.policy.is_passive() {
            let root = snapshot(query.filters_elements(), doc);
            prepare_query(query, doc, &Preparer::new(&self.registry, &self.policy, &root));
        }
        let ctx = Context::new(&self.registry, doc, &self.policy);
        let matched = eval_query(query, doc, &ctx)?;
        devtrace!(Event::Matched { terms: query.len(), matched });
        Ok(matched)
    }

    /// Applies the select spec. Without one the document is returned whole.
    ///
    /// # Errors
    /// Propagates unmapped faults raised by array selectors.
    pub fn project(&self, doc: &mut Value) -> SearchResult<Value> {
        let Some(spec) = &self.select else {
            return Ok(doc.clone());
        };
        if !self.policy.is_passive() {
            let root = snapshot(spec.filters_elements(), doc);
            prepare_select(spec, doc, &Preparer::new(&self.registry, &self.policy, &root));
        }
        let ctx = Context::new(&self.registry, doc, &self.policy);
        let out = select::project(spec, doc, &ctx)?.unwrap_or_else(Value::map);
        devtrace!(Event::Projected { keys: out.as_map().map_or(0, |m| m.len()) });
        Ok(out)
    }

    /// Matches then projects. `None` is the no-match result.
    ///
    /// # Errors
    /// See [`Search::matches`] and [`Search::project`].
    pub fn evaluate(&self, mut doc: Value) -> SearchResult<Option<Value>> {
        if !self.matches(&mut doc)? {
            return Ok(None);
        }
        if self.select.is_none() {
            return Ok(Some(doc));
        }
        self.project(&mut doc).map(Some)
    }

    /// Lazily evaluates a stream of documents, yielding matches. A failing
    /// document yields its error and the stream continues, so the caller
    /// decides whether to stop.
    pub fn filter<I>(&self, docs: I) -> Matches<&Self, I::IntoIter>
    where
        I: IntoIterator<Item = Value>,
    {
        Matches { search: self, docs: docs.into_iter() }
    }
}

// `$where` filters resolved while preparing read this copy as their root
fn snapshot(filters: bool, doc: &Value) -> Value {
    if filters { doc.clone() } else { Value::Null }
}

/// Iterator returned by [`Search::filter`] and [`dict_search`].
pub struct Matches<S, I> {
    search: S,
    docs: I,
}

impl<S, I> Iterator for Matches<S, I>
where
    S: Borrow<Search>,
    I: Iterator<Item = Value>,
{
    type Item = SearchResult<Value>;

    fn next(&mut self) -> Option<Self::Item> {
        for doc in self.docs.by_ref() {
            match self.search.borrow().evaluate(doc) {
                Ok(Some(out)) => return Some(Ok(out)),
                Ok(None) => {}
                Err(e) => {
                    log::warn!("document evaluation failed: {e}");
                    return Some(Err(e));
                }
            }
        }
        None
    }
}

/// Streams the documents of `docs` matching `query` under the default
/// configuration.
///
/// # Errors
/// Returns a configuration error for a malformed query.
pub fn dict_search<I>(docs: I, query: impl Into<Value>) -> SearchResult<Matches<Search, I::IntoIter>>
where
    I: IntoIterator<Item = Value>,
{
    let search = Search::builder().match_query(query).build()?;
    Ok(Matches { search, docs: docs.into_iter() })
}
