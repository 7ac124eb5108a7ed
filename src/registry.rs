//! Name → operator table.
//!
//! Built once per [`Search`](crate::search::Search) and reused for every
//! document. Compiled queries refer to operators by [`OpId`], an index into
//! this table, so a query is only meaningful together with the registry that
//! compiled it.

use indexmap::IndexMap;

use crate::config::OperatorConfig;
use crate::errors::{SearchError, SearchResult};
use crate::operators::{self, GuardedOperator, Operator};

/// Position of an operator inside its [`Registry`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OpId(usize);

#[derive(Debug)]
pub struct Registry {
    sentinel: String,
    ops: IndexMap<String, GuardedOperator>,
}

impl Registry {
    /// An empty registry using `sentinel` as the operator prefix.
    #[must_use]
    pub fn new(sentinel: impl Into<String>) -> Self {
        Self { sentinel: sentinel.into(), ops: IndexMap::new() }
    }

    /// A registry holding every built-in operator.
    ///
    /// # Errors
    /// Returns [`SearchError::Config`] for an empty sentinel.
    pub fn with_builtins(sentinel: impl Into<String>) -> SearchResult<Self> {
        let sentinel = sentinel.into();
        if sentinel.is_empty() || sentinel.chars().any(char::is_whitespace) {
            return Err(SearchError::Config(format!("invalid operator sentinel '{sentinel}'")));
        }
        let mut registry = Self::new(sentinel);
        for op in operators::builtins() {
            registry.register(op)?;
        }
        log::debug!("registry ready: {} operators, sentinel '{}'", registry.len(), registry.sentinel);
        Ok(registry)
    }

    /// Adds an operator under its own name.
    ///
    /// # Errors
    /// Returns [`SearchError::DuplicateOperator`] when the name is taken and
    /// [`SearchError::InvalidOperator`] for a malformed name.
    pub fn register(&mut self, op: Box<dyn Operator>) -> SearchResult<OpId> {
        let guarded = GuardedOperator::new(op)?;
        let name = guarded.name().to_string();
        if self.ops.contains_key(&name) {
            log::warn!("operator '{name}' registered twice");
            return Err(SearchError::DuplicateOperator(name));
        }
        let (index, _) = self.ops.insert_full(name, guarded);
        Ok(OpId(index))
    }

    /// Applies a configuration override to the operator named `name`.
    ///
    /// # Errors
    /// Returns [`SearchError::UnknownOperator`] when no such operator exists,
    /// or the error produced while applying `config`.
    pub fn configure(&mut self, name: &str, config: &OperatorConfig) -> SearchResult<()> {
        let Some(op) = self.get_mut(name) else {
            log::warn!("configuration for unknown operator '{name}'");
            return Err(SearchError::UnknownOperator(name.to_string()));
        };
        config.apply_to(op)
    }

    /// Looks an operator up by name, with or without the sentinel.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&GuardedOperator> {
        self.ops.get(self.bare(name))
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut GuardedOperator> {
        let bare = self.bare(name);
        self.ops.get_mut(bare)
    }

    /// Resolves a query key to an operator. Only sentinel-prefixed keys
    /// can name an operator.
    #[must_use]
    pub fn resolve(&self, key: &str) -> Option<OpId> {
        key.strip_prefix(self.sentinel.as_str()).and_then(|name| self.ops.get_index_of(name)).map(OpId)
    }

    #[must_use]
    pub fn operator(&self, id: OpId) -> Option<&GuardedOperator> {
        self.ops.get_index(id.0).map(|(_, op)| op)
    }

    #[must_use]
    pub fn is_reserved(&self, key: &str) -> bool {
        key.starts_with(self.sentinel.as_str())
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.ops.keys().map(String::as_str)
    }

    #[must_use]
    pub fn sentinel(&self) -> &str {
        &self.sentinel
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.ops.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    fn bare<'a>(&self, name: &'a str) -> &'a str {
        name.strip_prefix(self.sentinel.as_str()).unwrap_or(name)
    }
}
