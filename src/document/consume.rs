//! Consumption policy for lazily-produced sequences.
//!
//! A single-pass sequence read during matching is gone afterwards. Types
//! classified [`Consumption::Materialize`] are collected into a concrete
//! container and written back into the document before any operator reads
//! them, so later operators, selectors and the caller observe the same
//! elements. Everything else is passed through untouched.

use std::collections::HashMap;

use super::{Value, ValueType};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Consumption {
    Untouched,
    Materialize,
}

/// Target container for materialized sequences.
pub type Container = fn(Vec<Value>) -> Value;

#[derive(Debug, Clone)]
pub struct ConsumptionPolicy {
    classes: HashMap<ValueType, Consumption>,
    container: Container,
}

impl Default for ConsumptionPolicy {
    fn default() -> Self {
        Self { classes: HashMap::new(), container: Value::List }
    }
}

impl ConsumptionPolicy {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks `ty` as consumable: read once, then materialized in place.
    #[must_use]
    pub fn consume(mut self, ty: ValueType) -> Self {
        self.classes.insert(ty, Consumption::Materialize);
        self
    }

    /// Marks `ty` as safe to read repeatedly; it is never materialized.
    #[must_use]
    pub fn preserve(mut self, ty: ValueType) -> Self {
        self.classes.insert(ty, Consumption::Untouched);
        self
    }

    #[must_use]
    pub fn with_container(mut self, container: Container) -> Self {
        self.container = container;
        self
    }

    #[must_use]
    pub fn classify(&self, ty: ValueType) -> Consumption {
        if !ty.is_lazy() {
            return Consumption::Untouched;
        }
        self.classes.get(&ty).copied().unwrap_or(Consumption::Untouched)
    }

    /// Whether any type is materialized at all.
    #[must_use]
    pub fn is_passive(&self) -> bool {
        !self.classes.values().any(|c| *c == Consumption::Materialize)
    }

    /// Whether `value` holds a single-pass sequence this policy leaves for
    /// evaluation to drain.
    #[must_use]
    pub fn leaves_single_pass(&self, value: &Value) -> bool {
        match value {
            Value::Iter(_) => self.classify(ValueType::Iter) == Consumption::Untouched,
            Value::List(items) => items.iter().any(|v| self.leaves_single_pass(v)),
            Value::Map(map) => map.values().any(|v| self.leaves_single_pass(v)),
            _ => false,
        }
    }

    /// Replaces `value` with its materialized form when its type is
    /// consumable. Returns whether a replacement happened.
    pub fn materialize(&self, value: &mut Value) -> bool {
        if self.classify(value.value_type()) != Consumption::Materialize {
            return false;
        }
        let items = value.elements().map(std::borrow::Cow::into_owned).unwrap_or_default();
        log::debug!("materializing {} field ({} items)", value.value_type(), items.len());
        *value = (self.container)(items);
        true
    }
}
