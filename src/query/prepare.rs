//! Materialization pass.
//!
//! Runs before evaluation and walks the same paths the query will read,
//! replacing consumable lazy values in the caller's document with concrete
//! containers. Evaluation afterwards only needs shared access, which lets
//! operators like `$comp` read the root document while the walk is under way.
//!
//! Selections are resolved exactly as evaluation resolves them, so a
//! continuation behind `$slice`, `$where` or a list of indices only touches
//! the elements it will read.

use std::collections::HashSet;
use std::fmt;

use crate::devtrace;
use crate::document::{ConsumptionPolicy, Value};
use crate::operators::selectors::{normalize, selected_positions};
use crate::operators::{Argument, Context, IndexArg};
use crate::registry::{OpId, Registry};
use crate::utils::devlog::Event;

use super::types::{Query, Term};

/// Borrowed state of one materialization pass.
pub struct Preparer<'a> {
    registry: &'a Registry,
    policy: &'a ConsumptionPolicy,
    /// The document as it was before the pass; `$where` filters resolved
    /// during the pass read it as their root.
    root: &'a Value,
    // a filter run here would drain what evaluation still has to read
    filters_drain: bool,
}

impl<'a> Preparer<'a> {
    #[must_use]
    pub fn new(registry: &'a Registry, policy: &'a ConsumptionPolicy, root: &'a Value) -> Self {
        Self { registry, policy, root, filters_drain: policy.leaves_single_pass(root) }
    }

    pub(crate) fn materialize(&self, doc: &mut Value, trail: &Trail<'_>) {
        if self.policy.materialize(doc) {
            devtrace!(Event::Materialized { path: trail.to_string() });
        }
    }

    /// Whether the guards of `op` let evaluation read `doc` at all.
    pub(crate) fn admits(&self, op: OpId, doc: &Value) -> bool {
        self.registry.operator(op).is_none_or(|op| op.admits(doc.value_type()))
    }
}

/// Where the value being prepared sits in the document.
#[derive(Clone, Copy)]
pub(crate) enum Trail<'p> {
    Root,
    Key(&'p Trail<'p>, &'p str),
    Pos(&'p Trail<'p>, usize),
    /// The list built by a selector; positions below it count within it.
    Selection(&'p Trail<'p>, &'p str),
}

impl fmt::Display for Trail<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Root => f.write_str("<root>"),
            Self::Key(Self::Root, key) => f.write_str(key),
            Self::Key(parent, key) => write!(f, "{parent}.{key}"),
            Self::Pos(parent, pos) => write!(f, "{parent}[{pos}]"),
            Self::Selection(parent, op) => write!(f, "{parent}<{op}>"),
        }
    }
}

/// Materializes the consumable values `query` will read in `doc`.
pub fn prepare_query(query: &Query, doc: &mut Value, prep: &Preparer<'_>) {
    prepare_at(query, doc, prep, &Trail::Root);
}

fn prepare_at(query: &Query, doc: &mut Value, prep: &Preparer<'_>, trail: &Trail<'_>) {
    prep.materialize(doc, trail);
    let Query::Tree(terms) = query else {
        return;
    };
    for term in terms {
        match term {
            Term::Field { key, query } => {
                if let Some(child) = doc.as_map_mut().and_then(|m| m.get_mut(key)) {
                    prepare_at(query, child, prep, &Trail::Key(trail, key));
                }
            }
            Term::Op(node) => {
                if !prep.admits(node.op, doc) {
                    continue;
                }
                prepare_argument(&node.argument, doc, prep, trail);
                if let Some(then) = node.then.as_deref() {
                    with_selection(&node.name, &node.argument, doc, prep, trail, |target, at| {
                        prepare_at(then, target, prep, at);
                    });
                }
            }
        }
    }
}

/// Prepares the sub-queries carried by an operator argument. Combinators
/// read `doc` itself, element-wise operators read its elements.
pub(crate) fn prepare_argument(argument: &Argument, doc: &mut Value, prep: &Preparer<'_>, trail: &Trail<'_>) {
    match argument {
        Argument::Queries(queries) | Argument::Threshold { queries, .. } => {
            for q in queries {
                prepare_at(q, doc, prep, trail);
            }
        }
        Argument::Query(q) | Argument::Count { query: q, .. } | Argument::Where(q) => {
            if let Value::List(items) = doc {
                for (pos, item) in items.iter_mut().enumerate() {
                    prepare_at(q, item, prep, &Trail::Pos(trail, pos));
                }
            }
        }
        _ => {}
    }
}

/// Calls `f` on exactly what a selector continuation will read: the element
/// picked by a single index, or a list of the picked elements. Values
/// materialized in that list are written back to the elements they were
/// copied from.
///
/// Only concrete lists are walked. A lazy sequence left untouched by the
/// policy is drained by evaluation itself and has nothing to write back to.
/// A `$where` filter is only resolved here when the document holds no such
/// sequence, since running it would drain what evaluation reads later.
pub(crate) fn with_selection(
    name: &str,
    argument: &Argument,
    doc: &mut Value,
    prep: &Preparer<'_>,
    trail: &Trail<'_>,
    mut f: impl FnMut(&mut Value, &Trail<'_>),
) {
    let Value::List(items) = doc else {
        return;
    };
    if let Argument::Index(IndexArg::Single(i)) = argument {
        if let Some(pos) = normalize(*i, items.len()) {
            f(&mut items[pos], &Trail::Pos(trail, pos));
        }
        return;
    }
    if matches!(argument, Argument::Where(_)) && prep.filters_drain {
        log::trace!("{name}: document holds single-pass values, selection not prepared");
        return;
    }
    let ctx = Context::new(prep.registry, prep.root, prep.policy);
    let positions = match selected_positions(argument, items, &ctx) {
        Ok(Some(positions)) => positions,
        Ok(None) => return,
        Err(e) => {
            // evaluation raises the same error if it gets this far
            log::trace!("{name}: selection not prepared: {e}");
            return;
        }
    };
    let mut seen = HashSet::with_capacity(positions.len());
    let repeated = !positions.iter().all(|p| seen.insert(*p));
    let at = Trail::Selection(trail, name);
    loop {
        let mut selection = Value::List(positions.iter().map(|&p| items[p].clone()).collect());
        f(&mut selection, &at);
        let Value::List(picked) = selection else {
            return;
        };
        let mut changed = false;
        for (&pos, value) in positions.iter().zip(picked) {
            changed |= adopt(&mut items[pos], value);
        }
        // copies of one element share its lazy handles; once one copy has
        // drained a handle the others must be prepared again from the result
        if !(repeated && changed) {
            break;
        }
    }
}

/// Moves materialized values from a prepared copy into `original` wherever
/// `original` still holds the lazy value they replaced. Returns whether
/// anything moved.
fn adopt(original: &mut Value, prepared: Value) -> bool {
    match (original, prepared) {
        (Value::Map(dst), Value::Map(src)) => {
            let mut changed = false;
            for (key, value) in src {
                if let Some(slot) = dst.get_mut(&key) {
                    changed |= adopt(slot, value);
                }
            }
            changed
        }
        (Value::List(dst), Value::List(src)) => dst.iter_mut().zip(src).fold(false, |changed, (d, s)| adopt(d, s) | changed),
        (original, prepared) => {
            if original.value_type().is_lazy() && !prepared.value_type().is_lazy() {
                *original = prepared;
                true
            } else {
                false
            }
        }
    }
}
