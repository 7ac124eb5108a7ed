use crate::document::Value;
use crate::operators::Argument;
use crate::registry::OpId;

// Safety limit against runaway or hostile query nesting
pub(crate) const MAX_QUERY_DEPTH: usize = 64;

/// A compiled match query.
#[derive(Debug, Clone)]
pub enum Query {
    /// Implicit equality with the value at this level.
    Literal(Value),
    /// Terms of one mapping, implicitly ANDed in written order.
    Tree(Vec<Term>),
}

#[derive(Debug, Clone)]
pub enum Term {
    /// Descend into `key` of the current mapping.
    Field { key: String, query: Query },
    Op(MatchNode),
}

/// An operator term parsed once at compile time.
#[derive(Debug, Clone)]
pub struct MatchNode {
    pub op: OpId,
    pub name: String,
    pub argument: Argument,
    /// Continuation of an array selector, matched against the selection.
    pub then: Option<Box<Query>>,
}

impl Query {
    /// Number of terms at the top level; a literal counts as one.
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Literal(_) => 1,
            Self::Tree(terms) => terms.len(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Tree(terms) if terms.is_empty())
    }

    pub(crate) fn filters_elements(&self) -> bool {
        let Self::Tree(terms) = self else {
            return false;
        };
        terms.iter().any(|term| match term {
            Term::Field { query, .. } => query.filters_elements(),
            Term::Op(node) => {
                node.argument.filters_elements() || node.then.as_deref().is_some_and(Self::filters_elements)
            }
        })
    }
}
