use crate::document::Value;
use crate::errors::{SearchError, SearchResult};
use crate::operators::{Context, OperatorKind};

use super::types::{MatchNode, Query, Term};

/// Matches `doc` against a compiled query.
///
/// Terms of one mapping are ANDed in written order and evaluation stops at
/// the first false term. A field term applied to a non-mapping document is
/// false; a missing key is matched as an empty mapping, or as null when
/// compared with a literal.
///
/// # Errors
/// Propagates unmapped operator faults and structural errors.
pub fn eval_query(query: &Query, doc: &Value, ctx: &Context<'_>) -> SearchResult<bool> {
    match query {
        Query::Literal(expected) => Ok(doc == expected),
        Query::Tree(terms) => {
            for term in terms {
                if !eval_term(term, doc, ctx)? {
                    return Ok(false);
                }
            }
            Ok(true)
        }
    }
}

fn eval_term(term: &Term, doc: &Value, ctx: &Context<'_>) -> SearchResult<bool> {
    match term {
        Term::Field { key, query } => {
            let Value::Map(map) = doc else {
                return Ok(false);
            };
            match (map.get(key), query) {
                (Some(child), _) => eval_query(query, child, ctx),
                (None, Query::Literal(expected)) => Ok(expected.is_null()),
                (None, Query::Tree(_)) => eval_query(query, &Value::map(), ctx),
            }
        }
        Term::Op(node) => eval_node(node, doc, ctx),
    }
}

fn eval_node(node: &MatchNode, doc: &Value, ctx: &Context<'_>) -> SearchResult<bool> {
    let op = ctx
        .registry
        .operator(node.op)
        .ok_or_else(|| SearchError::UnknownOperator(node.name.clone()))?;
    let out = op.apply(doc, &node.argument, ctx)?;
    if op.kind() != OperatorKind::ArraySelector {
        return Ok(out.is_truthy());
    }
    let Some(then) = node.then.as_deref() else {
        return Err(SearchError::Structure(format!("{} has no continuation", node.name)));
    };
    eval_query(then, &out, ctx)
}
