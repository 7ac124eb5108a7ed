//! Short-circuit counting shared by the `match*` and `count*` families.

use crate::document::Value;
use crate::errors::{SearchError, SearchResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    Eq,
    Gt,
    Gte,
    Lt,
    Lte,
}

impl Comparison {
    /// Decides early once further true results can no longer change the outcome.
    #[must_use]
    pub const fn eager(self, count: i64, threshold: i64) -> Option<bool> {
        match self {
            Self::Eq if count > threshold => Some(false),
            Self::Gt if count > threshold => Some(true),
            Self::Gte if count >= threshold => Some(true),
            Self::Lt if count >= threshold => Some(false),
            Self::Lte if count > threshold => Some(false),
            _ => None,
        }
    }

    #[must_use]
    pub const fn finish(self, count: i64, threshold: i64) -> bool {
        match self {
            Self::Eq => count == threshold,
            Self::Gt => count > threshold,
            Self::Gte => count >= threshold,
            Self::Lt => count < threshold,
            Self::Lte => count <= threshold,
        }
    }
}

/// Counts true results, stopping as soon as the comparison is decided.
/// Results after the deciding one are never produced.
///
/// # Errors
/// Propagates the first error produced by `results`.
pub fn count_until<I>(cmp: Comparison, threshold: i64, results: I) -> SearchResult<bool>
where
    I: IntoIterator<Item = SearchResult<bool>>,
{
    let mut count = 0i64;
    for r in results {
        if r? {
            count += 1;
            if let Some(decided) = cmp.eager(count, threshold) {
                return Ok(decided);
            }
        }
    }
    Ok(cmp.finish(count, threshold))
}

/// Parses a `{threshold: rest}` argument.
pub(crate) fn split_threshold<'a>(op: &str, argument: &'a Value) -> SearchResult<(i64, &'a Value)> {
    let map = argument.as_map().ok_or_else(|| {
        SearchError::invalid(op, format!("expected {{threshold: ...}}, got {argument}"))
    })?;
    if map.len() != 1 {
        return Err(SearchError::invalid(op, format!("expected a single threshold entry, got {}", map.len())));
    }
    let Some((key, rest)) = map.first() else {
        return Err(SearchError::invalid(op, "missing threshold entry"));
    };
    let threshold = key
        .trim()
        .parse::<i64>()
        .map_err(|_| SearchError::InvalidThreshold { op: op.to_string(), found: key.clone() })?;
    Ok((threshold, rest))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::Fault;

    fn results(bits: &[bool]) -> Vec<SearchResult<bool>> {
        bits.iter().map(|b| Ok(*b)).collect()
    }

    #[test]
    fn final_predicates() {
        let bits = [true, false, true];
        assert!(count_until(Comparison::Eq, 2, results(&bits)).unwrap());
        assert!(!count_until(Comparison::Gt, 2, results(&bits)).unwrap());
        assert!(count_until(Comparison::Gte, 2, results(&bits)).unwrap());
        assert!(!count_until(Comparison::Lt, 2, results(&bits)).unwrap());
        assert!(count_until(Comparison::Lte, 2, results(&bits)).unwrap());
        assert!(count_until(Comparison::Gte, 0, results(&[])).unwrap());
    }

    #[test]
    fn eager_exit_skips_remaining_results() {
        // the error after the deciding result must never be reached
        let seq = vec![Ok(true), Ok(true), Err(Fault::type_error("unreached").into())];
        assert!(count_until(Comparison::Gt, 1, seq).unwrap());
        let seq = vec![Ok(true), Err(Fault::type_error("unreached").into())];
        assert!(!count_until(Comparison::Lt, 1, seq).unwrap());
        let seq = vec![Ok(true), Ok(true), Err(Fault::type_error("unreached").into())];
        assert!(!count_until(Comparison::Eq, 1, seq).unwrap());
    }

    #[test]
    fn unreachable_threshold_is_plain_false() {
        assert!(!count_until(Comparison::Eq, 10, results(&[true, true])).unwrap());
        assert!(!count_until(Comparison::Gte, 3, results(&[true])).unwrap());
    }

    #[test]
    fn threshold_key_must_be_integer() {
        let arg = Value::from(serde_json::json!({"2": [1]}));
        assert_eq!(split_threshold("match", &arg).unwrap().0, 2);
        let arg = Value::from(serde_json::json!({"two": [1]}));
        assert!(matches!(split_threshold("match", &arg), Err(SearchError::InvalidThreshold { .. })));
        let arg = Value::from(serde_json::json!({"1": [1], "2": [1]}));
        assert!(split_threshold("match", &arg).is_err());
        assert!(split_threshold("match", &Value::Int(1)).is_err());
    }
}
