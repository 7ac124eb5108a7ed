use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;

use super::Value;
use crate::errors::{Fault, FaultKind};

type BoxedIter = Box<dyn Iterator<Item = Value> + Send>;

/// A single-pass lazily-produced sequence.
///
/// Clones share the same underlying iterator: reading through one handle
/// advances every other handle. Whether a field holding one of these is
/// materialized after matching is decided by the
/// [`ConsumptionPolicy`](super::ConsumptionPolicy).
#[derive(Clone)]
pub struct LazyIter {
    inner: Arc<Mutex<BoxedIter>>,
}

impl LazyIter {
    pub fn new<I>(iter: I) -> Self
    where
        I: IntoIterator<Item = Value>,
        I::IntoIter: Send + 'static,
    {
        Self { inner: Arc::new(Mutex::new(Box::new(iter.into_iter()))) }
    }

    /// Pulls every remaining item. A second call returns an empty vec.
    #[must_use]
    pub fn drain(&self) -> Vec<Value> {
        let mut it = self.inner.lock();
        it.by_ref().collect()
    }

    /// Consumes items until one satisfies `pred`. Items before it are lost.
    pub fn find_map<T>(&self, mut pred: impl FnMut(Value) -> Option<T>) -> Option<T> {
        let mut it = self.inner.lock();
        it.by_ref().find_map(&mut pred)
    }

    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for LazyIter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("LazyIter(..)")
    }
}

/// Re-readable arithmetic sequence; every read starts from `start` again.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Range {
    pub start: i64,
    pub stop: i64,
    pub step: i64,
}

impl Range {
    /// # Errors
    /// Returns a value fault when `step` is zero.
    pub fn new(start: i64, stop: i64, step: i64) -> Result<Self, Fault> {
        if step == 0 {
            return Err(Fault::new(FaultKind::Value, "range step must not be zero"));
        }
        Ok(Self { start, stop, step })
    }

    // spans between i64 bounds need 65 bits
    #[must_use]
    pub fn len(&self) -> usize {
        let (start, stop) = (i128::from(self.start), i128::from(self.stop));
        let span = if self.step > 0 { stop - start } else { start - stop };
        if span <= 0 {
            return 0;
        }
        let step = u128::from(self.step.unsigned_abs());
        usize::try_from(span.unsigned_abs().div_ceil(step)).unwrap_or(usize::MAX)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[must_use]
    pub fn contains(&self, n: i64) -> bool {
        let in_bounds =
            if self.step > 0 { n >= self.start && n < self.stop } else { n <= self.start && n > self.stop };
        in_bounds && (i128::from(n) - i128::from(self.start)) % i128::from(self.step) == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = i64> + use<> {
        let Self { start, step, .. } = *self;
        // every produced element lies between start and stop
        (0..self.len()).map_while(move |i| {
            let offset = i128::from(step) * i128::try_from(i).ok()?;
            i64::try_from(i128::from(start) + offset).ok()
        })
    }
}
