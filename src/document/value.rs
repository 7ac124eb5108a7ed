use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

use super::lazy::{LazyIter, Range};
use crate::errors::Fault;

// 2^63: floats in [-2^63, 2^63) convert to i64 exactly when integral
const I64_LIMIT: f64 = 9_223_372_036_854_775_808.0;

/// Interior node of a document or query. Insertion order is preserved so that
/// the terms of a query mapping are evaluated in the order they were written.
pub type Map = IndexMap<String, Value>;

type UnaryFn = dyn Fn(&Value) -> Result<Value, Fault> + Send + Sync;
type BinaryFn = dyn Fn(&Value, &Value) -> Result<Value, Fault> + Send + Sync;

/// A caller-supplied function carried inside a query (`$expr`, `$comp`).
#[derive(Clone)]
pub enum Callable {
    Unary(Arc<UnaryFn>),
    Binary(Arc<BinaryFn>),
}

impl Callable {
    pub fn unary(f: impl Fn(&Value) -> Result<Value, Fault> + Send + Sync + 'static) -> Self {
        Self::Unary(Arc::new(f))
    }

    pub fn binary(
        f: impl Fn(&Value, &Value) -> Result<Value, Fault> + Send + Sync + 'static,
    ) -> Self {
        Self::Binary(Arc::new(f))
    }

    /// Infallible single-argument predicate.
    pub fn predicate(f: impl Fn(&Value) -> bool + Send + Sync + 'static) -> Self {
        Self::unary(move |v| Ok(Value::Bool(f(v))))
    }

    /// Infallible two-argument comparator.
    pub fn comparator(f: impl Fn(&Value, &Value) -> bool + Send + Sync + 'static) -> Self {
        Self::binary(move |a, b| Ok(Value::Bool(f(a, b))))
    }

    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Unary(a), Self::Unary(b)) => Arc::ptr_eq(a, b),
            (Self::Binary(a), Self::Binary(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Debug for Callable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unary(_) => f.write_str("Callable::Unary(..)"),
            Self::Binary(_) => f.write_str("Callable::Binary(..)"),
        }
    }
}

/// Runtime type tag of a [`Value`]. Used by type guards, the consumption
/// policy and the `$inst` operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueType {
    Null,
    Bool,
    Int,
    Float,
    Str,
    List,
    Map,
    Iter,
    Range,
    Func,
    Regex,
    Types,
}

impl ValueType {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool => "bool",
            Self::Int => "int",
            Self::Float => "float",
            Self::Str => "str",
            Self::List => "list",
            Self::Map => "map",
            Self::Iter => "iter",
            Self::Range => "range",
            Self::Func => "func",
            Self::Regex => "regex",
            Self::Types => "types",
        }
    }

    /// Sequences produced on demand rather than held in memory.
    #[must_use]
    pub const fn is_lazy(self) -> bool {
        matches!(self, Self::Iter | Self::Range)
    }

    #[must_use]
    pub const fn is_sequence(self) -> bool {
        matches!(self, Self::List | Self::Iter | Self::Range)
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A node of a document or query tree.
#[derive(Clone, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<Value>),
    Map(Map),
    Iter(LazyIter),
    Range(Range),
    Func(Callable),
    Regex(regex::Regex),
    Types(Vec<ValueType>),
}

impl Value {
    #[must_use]
    pub const fn value_type(&self) -> ValueType {
        match self {
            Self::Null => ValueType::Null,
            Self::Bool(_) => ValueType::Bool,
            Self::Int(_) => ValueType::Int,
            Self::Float(_) => ValueType::Float,
            Self::Str(_) => ValueType::Str,
            Self::List(_) => ValueType::List,
            Self::Map(_) => ValueType::Map,
            Self::Iter(_) => ValueType::Iter,
            Self::Range(_) => ValueType::Range,
            Self::Func(_) => ValueType::Func,
            Self::Regex(_) => ValueType::Regex,
            Self::Types(_) => ValueType::Types,
        }
    }

    #[must_use]
    pub fn map() -> Self {
        Self::Map(Map::new())
    }

    #[must_use]
    pub const fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_list(&self) -> Option<&Vec<Self>> {
        match self {
            Self::List(l) => Some(l),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_map(&self) -> Option<&Map> {
        match self {
            Self::Map(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_map_mut(&mut self) -> Option<&mut Map> {
        match self {
            Self::Map(m) => Some(m),
            _ => None,
        }
    }

    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    #[must_use]
    pub const fn is_map(&self) -> bool {
        matches!(self, Self::Map(_))
    }

    /// Truth value of an operator result. Empty containers, zero and null
    /// are false.
    #[must_use]
    pub fn is_truthy(&self) -> bool {
        match self {
            Self::Null => false,
            Self::Bool(b) => *b,
            Self::Int(i) => *i != 0,
            Self::Float(f) => *f != 0.0,
            Self::Str(s) => !s.is_empty(),
            Self::List(l) => !l.is_empty(),
            Self::Map(m) => !m.is_empty(),
            Self::Range(r) => !r.is_empty(),
            Self::Types(t) => !t.is_empty(),
            Self::Iter(_) | Self::Func(_) | Self::Regex(_) => true,
        }
    }

    /// Looks up a direct child of a mapping.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Self> {
        self.as_map().and_then(|m| m.get(key))
    }

    /// Resolves a dotted path (`"a.b.0"`) through mappings and list indices.
    #[must_use]
    pub fn get_path(&self, path: &str) -> Option<&Self> {
        let segments: Vec<&str> = path.split('.').collect();
        self.get_segments(&segments)
    }

    #[must_use]
    pub fn get_segments<S: AsRef<str>>(&self, segments: &[S]) -> Option<&Self> {
        let mut cur = self;
        for seg in segments {
            let seg = seg.as_ref();
            cur = match cur {
                Self::Map(m) => m.get(seg)?,
                Self::List(l) => l.get(seg.parse::<usize>().ok()?)?,
                _ => return None,
            };
        }
        Some(cur)
    }

    /// Elements of a sequence. Reading a [`LazyIter`] this way consumes it.
    #[must_use]
    pub fn elements(&self) -> Option<Cow<'_, [Self]>> {
        match self {
            Self::List(l) => Some(Cow::Borrowed(l.as_slice())),
            Self::Range(r) => Some(Cow::Owned(r.iter().map(Self::Int).collect())),
            Self::Iter(it) => Some(Cow::Owned(it.drain())),
            _ => None,
        }
    }

    /// Ordering used by `$gt`, `$gte`, `$lt` and `$lte`.
    ///
    /// # Errors
    /// Returns a type fault when the operands have no defined order.
    pub fn try_cmp(&self, other: &Self) -> Result<Ordering, Fault> {
        use Value as V;
        let incomparable = || {
            Fault::type_error(format!(
                "'{}' and '{}' are not comparable",
                self.value_type(),
                other.value_type()
            ))
        };
        match (self, other) {
            (V::Int(a), V::Int(b)) => Ok(a.cmp(b)),
            (V::Int(_) | V::Float(_), V::Int(_) | V::Float(_)) => {
                let (a, b) = (self.as_f64_lossy(), other.as_f64_lossy());
                a.partial_cmp(&b).ok_or_else(incomparable)
            }
            (V::Str(a), V::Str(b)) => Ok(a.cmp(b)),
            (V::Bool(a), V::Bool(b)) => Ok(a.cmp(b)),
            (V::List(a), V::List(b)) => {
                for (x, y) in a.iter().zip(b) {
                    if x == y {
                        continue;
                    }
                    return x.try_cmp(y);
                }
                Ok(a.len().cmp(&b.len()))
            }
            _ => Err(incomparable()),
        }
    }

    /// Membership test of `needle` inside `self` (`needle in self`).
    ///
    /// # Errors
    /// Returns a type fault when `self` is not a container or when a string is
    /// searched for a non-string needle.
    pub fn contains(&self, needle: &Self) -> Result<bool, Fault> {
        match self {
            Self::List(l) => Ok(l.iter().any(|v| v == needle)),
            Self::Map(m) => Ok(needle.as_str().is_some_and(|k| m.contains_key(k))),
            Self::Str(s) => match needle {
                Self::Str(n) => Ok(s.contains(n.as_str())),
                _ => Err(Fault::type_error(format!(
                    "'in <str>' requires str as left operand, not {}",
                    needle.value_type()
                ))),
            },
            Self::Range(r) => Ok(match needle {
                Self::Int(i) => r.contains(*i),
                Self::Float(f) if f.fract() == 0.0 && (-I64_LIMIT..I64_LIMIT).contains(f) => r.contains(*f as i64),
                _ => false,
            }),
            Self::Iter(it) => Ok(it.find_map(|v| (v == *needle).then_some(())).is_some()),
            _ => Err(Fault::type_error(format!(
                "argument of type '{}' is not a container",
                self.value_type()
            ))),
        }
    }

    /// Identity comparison. Immediates (`Null`, `Bool`, `Int`, type tags)
    /// are identical when equal; shared handles when they point at the same
    /// object. Owned strings, floats and containers are never identical to a
    /// separately built value.
    #[must_use]
    pub fn is_identical(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Null, Self::Null) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Int(a), Self::Int(b)) => a == b,
            (Self::Types(a), Self::Types(b)) => a == b,
            (Self::Iter(a), Self::Iter(b)) => a.ptr_eq(b),
            (Self::Func(a), Self::Func(b)) => a.ptr_eq(b),
            _ => false,
        }
    }

    #[allow(clippy::cast_precision_loss)]
    fn as_f64_lossy(&self) -> f64 {
        match self {
            Self::Int(i) => *i as f64,
            Self::Float(f) => *f,
            _ => f64::NAN,
        }
    }

    /// Converts a concrete value to JSON. Handles, patterns and lazy
    /// sequences have no JSON form and yield `None`.
    #[must_use]
    pub fn to_json(&self) -> Option<serde_json::Value> {
        use serde_json::Value as J;
        Some(match self {
            Self::Null => J::Null,
            Self::Bool(b) => J::Bool(*b),
            Self::Int(i) => J::from(*i),
            Self::Float(f) => J::from(*f),
            Self::Str(s) => J::String(s.clone()),
            Self::List(l) => J::Array(l.iter().map(Self::to_json).collect::<Option<_>>()?),
            Self::Map(m) => J::Object(
                m.iter()
                    .map(|(k, v)| v.to_json().map(|j| (k.clone(), j)))
                    .collect::<Option<_>>()?,
            ),
            Self::Range(r) => J::Array(r.iter().map(J::from).collect()),
            Self::Iter(_) | Self::Func(_) | Self::Regex(_) | Self::Types(_) => return None,
        })
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        use Value as V;
        match (self, other) {
            (V::Null, V::Null) => true,
            (V::Bool(a), V::Bool(b)) => a == b,
            (V::Int(a), V::Int(b)) => a == b,
            (V::Int(_) | V::Float(_), V::Int(_) | V::Float(_)) => {
                self.as_f64_lossy() == other.as_f64_lossy()
            }
            (V::Str(a), V::Str(b)) => a == b,
            (V::List(a), V::List(b)) => a == b,
            (V::Map(a), V::Map(b)) => a == b,
            (V::Range(a), V::Range(b)) => a == b,
            (V::Iter(a), V::Iter(b)) => a.ptr_eq(b),
            (V::Func(a), V::Func(b)) => a.ptr_eq(b),
            (V::Regex(a), V::Regex(b)) => a.as_str() == b.as_str(),
            (V::Types(a), V::Types(b)) => a == b,
            _ => false,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("null"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(i) => write!(f, "{i}"),
            Self::Float(x) => write!(f, "{x:?}"),
            Self::Str(s) => write!(f, "{s:?}"),
            Self::List(l) => f.debug_list().entries(l).finish(),
            Self::Map(m) => f.debug_map().entries(m).finish(),
            Self::Iter(it) => write!(f, "{it:?}"),
            Self::Range(r) => write!(f, "range({}, {}, {})", r.start, r.stop, r.step),
            Self::Func(c) => write!(f, "{c:?}"),
            Self::Regex(r) => write!(f, "/{}/", r.as_str()),
            Self::Types(t) => write!(f, "types{t:?}"),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Self::Int(i64::from(v))
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::Str(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::Str(v)
    }
}

impl<T: Into<Self>> From<Vec<T>> for Value {
    fn from(v: Vec<T>) -> Self {
        Self::List(v.into_iter().map(Into::into).collect())
    }
}

impl From<Map> for Value {
    fn from(v: Map) -> Self {
        Self::Map(v)
    }
}

impl From<LazyIter> for Value {
    fn from(v: LazyIter) -> Self {
        Self::Iter(v)
    }
}

impl From<Range> for Value {
    fn from(v: Range) -> Self {
        Self::Range(v)
    }
}

impl From<Callable> for Value {
    fn from(v: Callable) -> Self {
        Self::Func(v)
    }
}

impl From<regex::Regex> for Value {
    fn from(v: regex::Regex) -> Self {
        Self::Regex(v)
    }
}

impl From<ValueType> for Value {
    fn from(v: ValueType) -> Self {
        Self::Types(vec![v])
    }
}

impl From<serde_json::Value> for Value {
    fn from(v: serde_json::Value) -> Self {
        use serde_json::Value as J;
        match v {
            J::Null => Self::Null,
            J::Bool(b) => Self::Bool(b),
            J::Number(n) => n.as_i64().map_or_else(|| Self::Float(n.as_f64().unwrap_or(f64::NAN)), Self::Int),
            J::String(s) => Self::Str(s),
            J::Array(a) => Self::List(a.into_iter().map(Self::from).collect()),
            J::Object(o) => Self::Map(o.into_iter().map(|(k, v)| (k, Self::from(v))).collect()),
        }
    }
}

impl FromIterator<(String, Value)> for Value {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self::Map(iter.into_iter().collect())
    }
}
