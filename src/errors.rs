use std::fmt;
use thiserror::Error;

/// Category of an evaluation-time failure raised by an operator's raw implementation.
///
/// Kinds form a small is-a hierarchy rooted at [`FaultKind::Error`], so an
/// expected-fault mapping keyed on [`FaultKind::Lookup`] also recovers
/// [`FaultKind::Key`] and [`FaultKind::Index`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FaultKind {
    Error,
    Type,
    Value,
    Lookup,
    Key,
    Index,
    Arithmetic,
    ZeroDivision,
    Runtime,
}

impl FaultKind {
    #[must_use]
    pub const fn parent(self) -> Option<Self> {
        match self {
            Self::Error => None,
            Self::Key | Self::Index => Some(Self::Lookup),
            Self::ZeroDivision => Some(Self::Arithmetic),
            Self::Type | Self::Value | Self::Lookup | Self::Arithmetic | Self::Runtime => {
                Some(Self::Error)
            }
        }
    }

    /// True when `self` is `other` or one of its descendants.
    #[must_use]
    pub fn is_a(self, other: Self) -> bool {
        let mut cur = Some(self);
        while let Some(k) = cur {
            if k == other {
                return true;
            }
            cur = k.parent();
        }
        false
    }

    /// Distance from the root; deeper kinds are more specific.
    #[must_use]
    pub fn depth(self) -> usize {
        let mut d = 0;
        let mut cur = self.parent();
        while let Some(k) = cur {
            d += 1;
            cur = k.parent();
        }
        d
    }
}

impl fmt::Display for FaultKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Error => "error",
            Self::Type => "type",
            Self::Value => "value",
            Self::Lookup => "lookup",
            Self::Key => "key",
            Self::Index => "index",
            Self::Arithmetic => "arithmetic",
            Self::ZeroDivision => "zero_division",
            Self::Runtime => "runtime",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind} fault: {message}")]
pub struct Fault {
    pub kind: FaultKind,
    pub message: String,
}

impl Fault {
    pub fn new(kind: FaultKind, message: impl Into<String>) -> Self {
        Self { kind, message: message.into() }
    }

    pub fn type_error(message: impl Into<String>) -> Self {
        Self::new(FaultKind::Type, message)
    }
}

#[derive(Debug, Error)]
pub enum SearchError {
    #[error("Duplicate operator: {0}")]
    DuplicateOperator(String),

    #[error("Unknown operator: {0}")]
    UnknownOperator(String),

    #[error("Invalid operator: {0}")]
    InvalidOperator(String),

    #[error("Invalid argument for {op}: {reason}")]
    InvalidArgument { op: String, reason: String },

    #[error("Invalid threshold for {op}: {found}")]
    InvalidThreshold { op: String, found: String },

    #[error("Invalid slice pattern: {0}")]
    InvalidSlice(String),

    #[error("Mixed inclusion and exclusion at '{0}'")]
    MixedProjection(String),

    #[error("Expected a mapping for {0}")]
    NotAMapping(String),

    #[error("Default for {op} must be {expected}, got {found}")]
    DefaultTypeMismatch { op: String, expected: String, found: String },

    #[error("Structure error: {0}")]
    Structure(String),

    #[error("Comparator for {0} returned a non-boolean value")]
    Comparator(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Serde JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Fault(#[from] Fault),
}

impl SearchError {
    pub(crate) fn invalid(op: &str, reason: impl Into<String>) -> Self {
        Self::InvalidArgument { op: op.to_string(), reason: reason.into() }
    }

    /// Returns the fault when this error came from an operator's raw implementation.
    #[must_use]
    pub const fn as_fault(&self) -> Option<&Fault> {
        match self {
            Self::Fault(f) => Some(f),
            _ => None,
        }
    }
}

impl From<toml::de::Error> for SearchError {
    fn from(e: toml::de::Error) -> Self {
        Self::Config(e.to_string())
    }
}

pub type SearchResult<T> = Result<T, SearchError>;
