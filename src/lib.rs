//! MongoDB-style matching and projection over in-memory nested documents.
//!
//! A [`Search`] is configured once through [`SearchBuilder`] (operator
//! sentinel, match query, select spec, custom operators, per-operator
//! overrides, consumable types) and then evaluated against any number of
//! documents, one at a time or as a stream.

pub mod config;
pub mod document;
pub mod errors;
pub mod operators;
pub mod query;
pub mod registry;
pub mod search;
pub mod select;
pub mod utils;

pub use config::{ExpectedFault, OperatorConfig, SearchConfig};
pub use document::{Callable, ConsumptionPolicy, LazyIter, Map, Range, Value, ValueType};
pub use errors::{Fault, FaultKind, SearchError, SearchResult};
pub use operators::{Argument, Context, GuardedOperator, Operator, OperatorKind};
pub use registry::Registry;
pub use search::{Matches, Search, SearchBuilder, dict_search};

/// Initializes logging from `log4rs.yaml` in the working directory.
///
/// # Errors
/// Returns an error when the file is missing or invalid.
pub fn init() -> Result<(), Box<dyn std::error::Error>> {
    utils::logger::init()
}
