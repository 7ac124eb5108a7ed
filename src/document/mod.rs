//! Document model: the in-memory tree that queries and select specs walk.
pub mod consume;
mod convert;
pub mod lazy;
pub mod value;

pub use consume::{Consumption, ConsumptionPolicy};
pub use lazy::{LazyIter, Range};
pub use value::{Callable, Map, Value, ValueType};
