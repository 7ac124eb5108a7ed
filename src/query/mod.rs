//! Match queries: compilation, materialization and evaluation.

mod eval;
mod parse;
mod prepare;
mod types;

pub use eval::eval_query;
pub use parse::Compiler;
pub use prepare::{Preparer, prepare_query};
pub(crate) use prepare::{Trail, prepare_argument, with_selection};
pub use types::{MatchNode, Query, Term};
