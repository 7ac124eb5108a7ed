//! Projection: select specs and the include/exclude tree-walk.

mod parse;
mod project;
mod types;

pub use parse::compile_select;
pub use project::{prepare_select, project};
pub use types::{Mode, SelectNode, SelectSpec};
