use indexmap::IndexMap;

use crate::operators::Argument;
use crate::registry::OpId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Only listed keys survive.
    Include,
    /// Every key survives except the excluded ones.
    Exclude,
}

/// A validated select spec.
#[derive(Debug, Clone)]
pub enum SelectSpec {
    /// `1`: keep the whole value.
    Keep,
    /// `0`: drop the key.
    Drop,
    Level { mode: Mode, fields: IndexMap<String, SelectSpec> },
    Select(SelectNode),
}

/// An array selector whose selection is projected through `then`.
#[derive(Debug, Clone)]
pub struct SelectNode {
    pub op: OpId,
    pub name: String,
    pub argument: Argument,
    pub then: Box<SelectSpec>,
}

impl SelectSpec {
    /// Mode this node imposes on the mapping that contains it.
    #[must_use]
    pub const fn mode(&self) -> Mode {
        match self {
            Self::Keep | Self::Select(_) => Mode::Include,
            Self::Drop => Mode::Exclude,
            Self::Level { mode, .. } => *mode,
        }
    }

    pub(crate) fn filters_elements(&self) -> bool {
        match self {
            Self::Keep | Self::Drop => false,
            Self::Level { fields, .. } => fields.values().any(Self::filters_elements),
            Self::Select(node) => node.argument.filters_elements() || node.then.filters_elements(),
        }
    }
}
