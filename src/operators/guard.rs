//! Guard pipeline wrapped around every operator's raw implementation.
//!
//! Stages run in a fixed order: allowed types, ignored types, then the
//! raw call with expected-fault recovery. The type stages are rebuilt from
//! [`Guards`] whenever a guard is changed.

use crate::document::{Value, ValueType};
use crate::errors::{FaultKind, SearchError, SearchResult};

use super::{Argument, Context, Operator, OperatorKind};

/// Guard configuration of one operator.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Guards {
    pub allowed_types: Option<Vec<ValueType>>,
    pub ignored_types: Option<Vec<ValueType>>,
    pub expected_faults: Vec<(FaultKind, Value)>,
}

impl Guards {
    #[must_use]
    pub fn allow(mut self, types: &[ValueType]) -> Self {
        self.allowed_types = Some(types.to_vec());
        self
    }

    #[must_use]
    pub fn ignore(mut self, types: &[ValueType]) -> Self {
        self.ignored_types = Some(types.to_vec());
        self
    }

    #[must_use]
    pub fn expect(mut self, kind: FaultKind, fallback: Value) -> Self {
        self.expected_faults.push((kind, fallback));
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
enum TypeStage {
    Allow(Vec<ValueType>),
    Ignore(Vec<ValueType>),
}

impl TypeStage {
    fn passes(&self, ty: ValueType) -> bool {
        match self {
            Self::Allow(types) => types.contains(&ty),
            Self::Ignore(types) => !types.contains(&ty),
        }
    }
}

/// An operator together with its guards and effective default.
pub struct GuardedOperator {
    op: Box<dyn Operator>,
    default_return: Value,
    guards: Guards,
    stages: Vec<TypeStage>,
    // most specific kind first
    faults: Vec<(FaultKind, Value)>,
}

impl GuardedOperator {
    /// Wraps `op` with the guards it ships with.
    ///
    /// # Errors
    /// Returns [`SearchError::InvalidOperator`] when the operator's name is
    /// empty or not a plain token.
    pub fn new(op: Box<dyn Operator>) -> SearchResult<Self> {
        let name = op.name();
        if name.is_empty() || name.chars().any(|c| c.is_whitespace() || c == '.') {
            return Err(SearchError::InvalidOperator(format!("'{name}' is not a valid operator name")));
        }
        let default_return = op.default_return();
        let guards = op.default_guards();
        let mut guarded =
            Self { op, default_return, guards, stages: Vec::new(), faults: Vec::new() };
        guarded.rebuild();
        Ok(guarded)
    }

    #[must_use]
    pub fn name(&self) -> &str {
        self.op.name()
    }

    #[must_use]
    pub fn kind(&self) -> OperatorKind {
        self.op.kind()
    }

    #[must_use]
    pub const fn default_return(&self) -> &Value {
        &self.default_return
    }

    #[must_use]
    pub const fn guards(&self) -> &Guards {
        &self.guards
    }

    /// Whether the type guards let a value of type `ty` reach the call.
    #[must_use]
    pub fn admits(&self, ty: ValueType) -> bool {
        self.stages.iter().all(|s| s.passes(ty))
    }

    pub(crate) fn inner(&self) -> &dyn Operator {
        self.op.as_ref()
    }

    pub fn set_allowed_types(&mut self, types: Option<Vec<ValueType>>) {
        self.guards.allowed_types = types;
        self.rebuild();
    }

    pub fn set_ignored_types(&mut self, types: Option<Vec<ValueType>>) {
        self.guards.ignored_types = types;
        self.rebuild();
    }

    pub fn set_expected_faults(&mut self, faults: Vec<(FaultKind, Value)>) {
        self.guards.expected_faults = faults;
        self.rebuild();
    }

    /// Replaces the default. The new value must have the declared type.
    ///
    /// # Errors
    /// Returns [`SearchError::DefaultTypeMismatch`] on a type mismatch.
    pub fn set_default_return(&mut self, value: Value) -> SearchResult<()> {
        let expected = self.op.default_return().value_type();
        let found = value.value_type();
        if expected != found {
            return Err(SearchError::DefaultTypeMismatch {
                op: self.name().to_string(),
                expected: expected.to_string(),
                found: found.to_string(),
            });
        }
        self.default_return = value;
        Ok(())
    }

    fn rebuild(&mut self) {
        let mut stages = Vec::with_capacity(2);
        if let Some(types) = &self.guards.allowed_types {
            stages.push(TypeStage::Allow(types.clone()));
        }
        if let Some(types) = &self.guards.ignored_types {
            stages.push(TypeStage::Ignore(types.clone()));
        }
        let mut faults = self.guards.expected_faults.clone();
        // stable: equal depths keep configuration order
        faults.sort_by_key(|(kind, _)| std::cmp::Reverse(kind.depth()));
        self.stages = stages;
        self.faults = faults;
    }

    fn recover(&self, kind: FaultKind) -> Option<&Value> {
        self.faults.iter().find(|(k, _)| kind.is_a(*k)).map(|(_, v)| v)
    }

    /// Runs the guard pipeline around the raw implementation.
    ///
    /// # Errors
    /// Propagates structural errors and faults that no expected-fault entry
    /// covers.
    pub fn apply(&self, value: &Value, argument: &Argument, ctx: &Context<'_>) -> SearchResult<Value> {
        if !self.admits(value.value_type()) {
            return Ok(self.default_return.clone());
        }
        match self.op.call(value, argument, ctx) {
            Err(SearchError::Fault(fault)) => match self.recover(fault.kind) {
                Some(fallback) => {
                    log::trace!("{}: recovered {} fault: {}", self.name(), fault.kind, fault.message);
                    Ok(fallback.clone())
                }
                None => Err(SearchError::Fault(fault)),
            },
            other => other,
        }
    }
}

impl std::fmt::Debug for GuardedOperator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GuardedOperator")
            .field("name", &self.name())
            .field("kind", &self.kind())
            .field("default_return", &self.default_return)
            .field("guards", &self.guards)
            .finish()
    }
}
