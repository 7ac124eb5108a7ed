//! Leaf predicates: `(value, argument) -> bool`.

use std::cmp::Ordering;

use crate::document::{Callable, Value, ValueType};
use crate::errors::{Fault, FaultKind, SearchError, SearchResult};
use crate::query::Compiler;

use super::{Argument, Compiled, Context, Guards, Operator, OperatorKind, literal, unexpected_argument};

type PredicateFn = fn(&Value, &Value) -> Result<bool, Fault>;

/// A leaf predicate backed by a plain function.
pub struct Predicate {
    name: &'static str,
    test: PredicateFn,
    guards: fn() -> Guards,
}

impl Predicate {
    const fn new(name: &'static str, test: PredicateFn) -> Self {
        Self { name, test, guards: no_guards }
    }

    const fn recovering_type_faults(name: &'static str, test: PredicateFn) -> Self {
        Self { name, test, guards: type_faults_are_false }
    }
}

fn no_guards() -> Guards {
    Guards::default()
}

fn type_faults_are_false() -> Guards {
    Guards::default().expect(FaultKind::Type, Value::Bool(false))
}

impl Operator for Predicate {
    fn name(&self) -> &str {
        self.name
    }

    fn kind(&self) -> OperatorKind {
        OperatorKind::LowLevel
    }

    fn default_return(&self) -> Value {
        Value::Bool(false)
    }

    fn default_guards(&self) -> Guards {
        (self.guards)()
    }

    fn call(&self, value: &Value, argument: &Argument, _ctx: &Context<'_>) -> SearchResult<Value> {
        let arg = literal(self.name, argument)?;
        Ok(Value::Bool((self.test)(value, arg)?))
    }
}

fn eq(v: &Value, a: &Value) -> Result<bool, Fault> {
    Ok(v == a)
}

fn ne(v: &Value, a: &Value) -> Result<bool, Fault> {
    Ok(v != a)
}

fn gt(v: &Value, a: &Value) -> Result<bool, Fault> {
    Ok(v.try_cmp(a)? == Ordering::Greater)
}

fn gte(v: &Value, a: &Value) -> Result<bool, Fault> {
    Ok(v.try_cmp(a)? != Ordering::Less)
}

fn lt(v: &Value, a: &Value) -> Result<bool, Fault> {
    Ok(v.try_cmp(a)? == Ordering::Less)
}

fn lte(v: &Value, a: &Value) -> Result<bool, Fault> {
    Ok(v.try_cmp(a)? != Ordering::Greater)
}

fn is(v: &Value, a: &Value) -> Result<bool, Fault> {
    Ok(v.is_identical(a))
}

fn is_in(v: &Value, a: &Value) -> Result<bool, Fault> {
    a.contains(v)
}

fn not_in(v: &Value, a: &Value) -> Result<bool, Fault> {
    Ok(!a.contains(v)?)
}

fn cont(v: &Value, a: &Value) -> Result<bool, Fault> {
    v.contains(a)
}

fn ncont(v: &Value, a: &Value) -> Result<bool, Fault> {
    Ok(!v.contains(a)?)
}

/// Unanchored regular-expression search over string values.
pub struct RegexOp;

impl Operator for RegexOp {
    fn name(&self) -> &str {
        "regex"
    }

    fn kind(&self) -> OperatorKind {
        OperatorKind::LowLevel
    }

    fn default_return(&self) -> Value {
        Value::Bool(false)
    }

    fn default_guards(&self) -> Guards {
        Guards::default().allow(&[ValueType::Str])
    }

    fn compile(&self, argument: &Value, _compiler: &Compiler<'_>) -> SearchResult<Compiled> {
        let pattern = match argument {
            Value::Regex(r) => r.clone(),
            Value::Str(s) => regex::Regex::new(s).map_err(|e| SearchError::invalid("regex", e.to_string()))?,
            other => {
                return Err(SearchError::invalid(
                    "regex",
                    format!("expected a string or compiled pattern, got {}", other.value_type()),
                ));
            }
        };
        Ok(Compiled::new(Argument::Pattern(pattern)))
    }

    fn call(&self, value: &Value, argument: &Argument, _ctx: &Context<'_>) -> SearchResult<Value> {
        let Argument::Pattern(re) = argument else {
            return Err(unexpected_argument("regex", argument));
        };
        match value {
            Value::Str(s) => Ok(Value::Bool(re.is_match(s))),
            other => Err(Fault::type_error(format!("expected string, got {}", other.value_type())).into()),
        }
    }
}

/// Applies a caller-supplied single-argument predicate.
pub struct ExprOp;

impl Operator for ExprOp {
    fn name(&self) -> &str {
        "expr"
    }

    fn kind(&self) -> OperatorKind {
        OperatorKind::LowLevel
    }

    fn default_return(&self) -> Value {
        Value::Bool(false)
    }

    fn compile(&self, argument: &Value, _compiler: &Compiler<'_>) -> SearchResult<Compiled> {
        match argument {
            Value::Func(Callable::Unary(_)) => Ok(Compiled::new(Argument::Value(argument.clone()))),
            _ => Err(SearchError::invalid("expr", "expected a single-argument callable")),
        }
    }

    fn call(&self, value: &Value, argument: &Argument, _ctx: &Context<'_>) -> SearchResult<Value> {
        let Value::Func(Callable::Unary(f)) = literal("expr", argument)? else {
            return Err(unexpected_argument("expr", argument));
        };
        // anything but a boolean counts as a miss
        Ok(Value::Bool(matches!(f(value)?, Value::Bool(true))))
    }
}

/// Type membership check against one type tag or a list of them.
pub struct InstOp;

impl Operator for InstOp {
    fn name(&self) -> &str {
        "inst"
    }

    fn kind(&self) -> OperatorKind {
        OperatorKind::LowLevel
    }

    fn default_return(&self) -> Value {
        Value::Bool(false)
    }

    fn compile(&self, argument: &Value, _compiler: &Compiler<'_>) -> SearchResult<Compiled> {
        let types = match argument {
            Value::Types(t) => t.clone(),
            Value::List(items) => {
                let mut types = Vec::with_capacity(items.len());
                for item in items {
                    match item {
                        Value::Types(t) => types.extend_from_slice(t),
                        other => {
                            return Err(SearchError::invalid(
                                "inst",
                                format!("expected type tags, got {}", other.value_type()),
                            ));
                        }
                    }
                }
                types
            }
            other => {
                return Err(SearchError::invalid("inst", format!("expected type tags, got {}", other.value_type())));
            }
        };
        Ok(Compiled::new(Argument::Value(Value::Types(types))))
    }

    fn call(&self, value: &Value, argument: &Argument, _ctx: &Context<'_>) -> SearchResult<Value> {
        let Value::Types(types) = literal("inst", argument)? else {
            return Err(unexpected_argument("inst", argument));
        };
        Ok(Value::Bool(types.contains(&value.value_type())))
    }
}

/// Compares the current value with another field of the top-level document.
pub struct CompOp;

fn key_path(argument: &Value) -> Option<Vec<String>> {
    match argument {
        Value::Str(s) => Some(s.split('.').map(str::to_string).collect()),
        Value::List(parts) => parts
            .iter()
            .map(|p| match p {
                Value::Str(s) => Some(s.clone()),
                Value::Int(i) => Some(i.to_string()),
                _ => None,
            })
            .collect(),
        _ => None,
    }
}

impl Operator for CompOp {
    fn name(&self) -> &str {
        "comp"
    }

    fn kind(&self) -> OperatorKind {
        OperatorKind::LowLevel
    }

    fn default_return(&self) -> Value {
        Value::Bool(false)
    }

    fn compile(&self, argument: &Value, _compiler: &Compiler<'_>) -> SearchResult<Compiled> {
        let Some([path, func]) = argument.as_list().map(Vec::as_slice).and_then(|s| <&[Value; 2]>::try_from(s).ok())
        else {
            return Err(SearchError::invalid("comp", "expected [key_path, comparator]"));
        };
        let Some(path) = key_path(path) else {
            return Err(SearchError::invalid("comp", "key path must be a string or a list of keys"));
        };
        if !matches!(func, Value::Func(Callable::Binary(_))) {
            return Err(SearchError::invalid("comp", "comparator must be a two-argument callable"));
        }
        let path = Value::List(path.into_iter().map(Value::Str).collect());
        Ok(Compiled::new(Argument::Value(Value::List(vec![path, func.clone()]))))
    }

    fn call(&self, value: &Value, argument: &Argument, ctx: &Context<'_>) -> SearchResult<Value> {
        let parts = literal("comp", argument)?.as_list().map(Vec::as_slice);
        let Some([Value::List(path), Value::Func(Callable::Binary(f))]) = parts else {
            return Err(unexpected_argument("comp", argument));
        };
        let segments: Vec<&str> = path.iter().filter_map(Value::as_str).collect();
        let Some(other) = ctx.root.get_segments(&segments) else {
            return Ok(Value::Bool(false));
        };
        match f(value, other)? {
            Value::Bool(b) => Ok(Value::Bool(b)),
            _ => Err(SearchError::Comparator(segments.join("."))),
        }
    }
}

pub(crate) fn operators() -> Vec<Box<dyn Operator>> {
    vec![
        Box::new(Predicate::new("eq", eq)),
        Box::new(Predicate::new("ne", ne)),
        Box::new(Predicate::recovering_type_faults("gt", gt)),
        Box::new(Predicate::recovering_type_faults("gte", gte)),
        Box::new(Predicate::recovering_type_faults("lt", lt)),
        Box::new(Predicate::recovering_type_faults("lte", lte)),
        Box::new(Predicate::new("is", is)),
        Box::new(Predicate::recovering_type_faults("in", is_in)),
        Box::new(Predicate::recovering_type_faults("nin", not_in)),
        Box::new(Predicate::recovering_type_faults("cont", cont)),
        Box::new(Predicate::recovering_type_faults("ncont", ncont)),
        Box::new(RegexOp),
        Box::new(ExprOp),
        Box::new(InstOp),
        Box::new(CompOp),
    ]
}
