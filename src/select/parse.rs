use indexmap::IndexMap;

use crate::document::{Map, Value};
use crate::errors::{SearchError, SearchResult};
use crate::operators::OperatorKind;
use crate::query::Compiler;
use crate::registry::Registry;

use super::types::{Mode, SelectNode, SelectSpec};

/// Validates and compiles a select spec.
///
/// Every leaf must be `0`/`1` (or a boolean) and all children of one mapping
/// must agree on inclusion versus exclusion. An array selector must be the
/// only key of its mapping; its filter is compiled as a match query and its
/// continuation as a nested select spec.
///
/// # Errors
/// Returns [`SearchError::NotAMapping`] for a non-mapping spec,
/// [`SearchError::MixedProjection`] for a level mixing modes, and
/// [`SearchError::Structure`] for malformed leaves or misplaced operators.
pub fn compile_select(registry: &Registry, spec: &Value) -> SearchResult<SelectSpec> {
    let Value::Map(map) = spec else {
        return Err(SearchError::NotAMapping(format!("select spec, got {}", spec.value_type())));
    };
    let compiler = Compiler::new(registry);
    compile_level(&compiler, map, "")
}

fn compile_level(compiler: &Compiler<'_>, map: &Map, path: &str) -> SearchResult<SelectSpec> {
    if map.is_empty() {
        return Ok(SelectSpec::Keep);
    }
    let registry = compiler.registry();
    if let Some((key, id)) = map.keys().find_map(|k| registry.resolve(k).map(|id| (k, id))) {
        let op = registry.operator(id).ok_or_else(|| SearchError::UnknownOperator(key.clone()))?;
        if op.kind() != OperatorKind::ArraySelector {
            return Err(SearchError::Structure(format!(
                "only array selectors may appear in a select spec, found '{key}' at '{}'",
                display(path)
            )));
        }
        if map.len() != 1 {
            return Err(SearchError::Structure(format!("'{key}' must be the only key at '{}'", display(path))));
        }
        let compiled = op.inner().compile(&map[key.as_str()], compiler)?;
        let Some(rest) = compiled.continuation else {
            return Err(SearchError::invalid(op.name(), "array selector without a continuation"));
        };
        let then = compile_continuation(compiler, &rest, path)?;
        return Ok(SelectSpec::Select(SelectNode {
            op: id,
            name: op.name().to_string(),
            argument: compiled.argument,
            then: Box::new(then),
        }));
    }

    let mut fields = IndexMap::with_capacity(map.len());
    let mut mode = None;
    for (key, value) in map {
        let child_path = if path.is_empty() { key.clone() } else { format!("{path}.{key}") };
        let child = compile_child(compiler, value, &child_path)?;
        match mode {
            None => mode = Some(child.mode()),
            Some(m) if m != child.mode() => {
                log::warn!("select spec mixes inclusion and exclusion at '{}'", display(path));
                return Err(SearchError::MixedProjection(display(path).to_string()));
            }
            Some(_) => {}
        }
        fields.insert(key.clone(), child);
    }
    // non-empty map, so a mode was recorded
    let mode = mode.unwrap_or(Mode::Include);
    Ok(SelectSpec::Level { mode, fields })
}

fn compile_child(compiler: &Compiler<'_>, value: &Value, path: &str) -> SearchResult<SelectSpec> {
    match value {
        Value::Bool(true) | Value::Int(1) => Ok(SelectSpec::Keep),
        Value::Bool(false) | Value::Int(0) => Ok(SelectSpec::Drop),
        Value::Map(map) => compile_level(compiler, map, path),
        other => Err(SearchError::Structure(format!("select leaf at '{path}' must be 0 or 1, got {other}"))),
    }
}

fn compile_continuation(compiler: &Compiler<'_>, value: &Value, path: &str) -> SearchResult<SelectSpec> {
    match value {
        Value::Bool(true) | Value::Int(1) => Ok(SelectSpec::Keep),
        Value::Map(map) => compile_level(compiler, map, path),
        other => Err(SearchError::Structure(format!(
            "selector continuation at '{}' must be 1 or a select spec, got {other}",
            display(path)
        ))),
    }
}

fn display(path: &str) -> &str {
    if path.is_empty() { "<root>" } else { path }
}
