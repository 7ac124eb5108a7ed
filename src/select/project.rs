use crate::document::{Map, Value};
use crate::errors::{SearchError, SearchResult};
use crate::operators::Context;
use crate::query::{Preparer, Trail, prepare_argument, with_selection};

use super::types::{Mode, SelectNode, SelectSpec};

/// Projects `doc` through `spec`. `None` means the value is omitted from
/// its parent.
///
/// Output keys keep the document's order. Under inclusion a non-mapping
/// value is omitted; under exclusion it is kept as is.
///
/// # Errors
/// Propagates unmapped faults raised by array selectors.
pub fn project(spec: &SelectSpec, doc: &Value, ctx: &Context<'_>) -> SearchResult<Option<Value>> {
    match spec {
        SelectSpec::Keep => Ok(Some(doc.clone())),
        SelectSpec::Drop => Ok(None),
        SelectSpec::Level { mode, fields } => {
            let Value::Map(map) = doc else {
                return Ok(match mode {
                    Mode::Include => None,
                    Mode::Exclude => Some(doc.clone()),
                });
            };
            let mut out = Map::with_capacity(map.len());
            for (key, value) in map {
                let projected = match (fields.get(key), mode) {
                    (Some(child), _) => project(child, value, ctx)?,
                    (None, Mode::Include) => None,
                    (None, Mode::Exclude) => Some(value.clone()),
                };
                if let Some(v) = projected {
                    out.insert(key.clone(), v);
                }
            }
            Ok(Some(Value::Map(out)))
        }
        SelectSpec::Select(node) => project_selection(node, doc, ctx),
    }
}

fn project_selection(node: &SelectNode, doc: &Value, ctx: &Context<'_>) -> SearchResult<Option<Value>> {
    let op = ctx
        .registry
        .operator(node.op)
        .ok_or_else(|| SearchError::UnknownOperator(node.name.clone()))?;
    let selected = op.apply(doc, &node.argument, ctx)?;
    project(&node.then, &selected, ctx)
}

/// Materializes consumable values the projection will read.
pub fn prepare_select(spec: &SelectSpec, doc: &mut Value, prep: &Preparer<'_>) {
    prepare_level(spec, doc, prep, &Trail::Root);
}

fn prepare_level(spec: &SelectSpec, doc: &mut Value, prep: &Preparer<'_>, trail: &Trail<'_>) {
    match spec {
        SelectSpec::Keep | SelectSpec::Drop => {}
        SelectSpec::Level { fields, .. } => {
            let Some(map) = doc.as_map_mut() else {
                return;
            };
            for (key, child) in fields {
                if let Some(value) = map.get_mut(key) {
                    prepare_level(child, value, prep, &Trail::Key(trail, key));
                }
            }
        }
        SelectSpec::Select(node) => {
            prep.materialize(doc, trail);
            if !prep.admits(node.op, doc) {
                return;
            }
            prepare_argument(&node.argument, doc, prep, trail);
            with_selection(&node.name, &node.argument, doc, prep, trail, |target, at| {
                prepare_level(&node.then, target, prep, at);
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{ConsumptionPolicy, LazyIter, ValueType};
    use crate::registry::Registry;
    use crate::select::compile_select;
    use serde_json::json;

    fn run(spec: serde_json::Value, doc: serde_json::Value) -> Option<Value> {
        let registry = Registry::with_builtins("$").unwrap();
        let spec = compile_select(&registry, &Value::from(spec)).unwrap();
        let doc = Value::from(doc);
        let policy = ConsumptionPolicy::default();
        let ctx = Context::new(&registry, &doc, &policy);
        project(&spec, &doc, &ctx).unwrap()
    }

    #[test]
    fn exclusion_drops_listed_keys() {
        let out = run(json!({"id": 0}), json!({"id": 1, "info": {"x": 1}}));
        assert_eq!(out, Some(Value::from(json!({"info": {"x": 1}}))));
    }

    #[test]
    fn inclusion_keeps_listed_keys_in_document_order() {
        let out = run(json!({"c": 1, "a": 1, "zz": 1}), json!({"a": 1, "b": 2, "c": 3}));
        let out = out.unwrap();
        let keys: Vec<&String> = out.as_map().unwrap().keys().collect();
        assert_eq!(keys, ["a", "c"]);
    }

    #[test]
    fn nested_levels() {
        let doc = json!({"id": 1, "info": {"x": 1, "y": 2}, "tag": "t"});
        assert_eq!(run(json!({"info": {"y": 1}}), doc.clone()), Some(Value::from(json!({"info": {"y": 2}}))));
        assert_eq!(
            run(json!({"info": {"y": 0}}), doc.clone()),
            Some(Value::from(json!({"id": 1, "info": {"x": 1}, "tag": "t"})))
        );
        // a scalar under a nested inclusion has nothing to include
        assert_eq!(run(json!({"tag": {"x": 1}}), doc.clone()), Some(Value::map()));
        assert_eq!(run(json!({"tag": {"x": 0}}), doc), Some(Value::from(json!({"id": 1, "info": {"x": 1, "y": 2}, "tag": "t"}))));
    }

    #[test]
    fn selectors_feed_nested_projection() {
        let doc = json!({"rows": [{"k": 1, "v": "a"}, {"k": 2, "v": "b"}, {"k": 3, "v": "c"}]});
        assert_eq!(
            run(json!({"rows": {"$index": [-1, {"v": 1}]}}), doc.clone()),
            Some(Value::from(json!({"rows": {"v": "c"}})))
        );
        assert_eq!(
            run(json!({"rows": {"$slice": ["::2", 1]}}), doc.clone()),
            Some(Value::from(json!({"rows": [{"k": 1, "v": "a"}, {"k": 3, "v": "c"}]})))
        );
        assert_eq!(
            run(json!({"rows": {"$where": [{"k": {"$gte": 2}}, {"$index": [0, {"k": 1}]}]}}), doc),
            Some(Value::from(json!({"rows": {"k": 2}})))
        );
    }

    #[test]
    fn preparation_follows_the_selected_elements() {
        let registry = Registry::with_builtins("$").unwrap();
        let spec = compile_select(&registry, &Value::from(json!({"rows": {"$slice": ["1:", {"$index": [[1], {"$index": [0, {"xs": {"$slice": [":", 1]}}]}]}]}}))).unwrap();
        let rows = (0..3)
            .map(|i| [("xs".to_string(), Value::Iter(LazyIter::new(vec![Value::Int(i)])))].into_iter().collect())
            .collect();
        let mut doc: Value = [("rows".to_string(), Value::List(rows))].into_iter().collect();
        let policy = ConsumptionPolicy::new().consume(ValueType::Iter);
        let root = doc.clone();
        prepare_select(&spec, &mut doc, &Preparer::new(&registry, &policy, &root));
        let kinds: Vec<ValueType> = (0..3).filter_map(|i| doc.get_path(&format!("rows.{i}.xs"))).map(Value::value_type).collect();
        assert_eq!(kinds, [ValueType::Iter, ValueType::Iter, ValueType::List]);

        let ctx = Context::new(&registry, &doc, &policy);
        assert_eq!(project(&spec, &doc, &ctx).unwrap(), Some(Value::from(json!({"rows": {"xs": [2]}}))));
    }
}
