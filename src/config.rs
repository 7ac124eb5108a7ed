//! Search configuration loaded from TOML.
//!
//! Precedence: environment > config file > defaults.
//!
//! ```toml
//! sentinel = "$"
//! consumable = ["iter"]
//!
//! [ops.gt]
//! allowed_types = ["int", "float"]
//! expected_faults = [{ kind = "type", value = false }]
//! ```

use std::path::Path;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::document::{Value, ValueType};
use crate::errors::{FaultKind, SearchError, SearchResult};
use crate::operators::GuardedOperator;

pub const ENV_SENTINEL: &str = "DOCSEARCH_SENTINEL";

/// One `kind → value` recovery entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpectedFault {
    pub kind: FaultKind,
    pub value: serde_json::Value,
}

/// Per-operator overrides. Unset fields keep the operator's shipped guards;
/// an empty `expected_faults` list clears the shipped mapping.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OperatorConfig {
    pub default: Option<serde_json::Value>,
    pub allowed_types: Option<Vec<ValueType>>,
    pub ignored_types: Option<Vec<ValueType>>,
    pub expected_faults: Option<Vec<ExpectedFault>>,
}

impl OperatorConfig {
    #[must_use]
    pub fn default_value(mut self, value: impl Into<serde_json::Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    #[must_use]
    pub fn allowed_types(mut self, types: Vec<ValueType>) -> Self {
        self.allowed_types = Some(types);
        self
    }

    #[must_use]
    pub fn ignored_types(mut self, types: Vec<ValueType>) -> Self {
        self.ignored_types = Some(types);
        self
    }

    #[must_use]
    pub fn expect(mut self, kind: FaultKind, value: impl Into<serde_json::Value>) -> Self {
        self.expected_faults.get_or_insert_with(Vec::new).push(ExpectedFault { kind, value: value.into() });
        self
    }

    #[must_use]
    pub fn clear_expected_faults(mut self) -> Self {
        self.expected_faults = Some(Vec::new());
        self
    }

    /// Applies every set field to `op`. The default is checked first so a
    /// rejected override leaves the operator unchanged.
    ///
    /// # Errors
    /// Returns [`SearchError::DefaultTypeMismatch`] when `default` does not
    /// have the operator's declared result type.
    pub fn apply_to(&self, op: &mut GuardedOperator) -> SearchResult<()> {
        if let Some(default) = &self.default {
            op.set_default_return(Value::from(default.clone()))?;
        }
        if let Some(types) = &self.allowed_types {
            op.set_allowed_types(Some(types.clone()));
        }
        if let Some(types) = &self.ignored_types {
            op.set_ignored_types(Some(types.clone()));
        }
        if let Some(faults) = &self.expected_faults {
            op.set_expected_faults(faults.iter().map(|f| (f.kind, Value::from(f.value.clone()))).collect());
        }
        log::debug!("configured operator '{}': {:?}", op.name(), op.guards());
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    pub sentinel: String,
    /// Lazy types materialized in place when matched.
    pub consumable: Vec<ValueType>,
    pub ops: IndexMap<String, OperatorConfig>,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self { sentinel: "$".to_string(), consumable: Vec::new(), ops: IndexMap::new() }
    }
}

impl SearchConfig {
    /// # Errors
    /// Returns [`SearchError::Config`] for malformed TOML or unknown type and
    /// fault names.
    pub fn from_toml_str(s: &str) -> SearchResult<Self> {
        Ok(toml::from_str(s)?)
    }

    /// Reads `path`, then applies environment overrides.
    ///
    /// # Errors
    /// Returns [`SearchError::Config`] when the file cannot be read or parsed.
    pub fn load(path: &Path) -> SearchResult<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| SearchError::Config(format!("{}: {e}", path.display())))?;
        let cfg = Self::from_toml_str(&text)?;
        log::info!("loaded search config from {}", path.display());
        Ok(cfg.apply_env())
    }

    #[must_use]
    pub fn apply_env(self) -> Self {
        self.apply_env_from(|key| std::env::var(key).ok())
    }

    /// Applies overrides read through `lookup` instead of the process
    /// environment.
    #[must_use]
    pub fn apply_env_from(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(s) = lookup(ENV_SENTINEL).filter(|s| !s.is_empty()) {
            self.sentinel = s;
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operators::{Argument, Context, Operator, OperatorKind};
    use crate::registry::Registry;
    use serde_json::json;

    #[test]
    fn parses_full_config() {
        let cfg = SearchConfig::from_toml_str(
            r#"
            sentinel = "~"
            consumable = ["iter"]

            [ops.gt]
            allowed_types = ["int", "float"]
            expected_faults = [{ kind = "type", value = true }]

            [ops.in]
            expected_faults = []
            "#,
        )
        .unwrap();
        assert_eq!(cfg.sentinel, "~");
        assert_eq!(cfg.consumable, vec![ValueType::Iter]);
        let gt = &cfg.ops["gt"];
        assert_eq!(gt.allowed_types, Some(vec![ValueType::Int, ValueType::Float]));
        assert_eq!(gt.expected_faults, Some(vec![ExpectedFault { kind: FaultKind::Type, value: json!(true) }]));
        assert_eq!(cfg.ops["in"].expected_faults, Some(vec![]));
    }

    #[test]
    fn rejects_unknown_type_names() {
        let err = SearchConfig::from_toml_str("consumable = [\"generator\"]").unwrap_err();
        assert!(matches!(err, SearchError::Config(_)));
    }

    #[test]
    fn env_overrides_file_sentinel() {
        let cfg = SearchConfig::from_toml_str("sentinel = \"~\"").unwrap();
        let cfg = cfg.apply_env_from(|k| (k == ENV_SENTINEL).then(|| "@".to_string()));
        assert_eq!(cfg.sentinel, "@");
        let cfg = SearchConfig::default().apply_env_from(|_| Some(String::new()));
        assert_eq!(cfg.sentinel, "$");
    }

    #[test]
    fn load_reads_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("docsearch.toml");
        std::fs::write(&path, "consumable = [\"range\"]\n").unwrap();
        let cfg = SearchConfig::load(&path).unwrap();
        assert_eq!(cfg.consumable, vec![ValueType::Range]);
        assert!(SearchConfig::load(&dir.path().join("missing.toml")).is_err());
    }

    struct Boom;

    impl Operator for Boom {
        fn name(&self) -> &str {
            "boom"
        }
        fn kind(&self) -> OperatorKind {
            OperatorKind::LowLevel
        }
        fn default_return(&self) -> Value {
            Value::Bool(false)
        }
        fn call(&self, _: &Value, _: &Argument, _: &Context<'_>) -> SearchResult<Value> {
            Err(crate::errors::Fault::new(FaultKind::ZeroDivision, "division by zero").into())
        }
    }

    #[test]
    fn apply_to_sets_guards_and_default() {
        let mut registry = Registry::new("$");
        registry.register(Box::new(Boom)).unwrap();
        let config = OperatorConfig::default()
            .default_value(true)
            .ignored_types(vec![ValueType::Str])
            .expect(FaultKind::Arithmetic, false);
        registry.configure("boom", &config).unwrap();
        let op = registry.get("boom").unwrap();
        assert_eq!(op.default_return(), &Value::Bool(true));
        assert_eq!(op.guards().ignored_types, Some(vec![ValueType::Str]));

        let policy = crate::document::ConsumptionPolicy::default();
        let root = Value::Null;
        let ctx = Context::new(&registry, &root, &policy);
        let arg = Argument::Value(Value::Null);
        assert_eq!(op.apply(&Value::Int(1), &arg, &ctx).unwrap(), Value::Bool(false));
        assert_eq!(op.apply(&Value::from("s"), &arg, &ctx).unwrap(), Value::Bool(true));
    }

    #[test]
    fn mismatched_default_leaves_operator_untouched() {
        let mut registry = Registry::new("$");
        registry.register(Box::new(Boom)).unwrap();
        let config = OperatorConfig::default().default_value(json!([])).allowed_types(vec![ValueType::Int]);
        let err = registry.configure("boom", &config).unwrap_err();
        assert!(matches!(err, SearchError::DefaultTypeMismatch { .. }));
        assert_eq!(registry.get("boom").unwrap().guards().allowed_types, None);
    }
}
