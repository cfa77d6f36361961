//! Variable and parameter providers consulted by script engines.

use serde_json::{Map, Value};
use std::path::Path;
use std::sync::{Arc, OnceLock};

use crate::context::Environment;
use crate::error::RecipeError;
use crate::script::{is_scripted, EvaluationContext, ScriptNodeResolver, ScriptingManager};

/// Exposes the caller-supplied environment to scripts as `parameters`.
///
/// Bound once per `execute` call.
#[derive(Debug, Clone, Default)]
pub struct ParametersProvider {
    environment: Environment,
}

impl ParametersProvider {
    pub fn new(environment: Environment) -> Self {
        Self { environment }
    }

    /// Get a parameter value.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.environment.get(name)
    }

    /// All parameter values.
    pub fn values(&self) -> &Map<String, Value> {
        self.environment.values()
    }
}

/// Exposes a recipe's `variables` block to scripts.
///
/// Values may themselves be scripted. They are evaluated on the first
/// [`VariablesProvider::resolve`] call and every later call, including calls
/// through clones handed to nested recipes, sees that same snapshot.
#[derive(Debug, Clone, Default)]
pub struct VariablesProvider {
    variables: Map<String, Value>,
    has_scripts: bool,
    resolved: Arc<OnceLock<Map<String, Value>>>,
}

impl VariablesProvider {
    pub fn new(variables: Map<String, Value>) -> Self {
        let has_scripts = variables.values().any(contains_script);
        Self {
            variables,
            has_scripts,
            resolved: Arc::new(OnceLock::new()),
        }
    }

    /// Get a declared value, unresolved.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.variables.get(name)
    }

    /// Declared values, unresolved.
    pub fn values(&self) -> &Map<String, Value> {
        &self.variables
    }

    /// Evaluate scripted values against the parameters and the declared values.
    ///
    /// Evaluation happens once; later calls return the cached snapshot.
    pub fn resolve(
        &self,
        scripting: &ScriptingManager,
        parameters: &ParametersProvider,
        base_path: &Path,
    ) -> Result<Map<String, Value>, RecipeError> {
        if !self.has_scripts {
            return Ok(self.variables.clone());
        }
        if let Some(resolved) = self.resolved.get() {
            return Ok(resolved.clone());
        }

        let ctx = EvaluationContext::new(parameters, base_path).with_variables(&self.variables);
        let resolver = ScriptNodeResolver::new(scripting, &ctx);

        let mut resolved = self.variables.clone();
        for value in resolved.values_mut() {
            resolver.resolve(value)?;
        }

        // A concurrent first call may have won; keep its snapshot.
        Ok(self.resolved.get_or_init(|| resolved).clone())
    }
}

fn contains_script(value: &Value) -> bool {
    match value {
        Value::String(s) => is_scripted(s),
        Value::Array(items) => items.iter().any(contains_script),
        Value::Object(map) => map.values().any(contains_script),
        _ => false,
    }
}
