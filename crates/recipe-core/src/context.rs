//! Execution and step contexts.

use serde_json::{Map, Value};
use std::sync::Arc;

use crate::descriptor::RecipeDescriptor;

/// Caller-supplied key/value bag shared by a run and all of its nested runs.
///
/// Cloning shares the same underlying map.
#[derive(Debug, Clone, Default)]
pub struct Environment(Arc<Map<String, Value>>);

impl Environment {
    /// Create an environment from a JSON object.
    pub fn new(values: Map<String, Value>) -> Self {
        Self(Arc::new(values))
    }

    /// Get a value.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    /// Get a value as a string.
    pub fn get_str(&self, name: &str) -> Option<String> {
        self.0.get(name).map(|v| match v {
            Value::String(s) => s.clone(),
            _ => v.to_string(),
        })
    }

    /// All values.
    pub fn values(&self) -> &Map<String, Value> {
        &self.0
    }

    /// Returns true if both handles point at the same bag.
    pub fn ptr_eq(&self, other: &Environment) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl From<Map<String, Value>> for Environment {
    fn from(values: Map<String, Value>) -> Self {
        Self::new(values)
    }
}

impl FromIterator<(String, Value)> for Environment {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

/// State for one `execute` call.
#[derive(Debug, Clone)]
pub struct ExecutionContext {
    /// Unique execution ID.
    pub execution_id: String,

    /// Caller-supplied environment.
    pub environment: Environment,

    /// Recipe being executed.
    pub descriptor: Arc<RecipeDescriptor>,
}

impl ExecutionContext {
    /// Create a new execution context.
    pub fn new(
        execution_id: impl Into<String>,
        descriptor: Arc<RecipeDescriptor>,
        environment: Environment,
    ) -> Self {
        Self {
            execution_id: execution_id.into(),
            environment,
            descriptor,
        }
    }

    /// Build the context for one parsed step.
    pub fn step(&self, name: impl Into<String>, step: Value) -> StepContext {
        StepContext {
            name: name.into(),
            step,
            execution_id: self.execution_id.clone(),
            environment: self.environment.clone(),
            descriptor: self.descriptor.clone(),
            inner_recipes: Vec::new(),
        }
    }
}

/// Context handed to step handlers.
#[derive(Debug, Clone)]
pub struct StepContext {
    /// Declared step name.
    pub name: String,

    /// Raw step object; scripted leaves are rewritten in place before dispatch.
    pub step: Value,

    /// Execution ID of the owning run.
    pub execution_id: String,

    /// Environment of the owning run.
    pub environment: Environment,

    /// Recipe the step belongs to.
    pub descriptor: Arc<RecipeDescriptor>,

    /// Recipes to run after this step succeeds, in order.
    pub inner_recipes: Vec<Arc<RecipeDescriptor>>,
}

impl StepContext {
    /// Get a field of the step object.
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.step.get(name)
    }

    /// Deserialize a field of the step object into a handler-specific type.
    pub fn parse_field<T: serde::de::DeserializeOwned>(
        &self,
        name: &str,
    ) -> Result<Option<T>, serde_json::Error> {
        self.step
            .get(name)
            .cloned()
            .map(serde_json::from_value)
            .transpose()
    }

    /// Queue a nested recipe.
    pub fn add_inner_recipe(&mut self, descriptor: RecipeDescriptor) {
        self.inner_recipes.push(Arc::new(descriptor));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn descriptor() -> Arc<RecipeDescriptor> {
        Arc::new(RecipeDescriptor::inline("test", "{}"))
    }

    #[test]
    fn test_environment_values() {
        let env: Environment = [
            ("tenant".to_string(), json!("blog")),
            ("port".to_string(), json!(8080)),
        ]
        .into_iter()
        .collect();

        assert_eq!(env.get("tenant"), Some(&json!("blog")));
        assert_eq!(env.get_str("port"), Some("8080".to_string()));
        assert_eq!(env.get("missing"), None);
    }

    #[test]
    fn test_environment_shared() {
        let env = Environment::default();
        let other = env.clone();
        assert!(env.ptr_eq(&other));
        assert!(!env.ptr_eq(&Environment::default()));
    }

    #[test]
    fn test_step_context() {
        let ctx = ExecutionContext::new("exec-1", descriptor(), Environment::default());
        let mut step = ctx.step("feature", json!({"name": "feature", "enable": ["a", "b"]}));

        assert_eq!(step.name, "feature");
        assert_eq!(step.execution_id, "exec-1");
        assert!(step.environment.ptr_eq(&ctx.environment));
        assert_eq!(step.field("enable"), Some(&json!(["a", "b"])));

        let enable: Option<Vec<String>> = step.parse_field("enable").unwrap();
        assert_eq!(enable, Some(vec!["a".to_string(), "b".to_string()]));
        let missing: Option<Vec<String>> = step.parse_field("disable").unwrap();
        assert!(missing.is_none());

        step.add_inner_recipe(RecipeDescriptor::inline("child", "{}"));
        assert_eq!(step.inner_recipes.len(), 1);
    }
}
