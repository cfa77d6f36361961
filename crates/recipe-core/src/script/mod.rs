//! Script evaluation for bracketed recipe values.
//!
//! A string leaf such as `"[parameters.site]"` is an expression. The
//! [`ScriptingManager`] routes it to an engine: `prefix: body` selects the
//! engine registered under `prefix`, anything else goes to the default (rhai).

mod file;
mod jinja;
mod resolver;
mod rhai;

pub use self::file::FileEngine;
pub use self::jinja::JinjaEngine;
pub use self::resolver::{is_scripted, resolve_text, to_text, ScriptNodeResolver, MAX_PASSES};
pub use self::rhai::RhaiEngine;

use regex::Regex;
use serde_json::{Map, Value};
use std::path::Path;
use std::sync::{Arc, OnceLock};

use crate::error::RecipeError;
use crate::providers::ParametersProvider;

/// Everything an engine may consult while evaluating one expression.
#[derive(Debug, Clone, Copy)]
pub struct EvaluationContext<'a> {
    /// Caller-supplied parameters.
    pub parameters: &'a ParametersProvider,

    /// Recipe variables, if the recipe declares any.
    pub variables: Option<&'a Map<String, Value>>,

    /// Directory relative file references resolve against.
    pub base_path: &'a Path,
}

impl<'a> EvaluationContext<'a> {
    pub fn new(parameters: &'a ParametersProvider, base_path: &'a Path) -> Self {
        Self {
            parameters,
            variables: None,
            base_path,
        }
    }

    /// Attach recipe variables.
    pub fn with_variables(mut self, variables: &'a Map<String, Value>) -> Self {
        self.variables = Some(variables);
        self
    }

    /// Bindings as one JSON object: every variable by name, plus the
    /// `variables` and `parameters` objects.
    pub fn to_bindings(&self) -> Map<String, Value> {
        let mut bindings = self.variables.cloned().unwrap_or_default();
        bindings.insert(
            "variables".to_string(),
            Value::Object(self.variables.cloned().unwrap_or_default()),
        );
        bindings.insert(
            "parameters".to_string(),
            Value::Object(self.parameters.values().clone()),
        );
        bindings
    }
}

/// An expression language usable inside bracketed values.
pub trait ScriptingEngine: Send + Sync {
    /// Prefix that selects this engine (`prefix: body`).
    fn prefix(&self) -> &'static str;

    /// Evaluate a script. `Ok(None)` means the script produced no value.
    fn evaluate(
        &self,
        script: &str,
        ctx: &EvaluationContext<'_>,
    ) -> Result<Option<Value>, RecipeError>;
}

/// Registry of script engines with a default.
pub struct ScriptingManager {
    default: Arc<dyn ScriptingEngine>,
    engines: Vec<Arc<dyn ScriptingEngine>>,
}

impl ScriptingManager {
    /// Create a manager whose default engine is `default`.
    pub fn new<E: ScriptingEngine + 'static>(default: E) -> Self {
        let default: Arc<dyn ScriptingEngine> = Arc::new(default);
        Self {
            engines: vec![default.clone()],
            default,
        }
    }

    /// Rhai by default, with the `jinja` and `file` engines registered.
    pub fn with_defaults() -> Self {
        let mut manager = Self::new(RhaiEngine::new());
        manager.register(JinjaEngine::new());
        manager.register(FileEngine::new());
        manager
    }

    /// Register an engine. A later engine with the same prefix wins.
    pub fn register<E: ScriptingEngine + 'static>(&mut self, engine: E) {
        let prefix = engine.prefix();
        self.engines.retain(|e| e.prefix() != prefix);
        self.engines.push(Arc::new(engine));
    }

    /// Get an engine by prefix.
    pub fn get(&self, prefix: &str) -> Option<Arc<dyn ScriptingEngine>> {
        self.engines.iter().find(|e| e.prefix() == prefix).cloned()
    }

    /// List registered prefixes.
    pub fn list(&self) -> Vec<&'static str> {
        self.engines.iter().map(|e| e.prefix()).collect()
    }

    /// Evaluate an expression with the engine its prefix selects.
    pub fn evaluate(
        &self,
        expression: &str,
        ctx: &EvaluationContext<'_>,
    ) -> Result<Option<Value>, RecipeError> {
        if let Some((prefix, body)) = split_prefix(expression) {
            if let Some(engine) = self.get(prefix) {
                return engine.evaluate(body.trim(), ctx);
            }
        }

        self.default.evaluate(expression.trim(), ctx)
    }
}

impl Default for ScriptingManager {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl std::fmt::Debug for ScriptingManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScriptingManager")
            .field("default", &self.default.prefix())
            .field("engines", &self.list())
            .finish()
    }
}

fn split_prefix(expression: &str) -> Option<(&str, &str)> {
    static PREFIX: OnceLock<Regex> = OnceLock::new();
    let re = PREFIX.get_or_init(|| {
        Regex::new(r"(?s)^\s*([A-Za-z][A-Za-z0-9_]*)\s*:(.*)$").expect("valid prefix regex")
    });

    let caps = re.captures(expression)?;
    Some((caps.get(1)?.as_str(), caps.get(2)?.as_str()))
}
