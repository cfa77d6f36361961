//! Rhai script engine, the default for unprefixed expressions.

use rhai::{Dynamic, Engine, Scope};
use serde_json::Value;

use super::{EvaluationContext, ScriptingEngine};
use crate::error::RecipeError;

/// Evaluates expressions with Rhai.
///
/// Variables are bound as constants by name, and as the `variables` and
/// `parameters` maps. A fresh scope is built for every evaluation.
pub struct RhaiEngine {
    engine: Engine,
}

impl RhaiEngine {
    /// Create a new Rhai engine.
    pub fn new() -> Self {
        Self {
            engine: create_engine(),
        }
    }

    /// Build a Rhai scope from the evaluation context.
    fn build_scope(&self, ctx: &EvaluationContext<'_>) -> Scope<'static> {
        let mut scope = Scope::new();

        if let Some(variables) = ctx.variables {
            for (k, v) in variables {
                if is_identifier(k) {
                    scope.push_constant_dynamic(k.clone(), json_to_dynamic(v));
                }
            }
        }

        let variables = ctx
            .variables
            .map(|vars| json_to_map(vars.iter()))
            .unwrap_or_default();
        scope.push_constant("variables", variables);
        scope.push_constant("parameters", json_to_map(ctx.parameters.values().iter()));
        scope.push_constant("base_path", ctx.base_path.display().to_string());

        scope
    }
}

impl Default for RhaiEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptingEngine for RhaiEngine {
    fn prefix(&self) -> &'static str {
        "rhai"
    }

    fn evaluate(
        &self,
        script: &str,
        ctx: &EvaluationContext<'_>,
    ) -> Result<Option<Value>, RecipeError> {
        let mut scope = self.build_scope(ctx);
        let result = self.engine.eval_with_scope::<Dynamic>(&mut scope, script)?;

        if result.is_unit() {
            Ok(None)
        } else {
            Ok(Some(dynamic_to_json(&result)))
        }
    }
}

/// Create a Rhai engine with the recipe helper functions registered.
fn create_engine() -> Engine {
    let mut engine = Engine::new();

    engine.on_print(|msg| {
        tracing::info!(target: "rhai", "{}", msg);
    });
    engine.on_debug(|msg, _source, _pos| {
        tracing::debug!(target: "rhai", "{}", msg);
    });

    engine.register_fn("uuid", || uuid::Uuid::new_v4().to_string());

    engine.register_fn("timestamp", || chrono::Utc::now().timestamp().to_string());

    engine.register_fn("timestamp_ms", || {
        chrono::Utc::now().timestamp_millis().to_string()
    });

    engine.register_fn("base64", |s: &str| -> String {
        use base64::{engine::general_purpose::STANDARD, Engine as _};
        STANDARD.encode(s.as_bytes())
    });

    engine.register_fn("parse_json", |s: &str| -> Dynamic {
        match serde_json::from_str::<Value>(s) {
            Ok(v) => json_to_dynamic(&v),
            Err(_) => Dynamic::UNIT,
        }
    });

    engine.register_fn("to_json", |val: Dynamic| -> String {
        let json = dynamic_to_json(&val);
        serde_json::to_string(&json).unwrap_or_else(|_| "null".to_string())
    });

    engine
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        _ => false,
    }
}

// JSON <-> Dynamic conversion

fn json_to_map<'a>(entries: impl Iterator<Item = (&'a String, &'a Value)>) -> rhai::Map {
    let mut map = rhai::Map::new();
    for (k, v) in entries {
        map.insert(k.as_str().into(), json_to_dynamic(v));
    }
    map
}

fn json_to_dynamic(value: &Value) -> Dynamic {
    match value {
        Value::Null => Dynamic::UNIT,
        Value::Bool(b) => Dynamic::from(*b),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Dynamic::from(i)
            } else if let Some(f) = n.as_f64() {
                Dynamic::from(f)
            } else {
                Dynamic::UNIT
            }
        }
        Value::String(s) => Dynamic::from(s.clone()),
        Value::Array(arr) => {
            let rhai_arr: rhai::Array = arr.iter().map(json_to_dynamic).collect();
            Dynamic::from(rhai_arr)
        }
        Value::Object(obj) => Dynamic::from(json_to_map(obj.iter())),
    }
}

fn dynamic_to_json(value: &Dynamic) -> Value {
    if value.is_unit() {
        Value::Null
    } else if let Ok(b) = value.as_bool() {
        Value::Bool(b)
    } else if let Ok(i) = value.as_int() {
        Value::Number(i.into())
    } else if let Ok(f) = value.as_float() {
        serde_json::Number::from_f64(f)
            .map(Value::Number)
            .unwrap_or(Value::Null)
    } else if value.is_string() {
        Value::String(value.clone().into_string().unwrap_or_default())
    } else if value.is_array() {
        let arr = value.clone().into_array().unwrap_or_default();
        Value::Array(arr.iter().map(dynamic_to_json).collect())
    } else if let Some(map) = value.clone().try_cast::<rhai::Map>() {
        Value::Object(
            map.into_iter()
                .map(|(k, v)| (k.to_string(), dynamic_to_json(&v)))
                .collect(),
        )
    } else {
        Value::String(value.to_string())
    }
}
