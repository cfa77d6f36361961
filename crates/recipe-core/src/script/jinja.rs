//! Jinja expression engine (`jinja:` prefix) backed by minijinja.

use base64::{engine::general_purpose::STANDARD, Engine};
use minijinja::{Environment, ErrorKind, Value};

use super::{EvaluationContext, ScriptingEngine};
use crate::error::RecipeError;

/// Evaluates Jinja2 expressions such as `jinja: parameters.site | upper`.
pub struct JinjaEngine {
    env: Environment<'static>,
}

impl JinjaEngine {
    /// Create an engine. Built-in filters cover `int`, `float` and `default`;
    /// JSON and base64 conversions are added here.
    pub fn new() -> Self {
        let mut env = Environment::new();
        env.add_filter("tojson", to_json);
        env.add_filter("fromjson", from_json);
        env.add_filter("b64encode", |value: String| STANDARD.encode(value));
        env.add_filter("b64decode", from_base64);
        Self { env }
    }
}

impl Default for JinjaEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptingEngine for JinjaEngine {
    fn prefix(&self) -> &'static str {
        "jinja"
    }

    fn evaluate(
        &self,
        script: &str,
        ctx: &EvaluationContext<'_>,
    ) -> Result<Option<serde_json::Value>, RecipeError> {
        let expr = self.env.compile_expression(script)?;
        let result = expr.eval(Value::from_serialize(ctx.to_bindings()))?;

        if result.is_undefined() || result.is_none() {
            return Ok(None);
        }

        serde_json::to_value(&result)
            .map(Some)
            .map_err(|e| RecipeError::Script(format!("Jinja result is not JSON: {}", e)))
    }
}

fn invalid(message: impl std::fmt::Display) -> minijinja::Error {
    minijinja::Error::new(ErrorKind::InvalidOperation, message.to_string())
}

fn to_json(value: Value) -> Result<String, minijinja::Error> {
    serde_json::to_string(&value).map_err(invalid)
}

fn from_json(text: String) -> Result<Value, minijinja::Error> {
    serde_json::from_str::<serde_json::Value>(&text)
        .map(Value::from_serialize)
        .map_err(invalid)
}

fn from_base64(text: String) -> Result<String, minijinja::Error> {
    let bytes = STANDARD.decode(text).map_err(invalid)?;
    String::from_utf8(bytes).map_err(invalid)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::ParametersProvider;
    use serde_json::json;
    use std::path::Path;

    fn eval(script: &str) -> Result<Option<serde_json::Value>, RecipeError> {
        let engine = JinjaEngine::new();
        let params = ParametersProvider::new(
            [("tenant".to_string(), json!("blog"))].into_iter().collect(),
        );
        let variables = json!({"x": "5", "count": "3", "data": {"key": "value"}})
            .as_object()
            .cloned()
            .unwrap();
        let ctx = EvaluationContext::new(&params, Path::new("")).with_variables(&variables);
        engine.evaluate(script, &ctx)
    }

    #[test]
    fn test_variables_and_parameters() {
        assert_eq!(eval("x").unwrap(), Some(json!("5")));
        assert_eq!(eval("variables.x ~ '!'").unwrap(), Some(json!("5!")));
        assert_eq!(eval("parameters.tenant | upper").unwrap(), Some(json!("BLOG")));
    }

    #[test]
    fn test_undefined_is_no_value() {
        assert_eq!(eval("missing").unwrap(), None);
        assert_eq!(eval("none").unwrap(), None);
    }

    #[test]
    fn test_filters() {
        assert_eq!(eval("count | int + 1").unwrap(), Some(json!(4)));
        assert_eq!(eval("missing | default('fallback')").unwrap(), Some(json!("fallback")));
        assert_eq!(eval("'hello' | b64encode").unwrap(), Some(json!("aGVsbG8=")));
        assert_eq!(eval("'aGVsbG8=' | b64decode").unwrap(), Some(json!("hello")));
        assert_eq!(eval("data | tojson").unwrap(), Some(json!(r#"{"key":"value"}"#)));
        assert_eq!(eval(r#"'{"a": 1}' | fromjson"#).unwrap(), Some(json!({"a": 1})));
        assert!(matches!(eval("'not json' | fromjson"), Err(RecipeError::Script(_))));
    }

    #[test]
    fn test_syntax_error() {
        assert!(matches!(eval("x +"), Err(RecipeError::Script(_))));
    }
}
