//! Rewrites scripted string leaves of a JSON tree with their evaluated values.

use serde_json::Value;

use super::{EvaluationContext, ScriptingManager};
use crate::error::RecipeError;

/// Upper bound on re-evaluations of a single leaf.
pub const MAX_PASSES: usize = 64;

/// Returns true if a string is a bracketed expression.
pub fn is_scripted(value: &str) -> bool {
    value.starts_with('[') && value.ends_with(']')
}

/// Textual form of an evaluation result. No value becomes the empty string.
pub fn to_text(value: Option<Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s,
        Some(other) => other.to_string(),
    }
}

/// Evaluate a bracketed string until the result is no longer bracketed.
///
/// Returns `Ok(None)` when `value` is not scripted.
pub fn resolve_text<F>(value: &str, mut evaluate: F) -> Result<Option<String>, RecipeError>
where
    F: FnMut(&str) -> Result<Option<Value>, RecipeError>,
{
    if !is_scripted(value) {
        return Ok(None);
    }

    let mut current = value.to_string();
    let mut passes = 0;

    while is_scripted(&current) {
        if passes == MAX_PASSES {
            return Err(RecipeError::Script(format!(
                "Expression '{}' did not resolve after {} passes",
                value, MAX_PASSES
            )));
        }
        passes += 1;

        let expression = current.trim_matches(|c| c == '[' || c == ']');
        current = to_text(evaluate(expression)?);
    }

    Ok(Some(current))
}

/// Walks a JSON tree and resolves every scripted string leaf in place.
pub struct ScriptNodeResolver<'a> {
    scripting: &'a ScriptingManager,
    ctx: &'a EvaluationContext<'a>,
}

impl<'a> ScriptNodeResolver<'a> {
    pub fn new(scripting: &'a ScriptingManager, ctx: &'a EvaluationContext<'a>) -> Self {
        Self { scripting, ctx }
    }

    /// Resolve every scripted leaf under `node`.
    pub fn resolve(&self, node: &mut Value) -> Result<(), RecipeError> {
        match node {
            Value::Array(items) => {
                for item in items.iter_mut() {
                    self.resolve(item)?;
                }
            }
            Value::Object(map) => {
                for (_, value) in map.iter_mut() {
                    self.resolve(value)?;
                }
            }
            Value::String(text) => {
                if let Some(resolved) =
                    resolve_text(text, |expr| self.scripting.evaluate(expr, self.ctx))?
                {
                    *text = resolved;
                }
            }
            Value::Null | Value::Bool(_) | Value::Number(_) => {}
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::ParametersProvider;
    use crate::script::ScriptingEngine;
    use serde_json::json;
    use std::collections::HashMap;
    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    /// Looks expressions up in a fixed table and counts calls.
    struct TableEngine {
        table: HashMap<&'static str, Option<Value>>,
        calls: Arc<AtomicUsize>,
    }

    impl ScriptingEngine for TableEngine {
        fn prefix(&self) -> &'static str {
            "table"
        }

        fn evaluate(
            &self,
            script: &str,
            _ctx: &EvaluationContext<'_>,
        ) -> Result<Option<Value>, RecipeError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.table
                .get(script)
                .cloned()
                .ok_or_else(|| RecipeError::Script(format!("unknown expression '{}'", script)))
        }
    }

    fn table(entries: Vec<(&'static str, Option<Value>)>) -> (ScriptingManager, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let engine = TableEngine {
            table: entries.into_iter().collect(),
            calls: calls.clone(),
        };
        (ScriptingManager::new(engine), calls)
    }

    fn resolve(manager: &ScriptingManager, node: &mut Value) -> Result<(), RecipeError> {
        let params = ParametersProvider::default();
        let ctx = EvaluationContext::new(&params, Path::new(""));
        ScriptNodeResolver::new(manager, &ctx).resolve(node)
    }

    #[test]
    fn test_is_scripted() {
        assert!(is_scripted("[x]"));
        assert!(is_scripted("[]"));
        assert!(!is_scripted(" [x]"));
        assert!(!is_scripted("[x] "));
        assert!(!is_scripted("x"));
        assert!(!is_scripted(""));
    }

    #[test]
    fn test_to_text() {
        assert_eq!(to_text(None), "");
        assert_eq!(to_text(Some(Value::Null)), "");
        assert_eq!(to_text(Some(json!("a"))), "a");
        assert_eq!(to_text(Some(json!(42))), "42");
        assert_eq!(to_text(Some(json!(true))), "true");
        assert_eq!(to_text(Some(json!([1, 2]))), "[1,2]");
    }

    #[test]
    fn test_resolve_text_strips_all_outer_brackets() {
        let mut seen = Vec::new();
        let resolved = resolve_text("[[x]]", |expr| {
            seen.push(expr.to_string());
            Ok(Some(json!("5")))
        })
        .unwrap();

        assert_eq!(resolved.as_deref(), Some("5"));
        assert_eq!(seen, vec!["x"]);
    }

    #[test]
    fn test_resolve_text_reevaluates_bracketed_results() {
        let (manager, calls) = table(vec![
            ("outer", Some(json!("[inner]"))),
            ("inner", Some(json!("5"))),
        ]);
        let mut node = json!("[outer]");

        resolve(&manager, &mut node).unwrap();
        assert_eq!(node, json!("5"));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_resolve_text_never_stabilizes() {
        let result = resolve_text("[loop]", |_| Ok(Some(json!("[loop]"))));
        assert!(matches!(result, Err(RecipeError::Script(_))));
    }

    #[test]
    fn test_resolve_tree() {
        let (manager, _) = table(vec![
            ("x", Some(json!("5"))),
            ("n", Some(json!(7))),
            ("nothing", None),
        ]);
        let mut node = json!({
            "name": "feature",
            "plain": "hello",
            "count": 3,
            "flag": true,
            "empty": null,
            "list": ["[x]", "keep", ["[n]"]],
            "nested": {"deep": {"value": "[nothing]"}}
        });

        resolve(&manager, &mut node).unwrap();
        assert_eq!(
            node,
            json!({
                "name": "feature",
                "plain": "hello",
                "count": 3,
                "flag": true,
                "empty": null,
                "list": ["5", "keep", ["7"]],
                "nested": {"deep": {"value": ""}}
            })
        );
    }

    #[test]
    fn test_resolve_is_idempotent_on_resolved_tree() {
        let (manager, calls) = table(vec![("x", Some(json!("5")))]);
        let mut node = json!({"a": "[x]", "b": ["[x]"]});

        resolve(&manager, &mut node).unwrap();
        let first = node.clone();
        let calls_after_first = calls.load(Ordering::SeqCst);

        resolve(&manager, &mut node).unwrap();
        assert_eq!(node, first);
        assert_eq!(calls.load(Ordering::SeqCst), calls_after_first);
    }

    #[test]
    fn test_resolve_propagates_evaluator_error() {
        let (manager, _) = table(vec![]);
        let mut node = json!({"a": "[unknown]"});
        assert!(matches!(
            resolve(&manager, &mut node),
            Err(RecipeError::Script(_))
        ));
    }
}
