//! File engine (`file:` prefix): reads files next to the recipe.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use regex::Regex;
use serde_json::Value;
use std::path::{Component, Path, PathBuf};
use std::sync::OnceLock;

use super::{EvaluationContext, ScriptingEngine};
use crate::error::RecipeError;

/// Supports `text('relative/path')` and `base64('relative/path')`.
///
/// Paths resolve against the recipe's base path and may not escape it.
#[derive(Debug, Default)]
pub struct FileEngine;

impl FileEngine {
    pub fn new() -> Self {
        Self
    }
}

impl ScriptingEngine for FileEngine {
    fn prefix(&self) -> &'static str {
        "file"
    }

    fn evaluate(
        &self,
        script: &str,
        ctx: &EvaluationContext<'_>,
    ) -> Result<Option<Value>, RecipeError> {
        static CALL: OnceLock<Regex> = OnceLock::new();
        let re = CALL.get_or_init(|| {
            Regex::new(r#"^\s*(text|base64)\s*\(\s*['"]([^'"]+)['"]\s*\)\s*$"#)
                .expect("valid file call regex")
        });

        let caps = re.captures(script).ok_or_else(|| {
            RecipeError::Script(format!(
                "Unsupported file expression '{}', expected text('path') or base64('path')",
                script
            ))
        })?;

        let path = resolve_path(ctx.base_path, &caps[2])?;
        let bytes = std::fs::read(&path).map_err(|e| {
            RecipeError::Script(format!("Cannot read '{}': {}", path.display(), e))
        })?;

        let value = match &caps[1] {
            "text" => String::from_utf8(bytes).map_err(|e| {
                RecipeError::Script(format!("'{}' is not UTF-8: {}", path.display(), e))
            })?,
            _ => STANDARD.encode(bytes),
        };

        Ok(Some(Value::String(value)))
    }
}

fn resolve_path(base: &Path, relative: &str) -> Result<PathBuf, RecipeError> {
    let relative = Path::new(relative);
    let escapes = relative
        .components()
        .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));

    if escapes {
        return Err(RecipeError::Script(format!(
            "File path '{}' must be relative to the recipe",
            relative.display()
        )));
    }

    Ok(base.join(relative))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::ParametersProvider;
    use serde_json::json;

    fn eval(base: &Path, script: &str) -> Result<Option<Value>, RecipeError> {
        let params = ParametersProvider::default();
        let ctx = EvaluationContext::new(&params, base);
        FileEngine::new().evaluate(script, &ctx)
    }

    #[test]
    fn test_text_and_base64() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("assets")).unwrap();
        std::fs::write(dir.path().join("assets/hello.txt"), "hello").unwrap();

        assert_eq!(
            eval(dir.path(), "text('assets/hello.txt')").unwrap(),
            Some(json!("hello"))
        );
        assert_eq!(
            eval(dir.path(), r#" base64( "assets/hello.txt" ) "#).unwrap(),
            Some(json!("aGVsbG8="))
        );
    }

    #[test]
    fn test_rejects_escaping_paths() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            eval(dir.path(), "text('../secret')"),
            Err(RecipeError::Script(_))
        ));
        assert!(matches!(
            eval(dir.path(), "text('/etc/passwd')"),
            Err(RecipeError::Script(_))
        ));
    }

    #[test]
    fn test_missing_file_and_bad_call() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            eval(dir.path(), "text('nope.txt')"),
            Err(RecipeError::Script(_))
        ));
        assert!(matches!(
            eval(dir.path(), "read('a.txt')"),
            Err(RecipeError::Script(_))
        ));
    }
}
