//! `recipes` step: queue nested recipe files.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Component, Path};

use crate::context::StepContext;
use crate::descriptor::RecipeDescriptor;
use crate::error::RecipeError;
use crate::registry::StepHandler;

/// One entry of a `recipes` step's `values` list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecipeReference {
    /// Path relative to the declaring recipe.
    pub path: String,

    /// Run every step of the nested recipe in a new scope.
    #[serde(default)]
    pub isolated: bool,
}

/// Handles `{"name": "recipes", "values": [{"path": "child.json"}]}`.
#[derive(Debug, Default)]
pub struct RecipesStep;

impl RecipesStep {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl StepHandler for RecipesStep {
    fn name(&self) -> &'static str {
        "recipes"
    }

    async fn execute(&self, step: &mut StepContext) -> Result<(), RecipeError> {
        let references: Vec<RecipeReference> = step
            .parse_field("values")
            .map_err(|e| RecipeError::handler(&step.name, format!("Invalid 'values': {}", e)))?
            .unwrap_or_default();

        for reference in references {
            let relative = Path::new(&reference.path);
            if relative
                .components()
                .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir))
            {
                return Err(RecipeError::handler(
                    &step.name,
                    format!("Recipe path '{}' must be relative", reference.path),
                ));
            }

            let path = step.descriptor.base_path.join(relative);
            tracing::debug!(
                execution_id = %step.execution_id,
                recipe = %path.display(),
                isolated = reference.isolated,
                "Queued nested recipe"
            );
            step.add_inner_recipe(
                RecipeDescriptor::from_file(path).with_new_scope(reference.isolated),
            );
        }

        Ok(())
    }
}
