//! Collects the result of every recipe a run executes, nested ones included.

use async_trait::async_trait;
use std::sync::Mutex;

use recipe_core::{RecipeDescriptor, RecipeError, RecipeEventHandler, RecipeResult};

/// Outcome of one recipe.
#[derive(Debug, Clone, PartialEq)]
pub struct RecipeSummary {
    pub recipe: String,
    pub result: RecipeResult,
    pub error: Option<String>,
}

/// Observer that records finished recipes in completion order.
#[derive(Debug, Default)]
pub struct SummaryObserver {
    recipes: Mutex<Vec<RecipeSummary>>,
}

impl SummaryObserver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Recorded recipes, innermost first.
    pub fn recipes(&self) -> Vec<RecipeSummary> {
        self.recipes
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    fn record(&self, descriptor: &RecipeDescriptor, result: &RecipeResult, error: Option<&str>) {
        self.recipes
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(RecipeSummary {
                recipe: descriptor.name.clone(),
                result: result.clone(),
                error: error.map(str::to_string),
            });
    }
}

#[async_trait]
impl RecipeEventHandler for SummaryObserver {
    async fn recipe_executed(
        &self,
        descriptor: &RecipeDescriptor,
        result: &RecipeResult,
    ) -> Result<(), RecipeError> {
        self.record(descriptor, result, None);
        Ok(())
    }

    async fn execution_failed(
        &self,
        descriptor: &RecipeDescriptor,
        result: &RecipeResult,
        error: &str,
    ) -> Result<(), RecipeError> {
        self.record(descriptor, result, Some(error));
        Ok(())
    }

    async fn recipe_cancelled(
        &self,
        descriptor: &RecipeDescriptor,
        result: &RecipeResult,
    ) -> Result<(), RecipeError> {
        self.record(descriptor, result, None);
        Ok(())
    }
}

/// Print a per-step table for every recorded recipe.
pub fn print_summary(recipes: &[RecipeSummary]) {
    for summary in recipes {
        let status = if summary.error.is_some() {
            "FAILED"
        } else if summary.result.cancelled {
            "CANCELLED"
        } else {
            "OK"
        };
        println!(
            "{} [{}] {}",
            summary.recipe, summary.result.execution_id, status
        );

        for step in &summary.result.steps {
            let mark = match (step.is_completed, step.is_successful) {
                (true, true) => "ok",
                (true, false) => "failed",
                (false, _) => "skipped",
            };
            match &step.error_message {
                Some(message) => println!("  {:<24} {:<8} {}", step.step_name, mark, message),
                None => println!("  {:<24} {}", step.step_name, mark),
            }
        }
    }
}
