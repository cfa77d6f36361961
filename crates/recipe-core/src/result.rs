//! Step and recipe execution result types.

use serde::{Deserialize, Serialize};

use crate::error::RecipeError;

/// Outcome of dispatching a single step.
///
/// The executor records the outcome in the step's [`StepResult`] first and only
/// then decides whether to abort the run.
#[derive(Debug)]
pub enum StepOutcome {
    /// Every matching handler ran without error.
    Succeeded,
    /// Resolution or a handler failed.
    Failed(RecipeError),
}

impl StepOutcome {
    /// Returns true if the step succeeded.
    pub fn is_success(&self) -> bool {
        matches!(self, StepOutcome::Succeeded)
    }
}

impl From<Result<(), RecipeError>> for StepOutcome {
    fn from(result: Result<(), RecipeError>) -> Self {
        match result {
            Ok(()) => StepOutcome::Succeeded,
            Err(e) => StepOutcome::Failed(e),
        }
    }
}

/// Bookkeeping for one attempted step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepResult {
    /// Declared step name.
    pub step_name: String,

    /// Whether every handler ran without error.
    pub is_successful: bool,

    /// Whether the step was dispatched at all.
    pub is_completed: bool,

    /// Error message if the step failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl StepResult {
    /// Create a pending result for a step about to be dispatched.
    pub fn pending(step_name: impl Into<String>) -> Self {
        Self {
            step_name: step_name.into(),
            is_successful: false,
            is_completed: false,
            error_message: None,
        }
    }

    /// Record the outcome of the dispatch.
    pub fn complete(&mut self, outcome: &StepOutcome) {
        match outcome {
            StepOutcome::Succeeded => {
                self.is_successful = true;
                self.error_message = None;
            }
            StepOutcome::Failed(e) => {
                self.is_successful = false;
                self.error_message = Some(e.to_string());
            }
        }
        self.is_completed = true;
    }
}

/// Ordered results of a recipe run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecipeResult {
    /// Execution identifier of the run.
    pub execution_id: String,

    /// One entry per attempted step, in document order.
    pub steps: Vec<StepResult>,

    /// Whether the run stopped on the cancellation token.
    #[serde(default)]
    pub cancelled: bool,
}

impl RecipeResult {
    /// Create an empty result for an execution.
    pub fn new(execution_id: impl Into<String>) -> Self {
        Self {
            execution_id: execution_id.into(),
            steps: Vec::new(),
            cancelled: false,
        }
    }

    /// Returns true if every recorded step succeeded and the run was not cancelled.
    pub fn is_successful(&self) -> bool {
        !self.cancelled && self.steps.iter().all(|s| s.is_successful)
    }

    /// The first failed step, if any.
    pub fn failed_step(&self) -> Option<&StepResult> {
        self.steps.iter().find(|s| s.is_completed && !s.is_successful)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_step_result_success() {
        let mut result = StepResult::pending("settings");
        assert!(!result.is_completed);

        result.complete(&StepOutcome::Succeeded);
        assert!(result.is_completed);
        assert!(result.is_successful);
        assert!(result.error_message.is_none());
    }

    #[test]
    fn test_step_result_failure() {
        let mut result = StepResult::pending("settings");
        let outcome = StepOutcome::Failed(RecipeError::handler("settings", "disk full"));

        result.complete(&outcome);
        assert!(result.is_completed);
        assert!(!result.is_successful);
        assert_eq!(
            result.error_message.as_deref(),
            Some("Step 'settings' failed: disk full")
        );
    }

    #[test]
    fn test_recipe_result_failed_step() {
        let mut recipe = RecipeResult::new("exec-1");
        let mut ok = StepResult::pending("a");
        ok.complete(&StepOutcome::Succeeded);
        let mut failed = StepResult::pending("b");
        failed.complete(&StepOutcome::Failed(RecipeError::Script("x".into())));
        recipe.steps.push(ok);
        recipe.steps.push(failed);

        assert!(!recipe.is_successful());
        assert_eq!(recipe.failed_step().map(|s| s.step_name.as_str()), Some("b"));
    }

    #[test]
    fn test_recipe_result_serialization() {
        let mut recipe = RecipeResult::new("exec-1");
        let mut step = StepResult::pending("a");
        step.complete(&StepOutcome::Succeeded);
        recipe.steps.push(step);

        let json = serde_json::to_string(&recipe).unwrap();
        assert!(json.contains("\"execution_id\":\"exec-1\""));
        assert!(json.contains("\"is_completed\":true"));
        assert!(!json.contains("error_message"));
    }

    #[test]
    fn test_step_outcome_from_result() {
        assert!(StepOutcome::from(Ok(())).is_success());
        assert!(!StepOutcome::from(Err(RecipeError::Scope("gone".into()))).is_success());
    }
}
