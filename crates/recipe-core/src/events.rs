//! Lifecycle observers.

use async_trait::async_trait;
use std::sync::Arc;

use crate::context::StepContext;
use crate::descriptor::RecipeDescriptor;
use crate::error::RecipeError;
use crate::result::RecipeResult;

/// Receives recipe and step lifecycle notifications.
///
/// Every method defaults to a no-op. An error returned by an observer is
/// logged and never aborts the run.
#[async_trait]
pub trait RecipeEventHandler: Send + Sync {
    /// A recipe is about to run its first step.
    async fn recipe_executing(
        &self,
        _execution_id: &str,
        _descriptor: &RecipeDescriptor,
    ) -> Result<(), RecipeError> {
        Ok(())
    }

    /// Every step of a recipe completed.
    async fn recipe_executed(
        &self,
        _descriptor: &RecipeDescriptor,
        _result: &RecipeResult,
    ) -> Result<(), RecipeError> {
        Ok(())
    }

    /// A recipe run aborted with an error.
    async fn execution_failed(
        &self,
        _descriptor: &RecipeDescriptor,
        _result: &RecipeResult,
        _error: &str,
    ) -> Result<(), RecipeError> {
        Ok(())
    }

    /// A recipe run stopped at a step boundary because cancellation was requested.
    async fn recipe_cancelled(
        &self,
        _descriptor: &RecipeDescriptor,
        _result: &RecipeResult,
    ) -> Result<(), RecipeError> {
        Ok(())
    }

    /// A handler is about to process a step.
    async fn step_executing(&self, _step: &StepContext) -> Result<(), RecipeError> {
        Ok(())
    }

    /// A handler finished processing a step.
    async fn step_executed(&self, _step: &StepContext) -> Result<(), RecipeError> {
        Ok(())
    }
}

/// Fan-out to every registered observer, in registration order.
#[derive(Clone, Default)]
pub struct RecipeEvents {
    handlers: Vec<Arc<dyn RecipeEventHandler>>,
}

impl RecipeEvents {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an observer.
    pub fn register<H: RecipeEventHandler + 'static>(&mut self, handler: H) {
        self.handlers.push(Arc::new(handler));
    }

    /// Register a shared observer.
    pub fn register_arc(&mut self, handler: Arc<dyn RecipeEventHandler>) {
        self.handlers.push(handler);
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    pub async fn recipe_executing(&self, execution_id: &str, descriptor: &RecipeDescriptor) {
        for handler in &self.handlers {
            if let Err(e) = handler.recipe_executing(execution_id, descriptor).await {
                log_failure("recipe_executing", execution_id, &e);
            }
        }
    }

    pub async fn recipe_executed(&self, descriptor: &RecipeDescriptor, result: &RecipeResult) {
        for handler in &self.handlers {
            if let Err(e) = handler.recipe_executed(descriptor, result).await {
                log_failure("recipe_executed", &result.execution_id, &e);
            }
        }
    }

    pub async fn execution_failed(
        &self,
        descriptor: &RecipeDescriptor,
        result: &RecipeResult,
        error: &RecipeError,
    ) {
        let message = error.to_string();
        for handler in &self.handlers {
            if let Err(e) = handler.execution_failed(descriptor, result, &message).await {
                log_failure("execution_failed", &result.execution_id, &e);
            }
        }
    }

    pub async fn recipe_cancelled(&self, descriptor: &RecipeDescriptor, result: &RecipeResult) {
        for handler in &self.handlers {
            if let Err(e) = handler.recipe_cancelled(descriptor, result).await {
                log_failure("recipe_cancelled", &result.execution_id, &e);
            }
        }
    }

    pub async fn step_executing(&self, step: &StepContext) {
        for handler in &self.handlers {
            if let Err(e) = handler.step_executing(step).await {
                log_failure("step_executing", &step.execution_id, &e);
            }
        }
    }

    pub async fn step_executed(&self, step: &StepContext) {
        for handler in &self.handlers {
            if let Err(e) = handler.step_executed(step).await {
                log_failure("step_executed", &step.execution_id, &e);
            }
        }
    }
}

impl std::fmt::Debug for RecipeEvents {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecipeEvents")
            .field("handlers", &self.handlers.len())
            .finish()
    }
}

fn log_failure(event: &str, execution_id: &str, error: &RecipeError) {
    tracing::warn!(
        event = event,
        execution_id = %execution_id,
        error = %error,
        "Recipe event handler failed"
    );
}
