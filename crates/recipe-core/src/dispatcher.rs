//! Step dispatch: resolve scripted values, then run every matching handler.

use crate::context::StepContext;
use crate::error::RecipeError;
use crate::events::RecipeEvents;
use crate::providers::{ParametersProvider, VariablesProvider};
use crate::result::StepOutcome;
use crate::scope::ExecutionScope;
use crate::script::{EvaluationContext, ScriptNodeResolver};

/// Dispatches parsed steps within a scope.
pub struct StepDispatcher<'a> {
    scope: &'a ExecutionScope,
    events: &'a RecipeEvents,
}

impl<'a> StepDispatcher<'a> {
    pub fn new(scope: &'a ExecutionScope, events: &'a RecipeEvents) -> Self {
        Self { scope, events }
    }

    /// Resolve the step's scripted leaves and run its handlers.
    ///
    /// Never returns early with an error: the outcome is always reported so the
    /// caller can record it before deciding to abort.
    pub async fn dispatch(
        &self,
        step: &mut StepContext,
        parameters: &ParametersProvider,
        variables: &VariablesProvider,
    ) -> StepOutcome {
        let result = self.try_dispatch(step, parameters, variables).await;
        if let Err(e) = &result {
            tracing::error!(
                execution_id = %step.execution_id,
                step = %step.name,
                error = %e,
                "Recipe step failed"
            );
        }
        result.into()
    }

    async fn try_dispatch(
        &self,
        step: &mut StepContext,
        parameters: &ParametersProvider,
        variables: &VariablesProvider,
    ) -> Result<(), RecipeError> {
        self.resolve(step, parameters, variables)?;

        let handlers = self.scope.handlers.matching(&step.name);
        if handlers.is_empty() {
            tracing::debug!(step = %step.name, "No handler matches recipe step");
        }

        for handler in handlers {
            tracing::info!(
                execution_id = %step.execution_id,
                step = %step.name,
                handler = handler.name(),
                "Executing recipe step"
            );

            self.events.step_executing(step).await;
            handler.execute(step).await?;
            self.events.step_executed(step).await;

            tracing::info!(
                execution_id = %step.execution_id,
                step = %step.name,
                handler = handler.name(),
                "Finished executing recipe step"
            );
        }

        Ok(())
    }

    /// Rewrite scripted leaves of the step object in place.
    fn resolve(
        &self,
        step: &mut StepContext,
        parameters: &ParametersProvider,
        variables: &VariablesProvider,
    ) -> Result<(), RecipeError> {
        let base_path = step.descriptor.base_path.clone();
        let scripting = &self.scope.scripting;

        let resolved = variables.resolve(scripting, parameters, &base_path)?;
        let ctx = EvaluationContext::new(parameters, &base_path).with_variables(&resolved);

        ScriptNodeResolver::new(scripting, &ctx).resolve(&mut step.step)
    }
}
