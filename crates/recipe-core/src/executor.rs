//! Recipe executor.
//!
//! Streams a recipe, dispatches its steps one at a time, records a
//! [`StepResult`] per attempted step and runs nested recipes depth-first
//! before the next sibling step.

use futures::future::{BoxFuture, FutureExt};
use serde_json::Value;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::context::{Environment, ExecutionContext, StepContext};
use crate::descriptor::RecipeDescriptor;
use crate::dispatcher::StepDispatcher;
use crate::error::{ExecutionFailure, RecipeError};
use crate::events::RecipeEvents;
use crate::providers::{ParametersProvider, VariablesProvider};
use crate::reader::{RecipeEvent, RecipeReader};
use crate::result::{RecipeResult, StepOutcome, StepResult};
use crate::scope::{ExecutionScope, ScopeProvider, StepScope, TenantSettings};

/// Executes recipes against an ambient scope.
pub struct RecipeExecutor {
    ambient: ExecutionScope,
    scopes: Arc<dyn ScopeProvider>,
    tenant: TenantSettings,
    events: RecipeEvents,
}

impl RecipeExecutor {
    /// Create an executor. Isolated scopes are requested from `scopes` for the
    /// ambient scope's tenant.
    pub fn new(ambient: ExecutionScope, scopes: Arc<dyn ScopeProvider>) -> Self {
        let tenant = ambient.tenant.clone();
        Self {
            ambient,
            scopes,
            tenant,
            events: RecipeEvents::new(),
        }
    }

    /// Attach lifecycle observers.
    pub fn with_events(mut self, events: RecipeEvents) -> Self {
        self.events = events;
        self
    }

    pub fn tenant(&self) -> &TenantSettings {
        &self.tenant
    }

    /// Execute a recipe.
    ///
    /// Returns the execution ID when every step completed, `None` when the run
    /// stopped on the cancellation token.
    pub async fn execute(
        &self,
        execution_id: impl Into<String>,
        descriptor: Arc<RecipeDescriptor>,
        environment: Environment,
        cancel: &CancellationToken,
    ) -> Result<Option<String>, RecipeError> {
        let result = self
            .run(execution_id, descriptor, environment, cancel)
            .await
            .map_err(ExecutionFailure::into_error)?;

        if result.cancelled {
            Ok(None)
        } else {
            Ok(Some(result.execution_id))
        }
    }

    /// Execute a recipe and keep the per-step results, on failure as well.
    pub async fn run(
        &self,
        execution_id: impl Into<String>,
        descriptor: Arc<RecipeDescriptor>,
        environment: Environment,
        cancel: &CancellationToken,
    ) -> Result<RecipeResult, ExecutionFailure> {
        self.run_recipe(execution_id.into(), descriptor, environment, cancel, None)
            .await
    }

    fn run_recipe<'a>(
        &'a self,
        execution_id: String,
        descriptor: Arc<RecipeDescriptor>,
        environment: Environment,
        cancel: &'a CancellationToken,
        inherited: Option<VariablesProvider>,
    ) -> BoxFuture<'a, Result<RecipeResult, ExecutionFailure>> {
        async move {
            let mut result = RecipeResult::new(execution_id.clone());

            tracing::info!(
                execution_id = %execution_id,
                recipe = %descriptor.name,
                "Executing recipe"
            );
            self.events.recipe_executing(&execution_id, &descriptor).await;

            let ctx = ExecutionContext::new(execution_id, descriptor.clone(), environment);
            match self.run_steps(&ctx, cancel, inherited, &mut result).await {
                Ok(()) if result.cancelled => {
                    self.events.recipe_cancelled(&descriptor, &result).await;
                    Ok(result)
                }
                Ok(()) => {
                    tracing::info!(
                        execution_id = %result.execution_id,
                        recipe = %descriptor.name,
                        steps = result.steps.len(),
                        "Finished executing recipe"
                    );
                    self.events.recipe_executed(&descriptor, &result).await;
                    Ok(result)
                }
                Err(error) => {
                    tracing::error!(
                        execution_id = %result.execution_id,
                        recipe = %descriptor.name,
                        error = %error,
                        "Recipe execution failed"
                    );
                    self.events.execution_failed(&descriptor, &result, &error).await;
                    Err(ExecutionFailure { result, error })
                }
            }
        }
        .boxed()
    }

    async fn run_steps(
        &self,
        ctx: &ExecutionContext,
        cancel: &CancellationToken,
        inherited: Option<VariablesProvider>,
        result: &mut RecipeResult,
    ) -> Result<(), RecipeError> {
        let parameters = ParametersProvider::new(ctx.environment.clone());
        let mut variables = inherited.unwrap_or_default();
        let mut reader = RecipeReader::open(ctx.descriptor.clone());

        while let Some(event) = reader.next().await {
            let (index, raw) = match event? {
                RecipeEvent::Variables(values) => {
                    tracing::debug!(
                        execution_id = %ctx.execution_id,
                        count = values.len(),
                        "Loaded recipe variables"
                    );
                    variables = VariablesProvider::new(values);
                    continue;
                }
                RecipeEvent::Step { index, step } => (index, step),
            };

            let name = raw.get("name").and_then(Value::as_str).map(str::to_string);

            if cancel.is_cancelled() {
                tracing::error!(
                    execution_id = %ctx.execution_id,
                    step = name.as_deref().unwrap_or_default(),
                    index,
                    "Recipe interrupted by cancellation token"
                );
                result.cancelled = true;
                return Ok(());
            }

            let name = name.ok_or(RecipeError::MissingStepName { index })?;
            let mut step = ctx.step(name, raw);

            result.steps.push(StepResult::pending(&step.name));
            let outcome = self.execute_step(&mut step, &parameters, &variables).await;
            if let Some(record) = result.steps.last_mut() {
                record.complete(&outcome);
            }
            if let StepOutcome::Failed(e) = outcome {
                return Err(e);
            }

            for inner in std::mem::take(&mut step.inner_recipes) {
                let nested = self
                    .run_recipe(
                        Uuid::new_v4().to_string(),
                        inner,
                        ctx.environment.clone(),
                        cancel,
                        Some(variables.clone()),
                    )
                    .await
                    .map_err(ExecutionFailure::into_error)?;

                if nested.cancelled {
                    result.cancelled = true;
                    return Ok(());
                }
            }
        }

        Ok(())
    }

    /// Dispatch one step in its scope and release the scope afterwards.
    async fn execute_step(
        &self,
        step: &mut StepContext,
        parameters: &ParametersProvider,
        variables: &VariablesProvider,
    ) -> StepOutcome {
        let scope = match StepScope::acquire(
            &self.ambient,
            self.scopes.as_ref(),
            &self.tenant,
            step.descriptor.require_new_scope,
        )
        .await
        {
            Ok(scope) => scope,
            Err(e) => return StepOutcome::Failed(e),
        };

        let outcome = StepDispatcher::new(scope.get(), &self.events)
            .dispatch(step, parameters, variables)
            .await;

        scope.release(self.scopes.as_ref()).await;
        outcome
    }
}

impl std::fmt::Debug for RecipeExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecipeExecutor")
            .field("tenant", &self.tenant)
            .field("ambient", &self.ambient)
            .field("events", &self.events)
            .finish()
    }
}
