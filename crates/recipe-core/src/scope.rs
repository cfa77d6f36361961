//! Execution scopes.
//!
//! A scope bundles the step handlers and the script engines a step runs
//! against. Steps of an ordinary recipe share the executor's ambient scope; a
//! recipe that requires a new scope gets a fresh one from a [`ScopeProvider`]
//! for every step, released as soon as the step's dispatch finishes.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::error::RecipeError;
use crate::registry::HandlerRegistry;
use crate::script::ScriptingManager;

/// Identity of the tenant a scope belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TenantSettings {
    pub name: String,
}

impl TenantSettings {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl Default for TenantSettings {
    fn default() -> Self {
        Self::new("Default")
    }
}

/// Handlers and script engines available to a step.
#[derive(Debug, Clone)]
pub struct ExecutionScope {
    /// Tenant the scope was created for.
    pub tenant: TenantSettings,

    /// Step handlers, in dispatch order.
    pub handlers: Arc<HandlerRegistry>,

    /// Script engines used to resolve scripted values.
    pub scripting: Arc<ScriptingManager>,

    isolated: bool,
}

impl ExecutionScope {
    /// Create an ambient scope.
    pub fn new(tenant: TenantSettings, handlers: HandlerRegistry, scripting: ScriptingManager) -> Self {
        Self {
            tenant,
            handlers: Arc::new(handlers),
            scripting: Arc::new(scripting),
            isolated: false,
        }
    }

    /// Mark the scope as created for a single step.
    pub fn isolated(mut self) -> Self {
        self.isolated = true;
        self
    }

    pub fn is_isolated(&self) -> bool {
        self.isolated
    }
}

/// Source of fresh, isolated scopes.
#[async_trait]
pub trait ScopeProvider: Send + Sync {
    /// Create a scope for a tenant.
    async fn create_scope(&self, tenant: &TenantSettings) -> Result<ExecutionScope, RecipeError>;

    /// Release a scope created by [`ScopeProvider::create_scope`].
    async fn release_scope(&self, scope: ExecutionScope) {
        drop(scope);
    }
}

/// Builds a handler registry for a tenant.
pub type RegistryFactory =
    dyn Fn(&TenantSettings) -> Result<HandlerRegistry, RecipeError> + Send + Sync;

/// Default scope provider.
///
/// Every scope gets handlers from the factory and its own script engines.
pub struct TenantHost {
    factory: Arc<RegistryFactory>,
    live: AtomicUsize,
}

impl TenantHost {
    pub fn new<F>(factory: F) -> Self
    where
        F: Fn(&TenantSettings) -> Result<HandlerRegistry, RecipeError> + Send + Sync + 'static,
    {
        Self {
            factory: Arc::new(factory),
            live: AtomicUsize::new(0),
        }
    }

    /// Build an ambient scope. Ambient scopes are not tracked.
    pub fn build_scope(&self, tenant: &TenantSettings) -> Result<ExecutionScope, RecipeError> {
        let handlers = (self.factory)(tenant)?;
        Ok(ExecutionScope::new(
            tenant.clone(),
            handlers,
            ScriptingManager::with_defaults(),
        ))
    }

    /// Number of isolated scopes created and not yet released.
    pub fn live_scopes(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }
}

impl std::fmt::Debug for TenantHost {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TenantHost")
            .field("live_scopes", &self.live_scopes())
            .finish()
    }
}

#[async_trait]
impl ScopeProvider for TenantHost {
    async fn create_scope(&self, tenant: &TenantSettings) -> Result<ExecutionScope, RecipeError> {
        let scope = self.build_scope(tenant)?.isolated();
        let live = self.live.fetch_add(1, Ordering::SeqCst) + 1;
        tracing::debug!(tenant = %tenant.name, live_scopes = live, "Created isolated scope");
        Ok(scope)
    }

    async fn release_scope(&self, scope: ExecutionScope) {
        let live = self.live.fetch_sub(1, Ordering::SeqCst).saturating_sub(1);
        tracing::debug!(tenant = %scope.tenant.name, live_scopes = live, "Released isolated scope");
    }
}

/// The scope a single step dispatches in.
pub enum StepScope<'a> {
    /// The executor's own scope.
    Ambient(&'a ExecutionScope),
    /// A scope created for this step only.
    Isolated(ExecutionScope),
}

impl<'a> StepScope<'a> {
    /// Pick the ambient scope, or create a new one when `require_new` is set.
    pub async fn acquire(
        ambient: &'a ExecutionScope,
        provider: &dyn ScopeProvider,
        tenant: &TenantSettings,
        require_new: bool,
    ) -> Result<StepScope<'a>, RecipeError> {
        if !require_new {
            return Ok(StepScope::Ambient(ambient));
        }

        let scope = provider
            .create_scope(tenant)
            .await
            .map_err(|e| match e {
                RecipeError::Scope(_) => e,
                other => RecipeError::Scope(other.to_string()),
            })?;
        Ok(StepScope::Isolated(scope))
    }

    pub fn get(&self) -> &ExecutionScope {
        match self {
            StepScope::Ambient(scope) => scope,
            StepScope::Isolated(scope) => scope,
        }
    }

    /// Hand an isolated scope back to its provider.
    pub async fn release(self, provider: &dyn ScopeProvider) {
        if let StepScope::Isolated(scope) = self {
            provider.release_scope(scope).await;
        }
    }
}
