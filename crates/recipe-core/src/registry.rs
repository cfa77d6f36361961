//! Step handler registry and dispatch order.

use async_trait::async_trait;
use std::sync::Arc;

use crate::context::StepContext;
use crate::error::RecipeError;

/// A unit of work a recipe step can be dispatched to.
#[async_trait]
pub trait StepHandler: Send + Sync {
    /// Returns the step name this handler serves.
    fn name(&self) -> &'static str;

    /// Returns true if this handler should run for a step.
    ///
    /// Matches the declared step name case-insensitively by default.
    fn handles(&self, step_name: &str) -> bool {
        self.name().eq_ignore_ascii_case(step_name)
    }

    /// Execute the step. A handler may queue nested recipes on `step`.
    async fn execute(&self, step: &mut StepContext) -> Result<(), RecipeError>;
}

/// Ordered collection of step handlers.
///
/// Every handler that matches a step runs, in registration order.
#[derive(Clone, Default)]
pub struct HandlerRegistry {
    handlers: Vec<Arc<dyn StepHandler>>,
}

impl HandlerRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler.
    pub fn register<H: StepHandler + 'static>(&mut self, handler: H) {
        self.handlers.push(Arc::new(handler));
    }

    /// Register a shared handler.
    pub fn register_arc(&mut self, handler: Arc<dyn StepHandler>) {
        self.handlers.push(handler);
    }

    /// Handlers that match a step name, in registration order.
    pub fn matching(&self, step_name: &str) -> Vec<Arc<dyn StepHandler>> {
        self.handlers
            .iter()
            .filter(|h| h.handles(step_name))
            .cloned()
            .collect()
    }

    /// Check if any handler matches a step name.
    pub fn has(&self, step_name: &str) -> bool {
        self.handlers.iter().any(|h| h.handles(step_name))
    }

    /// List registered handler names.
    pub fn list(&self) -> Vec<&'static str> {
        self.handlers.iter().map(|h| h.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl std::fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerRegistry")
            .field("handlers", &self.list())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NamedHandler(&'static str);

    #[async_trait]
    impl StepHandler for NamedHandler {
        fn name(&self) -> &'static str {
            self.0
        }

        async fn execute(&self, _step: &mut StepContext) -> Result<(), RecipeError> {
            Ok(())
        }
    }

    struct AnyHandler;

    #[async_trait]
    impl StepHandler for AnyHandler {
        fn name(&self) -> &'static str {
            "audit"
        }

        fn handles(&self, _step_name: &str) -> bool {
            true
        }

        async fn execute(&self, _step: &mut StepContext) -> Result<(), RecipeError> {
            Ok(())
        }
    }

    #[test]
    fn test_registry_new() {
        let registry = HandlerRegistry::new();
        assert!(registry.is_empty());
        assert!(registry.matching("settings").is_empty());
    }

    #[test]
    fn test_matching_is_case_insensitive() {
        let mut registry = HandlerRegistry::new();
        registry.register(NamedHandler("settings"));

        assert!(registry.has("Settings"));
        assert!(registry.has("SETTINGS"));
        assert!(!registry.has("recipes"));
    }

    #[test]
    fn test_matching_preserves_registration_order() {
        let mut registry = HandlerRegistry::new();
        registry.register(AnyHandler);
        registry.register(NamedHandler("settings"));
        registry.register(NamedHandler("recipes"));
        registry.register(NamedHandler("settings"));

        let names: Vec<_> = registry.matching("settings").iter().map(|h| h.name()).collect();
        assert_eq!(names, vec!["audit", "settings", "settings"]);
        assert_eq!(registry.len(), 4);
        assert_eq!(registry.list(), vec!["audit", "settings", "recipes", "settings"]);
    }
}
