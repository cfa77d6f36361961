//! Built-in step handlers.
//!
//! - `settings`: merges values into the tenant settings store
//! - `recipes`: queues nested recipe files

mod recipes;
mod settings;

pub use self::recipes::{RecipeReference, RecipesStep};
pub use self::settings::SettingsStep;

use std::sync::Arc;

use crate::registry::HandlerRegistry;
use crate::scope::TenantSettings;
use crate::settings::TenantSettingsStore;

/// Create a registry with all built-in handlers for a tenant.
pub fn create_default_registry(
    store: Arc<TenantSettingsStore>,
    tenant: &TenantSettings,
) -> HandlerRegistry {
    let mut registry = HandlerRegistry::new();
    registry.register(SettingsStep::new(store, tenant.name.clone()));
    registry.register(RecipesStep::new());
    registry
}
