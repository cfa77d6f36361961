//! `settings` step: merge values into the tenant's settings.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::context::StepContext;
use crate::error::RecipeError;
use crate::registry::StepHandler;
use crate::settings::TenantSettingsStore;

/// Handles `{"name": "settings", "values": {"Key": "value", "Old": null}}`.
///
/// A `null` value removes the key.
pub struct SettingsStep {
    store: Arc<TenantSettingsStore>,
    tenant: String,
}

impl SettingsStep {
    pub fn new(store: Arc<TenantSettingsStore>, tenant: impl Into<String>) -> Self {
        Self {
            store,
            tenant: tenant.into(),
        }
    }
}

#[async_trait]
impl StepHandler for SettingsStep {
    fn name(&self) -> &'static str {
        "settings"
    }

    async fn execute(&self, step: &mut StepContext) -> Result<(), RecipeError> {
        let values: BTreeMap<String, Option<Value>> = step
            .parse_field("values")
            .map_err(|e| RecipeError::handler(&step.name, format!("Invalid 'values': {}", e)))?
            .ok_or_else(|| RecipeError::handler(&step.name, "Missing 'values' object"))?;

        self.store
            .save(&self.tenant, &values)
            .await
            .map_err(|e| RecipeError::handler(&step.name, e.to_string()))?;

        tracing::info!(
            execution_id = %step.execution_id,
            tenant = %self.tenant,
            keys = values.len(),
            "Updated tenant settings"
        );
        Ok(())
    }
}
