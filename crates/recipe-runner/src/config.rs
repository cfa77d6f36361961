//! Runner configuration.

use serde::Deserialize;
use std::path::PathBuf;

/// Runner configuration loaded from environment variables.
///
/// Environment variables are prefixed with `RECIPE_`:
/// - `RECIPE_APP_DATA`: Application data directory (default: "App_Data")
/// - `RECIPE_SITES_CONTAINER`: Directory of per-tenant data under app data (default: "Sites")
/// - `RECIPE_TENANT`: Tenant the recipe runs for (default: "Default")
#[derive(Debug, Clone, Deserialize)]
pub struct RunnerConfig {
    /// Application data directory
    #[serde(default = "default_app_data")]
    pub app_data: PathBuf,

    /// Per-tenant container directory
    #[serde(default = "default_sites_container")]
    pub sites_container: String,

    /// Tenant name
    #[serde(default = "default_tenant")]
    pub tenant: String,
}

fn default_app_data() -> PathBuf {
    PathBuf::from("App_Data")
}

fn default_sites_container() -> String {
    "Sites".to_string()
}

fn default_tenant() -> String {
    "Default".to_string()
}

impl RunnerConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, envy::Error> {
        envy::prefixed("RECIPE_").from_env::<RunnerConfig>()
    }

    /// Root directory of the tenant settings store.
    pub fn settings_root(&self) -> PathBuf {
        self.app_data.join(&self.sites_container)
    }
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            app_data: default_app_data(),
            sites_container: default_sites_container(),
            tenant: default_tenant(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = RunnerConfig::default();
        assert_eq!(config.app_data, PathBuf::from("App_Data"));
        assert_eq!(config.tenant, "Default");
        assert_eq!(config.settings_root(), PathBuf::from("App_Data").join("Sites"));
    }

    #[test]
    fn test_from_iter() {
        let vars = vec![
            ("RECIPE_APP_DATA".to_string(), "/var/lib/recipes".to_string()),
            ("RECIPE_TENANT".to_string(), "Blog".to_string()),
            ("OTHER".to_string(), "ignored".to_string()),
        ];
        let config: RunnerConfig = envy::prefixed("RECIPE_").from_iter(vars).unwrap();

        assert_eq!(config.app_data, PathBuf::from("/var/lib/recipes"));
        assert_eq!(config.sites_container, "Sites");
        assert_eq!(config.tenant, "Blog");
    }
}
