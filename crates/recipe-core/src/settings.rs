//! Per-tenant configuration store.
//!
//! Each tenant owns `<root>/<tenant>/appsettings.json`. Saves merge into the
//! existing document and are serialized per tenant.

use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use crate::error::RecipeError;

const SETTINGS_FILE: &str = "appsettings.json";

/// File-backed tenant settings.
#[derive(Debug)]
pub struct TenantSettingsStore {
    root: PathBuf,
    locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl TenantSettingsStore {
    /// Open a store rooted at `root`, creating the directory if needed.
    pub async fn open(root: impl Into<PathBuf>) -> Result<Self, RecipeError> {
        let root = root.into();
        tokio::fs::create_dir_all(&root).await.map_err(|e| {
            RecipeError::Settings(format!("Cannot create '{}': {}", root.display(), e))
        })?;

        Ok(Self {
            root,
            locks: Mutex::new(HashMap::new()),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Load a tenant's settings. Missing settings load as an empty object.
    pub async fn load(&self, tenant: &str) -> Result<Map<String, Value>, RecipeError> {
        let path = self.settings_path(tenant)?;
        read_settings(&path).await
    }

    /// Merge values into a tenant's settings. `None` removes the key.
    pub async fn save(
        &self,
        tenant: &str,
        data: &BTreeMap<String, Option<Value>>,
    ) -> Result<(), RecipeError> {
        let path = self.settings_path(tenant)?;
        let lock = self.lock_for(tenant);
        let _guard = lock.lock().await;

        let mut settings = read_settings(&path).await?;
        for (key, value) in data {
            match value {
                Some(value) => {
                    settings.insert(key.clone(), value.clone());
                }
                None => {
                    settings.remove(key);
                }
            }
        }

        if let Some(dir) = path.parent() {
            tokio::fs::create_dir_all(dir).await?;
        }
        let json = serde_json::to_string_pretty(&Value::Object(settings))?;
        tokio::fs::write(&path, json).await?;

        tracing::debug!(tenant = %tenant, keys = data.len(), "Saved tenant settings");
        Ok(())
    }

    fn settings_path(&self, tenant: &str) -> Result<PathBuf, RecipeError> {
        let valid = !tenant.is_empty()
            && tenant != "."
            && tenant != ".."
            && !tenant.contains(['/', '\\'])
            && !tenant.contains("..");

        if !valid {
            return Err(RecipeError::Settings(format!(
                "Invalid tenant name '{}'",
                tenant
            )));
        }

        Ok(self.root.join(tenant).join(SETTINGS_FILE))
    }

    /// Per-tenant save lock. Entries nobody holds are dropped on the way.
    fn lock_for(&self, tenant: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        locks.retain(|_, lock| Arc::strong_count(lock) > 1);
        locks.entry(tenant.to_string()).or_default().clone()
    }
}

async fn read_settings(path: &Path) -> Result<Map<String, Value>, RecipeError> {
    match tokio::fs::read_to_string(path).await {
        Ok(content) => serde_json::from_str(&content).map_err(|e| {
            RecipeError::Settings(format!("Invalid settings file '{}': {}", path.display(), e))
        }),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Map::new()),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn values(entries: &[(&str, Option<Value>)]) -> BTreeMap<String, Option<Value>> {
        entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[tokio::test]
    async fn test_load_missing_tenant() {
        let dir = tempfile::tempdir().unwrap();
        let store = TenantSettingsStore::open(dir.path().join("Sites")).await.unwrap();
        assert!(store.load("Default").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_save_merges_and_removes() {
        let dir = tempfile::tempdir().unwrap();
        let store = TenantSettingsStore::open(dir.path()).await.unwrap();

        store
            .save(
                "Default",
                &values(&[("Theme", Some(json!("Dark"))), ("Old", Some(json!(1)))]),
            )
            .await
            .unwrap();
        store
            .save(
                "Default",
                &values(&[("Old", None), ("Lang", Some(json!("en")))]),
            )
            .await
            .unwrap();

        let settings = store.load("Default").await.unwrap();
        assert_eq!(Value::Object(settings), json!({"Theme": "Dark", "Lang": "en"}));
        assert!(dir.path().join("Default").join(SETTINGS_FILE).exists());
    }

    #[tokio::test]
    async fn test_tenants_are_separate() {
        let dir = tempfile::tempdir().unwrap();
        let store = TenantSettingsStore::open(dir.path()).await.unwrap();

        store.save("a", &values(&[("k", Some(json!("a")))])).await.unwrap();
        store.save("b", &values(&[("k", Some(json!("b")))])).await.unwrap();

        assert_eq!(store.load("a").await.unwrap()["k"], json!("a"));
        assert_eq!(store.load("b").await.unwrap()["k"], json!("b"));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_saves_to_one_tenant() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(TenantSettingsStore::open(dir.path()).await.unwrap());

        let tasks: Vec<_> = (0..16)
            .map(|i| {
                let store = store.clone();
                tokio::spawn(async move {
                    let key = format!("k{}", i);
                    store
                        .save("Default", &values(&[(key.as_str(), Some(json!(i)))]))
                        .await
                })
            })
            .collect();
        for task in tasks {
            task.await.unwrap().unwrap();
        }

        assert_eq!(store.load("Default").await.unwrap().len(), 16);
    }

    #[tokio::test]
    async fn test_idle_tenant_locks_are_pruned() {
        let dir = tempfile::tempdir().unwrap();
        let store = TenantSettingsStore::open(dir.path()).await.unwrap();

        for i in 0..8 {
            let tenant = format!("t{}", i);
            store.save(&tenant, &values(&[("k", Some(json!(i)))])).await.unwrap();
        }

        let held = store.lock_for("t0");
        let locks = store.locks.lock().unwrap();
        assert_eq!(locks.len(), 1);
        assert!(Arc::ptr_eq(&locks["t0"], &held));
    }

    #[tokio::test]
    async fn test_invalid_tenant_names() {
        let dir = tempfile::tempdir().unwrap();
        let store = TenantSettingsStore::open(dir.path()).await.unwrap();

        for name in ["", "..", "a/b", "a\\b", "x..y"] {
            assert!(matches!(
                store.load(name).await,
                Err(RecipeError::Settings(_))
            ));
        }
    }

    #[tokio::test]
    async fn test_corrupt_settings_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = TenantSettingsStore::open(dir.path()).await.unwrap();
        std::fs::create_dir(dir.path().join("Default")).unwrap();
        std::fs::write(dir.path().join("Default").join(SETTINGS_FILE), "not json").unwrap();

        assert!(matches!(
            store.load("Default").await,
            Err(RecipeError::Settings(_))
        ));
    }
}
