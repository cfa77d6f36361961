//! Recipe Runner binary.
//!
//! Executes one recipe file for a tenant and prints a per-step summary.

mod config;
mod summary;

use anyhow::{Context, Result};
use clap::Parser;
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use recipe_core::handlers::create_default_registry;
use recipe_core::{
    CancellationToken, Environment, RecipeDescriptor, RecipeEvents, RecipeExecutor, TenantHost,
    TenantSettings, TenantSettingsStore,
};

use crate::config::RunnerConfig;
use crate::summary::{print_summary, SummaryObserver};

#[derive(Parser, Debug)]
#[command(name = "recipe-run")]
#[command(author, version, about = "Execute a JSON recipe", long_about = None)]
struct Args {
    /// Recipe file to execute
    recipe: PathBuf,

    /// Tenant to run the recipe for (overrides RECIPE_TENANT)
    #[arg(short, long)]
    tenant: Option<String>,

    /// Environment entry passed to the recipe as a parameter (repeatable)
    #[arg(short, long = "param", value_name = "KEY=VALUE", value_parser = parse_param)]
    params: Vec<(String, Value)>,

    /// Run every step of the recipe in a new scope
    #[arg(long)]
    isolated: bool,

    /// Execution ID (default: random UUID)
    #[arg(long)]
    execution_id: Option<String>,
}

/// Parse `key=value`. The value is read as JSON when possible, otherwise as a string.
fn parse_param(s: &str) -> Result<(String, Value), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("invalid KEY=VALUE: no '=' found in '{}'", s))?;

    let key = key.trim();
    if key.is_empty() {
        return Err(format!("invalid KEY=VALUE: empty key in '{}'", s));
    }

    let value = serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_string()));
    Ok((key.to_string(), value))
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,recipe_core=debug,recipe_runner=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load environment variables
    dotenvy::dotenv().ok();

    let args = Args::parse();
    let config = RunnerConfig::from_env().context("Failed to load RECIPE_* configuration")?;
    let tenant = TenantSettings::new(args.tenant.clone().unwrap_or_else(|| config.tenant.clone()));

    tracing::info!(
        recipe = %args.recipe.display(),
        tenant = %tenant.name,
        settings_root = %config.settings_root().display(),
        "Runner configuration loaded"
    );

    let store = Arc::new(TenantSettingsStore::open(config.settings_root()).await?);
    let host = Arc::new(TenantHost::new(move |tenant| {
        Ok(create_default_registry(store.clone(), tenant))
    }));
    let ambient = host.build_scope(&tenant)?;

    let observer = Arc::new(SummaryObserver::new());
    let mut events = RecipeEvents::new();
    events.register_arc(observer.clone());

    let executor = RecipeExecutor::new(ambient, host).with_events(events);

    // Cancel at the next step boundary on Ctrl-C
    let cancel = CancellationToken::new();
    let signal_token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Shutdown signal received, cancelling recipe");
            signal_token.cancel();
        }
    });

    let execution_id = args
        .execution_id
        .clone()
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
    let descriptor =
        Arc::new(RecipeDescriptor::from_file(&args.recipe).with_new_scope(args.isolated));
    let environment: Environment = args.params.into_iter().collect();

    let outcome = executor
        .run(execution_id, descriptor, environment, &cancel)
        .await;

    print_summary(&observer.recipes());

    match outcome {
        Ok(result) if result.cancelled => {
            tracing::warn!(execution_id = %result.execution_id, "Recipe cancelled");
            Ok(())
        }
        Ok(result) => {
            tracing::info!(
                execution_id = %result.execution_id,
                steps = result.steps.len(),
                "Recipe completed"
            );
            Ok(())
        }
        Err(failure) => Err(failure.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_param() {
        assert_eq!(
            parse_param("site=Blog").unwrap(),
            ("site".to_string(), json!("Blog"))
        );
        assert_eq!(parse_param("port=8080").unwrap(), ("port".to_string(), json!(8080)));
        assert_eq!(
            parse_param("flags=[\"a\"]").unwrap(),
            ("flags".to_string(), json!(["a"]))
        );
        assert_eq!(parse_param("empty=").unwrap(), ("empty".to_string(), json!("")));
        assert!(parse_param("novalue").is_err());
        assert!(parse_param("=x").is_err());
    }

    #[test]
    fn test_args() {
        let args = Args::parse_from([
            "recipe-run",
            "setup.recipe.json",
            "--tenant",
            "Blog",
            "-p",
            "site=Blog",
            "--param",
            "port=80",
            "--isolated",
        ]);
        assert_eq!(args.recipe, PathBuf::from("setup.recipe.json"));
        assert_eq!(args.tenant.as_deref(), Some("Blog"));
        assert_eq!(args.params.len(), 2);
        assert!(args.isolated);
        assert!(args.execution_id.is_none());
    }
}
