//! Recipe execution engine.
//!
//! This crate provides:
//! - Streaming reader for JSON recipes (`variables` plus ordered `steps`)
//! - Script-node resolution of bracketed values with rhai, jinja and file engines
//! - Step dispatch to pluggable handlers through a registry
//! - Ambient and isolated execution scopes per tenant
//! - Recursive execution of nested recipes with cooperative cancellation
//! - Built-in `settings` and `recipes` step handlers

pub mod context;
pub mod descriptor;
pub mod dispatcher;
pub mod error;
pub mod events;
pub mod executor;
pub mod handlers;
pub mod providers;
pub mod reader;
pub mod registry;
pub mod result;
pub mod scope;
pub mod script;
pub mod settings;

pub use context::{Environment, ExecutionContext, StepContext};
pub use descriptor::RecipeDescriptor;
pub use error::{ExecutionFailure, RecipeError};
pub use events::{RecipeEventHandler, RecipeEvents};
pub use executor::RecipeExecutor;
pub use registry::{HandlerRegistry, StepHandler};
pub use result::{RecipeResult, StepOutcome, StepResult};
pub use scope::{ExecutionScope, ScopeProvider, TenantHost, TenantSettings};
pub use script::{ScriptingEngine, ScriptingManager};
pub use settings::TenantSettingsStore;

pub use tokio_util::sync::CancellationToken;
