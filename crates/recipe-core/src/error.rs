//! Recipe execution error types.

use thiserror::Error;

use crate::result::RecipeResult;

/// Errors that can occur while executing a recipe.
#[derive(Debug, Error)]
pub enum RecipeError {
    /// The recipe document is not shaped like a recipe.
    #[error("Malformed recipe: {0}")]
    Parse(String),

    /// A step object has no string `name` field.
    #[error("Step {index} is missing a 'name' field")]
    MissingStepName { index: usize },

    /// Script evaluation error.
    #[error("Script error: {0}")]
    Script(String),

    /// A step handler failed.
    #[error("Step '{step}' failed: {message}")]
    Handler { step: String, message: String },

    /// An execution scope could not be created.
    #[error("Scope error: {0}")]
    Scope(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Tenant settings store error.
    #[error("Settings error: {0}")]
    Settings(String),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(String),
}

impl RecipeError {
    /// Build a handler failure for the named step.
    pub fn handler(step: impl Into<String>, message: impl Into<String>) -> Self {
        RecipeError::Handler {
            step: step.into(),
            message: message.into(),
        }
    }
}

impl From<std::io::Error> for RecipeError {
    fn from(e: std::io::Error) -> Self {
        RecipeError::Io(e.to_string())
    }
}

impl From<serde_json::Error> for RecipeError {
    fn from(e: serde_json::Error) -> Self {
        if e.is_data() {
            RecipeError::Parse(e.to_string())
        } else {
            RecipeError::Json(e.to_string())
        }
    }
}

impl From<minijinja::Error> for RecipeError {
    fn from(e: minijinja::Error) -> Self {
        RecipeError::Script(e.to_string())
    }
}

impl From<Box<rhai::EvalAltResult>> for RecipeError {
    fn from(e: Box<rhai::EvalAltResult>) -> Self {
        RecipeError::Script(format!("Rhai error: {}", e))
    }
}

/// A failed recipe run together with the steps recorded before it stopped.
#[derive(Debug, Error)]
#[error("Recipe execution '{}' failed: {error}", .result.execution_id)]
pub struct ExecutionFailure {
    /// Per-step bookkeeping up to and including the failed step.
    pub result: RecipeResult,

    /// The error that aborted the run.
    #[source]
    pub error: RecipeError,
}

impl ExecutionFailure {
    /// Discard the bookkeeping and keep the error.
    pub fn into_error(self) -> RecipeError {
        self.error
    }
}
