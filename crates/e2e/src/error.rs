//! Error types for the scenario harness

use thiserror::Error;

#[derive(Error, Debug)]
pub enum E2eError {
    #[error("Driver failed to start: {0}")]
    DriverStartup(String),

    #[error("Readiness check of {url} failed after {attempts} attempts")]
    DriverHealthCheck { url: String, attempts: usize },

    #[error("WebDriver command '{command}' failed: {message}")]
    WebDriver { command: String, message: String },

    #[error("Navigation to {url} failed: {reason}")]
    Navigation { url: String, reason: String },

    #[error("Authentication as '{login}' failed: {reason}")]
    Authentication { login: String, reason: String },

    #[error("Element {element} not interactable: {state}")]
    ElementNotInteractable { element: String, state: String },

    #[error("Timed out after {elapsed_ms} ms waiting for {description}; last observed: {last_observed}")]
    AssertionTimeout {
        description: String,
        elapsed_ms: u64,
        last_observed: String,
    },

    #[error("Output mismatch:\n{0}")]
    OutputMismatch(String),

    #[error("Page '{page}' belongs to an earlier browser session")]
    StalePage { page: String },

    #[error("No browser session is open")]
    NoSession,

    #[error("Not logged in")]
    NotLoggedIn,

    #[error("Impersonation error: {0}")]
    Impersonation(String),

    #[error("Fixture cannot go from {from} to {to}")]
    InvalidStateTransition { from: String, to: String },

    #[error("Cleanup of {resource} failed: {reason}")]
    FixtureCleanup { resource: String, reason: String },

    #[error("Test spec parse error: {0}")]
    SpecParse(String),

    #[error("Step failed: {step} - {reason}")]
    StepFailed { step: String, reason: String },

    #[error("Configuration error: {0}")]
    Config(#[from] pagewalk_common::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl E2eError {
    /// Whether the error means the UI did not reach an expected state in time
    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            E2eError::AssertionTimeout { .. } | E2eError::ElementNotInteractable { .. }
        )
    }
}

pub type E2eResult<T> = Result<T, E2eError>;
