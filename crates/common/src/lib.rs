//! pagewalk Common Library
//!
//! Configuration, identities and resource naming shared by the harness and
//! the command-line front end.

pub mod config;
pub mod error;
pub mod naming;
pub mod types;

// Re-export commonly used types
pub use config::{
    ArtifactsConfig, AuthConfig, BrowserConfig, BrowserKind, ScenarioConfig, SuiteConfig, TimeoutConfig,
};
pub use error::{Error, Result};
pub use naming::UniqueNames;
pub use types::*;

/// pagewalk version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default configuration file looked up in the working directory
pub const DEFAULT_CONFIG_FILE: &str = "pagewalk.toml";

/// Prefix of every environment override
pub const ENV_PREFIX: &str = "PAGEWALK_";
