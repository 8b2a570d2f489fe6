//! CLI Commands

pub mod check;
pub mod driver;
pub mod list;
pub mod run;

use anyhow::{Context, Result};
use std::path::Path;
use tracing::debug;

use pagewalk_common::SuiteConfig;
use pagewalk_e2e::TestSpec;

/// Read the config file (defaults when absent) and apply `PAGEWALK_*` overrides
pub fn load_config(path: &Path) -> Result<SuiteConfig> {
    let config = SuiteConfig::load(path)
        .with_context(|| format!("Failed to load {}", path.display()))?
        .with_env()?;
    debug!("Console under test: {}", config.base_url);
    Ok(config)
}

/// YAML scenarios below `dir`, narrowed by tag and name substring
pub fn load_specs(dir: &Path, tag: Option<&str>, name: Option<&str>) -> Result<Vec<TestSpec>> {
    let specs = TestSpec::load_all(dir)
        .with_context(|| format!("Failed to load scenarios from {}", dir.display()))?;

    Ok(specs
        .into_iter()
        .filter(|s| tag.map_or(true, |t| s.has_tag(t)))
        .filter(|s| name.map_or(true, |n| s.name.contains(n)))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    const LOGIN: &str = r#"
name: login-smoke
tags: [smoke]
steps:
  - action: open
"#;

    const LIBRARY: &str = r#"
name: library-browse
tags: [library]
steps:
  - action: open
    path: /library
"#;

    #[test]
    fn test_load_specs_filters() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("login.yaml"), LOGIN).unwrap();
        std::fs::write(dir.path().join("library.yml"), LIBRARY).unwrap();

        assert_eq!(load_specs(dir.path(), None, None).unwrap().len(), 2);

        let smoke = load_specs(dir.path(), Some("smoke"), None).unwrap();
        assert_eq!(smoke.len(), 1);
        assert_eq!(smoke[0].name, "login-smoke");

        let library = load_specs(dir.path(), None, Some("library")).unwrap();
        assert_eq!(library[0].name, "library-browse");
        assert!(load_specs(dir.path(), Some("smoke"), Some("library")).unwrap().is_empty());
    }

    #[test]
    fn test_missing_config_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_config(&dir.path().join("pagewalk.toml")).unwrap();
        assert!(config.base_url.starts_with("http"));
    }
}
