//! Configuration file
//!
//! An optional `config.toml` supplying default facts and output/execution
//! preferences. A missing file means defaults everywhere.

use anyhow::{Context, Result};
use reconcile::FactContext;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// The converge configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConvergeConfig {
    /// Default facts for requests that omit them
    #[serde(default)]
    pub facts: FactsConfig,

    #[serde(default)]
    pub output: OutputConfig,

    #[serde(default)]
    pub execution: ExecutionConfig,
}

/// `[facts]` section
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FactsConfig {
    pub os: Option<String>,
    pub platform: Option<String>,
    pub platform_family: Option<String>,
    pub platform_version: Option<String>,

    /// Probe the host (`/etc/os-release`) for facts the request leaves out
    #[serde(default)]
    pub detect: bool,
}

/// `[output]` section
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OutputConfig {
    /// Pretty-print the emitted JSON
    #[serde(default)]
    pub pretty: bool,
}

/// `[execution]` section
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExecutionConfig {
    /// Report changes without making them
    #[serde(default)]
    pub noop: bool,
}

impl ConvergeConfig {
    /// Load from an explicit path, or from the default location
    ///
    /// An explicit path must exist; the default location may be absent.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        match explicit {
            Some(path) => Self::load_from(&crate::paths::expand(&path.to_string_lossy())),
            None => {
                let path = crate::paths::config_file()?;
                if !path.exists() {
                    log::debug!("No config at {}, using defaults", path.display());
                    return Ok(Self::default());
                }
                Self::load_from(&path)
            }
        }
    }

    /// Load a config file
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Could not read config file: {}", path.display()))?;

        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Invalid TOML format in {}", path.display()))?;
        log::debug!("Loaded config from {}", path.display());
        Ok(config)
    }
}

impl FactsConfig {
    /// The configured fact values (without detection)
    pub fn to_facts(&self) -> FactContext {
        FactContext {
            os: self.os.clone(),
            platform: self.platform.clone(),
            platform_family: self.platform_family.clone(),
            platform_version: self.platform_version.clone(),
        }
    }

    /// Defaults to merge under request facts
    ///
    /// Configured values win over detected ones. The engines fall back to
    /// generic Linux when the result is still empty.
    pub fn defaults(&self, detect: bool) -> FactContext {
        let configured = self.to_facts();
        if detect || self.detect {
            configured.merged_over(&FactContext::detect())
        } else {
            configured
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_empty_config_is_default() {
        let config: ConvergeConfig = toml::from_str("").unwrap();
        assert_eq!(config, ConvergeConfig::default());
    }

    #[test]
    fn test_full_config() {
        let config: ConvergeConfig = toml::from_str(
            r#"
            [facts]
            os = "linux"
            platform = "ubuntu"
            platform_version = "22.04"

            [output]
            pretty = true

            [execution]
            noop = true
            "#,
        )
        .unwrap();

        assert!(config.output.pretty);
        assert!(config.execution.noop);
        assert!(!config.facts.detect);
        let facts = config.facts.to_facts();
        assert_eq!(facts.family(), Some("debian"));
        assert_eq!(facts.platform_version.as_deref(), Some("22.04"));
    }

    #[test]
    fn test_unknown_keys_rejected() {
        assert!(toml::from_str::<ConvergeConfig>("[output]\npretty = true\ncolor = 1\n").is_err());
        assert!(toml::from_str::<ConvergeConfig>("[nope]\n").is_err());
    }

    #[test]
    fn test_load_from_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("config.toml");
        std::fs::write(&path, "[facts]\nplatform_family = \"rhel\"\n").unwrap();

        let config = ConvergeConfig::load(Some(&path)).unwrap();
        assert_eq!(config.facts.platform_family.as_deref(), Some("rhel"));
    }

    #[test]
    fn test_explicit_missing_file_fails() {
        let tmp = TempDir::new().unwrap();
        let err = ConvergeConfig::load(Some(&tmp.path().join("missing.toml"))).unwrap_err();
        assert!(err.to_string().contains("missing.toml"));
    }

    #[test]
    fn test_invalid_toml_fails() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("config.toml");
        std::fs::write(&path, "[facts\n").unwrap();
        assert!(ConvergeConfig::load_from(&path).is_err());
    }

    #[test]
    fn test_defaults_without_detection() {
        let facts = FactsConfig {
            platform: Some("arch".into()),
            ..Default::default()
        };
        let defaults = facts.defaults(false);
        assert_eq!(defaults.platform(), Some("arch"));
        assert_eq!(defaults.os(), None);
    }
}
