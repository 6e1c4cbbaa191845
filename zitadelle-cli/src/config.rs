//! Configuration management

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use zitadelle_testing::{ReporterKind, RunnerConfig};

pub const DEFAULT_CONFIG_FILE: &str = "zitadelle.toml";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CliConfig {
    /// Runner configuration
    #[serde(default)]
    pub runner: RunnerConfig,
}

impl CliConfig {
    /// Load configuration from file, falling back to defaults when absent
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        let config_path = config_path
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));

        if !config_path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;

        let config: CliConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", config_path.display()))?;

        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self, config_path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;

        if let Some(parent) = config_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        fs::write(config_path, content)
            .with_context(|| format!("Failed to write config file: {}", config_path.display()))?;

        Ok(())
    }

    /// Command-line flags take precedence over the file
    pub fn apply_overrides(
        &mut self,
        verbose: bool,
        exclude_tags: Vec<String>,
        format: Option<ReporterKind>,
    ) {
        self.runner.verbose |= verbose;
        for tag in exclude_tags {
            if !self.runner.tag_filter.contains(&tag) {
                self.runner.tag_filter.push(tag);
            }
        }
        if let Some(format) = format {
            self.runner.reporter = format;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_config_load_save() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("nested").join("zitadelle.toml");

        let mut config = CliConfig::default();
        config.runner.tag_filter = vec!["slow".to_string()];
        config.runner.reporter = ReporterKind::Json;
        config.save(&config_path).unwrap();

        let loaded = CliConfig::load(Some(&config_path)).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_missing_config_is_default() {
        let temp_dir = TempDir::new().unwrap();
        let loaded = CliConfig::load(Some(&temp_dir.path().join("absent.toml"))).unwrap();
        assert_eq!(loaded, CliConfig::default());
    }

    #[test]
    fn test_invalid_config_names_the_file() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("broken.toml");
        fs::write(&config_path, "[runner]\nreporter = \"junit\"\n").unwrap();

        let error = CliConfig::load(Some(&config_path)).unwrap_err();
        assert!(error.to_string().contains("broken.toml"));
    }

    #[test]
    fn test_overrides_take_precedence() {
        let mut config: CliConfig =
            toml::from_str("[runner]\ntag_filter = [\"net\"]\nverbose = false\n").unwrap();

        config.apply_overrides(
            true,
            vec!["net".to_string(), "slow".to_string()],
            Some(ReporterKind::Json),
        );

        assert!(config.runner.verbose);
        assert_eq!(config.runner.tag_filter, vec!["net", "slow"]);
        assert_eq!(config.runner.reporter, ReporterKind::Json);
        assert!(config.runner.show_platform);
    }
}
