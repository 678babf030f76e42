use anyhow::{Context, Result};
use declarative::RetryConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Get the config directory path
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir().context("Could not determine home directory")?;
    Ok(home.join(".config").join("provisio"))
}

/// Get the config file path
pub fn config_path() -> Result<PathBuf> {
    Ok(config_dir()?.join("config.toml"))
}

// ============================================================================
// Main Config Schema
// ============================================================================

/// User configuration for provisio
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProvisioConfig {
    /// Existence lookup retry settings
    pub retry: RetrySection,

    /// Location of the file-backed store
    pub store: StoreSection,

    /// Deployment defaults
    pub deploy: DeploySection,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySection {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub backoff_factor: f64,
    pub max_delay_ms: u64,
}

impl Default for RetrySection {
    fn default() -> Self {
        let defaults = RetryConfig::default();
        Self {
            max_attempts: defaults.max_attempts,
            base_delay_ms: u64::try_from(defaults.base_delay.as_millis()).unwrap_or(u64::MAX),
            backoff_factor: defaults.backoff_factor,
            max_delay_ms: u64::try_from(defaults.max_delay.as_millis()).unwrap_or(u64::MAX),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreSection {
    /// Store file; `~` is expanded
    pub path: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeploySection {
    pub jobs: usize,
}

impl Default for DeploySection {
    fn default() -> Self {
        Self { jobs: 1 }
    }
}

impl ProvisioConfig {
    /// Load from ~/.config/provisio/config.toml, or defaults if absent
    pub fn load() -> Result<Self> {
        Self::load_from(&config_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Could not read config file: {}", path.display()))?;

        toml::from_str(&content).context("Invalid TOML format in provisio config")
    }

    /// Retry settings for existence lookups. At least one attempt is made.
    pub fn retry_config(&self) -> RetryConfig {
        let section = &self.retry;
        RetryConfig {
            max_attempts: section.max_attempts.max(1),
            base_delay: Duration::from_millis(section.base_delay_ms),
            backoff_factor: if section.backoff_factor.is_finite() && section.backoff_factor >= 1.0
            {
                section.backoff_factor
            } else {
                1.0
            },
            max_delay: Duration::from_millis(section.max_delay_ms),
        }
    }

    /// Resolve the store file: explicit override, then config, then the
    /// platform data directory.
    pub fn store_path(&self, cli_override: Option<&Path>) -> Result<PathBuf> {
        if let Some(path) = cli_override {
            return Ok(path.to_path_buf());
        }
        if let Some(path) = &self.store.path {
            let expanded = shellexpand::tilde(path);
            return Ok(PathBuf::from(expanded.as_ref()));
        }
        let data = dirs::data_dir().context("Could not determine data directory")?;
        Ok(data.join("provisio").join("store.json"))
    }

    /// Parallel jobs, with CLI override. Never zero.
    pub fn jobs(&self, cli_override: Option<usize>) -> usize {
        cli_override.unwrap_or(self.deploy.jobs).max(1)
    }
}
