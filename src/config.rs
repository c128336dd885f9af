use crate::error::ConfigError;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_MODEL: &str = "gpt-4-turbo-preview";

/// Runtime configuration, usually loaded from a TOML file.
///
/// ```toml
/// default_model = "claude-3-sonnet"
///
/// [simulation]
/// execute_latency_ms = 1200
///
/// [store]
/// snapshot_path = "data/store.bin"
/// ```
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Config {
    pub default_model: String,
    /// Keys shorter than or equal to this are rejected by API-key validation.
    pub api_key_min_length: usize,
    pub simulation: SimulationConfig,
    pub store: StoreConfig,
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    pub analyze_latency_ms: u64,
    pub generate_form_latency_ms: u64,
    pub execute_latency_ms: u64,
}

impl SimulationConfig {
    pub fn analyze_latency(&self) -> Duration {
        Duration::from_millis(self.analyze_latency_ms)
    }

    pub fn generate_form_latency(&self) -> Duration {
        Duration::from_millis(self.generate_form_latency_ms)
    }

    pub fn execute_latency(&self) -> Duration {
        Duration::from_millis(self.execute_latency_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub snapshot_path: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_model: DEFAULT_MODEL.to_string(),
            api_key_min_length: 10,
            simulation: SimulationConfig::default(),
            store: StoreConfig::default(),
        }
    }
}

impl Config {
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Applies `CHAINFORGE_DEFAULT_MODEL` and `CHAINFORGE_SNAPSHOT` on top of `self`.
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(model) = lookup("CHAINFORGE_DEFAULT_MODEL").filter(|m| !m.trim().is_empty()) {
            self.default_model = model;
        }
        if let Some(path) = lookup("CHAINFORGE_SNAPSHOT").filter(|p| !p.trim().is_empty()) {
            self.store.snapshot_path = Some(PathBuf::from(path));
        }
        self
    }
}
