//! Configuration for modelcache.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::ModelCacheResult;

/// Main configuration for modelcache.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// General settings.
    #[serde(default)]
    pub general: GeneralConfig,

    /// Cache settings shared by every cached model.
    #[serde(default)]
    pub cache: CacheSettings,
}

/// General settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Log format (text, json).
    #[serde(default = "default_log_format")]
    pub log_format: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_format: default_log_format(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "text".to_string()
}

/// What to do when an entry cannot be written to the cache directory.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum StoreErrorPolicy {
    /// Abort the evaluation with the storage error.
    #[default]
    Fail,
    /// Log a warning and keep the freshly computed outputs.
    Warn,
}

impl std::fmt::Display for StoreErrorPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreErrorPolicy::Fail => write!(f, "fail"),
            StoreErrorPolicy::Warn => write!(f, "warn"),
        }
    }
}

/// Cache settings carried by a model configuration.
///
/// None of these fields affect computed outputs, so they are stripped from
/// the configuration before it is hashed into a cache key.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CacheSettings {
    /// Read and write cached results.
    #[serde(default = "default_true")]
    pub enable_caching: bool,

    /// Directory holding one file per cache entry.
    #[serde(default = "default_cache_dir")]
    pub cache_dir: PathBuf,

    /// Failure policy for writes.
    #[serde(default)]
    pub on_store_error: StoreErrorPolicy,
}

impl CacheSettings {
    /// Enabled cache rooted at `cache_dir`.
    pub fn enabled(cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            enable_caching: true,
            cache_dir: cache_dir.into(),
            on_store_error: StoreErrorPolicy::Fail,
        }
    }

    /// Disabled cache. The directory is kept but never touched.
    pub fn disabled(cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            enable_caching: false,
            ..Self::enabled(cache_dir)
        }
    }

    /// Sets the storage failure policy.
    pub fn with_store_error_policy(mut self, policy: StoreErrorPolicy) -> Self {
        self.on_store_error = policy;
        self
    }
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self::enabled(default_cache_dir())
    }
}

fn default_true() -> bool {
    true
}

fn default_cache_dir() -> PathBuf {
    PathBuf::from("cache")
}

impl Config {
    /// Loads configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> ModelCacheResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Saves configuration to a TOML file.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> ModelCacheResult<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Creates default configuration.
    pub fn default_config() -> Self {
        Self {
            general: GeneralConfig::default(),
            cache: CacheSettings::default(),
        }
    }

    /// Tries to load configuration from current directory or uses default.
    pub fn load_or_default() -> Self {
        Self::load("modelcache.toml").unwrap_or_else(|_| Self::default_config())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::default_config()
    }
}
