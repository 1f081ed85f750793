//! Error types for modelcache.

use std::path::PathBuf;

use thiserror::Error;

/// Default result type for modelcache.
pub type ModelCacheResult<T> = Result<T, ModelCacheError>;

/// Errors raised by the cache layer and its surroundings.
///
/// Every cache error is fatal for the evaluation that raised it. None of
/// them is ever turned back into a cache miss.
#[derive(Error, Debug)]
pub enum ModelCacheError {
    /// A configuration or input value has no deterministic serialization.
    #[error("cannot serialize {context} deterministically: {reason}")]
    Serialization { context: String, reason: String },

    /// A cache file exists but could not be read back as an entry.
    #[error("cache file {} is corrupt: {reason}", path.display())]
    Corruption { path: PathBuf, reason: String },

    /// Creating the cache directory or writing an entry failed.
    #[error("failed to write cache at {}: {source}", path.display())]
    Storage {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Configuration not found at: {0}")]
    ConfigNotFound(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("Failed to serialize TOML: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}

impl ModelCacheError {
    /// Creates a generic error.
    pub fn other<S: Into<String>>(msg: S) -> Self {
        Self::Other(msg.into())
    }

    /// Creates a configuration error.
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Self::Config(msg.into())
    }

    /// Creates a serialization error for the given field or document.
    pub fn serialization<C: Into<String>, R: Into<String>>(context: C, reason: R) -> Self {
        Self::Serialization {
            context: context.into(),
            reason: reason.into(),
        }
    }

    /// Creates a corruption error for a cache file.
    pub fn corruption<P: Into<PathBuf>, R: ToString>(path: P, reason: R) -> Self {
        Self::Corruption {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    /// Creates a storage error for a cache path.
    pub fn storage<P: Into<PathBuf>>(path: P, source: std::io::Error) -> Self {
        Self::Storage {
            path: path.into(),
            source,
        }
    }

    /// Whether the error comes from writing to the cache directory.
    pub fn is_storage(&self) -> bool {
        matches!(self, Self::Storage { .. })
    }
}
