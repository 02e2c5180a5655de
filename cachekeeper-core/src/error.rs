use std::path::PathBuf;

use thiserror::Error;

/// Errors raised by the caching engine.
///
/// None of these surface from `Cache::get`/`Cache::put`: an absent key is an
/// absent result, and configuration problems are logged where they are applied.
#[derive(Error, Debug)]
pub enum CacheError {
    #[error("Configuration error: {0}")]
    Configuration(String),
    #[error("Unknown cache implementation: {0}")]
    UnknownImplementation(String),
    #[error("No cache policy registered under {0:?}")]
    PolicyNotFound(String),
    #[error("Operation not supported: {0}")]
    Unsupported(String),
    #[error("Monitoring registration failed: {0}")]
    Monitoring(String),
    #[error("Invalid cache name pattern: {0}")]
    InvalidPattern(#[from] regex::Error),
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse cache configuration: {0}")]
    Parse(#[from] toml::de::Error),
    #[cfg(feature = "watch")]
    #[error("Configuration watcher error: {0}")]
    Watch(#[from] notify::Error),
}

/// Result alias used throughout the crate.
pub type CacheResult<T> = Result<T, CacheError>;
