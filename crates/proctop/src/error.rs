//! Error types for proctop.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that end the monitor session.
#[derive(Debug, Error)]
pub enum MonitorError {
    /// IO error from terminal operations.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The process provider failed every attempt of a refresh.
    #[error("process information unavailable after {attempts} attempt(s): {reason}")]
    ProviderUnavailable { attempts: u32, reason: String },

    /// Configuration could not be loaded.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Standard output is not an interactive terminal.
    #[error("Terminal not available: proctop needs an interactive terminal")]
    TerminalNotAvailable,
}

/// Errors loading the YAML configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config {path}: {message}")]
    Parse { path: PathBuf, message: String },
}
