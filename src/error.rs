//! Structured error types for configuration loading.
//!
//! None of these errors are fatal: the session logs them, records them as
//! [`Diagnostic`]s and leaves its state intact.

use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Error codes for programmatic error handling.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    InvalidDirectory,
    MissingConfigFile,
    InvalidConfigFile,
    InvalidDelimiter,
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorCode::InvalidDirectory => write!(f, "INVALID_DIRECTORY"),
            ErrorCode::MissingConfigFile => write!(f, "MISSING_CONFIG_FILE"),
            ErrorCode::InvalidConfigFile => write!(f, "INVALID_CONFIG_FILE"),
            ErrorCode::InvalidDelimiter => write!(f, "INVALID_DELIMITER"),
        }
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// The configuration directory is missing, not a directory, or empty.
    #[error("Invalid config directory {}: {reason}", .path.display())]
    InvalidDirectory { path: PathBuf, reason: String },

    #[error("Config file '{name}' not found at {}", .path.display())]
    MissingConfigFile { name: String, path: PathBuf },

    /// The file exists but could not be read or is not a JSON object.
    #[error("Config file '{name}' at {} is invalid: {reason}", .path.display())]
    InvalidConfigFile {
        name: String,
        path: PathBuf,
        reason: String,
    },

    #[error("Invalid delimiter {0:?}: must be a non-empty string")]
    InvalidDelimiter(String),
}

impl ConfigError {
    pub fn code(&self) -> ErrorCode {
        match self {
            ConfigError::InvalidDirectory { .. } => ErrorCode::InvalidDirectory,
            ConfigError::MissingConfigFile { .. } => ErrorCode::MissingConfigFile,
            ConfigError::InvalidConfigFile { .. } => ErrorCode::InvalidConfigFile,
            ConfigError::InvalidDelimiter(_) => ErrorCode::InvalidDelimiter,
        }
    }

    /// Path involved in the failure, if any.
    pub fn path(&self) -> Option<&PathBuf> {
        match self {
            ConfigError::InvalidDirectory { path, .. }
            | ConfigError::MissingConfigFile { path, .. }
            | ConfigError::InvalidConfigFile { path, .. } => Some(path),
            ConfigError::InvalidDelimiter(_) => None,
        }
    }
}

/// Serializable record of a failure observed by a session.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Diagnostic {
    pub code: ErrorCode,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

impl From<&ConfigError> for Diagnostic {
    fn from(err: &ConfigError) -> Self {
        Self {
            code: err.code(),
            message: err.to_string(),
            path: err.path().cloned(),
        }
    }
}

/// Result type for configuration operations.
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;
