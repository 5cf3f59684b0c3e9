//! Unified error handling for lfancontrol
//!
//! Every fallible operation in the library, the CLI and the write helper
//! returns [`FanControlError`]. The variants follow the fan-control taxonomy:
//! a vanished file, a permission barrier, an absent capability, an elevation
//! timeout, a missing elevation mechanism and everything else the OS reports.

use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Result type alias using FanControlError
pub type Result<T> = std::result::Result<T, FanControlError>;

/// Unified error type for all lfancontrol operations
#[derive(thiserror::Error, Debug)]
pub enum FanControlError {
    // ============================================================================
    // Device Access Errors
    // ============================================================================
    #[error("File not found: {0}")]
    NotFound(PathBuf),

    #[error("Permission denied: {0}")]
    PermissionDenied(PathBuf),

    #[error("Operation not supported: {0}")]
    Unsupported(String),

    #[error("I/O error on {path}: {source}")]
    UnexpectedIo {
        path: PathBuf,
        source: io::Error,
    },

    // ============================================================================
    // Privilege Escalation Errors
    // ============================================================================
    #[error("Elevated write to {path} timed out after {}s", .after.as_secs())]
    Timeout {
        path: PathBuf,
        after: Duration,
    },

    #[error("Elevation mechanism unavailable: {0}")]
    MechanismUnavailable(String),

    #[error("Elevated write failed{}: {message}", .code.map(|c| format!(" (exit code {c})")).unwrap_or_default())]
    ElevatedWriteFailed {
        code: Option<i32>,
        message: String,
    },

    // ============================================================================
    // Validation Errors
    // ============================================================================
    #[error("Invalid path {path}: {reason}")]
    InvalidPath {
        path: PathBuf,
        reason: String,
    },

    #[error("Invalid value '{value}': {reason}")]
    InvalidValue {
        value: String,
        reason: String,
    },

    // ============================================================================
    // Configuration Errors
    // ============================================================================
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Failed to parse JSON: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("Invalid configuration value for {field}: {reason}")]
    InvalidConfig {
        field: String,
        reason: String,
    },
}

impl FanControlError {
    /// Classify an `io::Error` raised while touching `path`.
    pub fn from_io(path: impl AsRef<Path>, err: io::Error) -> Self {
        let path = path.as_ref().to_path_buf();
        match err.kind() {
            io::ErrorKind::NotFound => Self::NotFound(path),
            io::ErrorKind::PermissionDenied => Self::PermissionDenied(path),
            _ => Self::UnexpectedIo { path, source: err },
        }
    }

    /// Create an unsupported-capability error
    pub fn unsupported(msg: impl Into<String>) -> Self {
        Self::Unsupported(msg.into())
    }

    /// Create a config error from a string
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an invalid path error
    pub fn invalid_path(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::InvalidPath {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Create an invalid configuration error
    pub fn invalid_config(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            field: field.into(),
            reason: reason.into(),
        }
    }

    pub fn is_permission_denied(&self) -> bool {
        matches!(self, Self::PermissionDenied(_))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}
