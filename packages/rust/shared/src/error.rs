//! Error types for memsync.
//!
//! Library crates use [`MemsyncError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all memsync operations.
#[derive(Debug, thiserror::Error)]
pub enum MemsyncError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Missing or unusable API credential.
    #[error("credential error: {message}")]
    Credential { message: String },

    /// Transport-level HTTP failure (connect, timeout, body decode).
    #[error("network error: {0}")]
    Network(String),

    /// The remote service answered with a non-success status.
    #[error("remote error ({status} {code}): {message}")]
    Remote {
        status: u16,
        code: String,
        message: String,
    },

    /// Markdown parsing error.
    #[error("parse error: {message}")]
    Parse { message: String },

    /// Sync store or sync log error.
    #[error("storage error: {0}")]
    Storage(String),

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Data validation error (bad date, bad identifier, etc.).
    #[error("validation error: {message}")]
    Validation { message: String },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, MemsyncError>;

impl MemsyncError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a credential error from any displayable message.
    pub fn credential(msg: impl Into<String>) -> Self {
        Self::Credential {
            message: msg.into(),
        }
    }

    /// Create a parse error from any displayable message.
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse {
            message: msg.into(),
        }
    }

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_formatting() {
        let err = MemsyncError::config("missing database id");
        assert_eq!(err.to_string(), "config error: missing database id");

        let err = MemsyncError::Remote {
            status: 400,
            code: "validation_error".into(),
            message: "body.properties.Name should be defined".into(),
        };
        assert_eq!(
            err.to_string(),
            "remote error (400 validation_error): body.properties.Name should be defined"
        );
    }
}
