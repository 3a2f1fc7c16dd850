//! Error types for crmsync.
//!
//! Library crates use [`CrmSyncError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all crmsync operations.
#[derive(Debug, thiserror::Error)]
pub enum CrmSyncError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Network/HTTP error while fetching a data source.
    #[error("network error: {0}")]
    Network(String),

    /// CSV or JSON decoding error.
    #[error("parse error: {message}")]
    Parse { message: String },

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Data validation error (missing column, oversized body, etc.).
    #[error("validation error: {message}")]
    Validation { message: String },

    /// Failure while serializing an output table.
    #[error("output error: {0}")]
    Output(String),
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, CrmSyncError>;

impl CrmSyncError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
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
        let err = CrmSyncError::config("missing API token");
        assert_eq!(err.to_string(), "config error: missing API token");

        let err = CrmSyncError::validation("CRM export has no `id` column");
        assert!(err.to_string().contains("`id` column"));
    }

    #[test]
    fn io_error_carries_path() {
        let err = CrmSyncError::io(
            "/tmp/out/crm_update.csv",
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        );
        let msg = err.to_string();
        assert!(msg.contains("crm_update.csv"));
        assert!(msg.contains("denied"));
    }
}
