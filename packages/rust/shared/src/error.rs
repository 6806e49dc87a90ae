//! Error types for Dossier.
//!
//! Library crates use [`DossierError`] via `thiserror`.
//! The server binary wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all Dossier operations.
#[derive(Debug, thiserror::Error)]
pub enum DossierError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Network/HTTP error outside an adapter boundary (client construction, binding).
    #[error("network error: {0}")]
    Network(String),

    /// Database or storage layer error.
    #[error("storage error: {0}")]
    Storage(String),

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Required subject fields missing or blank. Surfaced to callers as a client error.
    #[error("input error: {message}")]
    Input { message: String },

    /// Unexpected failure inside the pipeline itself.
    #[error("pipeline error: {0}")]
    Pipeline(String),
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, DossierError>;

impl DossierError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create an input error from any displayable message.
    pub fn input(msg: impl Into<String>) -> Self {
        Self::Input {
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

    /// Whether this error should be reported to the caller as a client error.
    pub fn is_input(&self) -> bool {
        matches!(self, Self::Input { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_formatting() {
        let err = DossierError::config("missing API key");
        assert_eq!(err.to_string(), "config error: missing API key");

        let err = DossierError::input("given name and family name are required");
        assert!(err.to_string().contains("family name"));
        assert!(err.is_input());
    }

    #[test]
    fn storage_error_is_not_input() {
        let err = DossierError::Storage("disk full".into());
        assert!(!err.is_input());
        assert_eq!(err.to_string(), "storage error: disk full");
    }

    #[test]
    fn pipeline_error_display() {
        let err = DossierError::Pipeline("task failed: panicked".into());
        assert_eq!(err.to_string(), "pipeline error: task failed: panicked");
        assert!(!err.is_input());
    }
}
