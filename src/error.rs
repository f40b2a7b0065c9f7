//! Error types for the capture pipeline

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for capture operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while capturing targets
#[derive(Error, Debug)]
pub enum Error {
    /// The render backend could not be started
    #[error("Backend initialization failed: {0}")]
    InitializationError(String),

    /// Failed to fetch a target (network, DNS, TLS handshake)
    #[error("Failed to fetch target: {0}")]
    FetchError(String),

    /// The fetch did not complete in time
    #[error("Fetch timed out after {0}ms")]
    FetchTimeout(u64),

    /// The backend failed to render or capture the document
    #[error("Rendering failed: {0}")]
    RenderError(String),

    /// The backend did not report completion in time
    #[error("Rendering timed out after {0}ms")]
    RenderTimeout(u64),

    /// Reading or writing a local file failed
    #[error("I/O error on {}: {source}", .path.display())]
    ArtifactIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Invalid configuration or input; aborts a run before any job starts
    #[error("Invalid configuration: {0}")]
    ConfigError(String),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

/// Coarse grouping of [`Error`] variants used for reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Fetch,
    Render,
    ArtifactIo,
    Configuration,
    Other,
}

impl Error {
    pub(crate) fn artifact_io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::ArtifactIo {
            path: path.into(),
            source,
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::FetchError(_) | Error::FetchTimeout(_) => ErrorCategory::Fetch,
            Error::InitializationError(_) | Error::RenderError(_) | Error::RenderTimeout(_) => {
                ErrorCategory::Render
            }
            Error::ArtifactIo { .. } => ErrorCategory::ArtifactIo,
            Error::ConfigError(_) => ErrorCategory::Configuration,
            Error::Other(_) => ErrorCategory::Other,
        }
    }

    /// Whether this error aborts the whole run instead of a single target.
    pub fn is_fatal(&self) -> bool {
        self.category() == ErrorCategory::Configuration
    }
}
