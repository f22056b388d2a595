//! Error types for indexing, analysis and embedding.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur in the indexing and analysis stages.
#[derive(Debug, Error)]
pub enum Error {
    /// An error propagated from the sample store.
    #[error(transparent)]
    Core(#[from] sampledex_core::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// An audio file could not be opened or decoded.
    #[error("failed to decode {}: {message}", path.display())]
    Decode { path: PathBuf, message: String },

    /// The embedding service answered but the answer was unusable.
    #[error("embedding service error: {message}")]
    Embedding {
        /// HTTP status, when the service returned one.
        status: Option<u16>,
        message: String,
    },

    /// An analysis engine failed on a file.
    #[error("analysis failed for {}: {message}", path.display())]
    Analysis { path: PathBuf, message: String },

    /// A prerequisite of the cross-environment run is missing.
    #[error("{problem}\n\n{remediation}")]
    Setup { problem: String, remediation: String },

    /// An error propagated from `reqwest`.
    #[error("request error: {0}")]
    Request(#[from] reqwest::Error),

    #[error("configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Returns `true` when the error is transient and the operation may
    /// succeed if retried.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Request(e) => e.is_connect() || e.is_timeout(),
            Self::Embedding {
                status: Some(status),
                ..
            } => *status == 429 || *status >= 500,
            _ => false,
        }
    }

    pub(crate) fn setup(problem: impl Into<String>, remediation: impl Into<String>) -> Self {
        Self::Setup {
            problem: problem.into(),
            remediation: remediation.into(),
        }
    }
}

/// Convenience alias for results in this crate.
pub type Result<T> = std::result::Result<T, Error>;
