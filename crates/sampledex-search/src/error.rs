use thiserror::Error;

/// Errors that can occur while searching.
#[derive(Debug, Error)]
pub enum Error {
    /// The query could not be embedded.
    #[error("failed to embed query: {0}")]
    Embedding(#[from] sampledex_etl::Error),

    #[error(transparent)]
    Store(#[from] sampledex_core::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
