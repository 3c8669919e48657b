//! Error taxonomy for the document pipeline.
//!
//! Rendering faults ([`RenderFailure`]) never leave the renderer: they are
//! turned into the fallback document. Storage faults ([`StorageError`]) are
//! surfaced unmodified to whoever called the object store.

use thiserror::Error;

/// Rejected classification input.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ClassifyError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

/// Internal fault while building the primary document.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RenderFailure {
    #[error("document needs more than {max} pages")]
    PageLimit { max: usize },

    #[error("layout failed: {0}")]
    Layout(String),

    #[error("PDF encoder failed: {0}")]
    Encoder(String),

    #[error("PDF encoder panicked: {0}")]
    Panicked(String),

    #[error("PDF encoder produced malformed output: {0}")]
    MalformedOutput(String),
}

/// Failure talking to, or validating arguments for, an object store.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StorageError {
    #[error("invalid storage key: {0}")]
    InvalidKey(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("object store unavailable: {0}")]
    Unavailable(String),

    #[error("object not found: {0}")]
    NotFound(String),

    #[error("access denied: {0}")]
    AccessDenied(String),
}

/// Failure of the render → upload → sign orchestration.
#[derive(Debug, Error)]
pub enum PublishError {
    #[error(transparent)]
    Input(#[from] ClassifyError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}
