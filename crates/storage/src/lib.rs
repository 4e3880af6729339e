//! Artifact Storage
//!
//! Persists captured anomaly frames, one directory per subject.

mod repository;

pub use repository::{ArtifactEntry, ArtifactRef, ArtifactStore, FsArtifactStore};

use thiserror::Error;

/// Storage errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Encoding error: {0}")]
    Encoding(String),
    #[error("Artifact not found")]
    NotFound,
    #[error("Path escapes artifact root: {0}")]
    Forbidden(String),
}
