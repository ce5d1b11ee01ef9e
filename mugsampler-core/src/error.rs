use mugsampler_scanner::{ScanError, StoreError};
use std::path::PathBuf;
use thiserror::Error;

/// Failure to read or write the durable sampling state. Always fatal: going on
/// without it would silently lose resumability.
#[derive(Error, Debug)]
pub enum PersistenceError {
    #[error("IO error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to encode state for {}: {source}", path.display())]
    Encode {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Corrupt state document {}: {source}", path.display())]
    Decode {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),
}

#[derive(Error, Debug)]
pub enum SampleError {
    #[error("Navigation to {url} failed: {source}")]
    Navigation {
        url: String,
        #[source]
        source: ScanError,
    },

    #[error("Nothing usable at {url}: {reason}")]
    Extraction { url: String, reason: String },

    #[error("Blob store failed for '{key}': {source}")]
    Store {
        key: String,
        #[source]
        source: StoreError,
    },

    #[error(transparent)]
    Persistence(#[from] PersistenceError),
}

impl SampleError {
    pub fn is_fatal(&self) -> bool {
        matches!(self, SampleError::Persistence(_))
    }
}
