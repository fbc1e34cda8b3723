//! Store error types

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by the record store
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Invalid record id '{0}': only alphanumerics, '-' and '_' are allowed")]
    InvalidId(String),

    #[error("IO error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Corrupt record at {path}: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl StoreError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
