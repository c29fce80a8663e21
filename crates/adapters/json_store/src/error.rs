//! JSON store error types.

use std::path::PathBuf;

use pwm_domain::error::PwmError;

/// Errors originating from the JSON file store.
#[derive(Debug, thiserror::Error)]
pub enum JsonStoreError {
    /// The file could not be read or written.
    #[error("failed to access {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The file is not valid JSON, or not the expected document shape.
    #[error("failed to parse {path}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// Serializing a document before writing it failed.
    #[error("failed to serialize document")]
    Serialize(#[source] serde_json::Error),
}

impl From<JsonStoreError> for PwmError {
    fn from(err: JsonStoreError) -> Self {
        Self::Storage(Box::new(err))
    }
}
