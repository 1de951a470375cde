use std::path::PathBuf;

use thiserror::Error;

/// Failures surfaced by the durable store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("could not encode {name}: {source}")]
    Encode {
        name: String,
        #[source]
        source: serde_json::Error,
    },

    /// The file exists but does not parse (malformed date, wrong shape, ...).
    #[error("{path} is corrupt: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("activity event id {id} already exists with different content")]
    IdCollision { id: u64 },

    #[error("unsupported export version: {found} (expected {expected})")]
    UnsupportedExportVersion { found: u32, expected: u32 },

    #[error("import failed during {stage}: {message}")]
    Import { stage: &'static str, message: String },
}

/// Everything the drilling core can report to the interaction layer.
#[derive(Debug, Error)]
pub enum DrillError {
    #[error("the vocabulary is empty")]
    EmptyVocabulary,

    #[error("no vocabulary entry with id {0}")]
    UnknownEntry(u64),

    #[error("entry {id} cannot be scored: {reason}")]
    InvalidEntry { id: u64, reason: String },

    #[error("selection weight {weight} at index {index} is not usable")]
    InvalidWeight { index: usize, weight: f64 },

    #[error("\"{0}\" is already in the vocabulary")]
    DuplicateEntry(String),

    #[error("both sides of a word pair must be non-empty")]
    EmptyText,

    #[error("stored data failed validation: {0}")]
    DataIntegrity(String),

    #[error("persistence failed: {0}")]
    Persistence(#[from] StoreError),
}
