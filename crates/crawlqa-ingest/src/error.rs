//! Error types for loading items, schemas and job metadata.

use std::path::PathBuf;

use crawlqa_model::ModelError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum IngestError {
    // === File System Errors ===
    /// Failed to read file.
    #[error("failed to read file {path}: {source}")]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// File extension is not one we can read items from.
    #[error("unsupported items file {path}, expected .jl, .jsonl, .json or .csv")]
    UnsupportedFormat { path: PathBuf },

    // === Parsing Errors ===
    /// Malformed JSON document or JSON line.
    #[error("invalid JSON in {path} at line {line}: {source}")]
    Json {
        path: PathBuf,
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    /// Malformed CSV.
    #[error("failed to parse CSV {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    /// JSON document has an unexpected shape.
    #[error("unexpected format in {path}: {reason}")]
    Format { path: PathBuf, reason: String },

    // === Job Metadata ===
    /// Job dump does not have the expected blocks.
    #[error("job dump has an unexpected shape: {0}")]
    JobDump(#[source] serde_json::Error),

    #[error("job key is missing from the job dump")]
    MissingJobKey,

    // === Schema Errors ===
    #[error("the schema does not have 'properties'")]
    SchemaWithoutProperties,

    #[error("'{value}' tag value of '{field}' is invalid, should be str or list[str]")]
    InvalidTag { field: String, value: String },

    #[error("{tags} tag(s) are unsupported, valid tags are: {expected}")]
    UnknownTags { tags: String, expected: String },

    // === Source Keys ===
    #[error("'{key}' is not a valid {kind} key")]
    InvalidSourceKey { key: String, kind: &'static str },

    #[error(transparent)]
    Model(#[from] ModelError),
}

pub type Result<T> = std::result::Result<T, IngestError>;
