//! Error types for the CDC destination.

use cdc_core::{EventError, Operation, SchemaError};
use thiserror::Error;

/// Invalid or missing destination options. Fatal before `open`.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("missing required option '{0}'")]
    MissingOption(String),

    #[error("invalid value {value:?} for option '{key}': {reason}")]
    InvalidValue {
        key: String,
        value: String,
        reason: String,
    },
}

/// Per-record normalization failures. Fatal for the batch.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum NormalizeError {
    #[error("failed to decode payload: {0}")]
    Decode(String),

    #[error("composite keys are not supported (key fields: {})", .fields.join(", "))]
    UnsupportedCompositeKey { fields: Vec<String> },
}

/// A single insert/update/delete command that the storage rejected.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("failed to {operation} {target}: {message}")]
pub struct WriteError {
    pub operation: Operation,
    /// Table name for bulk inserts, `table:key` for single records
    pub target: String,
    pub message: String,
}

/// A relation that could not be compiled or applied. Never fatal.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RelationCompileError {
    #[error("relation '{relation}': invalid {field} {value:?}, expected an identifier")]
    InvalidIdentifier {
        relation: String,
        field: &'static str,
        value: String,
    },

    #[error("relation '{relation}': failed to apply: {message}")]
    Apply { relation: String, message: String },
}

/// Errors surfaced by the destination lifecycle.
#[derive(Error, Debug)]
pub enum DestinationError {
    #[error("invalid config: {0}")]
    Config(#[from] ConfigError),

    #[error("failed to connect to SurrealDB: {0}")]
    Connection(String),

    #[error("failed to load relation schema '{path}': {source}")]
    Schema {
        path: String,
        #[source]
        source: SchemaError,
    },

    #[error(transparent)]
    Event(#[from] EventError),

    #[error("change event at position {position} has no collection")]
    MissingCollection { position: usize },

    #[error("failed to process record at position {position} for '{collection}': {source}")]
    Normalize {
        position: usize,
        collection: String,
        #[source]
        source: NormalizeError,
    },

    #[error("batch failed after {written} records were written: {source}")]
    Write {
        written: usize,
        #[source]
        source: WriteError,
    },

    #[error("failed to close SurrealDB session: {0}")]
    Teardown(String),
}

/// Result type alias for destination operations.
pub type Result<T> = std::result::Result<T, DestinationError>;
