//! Error handling for the gridstream engine
//!
//! This module defines the engine-wide error type and a Result alias used
//! throughout the crate.

use crate::types::ColumnType;
use thiserror::Error;

/// Main error type for gridstream operations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    /// The leading 32-bit word of a batch did not match the wire magic
    #[error("invalid batch magic {0:#010x}")]
    InvalidMagic(u32),

    /// A column descriptor carried a type tag outside the known set
    #[error("unknown type tag {tag} in column {column_index} descriptor")]
    UnknownTypeTag { tag: u32, column_index: usize },

    /// A declared byte length extends past the end of the buffer
    #[error("truncated batch: column {column_index} needs {needed} bytes, {available} available")]
    Truncated {
        column_index: usize,
        needed: usize,
        available: usize,
    },

    /// An ingested batch's column type disagrees with the store schema
    #[error("Schema type mismatch at column {column_index} ('{name}'): expected {expected}, got {got}")]
    SchemaMismatch {
        column_index: usize,
        name: String,
        expected: ColumnType,
        got: ColumnType,
    },

    /// A column's row count diverged from the store total after a commit.
    /// Indicates an encoder bug; fatal for the stream.
    #[error("Integrity violation in column '{column_name}': {column_rows} rows, expected {expected_rows}")]
    IntegrityViolation {
        column_name: String,
        column_rows: u32,
        expected_rows: u32,
    },

    /// The batch was evicted from the ingest queue under SHED backpressure
    #[error("batch shed under backpressure")]
    Shed,

    /// The worker endpoint or its channel died unexpectedly
    #[error("worker transport failure: {0}")]
    TransportCrash(String),

    /// The pump was cancelled by the consumer; not a failure
    #[error("ingest aborted")]
    Aborted,

    /// The producer feeding the pump reported an error
    #[error("batch source error: {0}")]
    Source(String),
}

impl EngineError {
    /// Whether this error poisons the whole stream rather than a single batch.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            EngineError::IntegrityViolation { .. } | EngineError::TransportCrash(_)
        )
    }
}

/// Result type alias for gridstream operations
pub type Result<T> = std::result::Result<T, EngineError>;
