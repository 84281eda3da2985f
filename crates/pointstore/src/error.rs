//! Error and `Result` types for series storage operations.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// A convenience `Result` type for pointstore operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// The error type for series storage operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A row arrived with a timestamp older than the newest stored row and
    /// forced ordering is disabled.
    #[error("timestamps out of sequence: latest {latest}, got {got}")]
    OutOfOrderTimestamp {
        /// Timestamp of the newest row already stored.
        latest: i64,
        /// Timestamp of the rejected row.
        got: i64,
    },

    /// The on-disk header declares columns that are not a prefix of the
    /// runtime schema.
    #[error("header columns do not match schema: {0}")]
    SchemaMismatch(String),

    /// A data file exists without its header file.
    #[error("data file without header file: {}", .0.display())]
    OrphanedDataFile(PathBuf),

    /// The on-disk header was written by a newer implementation.
    #[error("unsupported repository version: {found} (supported up to {supported})")]
    UnsupportedVersion {
        /// Version declared by the header.
        found: u32,
        /// Newest version this implementation can read.
        supported: u32,
    },

    /// The header file is structurally invalid.
    #[error("invalid header file: {0}")]
    InvalidHeader(String),

    /// More columns than the 64-bit column mask can address.
    #[error("too many columns: {0} (limit 64)")]
    TooManyColumns(usize),

    /// A column name appears more than once in a schema.
    #[error("duplicate column name: {0}")]
    DuplicateColumn(String),

    /// A column name is not part of the schema.
    #[error("unknown column: {0}")]
    UnknownColumn(String),

    /// The series was closed and can no longer accept writes.
    #[error("series is closed")]
    Closed,

    /// Underlying I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}
