//! Error taxonomy for the DriveLog engine.
//!
//! Every failure is local and deterministic: it is raised where it is
//! detected and never retried. Data sparsity (an untrackable annotation, a
//! degenerate interpolation interval) is not an error and never lands here.

use drivelog_env::EnvError;
use thiserror::Error;

use crate::records::TableName;

pub type Result<T> = std::result::Result<T, DatasetError>;

/// Errors raised while loading or querying a dataset.
#[derive(Debug, Error)]
pub enum DatasetError {
    /// Table file is missing and missing tables are not allowed
    #[error("Table {table} not found at {path}")]
    NotFound { table: TableName, path: String },

    /// Token is not present in the table
    #[error("Unknown token {token} in table {table}")]
    Lookup { table: TableName, token: String },

    /// Table name that is not part of the schema
    #[error("Unknown table {0}")]
    UnknownTable(String),

    /// Dataset variant this engine cannot index
    #[error("Incompatible dataset: {0}")]
    Compatibility(String),

    /// Sensor modality not usable at this point
    #[error("Invalid sensor modality: {0}")]
    InvalidModality(String),

    /// Query prerequisites are not met (e.g. no LIDAR_TOP capture)
    #[error("Precondition failed: {0}")]
    Precondition(String),

    /// Two keyframes claim the same sample/channel slot
    #[error("Sample {sample} has two keyframes for channel {channel}: {first} and {second}")]
    DuplicateKeyframe {
        sample: String,
        channel: String,
        first: String,
        second: String,
    },

    /// Field name not present on the table's records
    #[error("Table {table} has no field {field}")]
    UnknownField { table: TableName, field: String },

    #[error("I/O error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse table {table}: {source}")]
    Json {
        table: TableName,
        #[source]
        source: serde_json::Error,
    },

    #[error(transparent)]
    Env(#[from] EnvError),
}

impl DatasetError {
    /// Creates a lookup error.
    pub fn lookup(table: TableName, token: impl Into<String>) -> Self {
        Self::Lookup {
            table,
            token: token.into(),
        }
    }

    /// Creates a precondition error.
    pub fn precondition(msg: impl Into<String>) -> Self {
        Self::Precondition(msg.into())
    }
}
