//! Error types for the DriveLog environment abstraction.

use std::path::Path;
use thiserror::Error;

/// Errors that can occur while talking to an external collaborator.
#[derive(Debug, Error)]
pub enum EnvError {
    /// Underlying file read failed
    #[error("I/O error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Point data did not match the expected layout
    #[error("Malformed point cloud: {0}")]
    MalformedPointCloud(String),

    /// No map mask could be produced for the requested map
    #[error("Map mask unavailable: {0}")]
    MapUnavailable(String),
}

impl EnvError {
    /// Creates an I/O error tagged with the offending path.
    pub fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.display().to_string(),
            source,
        }
    }

    /// Creates a malformed point cloud error.
    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::MalformedPointCloud(msg.into())
    }

    /// Creates a map-unavailable error.
    pub fn map_unavailable(what: impl std::fmt::Display) -> Self {
        Self::MapUnavailable(what.to_string())
    }
}
