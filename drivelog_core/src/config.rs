//! Dataset configuration.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Options recognized when opening a dataset.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatasetConfig {
    /// Root against which record `filename`s resolve
    pub data_root: PathBuf,

    /// Directory holding one `<table>.json` file per table; `data_root`
    /// when unset
    pub table_root: Option<PathBuf>,

    /// Substitute an empty table for a missing file (default: false)
    pub allow_missing_tables: bool,

    /// Map raster resolution in meters/pixel (default: 0.1)
    pub map_resolution: f64,

    /// Emit the per-table load summary at info level (default: true)
    pub verbose: bool,
}

impl Default for DatasetConfig {
    fn default() -> Self {
        Self {
            data_root: PathBuf::from("."),
            table_root: None,
            allow_missing_tables: false,
            map_resolution: 0.1,
            verbose: true,
        }
    }
}

impl DatasetConfig {
    /// Tables and data files under the same directory.
    pub fn new(data_root: impl AsRef<Path>) -> Self {
        Self {
            data_root: data_root.as_ref().to_path_buf(),
            ..Default::default()
        }
    }

    /// Directory the table files are read from.
    pub fn table_root(&self) -> &Path {
        self.table_root.as_deref().unwrap_or(&self.data_root)
    }

    pub fn with_table_root(mut self, table_root: impl AsRef<Path>) -> Self {
        self.table_root = Some(table_root.as_ref().to_path_buf());
        self
    }

    pub fn with_allow_missing_tables(mut self, allow: bool) -> Self {
        self.allow_missing_tables = allow;
        self
    }

    pub fn with_map_resolution(mut self, resolution: f64) -> Self {
        self.map_resolution = resolution;
        self
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }
}

/// Velocity estimation thresholds.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct VelocityConfig {
    /// Max seconds between consecutive annotations used for a one-sided
    /// difference (doubled for centered differences). Default: 1.5
    pub max_time_diff: f64,
}

impl Default for VelocityConfig {
    fn default() -> Self {
        Self { max_time_diff: 1.5 }
    }
}
