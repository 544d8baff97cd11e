//! Point-cloud loaders.
//!
//! The engine only asks for "the points behind this file". How they are
//! decoded is up to the loader.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::EnvError;
use crate::point_cloud::PointCloud;

/// Source of raw point clouds for a data file.
///
/// Implementations must be thread-safe: queries over independent captures
/// may be fanned out across threads by the caller.
pub trait PointCloudLoader: Send + Sync {
    /// Loads the point set stored at `path`.
    fn load(&self, path: &Path) -> Result<PointCloud, EnvError>;
}

/// Reads little-endian `f32` records of fixed width.
///
/// Lidar sweeps are stored as 5 floats per point (x, y, z, intensity, ring);
/// only the first `keep` columns are retained.
#[derive(Debug, Clone)]
pub struct BinaryPointCloudLoader {
    /// Floats per stored point
    pub record_width: usize,
    /// Leading columns kept per point
    pub keep: usize,
}

impl BinaryPointCloudLoader {
    /// Loader for lidar `.bin` sweeps (x, y, z, intensity).
    pub fn lidar() -> Self {
        Self {
            record_width: 5,
            keep: 4,
        }
    }

    /// Decodes an in-memory buffer using this loader's layout.
    pub fn decode(&self, bytes: &[u8]) -> Result<PointCloud, EnvError> {
        if self.keep < 3 || self.keep > self.record_width {
            return Err(EnvError::malformed(format!(
                "cannot keep {} of {} columns",
                self.keep, self.record_width
            )));
        }
        let stride = self.record_width * 4;
        if bytes.len() % stride != 0 {
            return Err(EnvError::malformed(format!(
                "{} bytes is not a multiple of the {}-byte record",
                bytes.len(),
                stride
            )));
        }

        let mut data = Vec::with_capacity(bytes.len() / stride * self.keep);
        for record in bytes.chunks_exact(stride) {
            for value in record.chunks_exact(4).take(self.keep) {
                let raw = [value[0], value[1], value[2], value[3]];
                data.push(f32::from_le_bytes(raw) as f64);
            }
        }
        PointCloud::from_point_major(self.keep, &data)
    }
}

impl PointCloudLoader for BinaryPointCloudLoader {
    fn load(&self, path: &Path) -> Result<PointCloud, EnvError> {
        let bytes = fs::read(path).map_err(|e| EnvError::io(path, e))?;
        let cloud = self.decode(&bytes)?;
        tracing::debug!("Loaded {} points from {}", cloud.nbr_points(), path.display());
        Ok(cloud)
    }
}

/// Serves pre-built clouds keyed by path.
#[derive(Debug, Clone, Default)]
pub struct MemoryPointCloudLoader {
    clouds: HashMap<PathBuf, PointCloud>,
}

impl MemoryPointCloudLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the cloud returned for `path`.
    pub fn insert(&mut self, path: impl Into<PathBuf>, cloud: PointCloud) {
        self.clouds.insert(path.into(), cloud);
    }

    pub fn len(&self) -> usize {
        self.clouds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clouds.is_empty()
    }
}

impl PointCloudLoader for MemoryPointCloudLoader {
    fn load(&self, path: &Path) -> Result<PointCloud, EnvError> {
        self.clouds.get(path).cloned().ok_or_else(|| {
            EnvError::io(
                path,
                std::io::Error::new(std::io::ErrorKind::NotFound, "no cloud registered"),
            )
        })
    }
}
