//! Map-mask service.
//!
//! A map mask is a raster of the drivable area for one map record. The
//! engine only needs world → pixel conversion and the resolution; the
//! raster itself stays opaque.

use std::path::Path;
use std::sync::Arc;

use nalgebra::DMatrix;

use crate::error::EnvError;

/// World-to-pixel raster service for a single map.
pub trait MapMask: Send + Sync {
    /// Meters per pixel.
    fn resolution(&self) -> f64;

    /// Converts world (x, y) in meters to (column, row) pixel coordinates.
    fn to_pixel_coords(&self, x: f64, y: f64) -> (i64, i64);

    /// Raster buffer, rows = image height.
    fn raster(&self) -> &DMatrix<u8>;

    /// True when (x, y) falls on a non-zero raster cell.
    fn is_on_mask(&self, x: f64, y: f64) -> bool {
        let (px, py) = self.to_pixel_coords(x, y);
        let raster = self.raster();
        if px < 0 || py < 0 {
            return false;
        }
        let (col, row) = (px as usize, py as usize);
        row < raster.nrows() && col < raster.ncols() && raster[(row, col)] > 0
    }
}

/// Opens the mask that backs a map record's file.
pub trait MapMaskProvider {
    fn open(&self, path: &Path, resolution: f64) -> Result<Arc<dyn MapMask>, EnvError>;
}

impl<F> MapMaskProvider for F
where
    F: Fn(&Path, f64) -> Result<Arc<dyn MapMask>, EnvError>,
{
    fn open(&self, path: &Path, resolution: f64) -> Result<Arc<dyn MapMask>, EnvError> {
        self(path, resolution)
    }
}

/// Provider used when no raster decoder is wired in.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullMapMaskProvider;

impl MapMaskProvider for NullMapMaskProvider {
    fn open(&self, path: &Path, _resolution: f64) -> Result<Arc<dyn MapMask>, EnvError> {
        Err(EnvError::map_unavailable(path.display()))
    }
}

/// In-memory raster with the image origin at the top-left corner.
///
/// World y grows upward while image rows grow downward, so
/// `row = height - y / resolution`.
#[derive(Debug, Clone)]
pub struct GridMapMask {
    resolution: f64,
    raster: DMatrix<u8>,
}

impl GridMapMask {
    pub fn new(raster: DMatrix<u8>, resolution: f64) -> Self {
        Self { resolution, raster }
    }
}

impl MapMask for GridMapMask {
    fn resolution(&self) -> f64 {
        self.resolution
    }

    fn to_pixel_coords(&self, x: f64, y: f64) -> (i64, i64) {
        let px = x / self.resolution;
        let py = self.raster.nrows() as f64 - y / self.resolution;
        (px.round() as i64, py.round() as i64)
    }

    fn raster(&self) -> &DMatrix<u8> {
        &self.raster
    }
}
