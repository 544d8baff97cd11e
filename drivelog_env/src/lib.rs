//! DriveLog Environment Abstraction Layer
//!
//! This crate holds the I/O seams that the DriveLog query engine consumes
//! without knowing how they are implemented:
//! - Point clouds (`PointCloudLoader::load()` → raw per-point feature matrix)
//! - Map masks (`MapMaskProvider::open()` → world-to-pixel raster service)
//!
//! Binary file formats live behind these traits, so the engine only ever
//! sees a `PointCloud` feature matrix or a `MapMask` handle.
//!
//! # Example
//!
//! ```ignore
//! use drivelog_env::{BinaryPointCloudLoader, PointCloudLoader};
//!
//! let loader = BinaryPointCloudLoader::lidar();
//! let cloud = loader.load(Path::new("lidar/host-a004_lidar1_1232815252301696606.bin"))?;
//! println!("{} points", cloud.nbr_points());
//! ```

mod error;
mod loader;
mod map_mask;
mod point_cloud;

pub use error::EnvError;
pub use loader::{BinaryPointCloudLoader, MemoryPointCloudLoader, PointCloudLoader};
pub use map_mask::{GridMapMask, MapMask, MapMaskProvider, NullMapMaskProvider};
pub use point_cloud::PointCloud;
