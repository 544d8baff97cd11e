//! DriveLog Core - Indexed Query & Transform Engine for AV Sensor Logs
//!
//! Loads a relational sensor-log dataset (13 JSON tables keyed by opaque
//! tokens) and answers spatial/temporal questions against it:
//! 1. **Indexing**: O(1) token lookup per table plus derived per-sample views
//! 2. **Interpolation**: object poses at non-keyframe captures via lerp/slerp
//! 3. **Frame changes**: world → ego → sensor (or flattened ego) for boxes,
//!    point sweeps and radar velocities, with camera visibility culling
//!
//! Loading runs Table Store → Reverse Index → Denormalizer once; the
//! resulting [`Dataset`] is immutable and safe to share between readers.

pub mod config;
pub mod dataset;
pub mod denormalize;
pub mod error;
pub mod explorer;
pub mod geometry;
pub mod interpolate;
pub mod maps;
pub mod pipeline;
pub mod records;
pub mod store;
pub mod sweep;
pub mod table;
pub mod transform;
pub mod velocity;

#[cfg(test)]
mod testing;

// Re-export key types for convenience
pub use config::{DatasetConfig, VelocityConfig};
pub use dataset::Dataset;
pub use denormalize::{DerivedViews, SensorInfo};
pub use error::{DatasetError, Result};
pub use explorer::{category_color, CategoryStats, SampleListing, SceneSummary};
pub use geometry::{Box3D, BoxVisibility, BoxVisibilityCheck, FrustumCheck};
pub use maps::EgoPoseOnMap;
pub use pipeline::{CaptureBoxes, CaptureQuery, ImageProjection};
pub use records::{Modality, Record, TableName, Token};
pub use store::{StoredRecord, TableStore};
pub use sweep::{SweepCloud, SweepRequest};
pub use table::Table;
pub use transform::RigidTransform;
