//! Multi-Sweep Aggregator.
//!
//! Stacks the preceding captures of one channel into the frame of a
//! reference capture so sparse sensors (radar, single lidar spins) can be
//! densified. Every point carries the age of its capture relative to the
//! reference, in seconds.

use drivelog_env::{PointCloud, PointCloudLoader};
use nalgebra::{Matrix3xX, Vector3};
use tracing::debug;

use crate::dataset::Dataset;
use crate::error::{DatasetError, Result};
use crate::records::{Modality, SampleData, Token};

/// Returns closer than this (meters, in x and y) are dropped by default.
pub const DEFAULT_MIN_DISTANCE: f64 = 1.0;

/// Rows of a radar cloud holding ego-motion compensated velocity (vx, vy).
pub const RADAR_VELOCITY_ROWS: (usize, usize) = (8, 9);

/// Which captures to stack.
#[derive(Debug, Clone, PartialEq)]
pub struct SweepRequest {
    pub sample_token: Token,
    /// Channel whose captures are stacked
    pub channel: String,
    /// Channel whose keyframe defines the output frame and time origin
    pub ref_channel: String,
    /// Upper bound on stacked captures, including the keyframe itself
    pub nsweeps: usize,
    /// Per-capture self-return filter radius (meters); 0 disables it
    pub min_distance: f64,
}

impl SweepRequest {
    /// Request with the default self-return filter of
    /// [`DEFAULT_MIN_DISTANCE`]. Points within that radius of the sensor are
    /// dropped from every capture, the reference included, so a single
    /// sweep is the reference capture's own points only after
    /// `with_min_distance(0.0)`.
    pub fn new(
        sample_token: impl Into<Token>,
        channel: impl Into<String>,
        ref_channel: impl Into<String>,
        nsweeps: usize,
    ) -> Self {
        Self {
            sample_token: sample_token.into(),
            channel: channel.into(),
            ref_channel: ref_channel.into(),
            nsweeps,
            min_distance: DEFAULT_MIN_DISTANCE,
        }
    }

    pub fn with_min_distance(mut self, min_distance: f64) -> Self {
        self.min_distance = min_distance;
        self
    }
}

/// Stacked points plus per-point capture age.
#[derive(Debug, Clone)]
pub struct SweepCloud {
    pub cloud: PointCloud,
    /// Reference time minus capture time (seconds), one per point
    pub times: Vec<f64>,
    /// Captures that contributed, newest first
    pub captures: Vec<Token>,
}

impl Dataset {
    /// Walks back from the sample's `channel` keyframe through `prev` links,
    /// stacking at most `nsweeps` captures in the reference sensor frame.
    ///
    /// A chain shorter than `nsweeps` just yields fewer captures.
    pub fn aggregate_sweeps(
        &self,
        loader: &dyn PointCloudLoader,
        request: &SweepRequest,
    ) -> Result<SweepCloud> {
        if request.nsweeps == 0 {
            return Err(DatasetError::precondition("sweep count must be at least 1"));
        }

        let ref_sd = self.keyframe(&request.sample_token, &request.ref_channel)?;
        let (ref_cs, _, ref_ego) = self.capture_context(ref_sd)?;
        let ref_time = ref_sd.timestamp * 1e-6;
        let ref_from_global = ref_cs.pose().inverse().compose(&ref_ego.pose().inverse());

        let mut current = self.keyframe(&request.sample_token, &request.channel)?;
        let mut stacked: Option<PointCloud> = None;
        let mut times = Vec::new();
        let mut captures = Vec::new();

        loop {
            let mut cloud = loader.load(&self.config().data_root.join(&current.filename))?;
            if request.min_distance > 0.0 {
                cloud.remove_close(request.min_distance);
            }

            let (cs, _, ego) = self.capture_context(current)?;
            let ref_from_current = ref_from_global.compose(&ego.pose()).compose(&cs.pose());
            cloud.transform(&ref_from_current.to_matrix());

            let time_lag = ref_time - current.timestamp * 1e-6;
            times.extend(std::iter::repeat(time_lag).take(cloud.nbr_points()));
            captures.push(current.token.clone());
            match stacked.as_mut() {
                Some(all) => all.extend(&cloud)?,
                None => stacked = Some(cloud),
            }

            if captures.len() == request.nsweeps {
                break;
            }
            match &current.prev {
                Some(prev) => current = self.get::<SampleData>(prev)?,
                None => break,
            }
        }

        debug!(
            "Stacked {} {} sweeps ({} points) into {}",
            captures.len(),
            request.channel,
            times.len(),
            request.ref_channel
        );

        let cloud = stacked.ok_or_else(|| DatasetError::precondition("no sweeps loaded"))?;
        Ok(SweepCloud {
            cloud,
            times,
            captures,
        })
    }

    /// Radar compensated velocities rotated into a reference sensor frame.
    ///
    /// Only rotations apply: radar → ego, then ego → reference. The
    /// vertical component is zeroed since radar measures in the plane.
    pub fn radar_velocities_in_reference(
        &self,
        radar_token: &str,
        reference_token: &str,
        cloud: &PointCloud,
    ) -> Result<Matrix3xX<f64>> {
        let radar_sd = self.get::<SampleData>(radar_token)?;
        let (radar_cs, radar_sensor, _) = self.capture_context(radar_sd)?;
        if radar_sensor.modality()? != Modality::Radar {
            return Err(DatasetError::InvalidModality(format!(
                "{} is not a radar",
                radar_sensor.channel
            )));
        }
        let (vx, vy) = RADAR_VELOCITY_ROWS;
        if cloud.dims() <= vy {
            return Err(drivelog_env::EnvError::malformed(format!(
                "radar cloud has {} channels, velocity needs {}",
                cloud.dims(),
                vy + 1
            ))
            .into());
        }

        let ref_sd = self.get::<SampleData>(reference_token)?;
        let (ref_cs, _, _) = self.capture_context(ref_sd)?;
        let rotation = ref_cs.pose().rotation.inverse() * radar_cs.pose().rotation;

        let points = cloud.points();
        let mut velocities = Matrix3xX::zeros(cloud.nbr_points());
        for i in 0..cloud.nbr_points() {
            let mut v = rotation * Vector3::new(points[(vx, i)], points[(vy, i)], 0.0);
            v.z = 0.0;
            velocities.set_column(i, &v);
        }
        Ok(velocities)
    }
}
