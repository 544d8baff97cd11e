//! Ego trajectories projected onto map masks.

use tracing::warn;

use drivelog_env::EnvError;

use crate::dataset::Dataset;
use crate::error::{DatasetError, Result};
use crate::records::{EgoPose, Log, Sample, Scene, Token};

/// Channel whose ego pose stands for the vehicle position of a sample.
pub const POSE_CHANNEL: &str = "LIDAR_TOP";

/// One sample's ego position on its log's map.
#[derive(Debug, Clone, PartialEq)]
pub struct EgoPoseOnMap {
    pub scene_token: Token,
    pub sample_token: Token,
    /// (column, row) in the map raster
    pub pixel: (i64, i64),
    /// Poses (this one included) closer than the query distance
    pub nbr_close: usize,
}

impl Dataset {
    /// Ego positions of every sample of the scenes recorded at `location`,
    /// optionally restricted to `scene_tokens`.
    ///
    /// Closeness is measured between pixel positions scaled back to meters
    /// by the mask resolution.
    pub fn ego_poses_on_map(
        &self,
        location: &str,
        scene_tokens: Option<&[Token]>,
        close_dist: f64,
    ) -> Result<Vec<EgoPoseOnMap>> {
        let logs = self.tokens_where::<Log, _>(|log| log.location == location);
        if logs.is_empty() {
            return Err(DatasetError::precondition(format!("no logs recorded at {}", location)));
        }

        let scenes: Vec<&str> = self
            .tokens_where::<Scene, _>(|scene| logs.contains(&scene.log_token.as_str()))
            .into_iter()
            .filter(|token| scene_tokens.map_or(true, |keep| keep.iter().any(|t| t.as_str() == *token)))
            .collect();
        if scenes.is_empty() {
            warn!("No scenes selected at {}", location);
        }

        let mut poses = Vec::new();
        let mut metric = Vec::new();
        for scene_token in scenes {
            let scene = self.get::<Scene>(scene_token)?;
            let map_token = self
                .log_map_token(&scene.log_token)?
                .ok_or_else(|| EnvError::map_unavailable(format!("log {} has no map", scene.log_token)))?;
            let mask = self.map_mask(map_token)?;

            for sample_token in self.tokens_where::<Sample, _>(|s| s.scene_token == scene_token) {
                let sd = self.keyframe(sample_token, POSE_CHANNEL)?;
                let pose = self.get::<EgoPose>(&sd.ego_pose_token)?;

                let pixel = mask.to_pixel_coords(pose.translation[0], pose.translation[1]);
                metric.push((pixel.0 as f64 * mask.resolution(), pixel.1 as f64 * mask.resolution()));
                poses.push(EgoPoseOnMap {
                    scene_token: scene_token.to_string(),
                    sample_token: sample_token.to_string(),
                    pixel,
                    nbr_close: 0,
                });
            }
        }

        for (i, pose) in poses.iter_mut().enumerate() {
            let (x, y) = metric[i];
            pose.nbr_close = metric
                .iter()
                .filter(|(ox, oy)| (ox - x).hypot(oy - y) < close_dist)
                .count();
        }
        Ok(poses)
    }
}
