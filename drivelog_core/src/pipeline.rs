//! Coordinate Pipeline - annotation boxes in a capture's sensor frame.
//!
//! World → ego → sensor, or world → flattened ego when a bird's-eye frame
//! is wanted. Camera captures additionally cull boxes that fail the
//! visibility policy.

use std::path::PathBuf;

use drivelog_env::PointCloudLoader;
use nalgebra::{Matrix2xX, Matrix3, Matrix4};
use tracing::debug;

use crate::dataset::Dataset;
use crate::error::{DatasetError, Result};
use crate::geometry::{pad_view, view_points, Box3D, BoxVisibility, BoxVisibilityCheck, FrustumCheck};
use crate::records::{CalibratedSensor, EgoPose, Modality, SampleAnnotation, SampleData, Token};
use crate::transform::{yaw_of, yaw_rotation, RigidTransform};

/// Pixel margin a projected point must keep from the image border.
const IMAGE_MARGIN: f64 = 1.0;

// ============================================================================
// QUERY / RESULT
// ============================================================================

/// What to resolve for one capture.
#[derive(Debug, Clone, Default)]
pub struct CaptureQuery {
    pub sample_data_token: Token,
    /// Camera-only culling policy
    pub visibility: BoxVisibility,
    /// Explicit annotations; bypasses interpolation when set
    pub selected_annotations: Option<Vec<Token>>,
    /// Ego-centered, yaw-only frame instead of the sensor frame
    pub flat_vehicle_frame: bool,
}

impl CaptureQuery {
    pub fn new(sample_data_token: impl Into<Token>) -> Self {
        Self {
            sample_data_token: sample_data_token.into(),
            ..Default::default()
        }
    }

    pub fn with_visibility(mut self, visibility: BoxVisibility) -> Self {
        self.visibility = visibility;
        self
    }

    pub fn with_annotations(mut self, tokens: Vec<Token>) -> Self {
        self.selected_annotations = Some(tokens);
        self
    }

    pub fn flattened(mut self) -> Self {
        self.flat_vehicle_frame = true;
        self
    }
}

/// Boxes resolved for a capture.
#[derive(Debug, Clone)]
pub struct CaptureBoxes {
    /// Backing data file
    pub data_path: PathBuf,
    pub boxes: Vec<Box3D>,
    /// Present for camera captures only
    pub camera_intrinsic: Option<Matrix3<f64>>,
}

/// Sensor points projected onto a camera image.
#[derive(Debug, Clone)]
pub struct ImageProjection {
    /// Pixel coordinates, one column per kept point
    pub pixels: Matrix2xX<f64>,
    /// Camera-frame depth of each kept point (meters)
    pub depths: Vec<f64>,
    /// Column of each kept point in the source cloud
    pub indices: Vec<usize>,
    pub image_path: PathBuf,
}

// ============================================================================
// FRAME CHANGES
// ============================================================================

/// World → ego, then ego → sensor, applied to the box in place.
pub fn world_to_sensor(b: &mut Box3D, ego: &EgoPose, cs: &CalibratedSensor) {
    world_to_ego(b, ego);
    let sensor = cs.pose();
    b.translate(&-sensor.translation);
    b.rotate(&sensor.rotation.inverse());
}

/// World → ego.
pub fn world_to_ego(b: &mut Box3D, ego: &EgoPose) {
    let pose = ego.pose();
    b.translate(&-pose.translation);
    b.rotate(&pose.rotation.inverse());
}

/// World → ego-centered frame with the vehicle's pitch and roll removed.
pub fn world_to_flat_vehicle(b: &mut Box3D, ego: &EgoPose) {
    let yaw = yaw_of(&ego.orientation());
    b.translate(&-ego.pose().translation);
    b.rotate(&yaw_rotation(yaw).inverse());
}

impl Dataset {
    /// Boxes of a capture in its sensor frame (or flattened ego frame),
    /// culled by `query.visibility` for cameras.
    pub fn resolve_boxes_for_capture(&self, query: &CaptureQuery) -> Result<CaptureBoxes> {
        self.resolve_boxes_with(query, &FrustumCheck)
    }

    /// [`Dataset::resolve_boxes_for_capture`] with a caller-supplied
    /// visibility check.
    pub fn resolve_boxes_with<C>(&self, query: &CaptureQuery, check: &C) -> Result<CaptureBoxes>
    where
        C: BoxVisibilityCheck + ?Sized,
    {
        let sd = self.get::<SampleData>(&query.sample_data_token)?;
        let (cs, sensor, ego) = self.capture_context(sd)?;

        let camera = match sensor.modality()? {
            Modality::Camera => {
                let intrinsic = cs.intrinsic().ok_or_else(|| {
                    DatasetError::precondition(format!(
                        "camera calibration {} has no intrinsic",
                        cs.token
                    ))
                })?;
                Some((intrinsic, (sd.width, sd.height)))
            }
            Modality::Lidar | Modality::Radar => None,
        };

        let candidates = match &query.selected_annotations {
            Some(tokens) => tokens
                .iter()
                .map(|token| self.get_box(token))
                .collect::<Result<Vec<_>>>()?,
            None => self.boxes_for_capture(&sd.token)?,
        };

        let total = candidates.len();
        let mut boxes = Vec::with_capacity(total);
        for mut b in candidates {
            if query.flat_vehicle_frame {
                world_to_flat_vehicle(&mut b, ego);
            } else {
                world_to_sensor(&mut b, ego, cs);
            }

            if let Some((intrinsic, image_size)) = &camera {
                if !check.is_visible(&b, intrinsic, *image_size, query.visibility) {
                    continue;
                }
            }
            boxes.push(b);
        }
        debug!(
            "Capture {} ({}): kept {}/{} boxes",
            sd.token,
            sensor.channel,
            boxes.len(),
            total
        );

        Ok(CaptureBoxes {
            data_path: self.config().data_root.join(&sd.filename),
            boxes,
            camera_intrinsic: camera.map(|(k, _)| k),
        })
    }

    /// Sensor frame → flattened vehicle frame as a homogeneous matrix.
    ///
    /// The ego translation is dropped; only the vehicle's pitch and roll are
    /// removed from the mounting chain.
    pub fn flat_vehicle_from_sensor(&self, sample_data_token: &str) -> Result<Matrix4<f64>> {
        let sd = self.get::<SampleData>(sample_data_token)?;
        let (cs, _, ego) = self.capture_context(sd)?;
        let orientation = ego.orientation();
        let flat_from_vehicle =
            RigidTransform::from_rotation(yaw_rotation(yaw_of(&orientation)).inverse() * orientation);
        Ok(flat_from_vehicle.compose(&cs.pose()).to_matrix())
    }

    /// Projects a lidar or radar capture onto a camera image.
    ///
    /// Points go sensor → ego → world → ego at camera time → camera. Points
    /// behind the camera or within one pixel of the image border are dropped.
    pub fn map_pointcloud_to_image(
        &self,
        loader: &dyn PointCloudLoader,
        pointsensor_token: &str,
        camera_token: &str,
    ) -> Result<ImageProjection> {
        let point_sd = self.get::<SampleData>(pointsensor_token)?;
        let cam_sd = self.get::<SampleData>(camera_token)?;
        let (point_cs, point_sensor, point_ego) = self.capture_context(point_sd)?;
        let (cam_cs, cam_sensor, cam_ego) = self.capture_context(cam_sd)?;

        if point_sensor.modality()? == Modality::Camera {
            return Err(DatasetError::InvalidModality(format!(
                "{} is a camera, expected lidar or radar",
                point_sensor.channel
            )));
        }
        if cam_sensor.modality()? != Modality::Camera {
            return Err(DatasetError::InvalidModality(format!(
                "{} is not a camera",
                cam_sensor.channel
            )));
        }
        let intrinsic = cam_cs.intrinsic().ok_or_else(|| {
            DatasetError::precondition(format!("camera calibration {} has no intrinsic", cam_cs.token))
        })?;

        let cloud = loader.load(&self.config().data_root.join(&point_sd.filename))?;
        let camera_from_sensor = cam_cs
            .pose()
            .inverse()
            .compose(&cam_ego.pose().inverse())
            .compose(&point_ego.pose())
            .compose(&point_cs.pose());
        let points = camera_from_sensor.transform_points(&cloud.xyz());
        let projected = view_points(&points, &pad_view(&intrinsic), true);

        let (width, height) = (cam_sd.width as f64, cam_sd.height as f64);
        let indices: Vec<usize> = (0..points.ncols())
            .filter(|&i| {
                let (x, y) = (projected[(0, i)], projected[(1, i)]);
                points[(2, i)] > 0.0
                    && x > IMAGE_MARGIN
                    && x < width - IMAGE_MARGIN
                    && y > IMAGE_MARGIN
                    && y < height - IMAGE_MARGIN
            })
            .collect();

        Ok(ImageProjection {
            pixels: Matrix2xX::from_fn(indices.len(), |r, c| projected[(r, indices[c])]),
            depths: indices.iter().map(|&i| points[(2, i)]).collect(),
            indices,
            image_path: self.config().data_root.join(&cam_sd.filename),
        })
    }

    /// First camera keyframe (by channel name) of the annotation's sample
    /// in which the annotation passes `visibility`.
    pub fn find_camera_for_annotation(
        &self,
        annotation_token: &str,
        visibility: BoxVisibility,
    ) -> Result<Option<Token>> {
        let ann = self.get::<SampleAnnotation>(annotation_token)?;
        for sd_token in self.sample_keyframes(&ann.sample_token)?.values() {
            if self.sensor_info(sd_token)?.modality()? != Modality::Camera {
                continue;
            }
            let query = CaptureQuery::new(sd_token.clone())
                .with_visibility(visibility)
                .with_annotations(vec![ann.token.clone()]);
            if !self.resolve_boxes_for_capture(&query)?.boxes.is_empty() {
                return Ok(Some(sd_token.clone()));
            }
        }
        Ok(None)
    }
}
