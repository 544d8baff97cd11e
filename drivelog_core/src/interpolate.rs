//! Temporal Interpolator - annotation boxes for non-keyframe captures.
//!
//! Annotations only exist on keyframe samples. A capture that falls between
//! the previous sample and its own sample gets each object's pose blended
//! from the two annotations of the same instance: translation linearly,
//! orientation by slerp.

use std::collections::HashMap;

use nalgebra::Vector3;
use tracing::debug;

use crate::dataset::Dataset;
use crate::error::Result;
use crate::geometry::Box3D;
use crate::records::{Sample, SampleAnnotation, SampleData};
use crate::transform::{quaternion_from_wxyz, slerp};

/// Interpolation parameter of `t` between `t0` and `t1`.
///
/// `t` is clamped into `[t0, t1]` first, so captures stamped outside the
/// interval pin to an endpoint. Returns `None` for a zero-length interval.
pub fn interpolation_fraction(t0: f64, t1: f64, t: f64) -> Option<f64> {
    let span = t1 - t0;
    if span == 0.0 {
        return None;
    }
    let t = if t0 <= t1 { t.clamp(t0, t1) } else { t.clamp(t1, t0) };
    Some((t - t0) / span)
}

/// Per-axis linear interpolation.
pub fn lerp(a: &[f64; 3], b: &[f64; 3], amount: f64) -> Vector3<f64> {
    let a = Vector3::from(*a);
    let b = Vector3::from(*b);
    a + (b - a) * amount
}

impl Dataset {
    /// World-frame boxes for the objects annotated at a capture.
    ///
    /// Keyframes, and captures whose sample has no predecessor, get their
    /// sample's annotations as-is. Other captures blend each annotation with
    /// the same instance's annotation on the previous sample; instances that
    /// only appear on the current sample, and zero-length sample intervals,
    /// fall back to the current annotation.
    pub fn boxes_for_capture(&self, sample_data_token: &str) -> Result<Vec<Box3D>> {
        let sd = self.get::<SampleData>(sample_data_token)?;
        let sample = self.get::<Sample>(&sd.sample_token)?;
        let current = self.sample_annotations(&sample.token)?;

        let prev_sample = match &sample.prev {
            Some(prev) if !sd.is_key_frame => self.get::<Sample>(prev)?,
            _ => return current.iter().map(|token| self.get_box(token)).collect(),
        };

        let fraction = interpolation_fraction(prev_sample.timestamp, sample.timestamp, sd.timestamp);
        if fraction.is_none() {
            debug!(
                "Samples {} and {} share a timestamp, using current annotations",
                prev_sample.token, sample.token
            );
        }

        let mut prev_by_instance: HashMap<&str, &SampleAnnotation> = HashMap::new();
        for token in self.sample_annotations(&prev_sample.token)? {
            let ann = self.get::<SampleAnnotation>(token)?;
            prev_by_instance.insert(ann.instance_token.as_str(), ann);
        }

        current
            .iter()
            .map(|token| {
                let ann = self.get::<SampleAnnotation>(token)?;
                let mut b = Self::box_from_annotation(ann, self.category_name(token)?);
                if let (Some(amount), Some(prev)) =
                    (fraction, prev_by_instance.get(ann.instance_token.as_str()))
                {
                    b.center = lerp(&prev.translation, &ann.translation, amount);
                    b.orientation = slerp(
                        &quaternion_from_wxyz(&prev.rotation),
                        &quaternion_from_wxyz(&ann.rotation),
                        amount,
                    );
                }
                Ok(b)
            })
            .collect()
    }
}
