//! Velocity Estimator - finite differences along an annotation chain.

use nalgebra::Vector3;

use crate::config::VelocityConfig;
use crate::dataset::Dataset;
use crate::error::Result;
use crate::records::{Sample, SampleAnnotation};

impl Dataset {
    /// World-frame velocity (m/s) of an annotated object.
    ///
    /// Uses the centered difference prev → next when both links exist and a
    /// one-sided difference otherwise. Returns NaN components when the
    /// object has no neighbours, the time span is not positive, or it
    /// exceeds `config.max_time_diff` (doubled for the centered case).
    pub fn box_velocity(&self, annotation_token: &str, config: &VelocityConfig) -> Result<Vector3<f64>> {
        let current = self.get::<SampleAnnotation>(annotation_token)?;
        let undefined = Vector3::repeat(f64::NAN);
        if current.prev.is_none() && current.next.is_none() {
            return Ok(undefined);
        }

        let first = match &current.prev {
            Some(prev) => self.get::<SampleAnnotation>(prev)?,
            None => current,
        };
        let last = match &current.next {
            Some(next) => self.get::<SampleAnnotation>(next)?,
            None => current,
        };

        let time_first = self.get::<Sample>(&first.sample_token)?.timestamp * 1e-6;
        let time_last = self.get::<Sample>(&last.sample_token)?.timestamp * 1e-6;
        let time_diff = time_last - time_first;

        let max_time_diff = if current.prev.is_some() && current.next.is_some() {
            config.max_time_diff * 2.0
        } else {
            config.max_time_diff
        };
        if time_diff <= 0.0 || time_diff > max_time_diff {
            return Ok(undefined);
        }

        let pos_diff = Vector3::from(last.translation) - Vector3::from(first.translation);
        Ok(pos_diff / time_diff)
    }
}
