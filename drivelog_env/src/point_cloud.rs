//! Raw point-cloud feature matrix.
//!
//! Points are stored column-wise: row 0..3 are x/y/z in the sensor frame,
//! the remaining rows are modality-specific channels (lidar intensity,
//! radar compensated velocity in rows 8-9, ...).

use nalgebra::{DMatrix, Matrix3, Matrix3xX, Matrix4, Vector3};
use serde::{Deserialize, Serialize};

use crate::error::EnvError;

/// A fixed-width per-point feature array.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointCloud {
    /// Feature matrix of shape (dims, n_points)
    points: DMatrix<f64>,
}

impl PointCloud {
    /// Wraps a feature matrix. At least three rows (x, y, z) are required.
    pub fn new(points: DMatrix<f64>) -> Result<Self, EnvError> {
        if points.nrows() < 3 {
            return Err(EnvError::malformed(format!(
                "expected at least 3 feature rows, got {}",
                points.nrows()
            )));
        }
        Ok(Self { points })
    }

    /// An empty cloud with the given number of feature rows.
    pub fn empty(dims: usize) -> Self {
        Self {
            points: DMatrix::zeros(dims.max(3), 0),
        }
    }

    /// Builds a cloud from a flat point-major buffer (`[x0, y0, z0, f0, x1, ...]`).
    pub fn from_point_major(dims: usize, data: &[f64]) -> Result<Self, EnvError> {
        if dims == 0 || data.len() % dims != 0 {
            return Err(EnvError::malformed(format!(
                "{} values do not divide into points of width {}",
                data.len(),
                dims
            )));
        }
        let n = data.len() / dims;
        // Column-major storage means a point-major buffer is exactly (dims × n).
        Self::new(DMatrix::from_column_slice(dims, n, data))
    }

    /// Number of points.
    pub fn nbr_points(&self) -> usize {
        self.points.ncols()
    }

    /// Number of feature rows per point.
    pub fn dims(&self) -> usize {
        self.points.nrows()
    }

    /// Full feature matrix.
    pub fn points(&self) -> &DMatrix<f64> {
        &self.points
    }

    /// Spatial rows only, as a 3×N matrix.
    pub fn xyz(&self) -> Matrix3xX<f64> {
        self.points.fixed_rows::<3>(0).into_owned()
    }

    /// A single point's position.
    pub fn position(&self, i: usize) -> Vector3<f64> {
        Vector3::new(self.points[(0, i)], self.points[(1, i)], self.points[(2, i)])
    }

    /// Adds `t` to every point position.
    pub fn translate(&mut self, t: &Vector3<f64>) {
        for mut col in self.points.column_iter_mut() {
            col[0] += t.x;
            col[1] += t.y;
            col[2] += t.z;
        }
    }

    /// Applies rotation matrix `r` to every point position.
    pub fn rotate(&mut self, r: &Matrix3<f64>) {
        for mut col in self.points.column_iter_mut() {
            let p = r * Vector3::new(col[0], col[1], col[2]);
            col[0] = p.x;
            col[1] = p.y;
            col[2] = p.z;
        }
    }

    /// Applies a homogeneous 4×4 transform to every point position.
    pub fn transform(&mut self, m: &Matrix4<f64>) {
        let r = m.fixed_view::<3, 3>(0, 0).into_owned();
        let t = Vector3::new(m[(0, 3)], m[(1, 3)], m[(2, 3)]);
        for mut col in self.points.column_iter_mut() {
            let p = r * Vector3::new(col[0], col[1], col[2]) + t;
            col[0] = p.x;
            col[1] = p.y;
            col[2] = p.z;
        }
    }

    /// Drops points whose x and y both lie within `radius` of the sensor.
    /// These are typically returns off the vehicle itself.
    pub fn remove_close(&mut self, radius: f64) {
        let keep: Vec<usize> = (0..self.nbr_points())
            .filter(|&i| !(self.points[(0, i)].abs() < radius && self.points[(1, i)].abs() < radius))
            .collect();
        if keep.len() == self.nbr_points() {
            return;
        }
        self.points = self.points.select_columns(keep.iter());
    }

    /// Appends the points of `other`. Both clouds must share the same width.
    pub fn extend(&mut self, other: &PointCloud) -> Result<(), EnvError> {
        if other.dims() != self.dims() {
            return Err(EnvError::malformed(format!(
                "cannot concatenate clouds of width {} and {}",
                self.dims(),
                other.dims()
            )));
        }
        let n = self.nbr_points();
        let m = other.nbr_points();
        let mut merged = DMatrix::zeros(self.dims(), n + m);
        merged.columns_mut(0, n).copy_from(&self.points);
        merged.columns_mut(n, m).copy_from(&other.points);
        self.points = merged;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_requires_spatial_rows() {
        assert!(PointCloud::new(DMatrix::zeros(2, 4)).is_err());
        assert!(PointCloud::new(DMatrix::zeros(3, 4)).is_ok());
    }

    #[test]
    fn test_point_major_layout() {
        let cloud = PointCloud::from_point_major(4, &[1.0, 2.0, 3.0, 0.5, 4.0, 5.0, 6.0, 0.7]).unwrap();
        assert_eq!(cloud.nbr_points(), 2);
        assert_eq!(cloud.dims(), 4);
        assert_relative_eq!(cloud.position(1), Vector3::new(4.0, 5.0, 6.0));
        assert_relative_eq!(cloud.points()[(3, 0)], 0.5);
    }

    #[test]
    fn test_transform_leaves_extra_channels() {
        let mut cloud = PointCloud::from_point_major(4, &[1.0, 0.0, 0.0, 9.0]).unwrap();
        let mut m = Matrix4::identity();
        m[(0, 3)] = 2.0;
        cloud.transform(&m);
        assert_relative_eq!(cloud.position(0), Vector3::new(3.0, 0.0, 0.0));
        assert_relative_eq!(cloud.points()[(3, 0)], 9.0);
    }

    #[test]
    fn test_remove_close() {
        let mut cloud = PointCloud::from_point_major(
            3,
            &[0.5, -0.5, 3.0, 0.5, 4.0, 0.0, -2.0, 0.1, 0.0],
        )
        .unwrap();
        cloud.remove_close(1.0);
        assert_eq!(cloud.nbr_points(), 2);
        assert_relative_eq!(cloud.position(0), Vector3::new(0.5, 4.0, 0.0));
    }

    #[test]
    fn test_extend_width_mismatch() {
        let mut a = PointCloud::empty(4);
        let b = PointCloud::empty(5);
        assert!(a.extend(&b).is_err());

        let c = PointCloud::from_point_major(4, &[0.0; 8]).unwrap();
        a.extend(&c).unwrap();
        assert_eq!(a.nbr_points(), 2);
    }
}
