use nalgebra as na;

use super::{CalibrationError, CameraIntrinsic};

/// The 3x3 identity matrix, row-major.
#[rustfmt::skip]
pub const IDENTITY: [f64; 9] = [
    1.0, 0.0, 0.0,
    0.0, 1.0, 0.0,
    0.0, 0.0, 1.0,
];

fn invert(m: &na::Matrix3<f64>) -> Result<na::Matrix3<f64>, CalibrationError> {
    m.try_inverse()
        .filter(|inv| inv.iter().all(|v| v.is_finite()))
        .ok_or_else(|| CalibrationError::SingularRectification(m.determinant()))
}

/// Back-projection from rectified pixels to ideal normalized camera coordinates.
///
/// Holds `iR = (K_new * R)^-1`, the inverse of the new (rectified) camera matrix combined with
/// the stereo rectification rotation, together with its forward counterpart.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RectificationTransform {
    inverse: na::Matrix3<f64>,
    forward: na::Matrix3<f64>,
    no_rotation: bool,
}

impl RectificationTransform {
    /// Create the transform from the new camera intrinsics and a rectification rotation.
    ///
    /// # Arguments
    ///
    /// * `new_intrinsic` - The intrinsics of the rectified (output) camera.
    /// * `rotation` - The row-major 3x3 rectification rotation, [`IDENTITY`] when unused.
    ///
    /// # Errors
    ///
    /// Returns an error if the intrinsics are invalid or the product is not invertible.
    pub fn new(
        new_intrinsic: &CameraIntrinsic,
        rotation: &[f64; 9],
    ) -> Result<Self, CalibrationError> {
        new_intrinsic.validate()?;
        if rotation.iter().any(|v| !v.is_finite()) {
            return Err(CalibrationError::NonFiniteParameter("rectification rotation"));
        }

        let forward = na::Matrix3::from_row_slice(&new_intrinsic.matrix())
            * na::Matrix3::from_row_slice(rotation);
        let inverse = invert(&forward)?;

        Ok(Self {
            inverse,
            forward,
            no_rotation: *rotation == IDENTITY,
        })
    }

    /// Transform for plain undistortion: no rotation, output camera equal to `intrinsic`.
    pub fn identity(intrinsic: &CameraIntrinsic) -> Result<Self, CalibrationError> {
        Self::new(intrinsic, &IDENTITY)
    }

    /// Create the transform directly from a precomputed row-major `iR` matrix.
    ///
    /// The affine branch is selected when the bottom row of `inverse` is exactly `[0, 0, 1]`.
    pub fn from_inverse(inverse: [f64; 9]) -> Result<Self, CalibrationError> {
        if inverse.iter().any(|v| !v.is_finite()) {
            return Err(CalibrationError::NonFiniteParameter("rectification matrix"));
        }
        let inverse = na::Matrix3::from_row_slice(&inverse);
        let forward = invert(&inverse)?;
        Ok(Self {
            inverse,
            forward,
            no_rotation: is_affine(&inverse),
        })
    }

    /// The `iR` matrix mapping rectified pixels to normalized coordinates.
    pub fn inverse(&self) -> &na::Matrix3<f64> {
        &self.inverse
    }

    /// Whether the homogeneous divide can be skipped.
    pub fn no_rotation(&self) -> bool {
        self.no_rotation
    }

    /// Project ideal normalized coordinates into the rectified image.
    ///
    /// Returns `None` for points on the plane at infinity of the rectified camera.
    pub fn project(&self, x: f64, y: f64) -> Option<(f64, f64)> {
        let p = self.forward * na::Vector3::new(x, y, 1.0);
        if p.z.abs() < f64::EPSILON {
            return None;
        }
        Some((p.x / p.z, p.y / p.z))
    }
}

fn is_affine(m: &na::Matrix3<f64>) -> bool {
    m[(2, 0)] == 0.0 && m[(2, 1)] == 0.0 && m[(2, 2)] == 1.0
}
