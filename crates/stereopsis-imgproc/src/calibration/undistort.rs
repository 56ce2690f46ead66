use super::{
    distortion::PolynomialDistortion, rectification::RectificationTransform, CameraIntrinsic,
};

/// Termination criteria of the iterative undistortion.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct UndistortCriteria {
    /// Maximum number of fixed-point iterations.
    pub max_iterations: usize,
    /// Stop once the reprojection residual in normalized coordinates falls below this value.
    pub epsilon: f64,
}

impl Default for UndistortCriteria {
    fn default() -> Self {
        Self {
            max_iterations: 20,
            epsilon: 1e-12,
        }
    }
}

/// Computes the ideal normalized coordinates of an observed (distorted) pixel.
///
/// The distortion model has no closed-form inverse, so the undistorted point is found by
/// fixed-point iteration starting from the distorted normalized coordinates.
///
/// # Arguments
///
/// * `intrinsic` - The intrinsic parameters of the camera.
/// * `distortion` - The distortion parameters of the camera.
/// * `u` - The observed column.
/// * `v` - The observed row.
/// * `criteria` - When to stop iterating.
///
/// # Returns
///
/// The ideal normalized `(x, y)`, or `None` when the model becomes degenerate on the way.
pub fn undistort_point(
    intrinsic: &CameraIntrinsic,
    distortion: &PolynomialDistortion,
    u: f64,
    v: f64,
    criteria: &UndistortCriteria,
) -> Option<(f64, f64)> {
    let xd = (u - intrinsic.cx) / intrinsic.fx;
    let yd = (v - intrinsic.cy) / intrinsic.fy;

    let d = distortion;
    let (mut x, mut y) = (xd, yd);

    for _ in 0..criteria.max_iterations {
        let r2 = x * x + y * y;
        let num = 1.0 + ((d.k3 * r2 + d.k2) * r2 + d.k1) * r2;
        let den = 1.0 + ((d.k6 * r2 + d.k5) * r2 + d.k4) * r2;
        if num.abs() < f64::EPSILON {
            return None;
        }
        let inv_kr = den / num;

        let dx = 2.0 * d.p1 * x * y + d.p2 * (r2 + 2.0 * x * x);
        let dy = d.p1 * (r2 + 2.0 * y * y) + 2.0 * d.p2 * x * y;

        x = (xd - dx) * inv_kr;
        y = (yd - dy) * inv_kr;

        let (ex, ey) = distortion.distort_normalized(x, y)?;
        if (ex - xd).hypot(ey - yd) < criteria.epsilon {
            break;
        }
    }

    if x.is_finite() && y.is_finite() {
        Some((x, y))
    } else {
        None
    }
}

/// Undistort a batch of observed pixels and project them into the rectified image.
///
/// Each output entry is `None` when the point could not be undistorted or falls on the plane
/// at infinity of the rectified camera.
pub fn undistort_points(
    intrinsic: &CameraIntrinsic,
    distortion: &PolynomialDistortion,
    rectification: &RectificationTransform,
    points: &[[f64; 2]],
    criteria: &UndistortCriteria,
) -> Vec<Option<[f64; 2]>> {
    points
        .iter()
        .map(|&[u, v]| {
            let (x, y) = undistort_point(intrinsic, distortion, u, v, criteria)?;
            let (col, row) = rectification.project(x, y)?;
            Some([col, row])
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calibration::{distortion::rectify_point, CalibrationError};
    use approx::assert_relative_eq;

    fn intrinsic() -> CameraIntrinsic {
        CameraIntrinsic {
            fx: 500.0,
            fy: 500.0,
            cx: 320.0,
            cy: 240.0,
        }
    }

    fn rotation_z(angle: f64) -> [f64; 9] {
        let (s, c) = angle.sin_cos();
        [c, -s, 0.0, s, c, 0.0, 0.0, 0.0, 1.0]
    }

    #[test]
    fn test_undistort_without_distortion_normalizes() {
        let k = intrinsic();
        let (x, y) = undistort_point(
            &k,
            &PolynomialDistortion::default(),
            420.0,
            140.0,
            &UndistortCriteria::default(),
        )
        .unwrap();
        assert_relative_eq!(x, 0.2, epsilon = 1e-15);
        assert_relative_eq!(y, -0.2, epsilon = 1e-15);
    }

    #[test]
    fn test_undistort_inverts_distortion() -> Result<(), CalibrationError> {
        let k = intrinsic();
        let d = PolynomialDistortion::from_coefficients(&[-0.2, 0.05, 1e-3, -5e-4, 0.0])?;
        let (x, y) = (0.31, -0.22);
        let (xd, yd) = d.distort_normalized(x, y).unwrap();
        let u = k.fx * xd + k.cx;
        let v = k.fy * yd + k.cy;

        let (xu, yu) = undistort_point(&k, &d, u, v, &UndistortCriteria::default()).unwrap();
        assert_relative_eq!(xu, x, epsilon = 1e-9);
        assert_relative_eq!(yu, y, epsilon = 1e-9);
        Ok(())
    }

    #[test]
    fn test_rectify_then_undistort_round_trip() -> Result<(), CalibrationError> {
        let k = intrinsic();
        let new_k = CameraIntrinsic {
            fx: 480.0,
            fy: 480.0,
            cx: 318.0,
            cy: 243.0,
        };
        let d = PolynomialDistortion::from_coefficients(&[-0.18, 0.04, 5e-4, -3e-4, -0.01])?;
        let criteria = UndistortCriteria::default();

        for rotation in [rotation_z(0.0), rotation_z(0.02)] {
            let rect = RectificationTransform::new(&new_k, &rotation)?;
            for row in (40..440).step_by(50) {
                for col in (40..600).step_by(70) {
                    let (row, col) = (row as f64, col as f64);
                    let (u, v) =
                        rectify_point(&k, &d, rect.inverse(), row, col, rect.no_rotation())
                            .unwrap();
                    let (x, y) = undistort_point(&k, &d, u, v, &criteria).unwrap();
                    let (pc, pr) = rect.project(x, y).unwrap();
                    assert!((pc - col).abs() < 1e-3, "col {col} -> {pc}");
                    assert!((pr - row).abs() < 1e-3, "row {row} -> {pr}");
                }
            }
        }
        Ok(())
    }

    #[test]
    fn test_undistort_points_batch() -> Result<(), CalibrationError> {
        let k = intrinsic();
        let rect = RectificationTransform::identity(&k)?;
        let out = undistort_points(
            &k,
            &PolynomialDistortion::default(),
            &rect,
            &[[320.0, 240.0], [10.0, 470.0]],
            &UndistortCriteria::default(),
        );
        assert_eq!(out.len(), 2);
        let p = out[1].unwrap();
        assert_relative_eq!(p[0], 10.0, epsilon = 1e-9);
        assert_relative_eq!(p[1], 470.0, epsilon = 1e-9);
        Ok(())
    }
}
