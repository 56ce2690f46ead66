use std::time::Instant;

use nalgebra as na;

use super::{rectification::RectificationTransform, CalibrationError, CameraIntrinsic};
use crate::interpolation::grid::{CoordinateMap, OUT_OF_RANGE};
use stereopsis_image::ImageSize;

/// Represents the polynomial distortion parameters of a camera
///
/// The radial part is the rational model `(1 + k1 r² + k2 r⁴ + k3 r⁶) / (1 + k4 r² + k5 r⁴ + k6 r⁶)`
/// and the tangential part is driven by `p1` and `p2`.
///
/// # Fields
///
/// * `k1` - The first radial distortion coefficient
/// * `k2` - The second radial distortion coefficient
/// * `p1` - The first tangential distortion coefficient
/// * `p2` - The second tangential distortion coefficient
/// * `k3` - The third radial distortion coefficient
/// * `k4` - The fourth radial distortion coefficient
/// * `k5` - The fifth radial distortion coefficient
/// * `k6` - The sixth radial distortion coefficient
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct PolynomialDistortion {
    /// The first radial distortion coefficient
    pub k1: f64,
    /// The second radial distortion coefficient
    pub k2: f64,
    /// The first tangential distortion coefficient
    pub p1: f64,
    /// The second tangential distortion coefficient
    pub p2: f64,
    /// The third radial distortion coefficient
    pub k3: f64,
    /// The fourth radial distortion coefficient
    pub k4: f64,
    /// The fifth radial distortion coefficient
    pub k5: f64,
    /// The sixth radial distortion coefficient
    pub k6: f64,
}

impl PolynomialDistortion {
    /// Create the distortion from coefficients in the order `k1, k2, p1, p2, k3, k4, k5, k6`.
    ///
    /// Missing trailing coefficients are zero.
    ///
    /// # Errors
    ///
    /// Returns an error for more than 8 coefficients or a non-finite value.
    ///
    /// # Example
    ///
    /// ```
    /// use stereopsis_imgproc::calibration::distortion::PolynomialDistortion;
    ///
    /// let d = PolynomialDistortion::from_coefficients(&[-0.28, 0.07, 0.001, -0.0005, 0.0]).unwrap();
    /// assert_eq!(d.k1, -0.28);
    /// assert_eq!(d.k6, 0.0);
    /// assert!(!d.is_rational());
    /// ```
    pub fn from_coefficients(coeffs: &[f64]) -> Result<Self, CalibrationError> {
        if coeffs.len() > 8 {
            return Err(CalibrationError::TooManyDistortionCoefficients(coeffs.len()));
        }
        if coeffs.iter().any(|c| !c.is_finite()) {
            return Err(CalibrationError::NonFiniteParameter("distortion coefficients"));
        }

        let mut k = [0.0; 8];
        k[..coeffs.len()].copy_from_slice(coeffs);

        Ok(Self {
            k1: k[0],
            k2: k[1],
            p1: k[2],
            p2: k[3],
            k3: k[4],
            k4: k[5],
            k5: k[6],
            k6: k[7],
        })
    }

    /// Whether the rational denominator (`k4..k6`) takes part in the model.
    pub fn is_rational(&self) -> bool {
        self.k4 != 0.0 || self.k5 != 0.0 || self.k6 != 0.0
    }

    /// Apply the distortion to ideal normalized coordinates.
    ///
    /// Returns `None` when the rational denominator vanishes.
    pub fn distort_normalized(&self, x: f64, y: f64) -> Option<(f64, f64)> {
        let r2 = x * x + y * y;

        // radial distortion
        let mut kr = 1.0 + ((self.k3 * r2 + self.k2) * r2 + self.k1) * r2;
        if self.is_rational() {
            let den = 1.0 + ((self.k6 * r2 + self.k5) * r2 + self.k4) * r2;
            if den.abs() < f64::EPSILON {
                return None;
            }
            kr /= den;
        }

        // tangential distortion
        let xd = x * kr + 2.0 * self.p1 * x * y + self.p2 * (r2 + 2.0 * x * x);
        let yd = y * kr + self.p1 * (r2 + 2.0 * y * y) + 2.0 * self.p2 * x * y;

        Some((xd, yd))
    }
}

/// Distort a point using polynomial distortion
///
/// # Arguments
///
/// * `x` - The x coordinate of the point
/// * `y` - The y coordinate of the point
/// * `intrinsic` - The intrinsic parameters of the camera
/// * `distortion` - The distortion parameters of the camera
///
/// # Returns
///
/// The distorted pixel coordinates, or `None` if the model is degenerate at this point.
pub fn distort_point_polynomial(
    x: f64,
    y: f64,
    intrinsic: &CameraIntrinsic,
    distortion: &PolynomialDistortion,
) -> Option<(f64, f64)> {
    // normalize the coordinates
    let x = (x - intrinsic.cx) / intrinsic.fx;
    let y = (y - intrinsic.cy) / intrinsic.fy;

    let (xd, yd) = distortion.distort_normalized(x, y)?;

    // denormalize the coordinates
    Some((intrinsic.fx * xd + intrinsic.cx, intrinsic.fy * yd + intrinsic.cy))
}

/// Find where a rectified pixel originates in the distorted source image.
///
/// # Arguments
///
/// * `intrinsic` - The intrinsic parameters of the source camera.
/// * `distortion` - The distortion parameters of the source camera.
/// * `ir` - The `(K_new * R)^-1` matrix.
/// * `row` - The row of the destination pixel.
/// * `col` - The column of the destination pixel.
/// * `no_rotation` - Skip the homogeneous divide; only valid when the last row of `ir` is `[0, 0, 1]`.
///
/// # Returns
///
/// The `(u, v)` source coordinates, or `None` if the point back-projects to infinity or the
/// distortion model is degenerate there.
pub fn rectify_point(
    intrinsic: &CameraIntrinsic,
    distortion: &PolynomialDistortion,
    ir: &na::Matrix3<f64>,
    row: f64,
    col: f64,
    no_rotation: bool,
) -> Option<(f64, f64)> {
    let p = ir * na::Vector3::new(col, row, 1.0);
    let (x, y) = if no_rotation {
        (p.x, p.y)
    } else {
        if p.z.abs() < f64::EPSILON {
            return None;
        }
        (p.x / p.z, p.y / p.z)
    };

    let (xd, yd) = distortion.distort_normalized(x, y)?;

    let u = intrinsic.fx * xd + intrinsic.cx;
    let v = intrinsic.fy * yd + intrinsic.cy;

    if u.is_finite() && v.is_finite() {
        Some((u, v))
    } else {
        None
    }
}

/// Generate the undistort and rectify map for a polynomial distortion model
///
/// The map is computed once per calibration and resolution and is meant to be reused for
/// every frame.
///
/// # Arguments
///
/// * `intrinsic` - The intrinsic parameters of the camera
/// * `distortion` - The distortion parameters of the camera
/// * `rectification` - The back-projection of the rectified camera
/// * `size` - The size of the rectified image
///
/// # Returns
///
/// The x and y maps for undistorting and rectifying the image. Points where the model is
/// degenerate hold [`OUT_OF_RANGE`].
pub fn generate_correction_map_polynomial(
    intrinsic: &CameraIntrinsic,
    distortion: &PolynomialDistortion,
    rectification: &RectificationTransform,
    size: &ImageSize,
) -> Result<CoordinateMap, CalibrationError> {
    intrinsic.validate()?;
    if size.width == 0 || size.height == 0 {
        return Err(CalibrationError::EmptyImageSize(*size));
    }

    let start = Instant::now();
    let ir = rectification.inverse();
    let no_rotation = rectification.no_rotation();

    let map = CoordinateMap::from_fn(*size, |x, y| {
        match rectify_point(intrinsic, distortion, ir, y as f64, x as f64, no_rotation) {
            Some((u, v)) => (u as f32, v as f32),
            None => (OUT_OF_RANGE, OUT_OF_RANGE),
        }
    })?;

    log::debug!(
        "built {}x{} correction map in {:?} (no_rotation: {})",
        size.width,
        size.height,
        start.elapsed(),
        no_rotation
    );

    let invalid = map.count_out_of_range(*size);
    if invalid > 0 {
        log::warn!(
            "correction map samples outside the source image for {} of {} pixels",
            invalid,
            size.area()
        );
    }

    Ok(map)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calibration::rectification::IDENTITY;
    use approx::assert_relative_eq;

    fn oak_intrinsic() -> CameraIntrinsic {
        CameraIntrinsic {
            fx: 577.48583984375,
            fy: 652.8748779296875,
            cx: 577.48583984375,
            cy: 386.1428833007813,
        }
    }

    fn oak_distortion() -> PolynomialDistortion {
        PolynomialDistortion {
            k1: 1.7547749280929563,
            k2: 0.0097926277667284,
            k3: -0.027250492945313457,
            k4: 2.1092164516448975,
            k5: 0.462927520275116,
            k6: -0.08215277642011642,
            p1: -0.00005457743463921361,
            p2: 0.00003006766564794816,
        }
    }

    fn rotation_x(angle: f64) -> [f64; 9] {
        let (s, c) = angle.sin_cos();
        [1.0, 0.0, 0.0, 0.0, c, -s, 0.0, s, c]
    }

    #[test]
    fn test_distort_point_polynomial() {
        let intrinsic = oak_intrinsic();
        let distortion = oak_distortion();

        let (x, y) = (100.0, 20.0);
        let (xd, yd) = distort_point_polynomial(x, y, &intrinsic, &distortion).unwrap();

        // evaluate the rational model by hand
        let xn = (x - intrinsic.cx) / intrinsic.fx;
        let yn = (y - intrinsic.cy) / intrinsic.fy;
        let r2 = xn * xn + yn * yn;
        let d = &distortion;
        let kr = (1.0 + d.k1 * r2 + d.k2 * r2 * r2 + d.k3 * r2 * r2 * r2)
            / (1.0 + d.k4 * r2 + d.k5 * r2 * r2 + d.k6 * r2 * r2 * r2);
        let xe = xn * kr + 2.0 * d.p1 * xn * yn + d.p2 * (r2 + 2.0 * xn * xn);
        let ye = yn * kr + d.p1 * (r2 + 2.0 * yn * yn) + 2.0 * d.p2 * xn * yn;

        assert_relative_eq!(xd, intrinsic.fx * xe + intrinsic.cx, epsilon = 1e-9);
        assert_relative_eq!(yd, intrinsic.fy * ye + intrinsic.cy, epsilon = 1e-9);
    }

    #[test]
    fn test_from_coefficients_pads_and_rejects() {
        let d = PolynomialDistortion::from_coefficients(&[0.1, 0.2, 0.3, 0.4]).unwrap();
        assert_eq!((d.k1, d.k2, d.p1, d.p2, d.k3), (0.1, 0.2, 0.3, 0.4, 0.0));
        assert_eq!(
            PolynomialDistortion::from_coefficients(&[0.0; 9]),
            Err(CalibrationError::TooManyDistortionCoefficients(9))
        );
        assert!(PolynomialDistortion::from_coefficients(&[f64::NAN]).is_err());
        assert!(PolynomialDistortion::from_coefficients(&[0.0, 0.0, 0.0, 0.0, 0.0, 0.1])
            .unwrap()
            .is_rational());
    }

    #[test]
    fn test_identity_rotation_matches_affine_branch() -> Result<(), CalibrationError> {
        let intrinsic = oak_intrinsic();
        let distortion = oak_distortion();
        let rect = RectificationTransform::new(&intrinsic, &IDENTITY)?;
        let ir = rect.inverse();

        for row in (0..720).step_by(37) {
            for col in (0..1280).step_by(53) {
                let (row, col) = (row as f64, col as f64);
                let affine = rectify_point(&intrinsic, &distortion, ir, row, col, true);
                let divided = rectify_point(&intrinsic, &distortion, ir, row, col, false);
                assert_eq!(affine, divided);
            }
        }
        Ok(())
    }

    #[test]
    fn test_no_distortion_identity_is_identity() -> Result<(), CalibrationError> {
        let intrinsic = CameraIntrinsic {
            fx: 400.0,
            fy: 400.0,
            cx: 160.0,
            cy: 120.0,
        };
        let rect = RectificationTransform::identity(&intrinsic)?;
        let (u, v) = rectify_point(
            &intrinsic,
            &PolynomialDistortion::default(),
            rect.inverse(),
            33.0,
            71.0,
            rect.no_rotation(),
        )
        .unwrap();
        assert_relative_eq!(u, 71.0, epsilon = 1e-9);
        assert_relative_eq!(v, 33.0, epsilon = 1e-9);
        Ok(())
    }

    #[test]
    fn test_point_at_infinity_is_flagged() -> Result<(), CalibrationError> {
        let intrinsic = CameraIntrinsic {
            fx: 1.0,
            fy: 1.0,
            cx: 0.0,
            cy: 0.0,
        };
        // w = row - col vanishes on the diagonal
        #[rustfmt::skip]
        let ir = na::Matrix3::new(
            1.0, 0.0, 0.0,
            0.0, 1.0, 0.0,
            -1.0, 1.0, 0.0,
        );
        let res = rectify_point(
            &intrinsic,
            &PolynomialDistortion::default(),
            &ir,
            5.0,
            5.0,
            false,
        );
        assert_eq!(res, None);
        Ok(())
    }

    #[test]
    fn test_undistort_rectify_map_polynomial() -> Result<(), CalibrationError> {
        let intrinsic = oak_intrinsic();
        let distortion = oak_distortion();
        let rect = RectificationTransform::identity(&intrinsic)?;

        let size = ImageSize {
            width: 8,
            height: 4,
        };

        let map = generate_correction_map_polynomial(&intrinsic, &distortion, &rect, &size)?;

        assert_eq!(map.map_x.shape, [4, 8]);
        assert_eq!(map.map_y.shape, [4, 8]);

        let (u, v) = rectify_point(&intrinsic, &distortion, rect.inverse(), 3.0, 5.0, true).unwrap();
        assert_eq!(map.get(3, 5), Some((u as f32, v as f32)));

        Ok(())
    }

    #[test]
    fn test_map_generation_is_deterministic() -> Result<(), CalibrationError> {
        let intrinsic = CameraIntrinsic {
            fx: 420.0,
            fy: 421.5,
            cx: 161.2,
            cy: 119.7,
        };
        let distortion = PolynomialDistortion::from_coefficients(&[-0.3, 0.1, 1e-3, -2e-3, -0.02])?;
        let rect = RectificationTransform::new(&intrinsic, &rotation_x(0.01))?;
        let size = ImageSize {
            width: 320,
            height: 240,
        };

        let a = generate_correction_map_polynomial(&intrinsic, &distortion, &rect, &size)?;
        let b = generate_correction_map_polynomial(&intrinsic, &distortion, &rect, &size)?;
        assert_eq!(a, b);
        Ok(())
    }

    #[test]
    fn test_map_precision_against_double_model() -> Result<(), CalibrationError> {
        let intrinsic = CameraIntrinsic {
            fx: 1400.0,
            fy: 1400.0,
            cx: 960.0,
            cy: 540.0,
        };
        let distortion =
            PolynomialDistortion::from_coefficients(&[-0.12, 0.03, 2e-4, 1e-4, -0.004])?;
        let rect = RectificationTransform::identity(&intrinsic)?;
        let size = ImageSize {
            width: 1920,
            height: 1080,
        };
        let map = generate_correction_map_polynomial(&intrinsic, &distortion, &rect, &size)?;

        for (row, col) in [(0, 0), (539, 959), (1079, 1919), (17, 1803)] {
            let (u, v) = rectify_point(
                &intrinsic,
                &distortion,
                rect.inverse(),
                row as f64,
                col as f64,
                true,
            )
            .unwrap();
            let (mu, mv) = map.get(row, col).unwrap();
            assert!((mu as f64 - u).abs() < 1e-3);
            assert!((mv as f64 - v).abs() < 1e-3);
        }
        Ok(())
    }

    #[test]
    fn test_empty_size_is_rejected() -> Result<(), CalibrationError> {
        let intrinsic = oak_intrinsic();
        let rect = RectificationTransform::identity(&intrinsic)?;
        let size = ImageSize {
            width: 0,
            height: 4,
        };
        assert_eq!(
            generate_correction_map_polynomial(
                &intrinsic,
                &PolynomialDistortion::default(),
                &rect,
                &size
            ),
            Err(CalibrationError::EmptyImageSize(size))
        );
        Ok(())
    }
}
