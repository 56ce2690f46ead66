use stereopsis_image::ImageSize;
use stereopsis_tensor::TensorError;

/// image distortion module.
pub mod distortion;

/// rectification transform module.
pub mod rectification;

/// iterative point undistortion.
pub mod undistort;

/// Errors raised while validating calibration data or building correction maps.
///
/// All of these are detected before any per-pixel work starts.
#[derive(thiserror::Error, Debug, PartialEq)]
pub enum CalibrationError {
    /// A focal length is zero or not finite.
    #[error("Invalid focal length fx={0}, fy={1}")]
    InvalidFocalLength(f64, f64),

    /// A calibration parameter is NaN or infinite.
    #[error("Calibration parameter `{0}` is not finite")]
    NonFiniteParameter(&'static str),

    /// More distortion coefficients than the polynomial model supports.
    #[error("Expected at most 8 distortion coefficients, got {0}")]
    TooManyDistortionCoefficients(usize),

    /// The rectification matrix cannot be inverted.
    #[error("Rectification matrix is singular (determinant {0})")]
    SingularRectification(f64),

    /// The requested map has no pixels.
    #[error("Cannot build a correction map of size {0}")]
    EmptyImageSize(ImageSize),

    /// The map buffers could not be allocated.
    #[error(transparent)]
    Tensor(#[from] TensorError),
}

/// Represents the instrinsic parameters of a pinhole camera
///
/// # Fields
///
/// * `fx` - The focal length in the x direction
/// * `fy` - The focal length in the y direction
/// * `cx` - The x coordinate of the principal point
/// * `cy` - The y coordinate of the principal point
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CameraIntrinsic {
    /// The focal length in the x direction
    pub fx: f64,
    /// The focal length in the y direction
    pub fy: f64,
    /// The x coordinate of the principal point
    pub cx: f64,
    /// The y coordinate of the principal point
    pub cy: f64,
}

impl CameraIntrinsic {
    /// Build the intrinsics from a row-major 3x3 camera matrix.
    ///
    /// Only `fx = m[0]`, `cx = m[2]`, `fy = m[4]` and `cy = m[5]` are read; skew is ignored.
    ///
    /// # Errors
    ///
    /// Returns an error if a focal length is zero or a value is not finite.
    pub fn from_matrix(m: &[f64; 9]) -> Result<Self, CalibrationError> {
        let intrinsic = Self {
            fx: m[0],
            fy: m[4],
            cx: m[2],
            cy: m[5],
        };
        intrinsic.validate()?;
        Ok(intrinsic)
    }

    /// Check that the focal lengths are usable and every value is finite.
    pub fn validate(&self) -> Result<(), CalibrationError> {
        if !self.cx.is_finite() || !self.cy.is_finite() {
            return Err(CalibrationError::NonFiniteParameter("principal point"));
        }
        if self.fx == 0.0 || self.fy == 0.0 || !self.fx.is_finite() || !self.fy.is_finite() {
            return Err(CalibrationError::InvalidFocalLength(self.fx, self.fy));
        }
        Ok(())
    }

    /// The row-major 3x3 camera matrix.
    #[rustfmt::skip]
    pub fn matrix(&self) -> [f64; 9] {
        [
            self.fx, 0.0, self.cx,
            0.0, self.fy, self.cy,
            0.0, 0.0, 1.0,
        ]
    }
}
