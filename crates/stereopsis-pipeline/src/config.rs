use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use serde::{Deserialize, Serialize};

use stereopsis_image::ImageSize;
use stereopsis_imgproc::calibration::{
    distortion::{generate_correction_map_polynomial, PolynomialDistortion},
    rectification::{RectificationTransform, IDENTITY},
    CalibrationError, CameraIntrinsic,
};
use stereopsis_imgproc::interpolation::grid::CoordinateMap;
use stereopsis_imgproc::stereo::BlockMatchState;

use crate::error::PipelineError;

fn identity_rotation() -> [f64; 9] {
    IDENTITY
}

/// Calibration of one camera of a stereo rig.
///
/// Matrices are row-major 3x3. Distortion coefficients follow the order
/// `k1, k2, p1, p2, k3, k4, k5, k6`; trailing coefficients may be omitted.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CameraCalibration {
    /// The camera matrix of the raw (distorted) camera.
    pub camera_matrix: [f64; 9],
    /// The lens distortion coefficients.
    #[serde(default)]
    pub distortion: Vec<f64>,
    /// The rectification rotation, identity when the camera is only undistorted.
    #[serde(default = "identity_rotation")]
    pub rectification: [f64; 9],
    /// The camera matrix of the rectified image, `camera_matrix` when absent.
    #[serde(default)]
    pub new_camera_matrix: Option<[f64; 9]>,
}

impl CameraCalibration {
    /// The intrinsics of the raw camera.
    pub fn intrinsic(&self) -> Result<CameraIntrinsic, CalibrationError> {
        CameraIntrinsic::from_matrix(&self.camera_matrix)
    }

    /// The lens distortion model.
    pub fn distortion_model(&self) -> Result<PolynomialDistortion, CalibrationError> {
        PolynomialDistortion::from_coefficients(&self.distortion)
    }

    /// The back-projection of the rectified camera using `rotation`.
    pub fn rectification_with(
        &self,
        rotation: &[f64; 9],
    ) -> Result<RectificationTransform, CalibrationError> {
        let new_matrix = self.new_camera_matrix.as_ref().unwrap_or(&self.camera_matrix);
        RectificationTransform::new(&CameraIntrinsic::from_matrix(new_matrix)?, rotation)
    }

    /// The back-projection of the rectified camera.
    pub fn rectification_transform(&self) -> Result<RectificationTransform, CalibrationError> {
        self.rectification_with(&self.rectification)
    }

    /// Build the undistortion and rectification map of this camera.
    ///
    /// # Errors
    ///
    /// Returns an error if the calibration is malformed or `size` is empty.
    pub fn correction_map(&self, size: ImageSize) -> Result<CoordinateMap, CalibrationError> {
        self.correction_map_with(&self.rectification, size)
    }

    /// Same as [`CameraCalibration::correction_map`] with an explicit rotation.
    pub fn correction_map_with(
        &self,
        rotation: &[f64; 9],
        size: ImageSize,
    ) -> Result<CoordinateMap, CalibrationError> {
        generate_correction_map_polynomial(
            &self.intrinsic()?,
            &self.distortion_model()?,
            &self.rectification_with(rotation)?,
            &size,
        )
    }
}

/// Calibration of a stereo rig at a fixed resolution.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StereoCalibration {
    /// `[width, height]` of the raw and rectified images.
    pub image_size: [usize; 2],
    /// The left camera.
    pub left: CameraCalibration,
    /// The right camera.
    pub right: CameraCalibration,
}

impl StereoCalibration {
    /// The calibrated resolution.
    pub fn size(&self) -> ImageSize {
        self.image_size.into()
    }
}

/// Everything needed to set up a [`crate::StereoPipeline`].
///
/// # Example
///
/// ```
/// use stereopsis_pipeline::StereoConfig;
///
/// let config = StereoConfig::from_json_str(
///     r#"{
///         "calibration": {
///             "image_size": [640, 480],
///             "left": { "camera_matrix": [500, 0, 320, 0, 500, 240, 0, 0, 1] },
///             "right": { "camera_matrix": [500, 0, 320, 0, 500, 240, 0, 0, 1] }
///         },
///         "block_matching": { "window_size": 15 }
///     }"#,
/// )
/// .unwrap();
///
/// assert_eq!(config.calibration.size().width, 640);
/// assert_eq!(config.block_matching.window_size, 15);
/// assert_eq!(config.block_matching.num_disparities, 64);
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StereoConfig {
    /// The stereo rig calibration.
    pub calibration: StereoCalibration,
    /// The block matching parameters; omitted fields take their defaults.
    #[serde(default)]
    pub block_matching: BlockMatchState,
}

impl StereoConfig {
    /// Parse a configuration from a JSON string.
    pub fn from_json_str(json: &str) -> Result<Self, PipelineError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Read a configuration from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened or does not hold a valid configuration.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, PipelineError> {
        let file = File::open(path.as_ref())?;
        let config = serde_json::from_reader(BufReader::new(file))?;
        log::debug!("loaded stereo configuration from {}", path.as_ref().display());
        Ok(config)
    }

    /// Write the configuration to a JSON file.
    pub fn to_json_file(&self, path: impl AsRef<Path>) -> Result<(), PipelineError> {
        let file = File::create(path)?;
        serde_json::to_writer_pretty(BufWriter::new(file), self)?;
        Ok(())
    }
}
