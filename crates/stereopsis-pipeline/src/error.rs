use stereopsis_image::{ImageError, ImageSize};
use stereopsis_imgproc::calibration::CalibrationError;
use stereopsis_imgproc::stereo::StereoError;

/// An error type for the stereo pipeline.
#[derive(thiserror::Error, Debug)]
pub enum PipelineError {
    /// The calibration is malformed or a map could not be built.
    #[error(transparent)]
    Calibration(#[from] CalibrationError),

    /// The block matching parameters are invalid.
    #[error(transparent)]
    Stereo(#[from] StereoError),

    /// An image could not be created or resampled.
    #[error(transparent)]
    Image(#[from] ImageError),

    /// A frame does not have the calibrated resolution.
    #[error("Image of {actual} does not match the calibrated size {expected}")]
    FrameSizeMismatch {
        /// The resolution the maps were built for
        expected: ImageSize,
        /// The resolution of the frame
        actual: ImageSize,
    },

    /// The configuration file could not be read or written.
    #[error("Failed to access the configuration file")]
    Io(#[from] std::io::Error),

    /// The configuration is not valid JSON for the expected layout.
    #[error("Failed to parse the configuration")]
    Json(#[from] serde_json::Error),
}
