#![deny(missing_docs)]
#![doc = env!("CARGO_PKG_DESCRIPTION")]

/// Calibration and matching configuration files.
pub mod config;

mod error;

/// Rectify-then-match processing with maps built once per calibration.
pub mod pipeline;

pub use crate::config::{CameraCalibration, StereoCalibration, StereoConfig};
pub use crate::error::PipelineError;
pub use crate::pipeline::{stereo_rectify_and_match, StereoFrame, StereoPipeline, StereoRectifier};
