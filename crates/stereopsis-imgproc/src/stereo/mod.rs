//! Dense disparity estimation between two rectified images.

/// SAD block matching.
pub mod block_matching;

mod cost;

/// Block matching parameters.
pub mod state;

pub use block_matching::{
    stereo_block_matching, stereo_block_matching_naive, stereo_block_matching_with_strategy,
};
pub use state::BlockMatchState;

use crate::{filter::FilterError, parallel::ParallelError};
use stereopsis_image::{Image, ImageError, ImageSize};

/// Fixed-point scale of the disparity values: 4 fractional bits.
pub const DISPARITY_SCALE: i32 = 16;

/// Disparities scaled by [`DISPARITY_SCALE`], one per pixel of the left image.
pub type DisparityMap = Image<i16, 1>;

/// Errors raised while setting up block matching.
///
/// Every error is detected before any pixel is matched; per-pixel failures are written as the
/// invalid disparity instead.
#[derive(thiserror::Error, Debug, PartialEq)]
pub enum StereoError {
    /// The window size is even or outside `5..=255`.
    #[error("window size must be odd and in 5..=255, got {0}")]
    InvalidWindowSize(usize),

    /// The window does not fit in the image.
    #[error("window size {window} does not fit in image of {size}")]
    WindowTooLarge {
        /// The matching window size
        window: usize,
        /// The size of the images
        size: ImageSize,
    },

    /// The disparity range is empty or cannot be stored in the output.
    #[error("invalid disparity range: min {min_disparity}, count {num_disparities}")]
    InvalidDisparityRange {
        /// The smallest disparity searched
        min_disparity: i32,
        /// The number of disparities searched
        num_disparities: usize,
    },

    /// The left and right images have different sizes.
    #[error("left image is {0} but right image is {1}")]
    SizeMismatch(ImageSize, ImageSize),

    /// The pre-filter parameters are invalid.
    #[error(transparent)]
    PreFilter(#[from] FilterError),

    /// The rows could not be processed.
    #[error(transparent)]
    Parallel(#[from] ParallelError),

    /// The output image could not be created.
    #[error(transparent)]
    Image(#[from] ImageError),
}
