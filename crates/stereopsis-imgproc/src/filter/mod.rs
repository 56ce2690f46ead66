//! Filter operations
//!
//! This module provides the contrast filters applied to rectified images before matching.

/// Filter kernels
pub mod kernels;

/// Stereo pre-filter
mod prefilter;
pub use prefilter::*;

use crate::parallel::ParallelError;
use stereopsis_image::ImageError;

/// Errors raised by the filter operations.
#[derive(thiserror::Error, Debug, PartialEq)]
pub enum FilterError {
    /// The clipping cap is outside the supported range.
    #[error("pre-filter cap must be in 1..=63, got {0}")]
    InvalidCap(i32),

    /// The kernel size is not an odd value in the supported range.
    #[error("pre-filter size must be odd and in 5..=255, got {0}")]
    InvalidKernelSize(usize),

    /// The output image could not be created.
    #[error(transparent)]
    Image(#[from] ImageError),

    /// The rows could not be processed.
    #[error(transparent)]
    Parallel(#[from] ParallelError),
}
