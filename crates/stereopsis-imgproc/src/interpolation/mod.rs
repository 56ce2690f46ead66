//! Pixel interpolation methods for image transformations.
//!
//! This module provides the interpolation kernels used when resampling images through a
//! coordinate map, the map type itself and the remap entry points.
//!
//! # Interpolation Modes
//!
//! - **Nearest**: Fastest, uses nearest pixel value (no interpolation)
//! - **Bilinear**: Smooth linear interpolation between adjacent pixels
//!
//! Samples outside the source image never read memory; they produce the border value.

mod bilinear;

/// Grid generation and coordinate mapping utilities.
///
/// Functions for generating coordinate meshgrids used in image warping
/// and transformation operations.
pub mod grid;

pub(crate) mod interpolate;
mod nearest;
mod remap;

/// Remapping of images delivered row by row.
pub mod streaming;

pub use interpolate::InterpolationMode;
pub use remap::{remap, remap_with_border, warp};
pub use streaming::{RemappedRow, RowWindowRemap, StreamingRemapError};
