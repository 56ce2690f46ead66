#![deny(missing_docs)]
#![doc = env!("CARGO_PKG_DESCRIPTION")]

/// lens distortion, rectification transforms and correction maps.
pub mod calibration;

/// contrast filters applied before stereo matching.
pub mod filter;

/// utilities for interpolation.
pub mod interpolation;

/// module containing parallization utilities.
pub mod parallel;

/// dense stereo correspondence.
pub mod stereo;
