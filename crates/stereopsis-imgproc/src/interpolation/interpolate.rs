use super::bilinear::bilinear_interpolation;
use super::grid::in_bounds;
use super::nearest::nearest_neighbor_interpolation;
use stereopsis_image::{Image, ImageDtype};

/// Interpolation mode for the remap operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InterpolationMode {
    /// Bilinear interpolation
    #[default]
    Bilinear,
    /// Nearest neighbor interpolation
    Nearest,
}

/// Row-addressable pixel storage that the interpolation kernels read from.
///
/// A full image exposes every row; a streaming window exposes only the rows it holds.
pub(crate) trait RowSource<T> {
    /// Total number of rows of the source image.
    fn rows(&self) -> usize;

    /// Number of columns of the source image.
    fn cols(&self) -> usize;

    /// The interleaved samples of row `r`, or `None` if the row is not available.
    fn row(&self, r: usize) -> Option<&[T]>;
}

impl<T, const C: usize> RowSource<T> for Image<T, C> {
    fn rows(&self) -> usize {
        self.height()
    }

    fn cols(&self) -> usize {
        self.width()
    }

    fn row(&self, r: usize) -> Option<&[T]> {
        (r < self.height()).then(|| Image::row(self, r))
    }
}

/// Kernel for interpolating a pixel value
///
/// # Arguments
///
/// * `src` - The source rows.
/// * `u` - The x coordinate of the pixel to interpolate.
/// * `v` - The y coordinate of the pixel to interpolate.
/// * `interpolation` - The interpolation mode to use.
///
/// # Returns
///
/// The interpolated pixel, or `None` if `(u, v)` is outside the source or the rows it
/// needs are not available.
pub(crate) fn interpolate_pixel<T: ImageDtype, const C: usize, S: RowSource<T>>(
    src: &S,
    u: f32,
    v: f32,
    interpolation: InterpolationMode,
) -> Option<[T; C]> {
    if !in_bounds(u, v, src.cols(), src.rows()) {
        return None;
    }

    match interpolation {
        InterpolationMode::Bilinear => bilinear_interpolation(src, u, v),
        InterpolationMode::Nearest => nearest_neighbor_interpolation(src, u, v),
    }
}
