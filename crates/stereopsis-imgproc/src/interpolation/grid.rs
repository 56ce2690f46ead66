use rayon::prelude::*;

use stereopsis_image::{ImageError, ImageSize};
use stereopsis_tensor::{Tensor2, TensorError};

/// Coordinate written for destination pixels with no valid source position.
pub const OUT_OF_RANGE: f32 = -1.0;

/// Per-pixel source coordinates of a geometric transformation.
///
/// `map_x[r, c]` and `map_y[r, c]` hold the source column and row sampled for destination
/// pixel `(r, c)`. Coordinates are computed in double precision and stored as `f32`.
#[derive(Clone, Debug, PartialEq)]
pub struct CoordinateMap {
    /// Source column for every destination pixel.
    pub map_x: Tensor2<f32>,
    /// Source row for every destination pixel.
    pub map_y: Tensor2<f32>,
}

impl CoordinateMap {
    /// Create a map from two coordinate tensors of the same shape.
    ///
    /// # Errors
    ///
    /// Returns an error if the shapes of `map_x` and `map_y` differ.
    pub fn new(map_x: Tensor2<f32>, map_y: Tensor2<f32>) -> Result<Self, ImageError> {
        if map_x.shape != map_y.shape {
            return Err(ImageError::InvalidImageSize(
                map_x.shape[1],
                map_x.shape[0],
                map_y.shape[1],
                map_y.shape[0],
            ));
        }
        Ok(Self { map_x, map_y })
    }

    /// Create the map that samples every pixel at its own position.
    pub fn identity(size: ImageSize) -> Result<Self, TensorError> {
        let (map_x, map_y) = meshgrid(size.height, size.width)?;
        Ok(Self { map_x, map_y })
    }

    /// Create a map by evaluating `f(x, y)` for every destination pixel, rows in parallel.
    pub fn from_fn<F>(size: ImageSize, f: F) -> Result<Self, TensorError>
    where
        F: Fn(usize, usize) -> (f32, f32) + Send + Sync,
    {
        let (map_x, map_y) = meshgrid_from_fn(size.height, size.width, f)?;
        Ok(Self { map_x, map_y })
    }

    /// The destination size covered by the map.
    pub fn size(&self) -> ImageSize {
        ImageSize {
            width: self.map_x.shape[1],
            height: self.map_x.shape[0],
        }
    }

    /// The source coordinates `(x, y)` of destination pixel `(row, col)`.
    pub fn get(&self, row: usize, col: usize) -> Option<(f32, f32)> {
        let x = self.map_x.get([row, col])?;
        let y = self.map_y.get([row, col])?;
        Some((*x, *y))
    }

    /// Number of entries that do not sample inside an image of `src_size`.
    pub fn count_out_of_range(&self, src_size: ImageSize) -> usize {
        self.map_x
            .as_slice()
            .iter()
            .zip(self.map_y.as_slice())
            .filter(|&(&x, &y)| !in_bounds(x, y, src_size.width, src_size.height))
            .count()
    }

    /// Largest distance between a destination row and the source row it samples.
    ///
    /// Entries that are not finite or hold [`OUT_OF_RANGE`] are ignored.
    pub fn max_vertical_displacement(&self) -> f32 {
        let cols = self.map_y.shape[1].max(1);
        self.map_y
            .as_slice()
            .chunks_exact(cols)
            .enumerate()
            .flat_map(|(r, row)| row.iter().map(move |&y| (r, y)))
            .filter(|&(_, y)| y.is_finite() && y >= 0.0)
            .map(|(r, y)| (y - r as f32).abs())
            .fold(0.0, f32::max)
    }
}

/// Whether `(x, y)` lies inside a `cols x rows` image. NaN is never inside.
#[inline]
pub(crate) fn in_bounds(x: f32, y: f32, cols: usize, rows: usize) -> bool {
    x >= 0.0 && y >= 0.0 && x <= (cols as f32 - 1.0) && y <= (rows as f32 - 1.0)
}

/// Create a meshgrid of x and y coordinates
///
/// # Arguments
///
/// * `rows` - The number of rows indicating the height of the grid
/// * `cols` - The number of columns indicating the width of the grid
///
/// # Returns
///
/// A tuple of 2D arrays of shape (rows, cols) containing the x and y coordinates
pub fn meshgrid(rows: usize, cols: usize) -> Result<(Tensor2<f32>, Tensor2<f32>), TensorError> {
    let map_x = Tensor2::from_shape_fn([rows, cols], |[_, c]| c as f32)?;
    let map_y = Tensor2::from_shape_fn([rows, cols], |[r, _]| r as f32)?;
    Ok((map_x, map_y))
}

/// Create a pair of coordinate grids from a function of the pixel position.
///
/// `f(x, y)` is called once per element with the column and row; rows are filled in parallel.
pub fn meshgrid_from_fn<F>(
    rows: usize,
    cols: usize,
    f: F,
) -> Result<(Tensor2<f32>, Tensor2<f32>), TensorError>
where
    F: Fn(usize, usize) -> (f32, f32) + Send + Sync,
{
    let mut map_x = Tensor2::<f32>::zeros([rows, cols])?;
    let mut map_y = Tensor2::<f32>::zeros([rows, cols])?;

    if cols > 0 {
        map_x
            .as_slice_mut()
            .par_chunks_exact_mut(cols)
            .zip(map_y.as_slice_mut().par_chunks_exact_mut(cols))
            .enumerate()
            .for_each(|(r, (row_x, row_y))| {
                row_x
                    .iter_mut()
                    .zip(row_y.iter_mut())
                    .enumerate()
                    .for_each(|(c, (x, y))| {
                        (*x, *y) = f(c, r);
                    });
            });
    }

    Ok((map_x, map_y))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_meshgrid() -> Result<(), TensorError> {
        let (map_x, map_y) = meshgrid(2, 3)?;
        assert_eq!(map_x.shape, [2, 3]);
        assert_eq!(map_x.as_slice(), &[0.0, 1.0, 2.0, 0.0, 1.0, 2.0]);
        assert_eq!(map_y.as_slice(), &[0.0, 0.0, 0.0, 1.0, 1.0, 1.0]);
        Ok(())
    }

    #[test]
    fn test_meshgrid_from_fn_matches_meshgrid() -> Result<(), TensorError> {
        let (x0, y0) = meshgrid(5, 7)?;
        let (x1, y1) = meshgrid_from_fn(5, 7, |x, y| (x as f32, y as f32))?;
        assert_eq!(x0, x1);
        assert_eq!(y0, y1);
        Ok(())
    }

    #[test]
    fn test_map_accessors() -> Result<(), TensorError> {
        let size = ImageSize {
            width: 4,
            height: 3,
        };
        let map = CoordinateMap::from_fn(size, |x, y| (x as f32 + 0.5, y as f32 * 2.0))?;
        assert_eq!(map.size(), size);
        assert_eq!(map.get(2, 1), Some((1.5, 4.0)));
        assert_eq!(map.get(3, 0), None);
        // x = 3.5 and y = 4 fall outside a 4x3 source
        assert_eq!(map.count_out_of_range(size), 6);
        assert_eq!(map.max_vertical_displacement(), 2.0);
        Ok(())
    }

    #[test]
    fn test_map_shape_mismatch() -> Result<(), TensorError> {
        let (x, _) = meshgrid(2, 3)?;
        let (_, y) = meshgrid(3, 2)?;
        assert_eq!(
            CoordinateMap::new(x, y),
            Err(ImageError::InvalidImageSize(3, 2, 2, 3))
        );
        Ok(())
    }

    #[test]
    fn test_in_bounds() {
        assert!(in_bounds(0.0, 0.0, 4, 3));
        assert!(in_bounds(3.0, 2.0, 4, 3));
        assert!(!in_bounds(3.01, 2.0, 4, 3));
        assert!(!in_bounds(-0.01, 1.0, 4, 3));
        assert!(!in_bounds(f32::NAN, 1.0, 4, 3));
        assert!(!in_bounds(OUT_OF_RANGE, OUT_OF_RANGE, 4, 3));
    }
}
