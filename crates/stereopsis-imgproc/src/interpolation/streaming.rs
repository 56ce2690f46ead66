use stereopsis_image::{ImageDtype, ImageSize};

use super::grid::CoordinateMap;
use super::interpolate::{interpolate_pixel, RowSource};
use super::InterpolationMode;

/// Errors raised by [`RowWindowRemap`].
#[derive(thiserror::Error, Debug, PartialEq)]
pub enum StreamingRemapError {
    /// The window must hold at least one row.
    #[error("row window must hold at least one row")]
    EmptyWindow,

    /// The source image has no pixels.
    #[error("source image {0} has no pixels")]
    EmptySource(ImageSize),

    /// A pushed row does not have the source width.
    #[error("expected a row of {expected} samples, got {actual}")]
    RowLength {
        /// Number of samples of a source row
        expected: usize,
        /// Number of samples pushed
        actual: usize,
    },

    /// More rows were pushed than the source has.
    #[error("source has only {0} rows")]
    TooManyRows(usize),

    /// The x and y coordinate planes of the map differ in shape.
    #[error("map_x has shape {x:?} but map_y has shape {y:?}")]
    MapShapeMismatch {
        /// Shape of `map_x`
        x: [usize; 2],
        /// Shape of `map_y`
        y: [usize; 2],
    },
}

/// One destination row produced by [`RowWindowRemap`].
#[derive(Clone, Debug, PartialEq)]
pub struct RemappedRow<T> {
    /// Index of the destination row.
    pub index: usize,
    /// Interleaved samples of the row.
    pub data: Vec<T>,
}

/// Ring of the most recent source rows, tagged with their row index.
struct RowRing<T> {
    data: Vec<T>,
    tags: Vec<Option<usize>>,
    row_len: usize,
    rows: usize,
    cols: usize,
}

impl<T> RowSource<T> for RowRing<T> {
    fn rows(&self) -> usize {
        self.rows
    }

    fn cols(&self) -> usize {
        self.cols
    }

    fn row(&self, r: usize) -> Option<&[T]> {
        let slot = r % self.tags.len();
        match self.tags[slot] {
            Some(tag) if tag == r => self.data.get(slot * self.row_len..(slot + 1) * self.row_len),
            _ => None,
        }
    }
}

/// Remap a source image that arrives row by row, holding only a window of source rows.
///
/// Destination row `i` is produced once source row `i + window_rows / 2` has been pushed. A
/// sample whose source rows have already left the window, or have not arrived, is treated as
/// out of range and receives the border value. When the window spans the vertical
/// displacement of the map (see [`RowWindowRemap::window_rows_for`]) the output is identical
/// to [`super::remap`].
///
/// # Example
///
/// ```
/// use stereopsis_image::ImageSize;
/// use stereopsis_imgproc::interpolation::{grid::CoordinateMap, InterpolationMode, RowWindowRemap};
///
/// let size = ImageSize { width: 4, height: 3 };
/// let map = CoordinateMap::identity(size).unwrap();
/// let mut stream = RowWindowRemap::<u8, 1>::new(&map, size, 3, InterpolationMode::Bilinear).unwrap();
///
/// let mut rows = Vec::new();
/// for r in 0..3u8 {
///     rows.extend(stream.push_row(&[r; 4]).unwrap());
/// }
/// rows.extend(stream.finish());
/// assert_eq!(rows.len(), 3);
/// assert_eq!(rows[2].data, vec![2; 4]);
/// ```
pub struct RowWindowRemap<'a, T, const C: usize> {
    map: &'a CoordinateMap,
    ring: RowRing<T>,
    interpolation: InterpolationMode,
    border: [T; C],
    rows_received: usize,
    next_row: usize,
}

impl<'a, T: ImageDtype, const C: usize> RowWindowRemap<'a, T, C> {
    /// Create a streaming remap over `map` for a source of `src_size`.
    ///
    /// # Arguments
    ///
    /// * `map` - The source coordinates of every destination pixel.
    /// * `src_size` - The size of the source image that will be pushed.
    /// * `window_rows` - Number of source rows held at a time.
    /// * `interpolation` - The interpolation mode to use.
    pub fn new(
        map: &'a CoordinateMap,
        src_size: ImageSize,
        window_rows: usize,
        interpolation: InterpolationMode,
    ) -> Result<Self, StreamingRemapError> {
        if window_rows == 0 {
            return Err(StreamingRemapError::EmptyWindow);
        }
        if src_size.width == 0 || src_size.height == 0 {
            return Err(StreamingRemapError::EmptySource(src_size));
        }
        if map.map_x.shape != map.map_y.shape {
            return Err(StreamingRemapError::MapShapeMismatch {
                x: map.map_x.shape,
                y: map.map_y.shape,
            });
        }

        let window_rows = window_rows.min(src_size.height);
        let row_len = src_size.width * C;

        Ok(Self {
            map,
            ring: RowRing {
                data: vec![T::default(); window_rows * row_len],
                tags: vec![None; window_rows],
                row_len,
                rows: src_size.height,
                cols: src_size.width,
            },
            interpolation,
            border: [T::default(); C],
            rows_received: 0,
            next_row: 0,
        })
    }

    /// Set the value written for out-of-range samples.
    pub fn with_border(mut self, border: [T; C]) -> Self {
        self.border = border;
        self
    }

    /// The smallest odd window that reproduces a full remap with `map`.
    ///
    /// Saturates for displacements too large to count; [`RowWindowRemap::new`] clamps the
    /// window to the source height.
    pub fn window_rows_for(map: &CoordinateMap) -> usize {
        let half = (map.max_vertical_displacement().ceil() as usize).saturating_add(1);
        half.saturating_mul(2).saturating_add(1)
    }

    /// Number of source rows held at a time.
    pub fn window_rows(&self) -> usize {
        self.ring.tags.len()
    }

    /// Push the next source row and collect the destination rows that became computable.
    ///
    /// # Errors
    ///
    /// Returns an error if the row has the wrong length or the source is already complete.
    pub fn push_row(&mut self, row: &[T]) -> Result<Vec<RemappedRow<T>>, StreamingRemapError> {
        if row.len() != self.ring.row_len {
            return Err(StreamingRemapError::RowLength {
                expected: self.ring.row_len,
                actual: row.len(),
            });
        }
        if self.rows_received == self.ring.rows {
            return Err(StreamingRemapError::TooManyRows(self.ring.rows));
        }

        let r = self.rows_received;
        let slot = r % self.window_rows();
        let row_len = self.ring.row_len;
        self.ring.data[slot * row_len..(slot + 1) * row_len].copy_from_slice(row);
        self.ring.tags[slot] = Some(r);
        self.rows_received += 1;

        let half = self.window_rows() / 2;
        let last_src = self.ring.rows - 1;
        let dst_rows = self.map.size().height;

        let mut out = Vec::new();
        while self.next_row < dst_rows && (self.next_row + half).min(last_src) < self.rows_received
        {
            out.push(self.compute_row(self.next_row));
            self.next_row += 1;
        }
        Ok(out)
    }

    /// Produce every destination row not emitted yet.
    pub fn finish(mut self) -> Vec<RemappedRow<T>> {
        let dst_rows = self.map.size().height;
        let mut out = Vec::with_capacity(dst_rows.saturating_sub(self.next_row));
        while self.next_row < dst_rows {
            out.push(self.compute_row(self.next_row));
            self.next_row += 1;
        }
        out
    }

    fn compute_row(&self, index: usize) -> RemappedRow<T> {
        let cols = self.map.size().width;
        let xs = &self.map.map_x.as_slice()[index * cols..(index + 1) * cols];
        let ys = &self.map.map_y.as_slice()[index * cols..(index + 1) * cols];

        let mut data = Vec::with_capacity(cols * C);
        for (&x, &y) in xs.iter().zip(ys) {
            let pixel = interpolate_pixel(&self.ring, x, y, self.interpolation)
                .unwrap_or(self.border);
            data.extend_from_slice(&pixel);
        }

        RemappedRow { index, data }
    }
}
