use rayon::prelude::*;
use thiserror::Error;

use stereopsis_image::Image;

use crate::interpolation::grid::CoordinateMap;

/// Errors that can occur during parallel execution.
#[derive(Error, Debug, PartialEq)]
pub enum ParallelError {
    /// The thread pool failed to build.
    #[error("failed to build thread pool: {0}")]
    BuildError(String),

    /// The requested thread count is invalid.
    #[error("thread count must be > 0, got {0}")]
    InvalidThreadCount(usize),

    /// The row length must be non-zero and divide the buffer.
    #[error("row length {0} does not split a buffer of {1} elements")]
    InvalidRowStride(usize, usize),
}

/// Controls how row-wise operations are executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExecutionStrategy {
    /// Use the global Rayon thread pool to process rows in parallel.
    #[default]
    ParallelRows,

    /// Run sequentially on the current thread.
    ///
    /// Useful for small images, debugging, or when the overhead of parallelization
    /// outweighs the benefits.
    Serial,

    /// Run on a local thread pool with `n` threads.
    ///
    /// # Warning
    /// Creates a new thread pool on every call, which has significant overhead.
    /// Use this primarily for benchmarking or specific isolation needs.
    Fixed(usize),
}

/// Apply a function to consecutive chunks of a buffer, passing the chunk index.
///
/// The last chunk may be shorter than `chunk_len`.
///
/// # Errors
///
/// Returns an error if `chunk_len` is zero or the thread pool cannot be built.
pub fn par_iter_chunks_indexed<T, F>(
    data: &mut [T],
    chunk_len: usize,
    strategy: ExecutionStrategy,
    f: F,
) -> Result<(), ParallelError>
where
    T: Send,
    F: Fn(usize, &mut [T]) + Send + Sync,
{
    if chunk_len == 0 {
        return Err(ParallelError::InvalidRowStride(chunk_len, data.len()));
    }

    match strategy {
        ExecutionStrategy::Serial => {
            data.chunks_mut(chunk_len)
                .enumerate()
                .for_each(|(i, chunk)| f(i, chunk));
        }
        ExecutionStrategy::ParallelRows => {
            data.par_chunks_mut(chunk_len)
                .enumerate()
                .for_each(|(i, chunk)| f(i, chunk));
        }
        ExecutionStrategy::Fixed(n) => {
            if n == 0 {
                return Err(ParallelError::InvalidThreadCount(n));
            }
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(n)
                .build()
                .map_err(|e| ParallelError::BuildError(e.to_string()))?;

            pool.install(|| {
                data.par_chunks_mut(chunk_len)
                    .enumerate()
                    .for_each(|(i, chunk)| f(i, chunk));
            });
        }
    }
    Ok(())
}

/// Apply a function to every row of a row-major buffer, passing the row index.
///
/// # Arguments
///
/// * `data` - The buffer to write.
/// * `row_len` - The number of elements per row.
/// * `strategy` - How the rows are distributed.
/// * `f` - Called once per row with `(row_index, row)`.
///
/// # Errors
///
/// Returns an error if `row_len` does not split `data` or the thread pool cannot be built.
pub fn par_iter_rows_indexed<T, F>(
    data: &mut [T],
    row_len: usize,
    strategy: ExecutionStrategy,
    f: F,
) -> Result<(), ParallelError>
where
    T: Send,
    F: Fn(usize, &mut [T]) + Send + Sync,
{
    if row_len == 0 || data.len() % row_len != 0 {
        return Err(ParallelError::InvalidRowStride(row_len, data.len()));
    }
    par_iter_chunks_indexed(data, row_len, strategy, f)
}

/// Number of rows per band when splitting `rows` over the threads of `strategy`.
pub fn band_rows(rows: usize, strategy: ExecutionStrategy) -> usize {
    let threads = match strategy {
        ExecutionStrategy::Serial => 1,
        ExecutionStrategy::ParallelRows => rayon::current_num_threads(),
        ExecutionStrategy::Fixed(n) => n,
    };
    rows.div_ceil(threads.max(1)).max(1)
}

/// Apply a function to each pixel for grid sampling in parallel.
///
/// The destination must have the size of the map; this is checked by the callers.
pub fn par_iter_rows_resample<T, const C: usize>(
    dst: &mut Image<T, C>,
    map: &CoordinateMap,
    f: impl Fn(f32, f32, &mut [T]) + Send + Sync,
) where
    T: Send,
{
    let cols = dst.cols();
    if cols == 0 {
        return;
    }
    let dst_slice = dst.as_slice_mut();
    let map_x_slice = map.map_x.as_slice();
    let map_y_slice = map.map_y.as_slice();

    dst_slice
        .par_chunks_exact_mut(C * cols)
        .zip(map_x_slice.par_chunks_exact(cols))
        .zip(map_y_slice.par_chunks_exact(cols))
        .for_each(|((dst_chunk, map_x_chunk), map_y_chunk)| {
            dst_chunk
                .chunks_exact_mut(C)
                .zip(map_x_chunk.iter().zip(map_y_chunk.iter()))
                .for_each(|(dst_pixel, (&x, &y))| {
                    f(x, y, dst_pixel);
                });
        });
}
