use serde::{Deserialize, Serialize};

use super::{kernels::sobel_kernel_1d, FilterError};
use crate::parallel::{par_iter_rows_indexed, ExecutionStrategy};
use stereopsis_image::{Image, ImageSize};

/// Largest supported clipping cap of the pre-filter response.
pub const MAX_PRE_FILTER_CAP: i32 = 63;

/// The contrast filter applied to both images before block matching.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum PreFilterType {
    /// Horizontal 3x3 sobel response.
    #[default]
    XSobel,
    /// Intensity minus the mean of a square neighbourhood.
    NormalizedResponse,
}

/// Check that a pre-filter cap is in `1..=63`.
pub fn check_pre_filter_cap(cap: i32) -> Result<(), FilterError> {
    if !(1..=MAX_PRE_FILTER_CAP).contains(&cap) {
        return Err(FilterError::InvalidCap(cap));
    }
    Ok(())
}

/// Check that a normalized-response window size is odd and in `5..=255`.
pub fn check_pre_filter_size(size: usize) -> Result<(), FilterError> {
    if size % 2 == 0 || !(5..=255).contains(&size) {
        return Err(FilterError::InvalidKernelSize(size));
    }
    Ok(())
}

/// Apply the stereo pre-filter selected by `filter`.
///
/// The response is clipped to `[-cap, cap]` and offset by `cap`, so every output value lies
/// in `[0, 2 * cap]` and a flat region maps to `cap`.
///
/// # Arguments
///
/// * `src` - The single channel input image.
/// * `filter` - The pre-filter to apply.
/// * `cap` - The clipping cap, in `1..=63`.
/// * `size` - The window size of [`PreFilterType::NormalizedResponse`]; ignored otherwise.
/// * `strategy` - How the rows are distributed.
pub fn stereo_prefilter<T>(
    src: &Image<T, 1>,
    filter: PreFilterType,
    cap: i32,
    size: usize,
    strategy: ExecutionStrategy,
) -> Result<Image<i32, 1>, FilterError>
where
    T: Copy + Into<i32> + Sync,
{
    match filter {
        PreFilterType::XSobel => prefilter_xsobel(src, cap, strategy),
        PreFilterType::NormalizedResponse => {
            prefilter_normalized_response(src, cap, size, strategy)
        }
    }
}

/// Horizontal sobel pre-filter.
///
/// The response is zero on the one pixel border of the image, so border pixels hold `cap`.
pub fn prefilter_xsobel<T>(
    src: &Image<T, 1>,
    cap: i32,
    strategy: ExecutionStrategy,
) -> Result<Image<i32, 1>, FilterError>
where
    T: Copy + Into<i32> + Sync,
{
    check_pre_filter_cap(cap)?;

    let (cols, rows) = (src.width(), src.height());
    let mut dst = Image::<i32, 1>::from_size_val(src.size(), cap)?;
    if cols < 3 || rows < 3 {
        return Ok(dst);
    }

    let (deriv, smooth) = sobel_kernel_1d();

    par_iter_rows_indexed(dst.as_slice_mut(), cols, strategy, |r, dst_row| {
        if r == 0 || r == rows - 1 {
            return;
        }
        for (c, out) in dst_row.iter_mut().enumerate().take(cols - 1).skip(1) {
            let mut response = 0i32;
            for (ky, &wy) in smooth.iter().enumerate() {
                let src_row = src.row(r + ky - 1);
                for (kx, &wx) in deriv.iter().enumerate() {
                    let v: i32 = src_row[c + kx - 1].into();
                    response += wy * wx * v;
                }
            }
            *out = response.clamp(-cap, cap) + cap;
        }
    })?;

    Ok(dst)
}

/// Normalized response pre-filter: each pixel minus the mean of its `size x size`
/// neighbourhood.
///
/// The neighbourhood is cropped at the image border and the mean uses integer division.
pub fn prefilter_normalized_response<T>(
    src: &Image<T, 1>,
    cap: i32,
    size: usize,
    strategy: ExecutionStrategy,
) -> Result<Image<i32, 1>, FilterError>
where
    T: Copy + Into<i32> + Sync,
{
    check_pre_filter_cap(cap)?;
    check_pre_filter_size(size)?;

    let (cols, rows) = (src.width(), src.height());
    let mut dst = Image::<i32, 1>::from_size_val(src.size(), cap)?;
    if cols == 0 || rows == 0 {
        return Ok(dst);
    }

    let integral = integral_image(src);
    let half = size / 2;
    let stride = cols + 1;

    par_iter_rows_indexed(dst.as_slice_mut(), cols, strategy, |r, dst_row| {
        let r0 = r.saturating_sub(half);
        let r1 = (r + half).min(rows - 1) + 1;
        let src_row = src.row(r);
        for (c, out) in dst_row.iter_mut().enumerate() {
            let c0 = c.saturating_sub(half);
            let c1 = (c + half).min(cols - 1) + 1;
            let sum = integral[r1 * stride + c1] - integral[r0 * stride + c1]
                - integral[r1 * stride + c0]
                + integral[r0 * stride + c0];
            let count = ((r1 - r0) * (c1 - c0)) as i64;
            let mean = (sum / count) as i32;
            let value: i32 = src_row[c].into();
            *out = (value - mean).clamp(-cap, cap) + cap;
        }
    })?;

    Ok(dst)
}

/// Summed area table with a leading row and column of zeros.
fn integral_image<T: Copy + Into<i32>>(src: &Image<T, 1>) -> Vec<i64> {
    let ImageSize { width, height } = src.size();
    let stride = width + 1;
    let mut integral = vec![0i64; (height + 1) * stride];
    for r in 0..height {
        let mut row_sum = 0i64;
        for (c, &v) in src.row(r).iter().enumerate() {
            let v: i32 = v.into();
            row_sum += v as i64;
            integral[(r + 1) * stride + c + 1] = integral[r * stride + c + 1] + row_sum;
        }
    }
    integral
}

#[cfg(test)]
mod tests {
    use super::*;

    fn step_image() -> Result<Image<u8, 1>, FilterError> {
        Ok(Image::from_size_fn(
            ImageSize {
                width: 10,
                height: 6,
            },
            |_, c, _| if c < 5 { 0 } else { 10 },
        )?)
    }

    #[test]
    fn test_xsobel_flat_is_cap() -> Result<(), FilterError> {
        let image = Image::<u16, 1>::from_size_val([8, 8].into(), 700)?;
        let out = prefilter_xsobel(&image, 31, ExecutionStrategy::Serial)?;
        assert!(out.as_slice().iter().all(|&v| v == 31));
        Ok(())
    }

    #[test]
    fn test_xsobel_step_edge() -> Result<(), FilterError> {
        let image = step_image()?;
        let out = prefilter_xsobel(&image, 31, ExecutionStrategy::ParallelRows)?;

        let row = out.row(2);
        assert_eq!(row[3], 31);
        // 4 * 10 clipped to the cap
        assert_eq!(row[4], 62);
        assert_eq!(row[5], 62);
        assert_eq!(row[6], 31);

        // zero response on the image border
        assert!(out.row(0).iter().all(|&v| v == 31));
        assert!(out.row(5).iter().all(|&v| v == 31));

        let small = prefilter_xsobel(&image, 63, ExecutionStrategy::Serial)?;
        assert_eq!(small.row(2)[4], 103);
        Ok(())
    }

    #[test]
    fn test_xsobel_tiny_image() -> Result<(), FilterError> {
        let image = Image::<u8, 1>::from_size_val([2, 5].into(), 9)?;
        let out = prefilter_xsobel(&image, 5, ExecutionStrategy::Serial)?;
        assert!(out.as_slice().iter().all(|&v| v == 5));
        Ok(())
    }

    #[test]
    fn test_normalized_response_values() -> Result<(), FilterError> {
        let mut image = Image::<u8, 1>::from_size_val([7, 7].into(), 50)?;
        image.as_slice_mut()[3 * 7 + 3] = 100;

        let out = prefilter_normalized_response(&image, 20, 5, ExecutionStrategy::Serial)?;
        // mean of the 5x5 window is 52
        assert_eq!(out.row(3)[3], 20 + 20);
        // a neighbour sees the bright pixel in its window: 50 - 52
        assert_eq!(out.row(3)[4], 18);
        // the corner window is cropped to 3x3 and does not reach the bright pixel
        assert_eq!(out.row(0)[0], 20);
        Ok(())
    }

    #[test]
    fn test_invalid_parameters() -> Result<(), FilterError> {
        let image = step_image()?;
        assert_eq!(
            stereo_prefilter(&image, PreFilterType::XSobel, 0, 9, ExecutionStrategy::Serial),
            Err(FilterError::InvalidCap(0))
        );
        assert_eq!(
            stereo_prefilter(&image, PreFilterType::XSobel, 64, 9, ExecutionStrategy::Serial),
            Err(FilterError::InvalidCap(64))
        );
        assert_eq!(
            stereo_prefilter(
                &image,
                PreFilterType::NormalizedResponse,
                31,
                4,
                ExecutionStrategy::Serial
            ),
            Err(FilterError::InvalidKernelSize(4))
        );
        Ok(())
    }
}
