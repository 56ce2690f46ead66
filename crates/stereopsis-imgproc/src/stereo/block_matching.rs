use std::time::Instant;

use super::cost::{normalized_cost, select_disparity, MatchParams};
use super::{BlockMatchState, DisparityMap, StereoError};
use crate::filter::stereo_prefilter;
use crate::parallel::{band_rows, par_iter_chunks_indexed, par_iter_rows_indexed, ExecutionStrategy};
use stereopsis_image::Image;

/// Matching inputs after the optional pre-filter.
struct MatchPlanes {
    left: Vec<i32>,
    right: Vec<i32>,
    /// Per-pixel texture contribution of the left image.
    texture: Vec<u64>,
    cols: usize,
    rows: usize,
}

impl MatchPlanes {
    fn new<T>(
        left: &Image<T, 1>,
        right: &Image<T, 1>,
        state: &BlockMatchState,
        strategy: ExecutionStrategy,
    ) -> Result<Self, StereoError>
    where
        T: Copy + Into<i32> + Sync,
    {
        if left.size() != right.size() {
            return Err(StereoError::SizeMismatch(left.size(), right.size()));
        }
        state.validate(left.size())?;

        let (cols, rows) = (left.width(), left.height());

        let (left_plane, right_plane, texture) = match state.pre_filter {
            Some(filter) => {
                let cap = state.pre_filter_cap;
                let size = state.pre_filter_size;
                let l = stereo_prefilter(left, filter, cap, size, strategy)?.0.into_vec();
                let r = stereo_prefilter(right, filter, cap, size, strategy)?.0.into_vec();
                let texture = l.iter().map(|&p| (p - cap).unsigned_abs() as u64).collect();
                (l, r, texture)
            }
            None => {
                let l: Vec<i32> = left.as_slice().iter().map(|&v| v.into()).collect();
                let r: Vec<i32> = right.as_slice().iter().map(|&v| v.into()).collect();
                let texture = l
                    .chunks_exact(cols)
                    .flat_map(|row| {
                        std::iter::once(0).chain(
                            row.windows(2)
                                .map(|pair| (pair[1] - pair[0]).unsigned_abs() as u64),
                        )
                    })
                    .collect();
                (l, r, texture)
            }
        };

        Ok(Self {
            left: left_plane,
            right: right_plane,
            texture,
            cols,
            rows,
        })
    }
}

/// Compute the disparity map of a rectified stereo pair with SAD block matching.
///
/// For every pixel of the left image the window SAD against the right image is evaluated for
/// each disparity `d` in `[min_disparity, min_disparity + num_disparities)`, comparing
/// `left(r, c)` with `right(r, c - d)`. Window pixels falling outside either image are left
/// out and the sum is rescaled to the full window area, as is the window texture. The lowest
/// cost wins, ties going to
/// the lower disparity. Pixels with too little texture or an ambiguous minimum receive
/// [`BlockMatchState::invalid_disparity`].
///
/// Window sums are maintained incrementally, so the cost per pixel and disparity does not
/// depend on the window size. The output is identical to [`stereo_block_matching_naive`].
///
/// # Arguments
///
/// * `left` - The rectified left image.
/// * `right` - The rectified right image.
/// * `state` - The matching parameters.
///
/// # Returns
///
/// The disparities scaled by [`super::DISPARITY_SCALE`].
///
/// # Errors
///
/// Returns an error if the parameters are invalid or the images differ in size.
pub fn stereo_block_matching<T>(
    left: &Image<T, 1>,
    right: &Image<T, 1>,
    state: &BlockMatchState,
) -> Result<DisparityMap, StereoError>
where
    T: Copy + Into<i32> + Sync,
{
    stereo_block_matching_with_strategy(left, right, state, ExecutionStrategy::default())
}

/// Same as [`stereo_block_matching`] with an explicit execution strategy.
///
/// The image is split in horizontal bands, one per thread; each band carries its own running
/// column sums.
pub fn stereo_block_matching_with_strategy<T>(
    left: &Image<T, 1>,
    right: &Image<T, 1>,
    state: &BlockMatchState,
    strategy: ExecutionStrategy,
) -> Result<DisparityMap, StereoError>
where
    T: Copy + Into<i32> + Sync,
{
    let start = Instant::now();
    let planes = MatchPlanes::new(left, right, state, strategy)?;
    let params = MatchParams::new(state);

    let mut disparity = vec![params.invalid(); planes.cols * planes.rows];
    let band = band_rows(planes.rows, strategy);

    par_iter_chunks_indexed(&mut disparity, band * planes.cols, strategy, |b, chunk| {
        match_band(&planes, &params, b * band, chunk);
    })?;

    log::debug!(
        "block matching {}x{} over {} disparities took {:?}",
        planes.cols,
        planes.rows,
        state.num_disparities,
        start.elapsed()
    );

    Ok(Image::new(left.size(), disparity)?)
}

/// Running-sum matcher over the rows `first_row..` covered by `out`.
fn match_band(planes: &MatchPlanes, params: &MatchParams, first_row: usize, out: &mut [i16]) {
    let (cols, rows) = (planes.cols, planes.rows);
    let ndisp = params.num_disparities;
    let half = params.half_window;

    // per column: SAD of every disparity over the window rows
    let mut col_sad = vec![0u64; cols * ndisp];
    let mut col_tex = vec![0u64; cols];
    let mut win_sad = vec![0u64; ndisp];
    let mut costs = vec![0u64; ndisp];

    let top = first_row.saturating_sub(half);
    let bottom = (first_row + half).min(rows - 1);
    for r in top..=bottom {
        accumulate_row(planes, params, r, &mut col_sad, &mut col_tex, true);
    }

    for (k, out_row) in out.chunks_exact_mut(cols).enumerate() {
        let r = first_row + k;
        if k > 0 {
            if r + half < rows {
                accumulate_row(planes, params, r + half, &mut col_sad, &mut col_tex, true);
            }
            if r > half {
                accumulate_row(planes, params, r - half - 1, &mut col_sad, &mut col_tex, false);
            }
        }
        let window_rows = ((r + half).min(rows - 1) - r.saturating_sub(half) + 1) as u64;

        win_sad.fill(0);
        let mut win_tex = 0u64;
        for c in 0..=half.min(cols - 1) {
            add_column(&col_sad, &col_tex, c, ndisp, &mut win_sad, &mut win_tex, true);
        }

        for (c, out_px) in out_row.iter_mut().enumerate() {
            if c > 0 {
                if c + half < cols {
                    add_column(&col_sad, &col_tex, c + half, ndisp, &mut win_sad, &mut win_tex, true);
                }
                if c > half {
                    add_column(&col_sad, &col_tex, c - half - 1, ndisp, &mut win_sad, &mut win_tex, false);
                }
            }

            let c0 = c.saturating_sub(half) as i64;
            let c1 = (c + half).min(cols - 1) as i64;
            for (i, cost) in costs.iter_mut().enumerate() {
                let d = params.min_disparity + i as i64;
                // window columns whose right sample c - d is inside the image
                let lo = c0.max(d);
                let hi = c1.min(cols as i64 - 1 + d);
                let window_cols = (hi - lo + 1).max(0) as u64;
                *cost = normalized_cost(win_sad[i], window_rows * window_cols, params.area);
            }

            let texture = normalized_cost(win_tex, window_rows * (c1 - c0 + 1) as u64, params.area);
            *out_px = select_disparity(&costs, texture, params);
        }
    }
}

/// Add or remove the contribution of image row `r` to the column sums.
fn accumulate_row(
    planes: &MatchPlanes,
    params: &MatchParams,
    r: usize,
    col_sad: &mut [u64],
    col_tex: &mut [u64],
    add: bool,
) {
    let cols = planes.cols;
    let ndisp = params.num_disparities;
    let left = &planes.left[r * cols..(r + 1) * cols];
    let right = &planes.right[r * cols..(r + 1) * cols];
    let texture = &planes.texture[r * cols..(r + 1) * cols];

    for (c, &lv) in left.iter().enumerate() {
        let sums = &mut col_sad[c * ndisp..(c + 1) * ndisp];
        for (i, sum) in sums.iter_mut().enumerate() {
            let rc = c as i64 - (params.min_disparity + i as i64);
            if rc < 0 || rc >= cols as i64 {
                continue;
            }
            let diff = (lv - right[rc as usize]).unsigned_abs() as u64;
            if add {
                *sum += diff;
            } else {
                *sum -= diff;
            }
        }
        if add {
            col_tex[c] += texture[c];
        } else {
            col_tex[c] -= texture[c];
        }
    }
}

/// Add or remove column `c` of the column sums to the window sums.
fn add_column(
    col_sad: &[u64],
    col_tex: &[u64],
    c: usize,
    ndisp: usize,
    win_sad: &mut [u64],
    win_tex: &mut u64,
    add: bool,
) {
    let sums = &col_sad[c * ndisp..(c + 1) * ndisp];
    for (w, &s) in win_sad.iter_mut().zip(sums) {
        if add {
            *w += s;
        } else {
            *w -= s;
        }
    }
    if add {
        *win_tex += col_tex[c];
    } else {
        *win_tex -= col_tex[c];
    }
}

/// Reference block matcher evaluating every window directly.
///
/// Produces exactly the output of [`stereo_block_matching`] at a cost proportional to the
/// window area. Intended for testing and validation.
pub fn stereo_block_matching_naive<T>(
    left: &Image<T, 1>,
    right: &Image<T, 1>,
    state: &BlockMatchState,
) -> Result<DisparityMap, StereoError>
where
    T: Copy + Into<i32> + Sync,
{
    let planes = MatchPlanes::new(left, right, state, ExecutionStrategy::Serial)?;
    let params = MatchParams::new(state);
    let (cols, rows) = (planes.cols, planes.rows);
    let half = params.half_window;

    let mut disparity = vec![params.invalid(); cols * rows];

    par_iter_rows_indexed(&mut disparity, cols, ExecutionStrategy::Serial, |r, out_row| {
        let r0 = r.saturating_sub(half);
        let r1 = (r + half).min(rows - 1);
        let mut costs = vec![0u64; params.num_disparities];

        for (c, out_px) in out_row.iter_mut().enumerate() {
            let c0 = c.saturating_sub(half);
            let c1 = (c + half).min(cols - 1);

            for (i, cost) in costs.iter_mut().enumerate() {
                let d = params.min_disparity + i as i64;
                let (mut sad, mut count) = (0u64, 0u64);
                for wr in r0..=r1 {
                    for wc in c0..=c1 {
                        let rc = wc as i64 - d;
                        if rc < 0 || rc >= cols as i64 {
                            continue;
                        }
                        let lv = planes.left[wr * cols + wc];
                        let rv = planes.right[wr * cols + rc as usize];
                        sad += (lv - rv).unsigned_abs() as u64;
                        count += 1;
                    }
                }
                *cost = normalized_cost(sad, count, params.area);
            }

            let mut texture = 0u64;
            for wr in r0..=r1 {
                texture += planes.texture[wr * cols + c0..=wr * cols + c1]
                    .iter()
                    .sum::<u64>();
            }

            let count = ((r1 - r0 + 1) * (c1 - c0 + 1)) as u64;
            let texture = normalized_cost(texture, count, params.area);
            *out_px = select_disparity(&costs, texture, &params);
        }
    })?;

    Ok(Image::new(left.size(), disparity)?)
}
