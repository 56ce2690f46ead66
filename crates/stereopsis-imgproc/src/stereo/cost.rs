use super::{BlockMatchState, DISPARITY_SCALE};

/// Cost of a candidate whose window has no pixel inside both images.
pub(crate) const SKIPPED: u64 = u64::MAX;

/// Per-pixel decision parameters derived from a validated [`BlockMatchState`].
#[derive(Clone, Copy, Debug)]
pub(crate) struct MatchParams {
    pub min_disparity: i64,
    pub num_disparities: usize,
    pub half_window: usize,
    pub area: u64,
    texture_threshold: u64,
    uniqueness_ratio: u64,
    subpixel: bool,
    invalid: i16,
}

impl MatchParams {
    pub fn new(state: &BlockMatchState) -> Self {
        Self {
            min_disparity: state.min_disparity as i64,
            num_disparities: state.num_disparities,
            half_window: state.window_size / 2,
            area: (state.window_size * state.window_size) as u64,
            texture_threshold: state.texture_threshold as u64,
            uniqueness_ratio: state.uniqueness_ratio as u64,
            subpixel: state.subpixel,
            invalid: state.invalid_disparity(),
        }
    }

    pub fn invalid(&self) -> i16 {
        self.invalid
    }
}

/// Scale a window sum to the full window area.
///
/// `count` is the number of window pixels that contributed to `sum`.
#[inline]
pub(crate) fn normalized_cost(sum: u64, count: u64, area: u64) -> u64 {
    if count == 0 {
        SKIPPED
    } else {
        sum * area / count
    }
}

/// Pick the disparity of one pixel from its candidate costs.
///
/// `costs[i]` belongs to disparity `min_disparity + i`. Ties go to the lower disparity.
pub(crate) fn select_disparity(costs: &[u64], texture: u64, params: &MatchParams) -> i16 {
    if texture < params.texture_threshold {
        return params.invalid;
    }

    let mut best: Option<(usize, u64)> = None;
    for (i, &c) in costs.iter().enumerate() {
        if c == SKIPPED {
            continue;
        }
        match best {
            Some((_, b)) if c >= b => {}
            _ => best = Some((i, c)),
        }
    }
    let Some((best_i, best_cost)) = best else {
        return params.invalid;
    };

    // runner-up among candidates that are not neighbours of the winner
    let second = costs
        .iter()
        .enumerate()
        .filter(|&(i, &c)| c != SKIPPED && i.abs_diff(best_i) > 1)
        .map(|(_, &c)| c)
        .min();
    if let Some(second) = second {
        let lhs = second as u128 * 100;
        let rhs = best_cost as u128 * (100 + params.uniqueness_ratio as u128);
        if lhs <= rhs {
            return params.invalid;
        }
    }

    let d = params.min_disparity + best_i as i64;
    let scale = DISPARITY_SCALE as i64;
    let out = if params.subpixel {
        let prev = best_i
            .checked_sub(1)
            .map(|i| costs[i])
            .filter(|&c| c != SKIPPED);
        let next = costs.get(best_i + 1).copied().filter(|&c| c != SKIPPED);
        let (p, n) = match (prev, next) {
            (Some(p), Some(n)) => (p, n),
            (Some(p), None) => (p, p),
            (None, Some(n)) => (n, n),
            (None, None) => (best_cost, best_cost),
        };
        let (p, n, c) = (p as i64, n as i64, best_cost as i64);
        let k = p + n - 2 * c + (p - n).abs();
        let delta = if k == 0 { 0 } else { (p - n) * 256 / k };
        (d * 256 + delta + 15) >> 4
    } else {
        d * scale
    };

    i16::try_from(out).unwrap_or(params.invalid)
}
