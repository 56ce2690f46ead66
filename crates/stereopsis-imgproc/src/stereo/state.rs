use serde::{Deserialize, Serialize};

use super::{StereoError, DISPARITY_SCALE};
use crate::filter::{check_pre_filter_cap, check_pre_filter_size, PreFilterType};
use stereopsis_image::ImageSize;

/// Parameters of the SAD block matcher.
///
/// Missing fields take their default value when deserialized.
///
/// # Example
///
/// ```
/// use stereopsis_imgproc::stereo::BlockMatchState;
///
/// let state: BlockMatchState =
///     serde_json::from_str(r#"{ "window_size": 9, "num_disparities": 32 }"#).unwrap();
/// assert_eq!(state.window_size, 9);
/// assert_eq!(state.uniqueness_ratio, 15);
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BlockMatchState {
    /// Side of the square matching window, odd and in `5..=255`.
    pub window_size: usize,
    /// Number of candidate disparities.
    pub num_disparities: usize,
    /// Smallest candidate disparity.
    pub min_disparity: i32,
    /// Minimum window texture for a match to be accepted.
    ///
    /// Windows cropped at the image border have their texture rescaled to the full window
    /// area, so the gate applies the same per-pixel texture everywhere.
    pub texture_threshold: u32,
    /// Margin in percent by which the best cost must beat the runner-up.
    pub uniqueness_ratio: u32,
    /// Contrast filter applied to both images, `None` to match raw intensities.
    pub pre_filter: Option<PreFilterType>,
    /// Clipping cap of the pre-filter response, in `1..=63`.
    pub pre_filter_cap: i32,
    /// Window size of [`PreFilterType::NormalizedResponse`].
    pub pre_filter_size: usize,
    /// Refine disparities to 1/16 pixel.
    pub subpixel: bool,
}

impl Default for BlockMatchState {
    fn default() -> Self {
        Self {
            window_size: 21,
            num_disparities: 64,
            min_disparity: 0,
            texture_threshold: 10,
            uniqueness_ratio: 15,
            pre_filter: Some(PreFilterType::XSobel),
            pre_filter_cap: 31,
            pre_filter_size: 9,
            subpixel: true,
        }
    }
}

impl BlockMatchState {
    /// Check the parameters against the size of the images to match.
    ///
    /// # Errors
    ///
    /// Returns the first invalid parameter found.
    pub fn validate(&self, size: ImageSize) -> Result<(), StereoError> {
        let w = self.window_size;
        if w % 2 == 0 || !(5..=255).contains(&w) {
            return Err(StereoError::InvalidWindowSize(w));
        }
        if w > size.width.min(size.height) {
            return Err(StereoError::WindowTooLarge { window: w, size });
        }

        let scale = DISPARITY_SCALE as i64;
        let min_d = self.min_disparity as i64;
        let max_d = min_d + self.num_disparities as i64 - 1;
        let lowest = (min_d - 1) * scale;
        // sub-pixel refinement moves a disparity by at most half a pixel
        let highest = max_d * scale + scale / 2;
        if self.num_disparities == 0 || lowest < i16::MIN as i64 || highest > i16::MAX as i64 {
            return Err(StereoError::InvalidDisparityRange {
                min_disparity: self.min_disparity,
                num_disparities: self.num_disparities,
            });
        }

        if let Some(filter) = self.pre_filter {
            check_pre_filter_cap(self.pre_filter_cap)?;
            if filter == PreFilterType::NormalizedResponse {
                check_pre_filter_size(self.pre_filter_size)?;
            }
        }

        Ok(())
    }

    /// The value written for pixels without a valid match, `(min_disparity - 1) * 16`.
    pub fn invalid_disparity(&self) -> i16 {
        let v = (self.min_disparity as i64 - 1) * DISPARITY_SCALE as i64;
        v.clamp(i16::MIN as i64, i16::MAX as i64) as i16
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::FilterError;

    const SIZE: ImageSize = ImageSize {
        width: 64,
        height: 48,
    };

    #[test]
    fn test_default_is_valid() -> Result<(), StereoError> {
        let state = BlockMatchState::default();
        state.validate(SIZE)?;
        assert_eq!(state.invalid_disparity(), -16);
        Ok(())
    }

    #[test]
    fn test_window_checks() {
        for window_size in [4, 3, 257] {
            let state = BlockMatchState {
                window_size,
                ..Default::default()
            };
            assert_eq!(
                state.validate(SIZE),
                Err(StereoError::InvalidWindowSize(window_size))
            );
        }
        let state = BlockMatchState {
            window_size: 49,
            ..Default::default()
        };
        assert_eq!(
            state.validate(SIZE),
            Err(StereoError::WindowTooLarge {
                window: 49,
                size: SIZE
            })
        );
    }

    #[test]
    fn test_disparity_range_checks() {
        let empty = BlockMatchState {
            num_disparities: 0,
            ..Default::default()
        };
        assert!(matches!(
            empty.validate(SIZE),
            Err(StereoError::InvalidDisparityRange { .. })
        ));

        let too_wide = BlockMatchState {
            num_disparities: 4096,
            ..Default::default()
        };
        assert!(too_wide.validate(SIZE).is_err());

        let negative = BlockMatchState {
            min_disparity: -8,
            num_disparities: 16,
            ..Default::default()
        };
        assert_eq!(negative.validate(SIZE), Ok(()));
        assert_eq!(negative.invalid_disparity(), -144);
    }

    #[test]
    fn test_pre_filter_checks() {
        let state = BlockMatchState {
            pre_filter_cap: 70,
            ..Default::default()
        };
        assert_eq!(
            state.validate(SIZE),
            Err(StereoError::PreFilter(FilterError::InvalidCap(70)))
        );

        let raw = BlockMatchState {
            pre_filter: None,
            pre_filter_cap: 70,
            ..Default::default()
        };
        assert_eq!(raw.validate(SIZE), Ok(()));

        let normalized = BlockMatchState {
            pre_filter: Some(PreFilterType::NormalizedResponse),
            pre_filter_size: 8,
            ..Default::default()
        };
        assert_eq!(
            normalized.validate(SIZE),
            Err(StereoError::PreFilter(FilterError::InvalidKernelSize(8)))
        );
    }

    #[test]
    fn test_serde_round_trip() -> Result<(), serde_json::Error> {
        let state = BlockMatchState {
            window_size: 11,
            pre_filter: None,
            ..Default::default()
        };
        let json = serde_json::to_string(&state)?;
        let back: BlockMatchState = serde_json::from_str(&json)?;
        assert_eq!(back, state);
        Ok(())
    }
}
