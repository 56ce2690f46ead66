use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use stereopsis_image::{Image, ImageDtype, ImageSize};
use stereopsis_imgproc::interpolation::{grid::CoordinateMap, warp, InterpolationMode};
use stereopsis_imgproc::parallel::ExecutionStrategy;
use stereopsis_imgproc::stereo::{
    stereo_block_matching_with_strategy, BlockMatchState, DisparityMap, StereoError,
};

use crate::config::{CameraCalibration, StereoCalibration, StereoConfig};
use crate::error::PipelineError;

/// Resamples raw stereo frames into the rectified geometry.
///
/// The maps are built once and shared; cloning a rectifier does not copy them.
#[derive(Clone, Debug)]
pub struct StereoRectifier {
    left_map: Arc<CoordinateMap>,
    right_map: Arc<CoordinateMap>,
    interpolation: InterpolationMode,
}

impl StereoRectifier {
    /// Build the correction maps of both cameras.
    ///
    /// # Errors
    ///
    /// Returns an error if either calibration is malformed or the image size is empty.
    pub fn new(calibration: &StereoCalibration) -> Result<Self, PipelineError> {
        let start = Instant::now();
        let size = calibration.size();

        let (left, right) = rayon::join(
            || calibration.left.correction_map(size),
            || calibration.right.correction_map(size),
        );
        let rectifier = Self::from_maps(Arc::new(left?), Arc::new(right?))?;

        log::debug!(
            "built stereo maps for {}x{} in {:?}",
            size.width,
            size.height,
            start.elapsed()
        );

        Ok(rectifier)
    }

    /// Create a rectifier from maps built elsewhere.
    ///
    /// # Errors
    ///
    /// Returns an error if the two maps cover different sizes.
    pub fn from_maps(
        left_map: Arc<CoordinateMap>,
        right_map: Arc<CoordinateMap>,
    ) -> Result<Self, PipelineError> {
        if left_map.size() != right_map.size() {
            return Err(PipelineError::FrameSizeMismatch {
                expected: left_map.size(),
                actual: right_map.size(),
            });
        }
        Ok(Self {
            left_map,
            right_map,
            interpolation: InterpolationMode::Bilinear,
        })
    }

    /// Set the interpolation used to resample the frames.
    pub fn with_interpolation(mut self, interpolation: InterpolationMode) -> Self {
        self.interpolation = interpolation;
        self
    }

    /// The rectified image size.
    pub fn size(&self) -> ImageSize {
        self.left_map.size()
    }

    /// The map of the left camera.
    pub fn left_map(&self) -> &Arc<CoordinateMap> {
        &self.left_map
    }

    /// The map of the right camera.
    pub fn right_map(&self) -> &Arc<CoordinateMap> {
        &self.right_map
    }

    /// Rectify one stereo frame; both images are resampled concurrently.
    ///
    /// # Errors
    ///
    /// Returns an error if either image does not have the calibrated size.
    pub fn rectify<T: ImageDtype, const C: usize>(
        &self,
        left: &Image<T, C>,
        right: &Image<T, C>,
    ) -> Result<(Image<T, C>, Image<T, C>), PipelineError> {
        for image in [left, right] {
            if image.size() != self.size() {
                return Err(PipelineError::FrameSizeMismatch {
                    expected: self.size(),
                    actual: image.size(),
                });
            }
        }

        let (left, right) = rayon::join(
            || warp(left, &self.left_map, self.interpolation),
            || warp(right, &self.right_map, self.interpolation),
        );
        Ok((left?, right?))
    }
}

/// The products of one processed stereo frame.
#[derive(Clone, Debug)]
pub struct StereoFrame<T> {
    /// The rectified left image.
    pub left_rectified: Image<T, 1>,
    /// The rectified right image.
    pub right_rectified: Image<T, 1>,
    /// The disparity of every left pixel, see [`stereopsis_imgproc::stereo::DISPARITY_SCALE`].
    pub disparity: DisparityMap,
}

/// Rectify-then-match processing of a stream of frames from one calibrated rig.
///
/// The maps are built and the matching parameters validated when the pipeline is created, so
/// [`StereoPipeline::process`] only fails on frames of the wrong size. A frame that is no
/// longer wanted is abandoned by dropping its result.
///
/// # Example
///
/// ```
/// use stereopsis_image::{Image, ImageSize};
/// use stereopsis_pipeline::{StereoConfig, StereoPipeline};
///
/// let config = StereoConfig::from_json_str(
///     r#"{
///         "calibration": {
///             "image_size": [32, 24],
///             "left": { "camera_matrix": [40, 0, 16, 0, 40, 12, 0, 0, 1] },
///             "right": { "camera_matrix": [40, 0, 16, 0, 40, 12, 0, 0, 1] }
///         },
///         "block_matching": { "window_size": 5, "num_disparities": 8 }
///     }"#,
/// )
/// .unwrap();
///
/// let pipeline = StereoPipeline::new(&config).unwrap();
/// let size = ImageSize { width: 32, height: 24 };
/// let left = Image::<u8, 1>::from_size_val(size, 0).unwrap();
/// let right = left.clone();
///
/// let frame = pipeline.process(&left, &right).unwrap();
/// assert_eq!(frame.disparity.size(), size);
/// assert_eq!(pipeline.frames_processed(), 1);
/// ```
#[derive(Debug)]
pub struct StereoPipeline {
    rectifier: StereoRectifier,
    state: BlockMatchState,
    strategy: ExecutionStrategy,
    frames_processed: AtomicU64,
}

impl StereoPipeline {
    /// Set up the pipeline for `config`.
    ///
    /// # Errors
    ///
    /// Returns an error if the matching parameters do not suit the calibrated size or the
    /// calibration is malformed. Nothing is matched before both checks pass.
    pub fn new(config: &StereoConfig) -> Result<Self, PipelineError> {
        config.block_matching.validate(config.calibration.size())?;
        let rectifier = StereoRectifier::new(&config.calibration)?;

        Ok(Self {
            rectifier,
            state: config.block_matching,
            strategy: ExecutionStrategy::default(),
            frames_processed: AtomicU64::new(0),
        })
    }

    /// Set up the pipeline from a JSON configuration file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, PipelineError> {
        Self::new(&StereoConfig::from_json_file(path)?)
    }

    /// Set how the matching stage distributes its rows.
    pub fn with_strategy(mut self, strategy: ExecutionStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// The rectifier holding the cached maps.
    pub fn rectifier(&self) -> &StereoRectifier {
        &self.rectifier
    }

    /// The matching parameters.
    pub fn state(&self) -> &BlockMatchState {
        &self.state
    }

    /// Number of frames processed so far.
    pub fn frames_processed(&self) -> u64 {
        self.frames_processed.load(Ordering::Relaxed)
    }

    /// Rectify a raw stereo frame and compute its disparity.
    ///
    /// # Errors
    ///
    /// Returns an error if either image does not have the calibrated size.
    pub fn process<T>(
        &self,
        left: &Image<T, 1>,
        right: &Image<T, 1>,
    ) -> Result<StereoFrame<T>, PipelineError>
    where
        T: ImageDtype + Into<i32>,
    {
        let start = Instant::now();

        let (left_rectified, right_rectified) = self.rectifier.rectify(left, right)?;
        let disparity = stereo_block_matching_with_strategy(
            &left_rectified,
            &right_rectified,
            &self.state,
            self.strategy,
        )?;

        let frame = self.frames_processed.fetch_add(1, Ordering::Relaxed);
        log::debug!("stereo frame {} took {:?}", frame, start.elapsed());

        Ok(StereoFrame {
            left_rectified,
            right_rectified,
            disparity,
        })
    }
}

/// Rectify and match a single stereo pair.
///
/// Builds both maps, resamples the images bilinearly and runs block matching. `rotation_left`
/// and `rotation_right` take the place of the `rectification` stored in the calibrations.
/// When several pairs share a calibration, use a [`StereoPipeline`] so the maps are built once.
///
/// # Errors
///
/// Returns an error if the images differ in size, or the calibration or the matching
/// parameters are invalid.
pub fn stereo_rectify_and_match<T>(
    left: &Image<T, 1>,
    right: &Image<T, 1>,
    calibration_left: &CameraCalibration,
    calibration_right: &CameraCalibration,
    rotation_left: &[f64; 9],
    rotation_right: &[f64; 9],
    state: &BlockMatchState,
) -> Result<DisparityMap, PipelineError>
where
    T: ImageDtype + Into<i32>,
{
    if left.size() != right.size() {
        return Err(StereoError::SizeMismatch(left.size(), right.size()).into());
    }
    let size = left.size();
    state.validate(size)?;

    let (left_map, right_map) = rayon::join(
        || calibration_left.correction_map_with(rotation_left, size),
        || calibration_right.correction_map_with(rotation_right, size),
    );
    let rectifier = StereoRectifier::from_maps(Arc::new(left_map?), Arc::new(right_map?))?;
    let (left, right) = rectifier.rectify(left, right)?;

    Ok(stereo_block_matching_with_strategy(
        &left,
        &right,
        state,
        ExecutionStrategy::default(),
    )?)
}
