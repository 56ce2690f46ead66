use std::io::Write;

use rand::{rngs::StdRng, Rng, SeedableRng};
use stereopsis_image::{Image, ImageSize};
use stereopsis_pipeline::{PipelineError, StereoPipeline};

const CONFIG: &str = r#"{
    "calibration": {
        "image_size": [96, 48],
        "left": {
            "camera_matrix": [100, 0, 48, 0, 100, 24, 0, 0, 1],
            "distortion": [0, 0, 0, 0, 0]
        },
        "right": {
            "camera_matrix": [100, 0, 48, 0, 100, 24, 0, 0, 1],
            "distortion": [0, 0, 0, 0, 0],
            "rectification": [1, 0, 0, 0, 1, 0, 0, 0, 1]
        }
    },
    "block_matching": {
        "window_size": 7,
        "num_disparities": 16,
        "subpixel": false
    }
}"#;

/// A random texture seen by two cameras `d0` pixels apart.
fn shifted_pair(
    size: ImageSize,
    d0: usize,
    seed: u64,
) -> Result<(Image<u8, 1>, Image<u8, 1>), PipelineError> {
    let mut rng = StdRng::seed_from_u64(seed);
    let stride = size.width + d0;
    let wide: Vec<u8> = (0..stride * size.height).map(|_| rng.random()).collect();
    let left = Image::from_size_fn(size, |r, c, _| wide[r * stride + c])?;
    let right = Image::from_size_fn(size, |r, c, _| wide[r * stride + c + d0])?;
    Ok((left, right))
}

fn pipeline_from_file() -> Result<StereoPipeline, Box<dyn std::error::Error>> {
    let mut file = tempfile::NamedTempFile::new()?;
    file.write_all(CONFIG.as_bytes())?;
    Ok(StereoPipeline::from_json_file(file.path())?)
}

#[test]
fn test_pipeline_recovers_disparity() -> Result<(), Box<dyn std::error::Error>> {
    let pipeline = pipeline_from_file()?;
    let size = pipeline.rectifier().size();
    assert_eq!(size, ImageSize::from([96, 48]));

    let d0 = 6;
    let (left, right) = shifted_pair(size, d0, 21)?;
    let frame = pipeline.process(&left, &right)?;

    // interior pixels clear of the first row and column, which the ideal maps may round
    // just outside the image
    let half = pipeline.state().window_size / 2;
    for r in half + 2..size.height - half {
        for c in (d0 + half + 16)..size.width - half - 1 {
            assert_eq!(frame.disparity.get_pixel(c, r, 0)?, (d0 * 16) as i16, "({r}, {c})");
        }
    }
    Ok(())
}

#[test]
fn test_frames_can_be_processed_from_several_threads() -> Result<(), Box<dyn std::error::Error>> {
    let pipeline = pipeline_from_file()?;
    let size = pipeline.rectifier().size();

    let pairs = (0..4)
        .map(|seed| shifted_pair(size, 3, seed))
        .collect::<Result<Vec<_>, _>>()?;
    let expected = pairs
        .iter()
        .map(|(l, r)| Ok(pipeline.process(l, r)?.disparity))
        .collect::<Result<Vec<_>, PipelineError>>()?;

    let shared = &pipeline;
    let results = std::thread::scope(|s| {
        let handles: Vec<_> = pairs
            .iter()
            .map(|(l, r)| s.spawn(move || shared.process(l, r)))
            .collect();
        handles
            .into_iter()
            .map(|h| h.join().map_err(|_| "worker panicked"))
            .collect::<Result<Vec<_>, _>>()
    })?;

    for (result, expected) in results.into_iter().zip(expected) {
        assert_eq!(result?.disparity, expected);
    }
    assert_eq!(pipeline.frames_processed(), 8);
    Ok(())
}
