use argh::FromArgs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use stereopsis::image::{Image, ImageSize};
use stereopsis::imgproc::stereo::{BlockMatchState, DisparityMap, DISPARITY_SCALE};
use stereopsis::pipeline::StereoPipeline;

#[derive(FromArgs)]
/// Rectify a stereo pair and write its disparity map as a PNG
struct Args {
    /// path to the stereo configuration (JSON)
    #[argh(option, short = 'c')]
    config: PathBuf,

    /// path to the left image
    #[argh(option, short = 'l')]
    left: PathBuf,

    /// path to the right image
    #[argh(option, short = 'r')]
    right: PathBuf,

    /// path of the output disparity image
    #[argh(option, short = 'o', default = "PathBuf::from(\"disparity.png\")")]
    output: PathBuf,

    /// also write the rectified images next to the output
    #[argh(switch)]
    save_rectified: bool,
}

fn read_image_mono8(path: &Path) -> Result<Image<u8, 1>, Box<dyn std::error::Error>> {
    let img = image::open(path)?.to_luma8();
    let size = ImageSize {
        width: img.width() as usize,
        height: img.height() as usize,
    };
    Ok(Image::new(size, img.into_raw())?)
}

fn write_image_mono8(path: &Path, image: &Image<u8, 1>) -> Result<(), Box<dyn std::error::Error>> {
    let buffer = image::GrayImage::from_raw(
        image.width() as u32,
        image.height() as u32,
        image.as_slice().to_vec(),
    )
    .ok_or("image buffer does not match its size")?;
    buffer.save(path)?;
    Ok(())
}

/// Stretch the searched disparity range over 1..=255; invalid pixels become 0.
fn disparity_to_mono8(
    disparity: &DisparityMap,
    state: &BlockMatchState,
) -> Result<Image<u8, 1>, Box<dyn std::error::Error>> {
    let invalid = state.invalid_disparity();
    let lowest = state.min_disparity * DISPARITY_SCALE;
    let span = (state.num_disparities as i32 * DISPARITY_SCALE).max(1);

    let data = disparity
        .as_slice()
        .iter()
        .map(|&d| {
            if d == invalid {
                0
            } else {
                (1 + (d as i32 - lowest).clamp(0, span) * 254 / span) as u8
            }
        })
        .collect();

    Ok(Image::new(disparity.size(), data)?)
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let args: Args = argh::from_env();

    let pipeline = StereoPipeline::from_json_file(&args.config)?;

    let left = read_image_mono8(&args.left)?;
    let right = read_image_mono8(&args.right)?;

    let start = Instant::now();
    let frame = pipeline.process(&left, &right)?;
    log::info!("processed {} in {:?}", left.size(), start.elapsed());

    let invalid = frame
        .disparity
        .as_slice()
        .iter()
        .filter(|&&d| d == pipeline.state().invalid_disparity())
        .count();
    log::info!(
        "{} of {} pixels have no disparity",
        invalid,
        frame.disparity.size().area()
    );

    let disparity = disparity_to_mono8(&frame.disparity, pipeline.state())?;
    write_image_mono8(&args.output, &disparity)?;

    if args.save_rectified {
        write_image_mono8(&args.output.with_file_name("left_rectified.png"), &frame.left_rectified)?;
        write_image_mono8(
            &args.output.with_file_name("right_rectified.png"),
            &frame.right_rectified,
        )?;
    }

    Ok(())
}
