use crate::parallel;

use super::grid::CoordinateMap;
use super::interpolate::interpolate_pixel;
use super::InterpolationMode;
use stereopsis_image::{Image, ImageDtype, ImageError};

fn check_map_size<T, const C: usize>(
    dst: &Image<T, C>,
    map: &CoordinateMap,
) -> Result<(), ImageError> {
    if map.map_x.shape != map.map_y.shape {
        return Err(ImageError::InvalidImageSize(
            map.map_x.shape[1],
            map.map_x.shape[0],
            map.map_y.shape[1],
            map.map_y.shape[0],
        ));
    }

    if dst.size() != map.size() {
        return Err(ImageError::InvalidImageSize(
            map.size().width,
            map.size().height,
            dst.width(),
            dst.height(),
        ));
    }

    Ok(())
}

/// Apply generic geometric transformation to an image.
///
/// Destination pixels whose source position is outside the image are set to zero.
///
/// # Arguments
///
/// * `src` - The input image container with shape (height, width, C).
/// * `dst` - The output image container with the shape of the map.
/// * `map` - The source coordinates of every destination pixel.
/// * `interpolation` - The interpolation mode to use.
///
/// # Errors
///
/// * The map_x and map_y must have the same size.
/// * The output image must have the same size as the map.
pub fn remap<T: ImageDtype, const C: usize>(
    src: &Image<T, C>,
    dst: &mut Image<T, C>,
    map: &CoordinateMap,
    interpolation: InterpolationMode,
) -> Result<(), ImageError> {
    remap_with_border(src, dst, map, interpolation, [T::default(); C])
}

/// Apply generic geometric transformation to an image with a constant border.
///
/// Destination pixels whose source position is outside the image are set to `border`.
pub fn remap_with_border<T: ImageDtype, const C: usize>(
    src: &Image<T, C>,
    dst: &mut Image<T, C>,
    map: &CoordinateMap,
    interpolation: InterpolationMode,
    border: [T; C],
) -> Result<(), ImageError> {
    check_map_size(dst, map)?;

    if src.width() == 0 || src.height() == 0 {
        dst.as_slice_mut()
            .chunks_exact_mut(C)
            .for_each(|pixel| pixel.copy_from_slice(&border));
        return Ok(());
    }

    // parallelize the remap operation by rows
    parallel::par_iter_rows_resample(dst, map, |x, y, dst_pixel| {
        let pixel = interpolate_pixel(src, x, y, interpolation).unwrap_or(border);
        dst_pixel.copy_from_slice(&pixel);
    });

    Ok(())
}

/// Resample an image through a coordinate map into a newly allocated image.
///
/// The output has the size of the map.
///
/// # Example
///
/// ```
/// use stereopsis_image::{Image, ImageSize};
/// use stereopsis_imgproc::interpolation::{grid::CoordinateMap, warp, InterpolationMode};
///
/// let size = ImageSize { width: 4, height: 3 };
/// let image = Image::<u8, 1>::from_size_fn(size, |r, c, _| (r * 4 + c) as u8).unwrap();
/// let map = CoordinateMap::identity(size).unwrap();
///
/// let out = warp(&image, &map, InterpolationMode::Nearest).unwrap();
/// assert_eq!(out, image);
/// ```
pub fn warp<T: ImageDtype, const C: usize>(
    src: &Image<T, C>,
    map: &CoordinateMap,
    interpolation: InterpolationMode,
) -> Result<Image<T, C>, ImageError> {
    let mut dst = Image::from_size_val(map.size(), T::default())?;
    remap(src, &mut dst, map, interpolation)?;
    Ok(dst)
}
