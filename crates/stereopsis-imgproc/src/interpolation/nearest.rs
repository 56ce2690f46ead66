use super::interpolate::RowSource;

/// Kernel for nearest neighbor interpolation
///
/// Coordinates are rounded half up, `floor(u + 0.5)`. The caller guarantees that `(u, v)`
/// lies inside the source.
///
/// # Returns
///
/// The pixel values, or `None` if the source row is not available.
pub(crate) fn nearest_neighbor_interpolation<T: Copy + Default, const C: usize, S>(
    src: &S,
    u: f32,
    v: f32,
) -> Option<[T; C]>
where
    S: RowSource<T>,
{
    let iu = ((u + 0.5).floor() as usize).min(src.cols() - 1);
    let iv = ((v + 0.5).floor() as usize).min(src.rows() - 1);

    let row = src.row(iv)?;
    let base = iu * C;

    let mut pixel = [T::default(); C];
    pixel.copy_from_slice(row.get(base..base + C)?);

    Some(pixel)
}
