use stereopsis_image::ImageDtype;

use super::interpolate::RowSource;

/// Kernel for bilinear interpolation
///
/// The four neighbours are blended in `f32` and converted back with [`ImageDtype::from_f32`].
/// Neighbours past the last row or column fall back to the last one. The caller guarantees
/// that `(u, v)` lies inside the source.
///
/// # Returns
///
/// The interpolated pixel values, or `None` if a needed source row is not available.
pub(crate) fn bilinear_interpolation<T: ImageDtype, const C: usize, S>(
    src: &S,
    u: f32,
    v: f32,
) -> Option<[T; C]>
where
    S: RowSource<T>,
{
    let (rows, cols) = (src.rows(), src.cols());

    let iu0 = (u.floor() as usize).min(cols - 1);
    let iv0 = (v.floor() as usize).min(rows - 1);

    let frac_u = u - iu0 as f32;
    let frac_v = v - iv0 as f32;

    let frac_uu = 1.0 - frac_u;
    let frac_vv = 1.0 - frac_v;

    let w00 = frac_uu * frac_vv;
    let w01 = frac_u * frac_vv;
    let w10 = frac_uu * frac_v;
    let w11 = frac_u * frac_v;

    let iu1 = if iu0 + 1 < cols { iu0 + 1 } else { iu0 };
    // the lower row only takes part when it has a weight
    let iv1 = if frac_v > 0.0 && iv0 + 1 < rows {
        iv0 + 1
    } else {
        iv0
    };

    let row0 = src.row(iv0)?;
    let row1 = src.row(iv1)?;

    let p00 = row0.get(iu0 * C..(iu0 + 1) * C)?;
    let p01 = row0.get(iu1 * C..(iu1 + 1) * C)?;
    let p10 = row1.get(iu0 * C..(iu0 + 1) * C)?;
    let p11 = row1.get(iu1 * C..(iu1 + 1) * C)?;

    let mut pixel = [T::default(); C];
    for k in 0..C {
        let val = p00[k].to_f32() * w00
            + p01[k].to_f32() * w01
            + p10[k].to_f32() * w10
            + p11[k].to_f32() * w11;
        pixel[k] = T::from_f32(val);
    }

    Some(pixel)
}
