// rotate.rs — CPU reference for the 3-D rotation / resampling kernel.
//
// Backward resampling: every output voxel p = (x, y, z) is filled with the
// source sampled at
//
//     q = R⁻¹ · (p − c) + c
//
// so each output voxel receives exactly one value and there are no holes,
// whatever R is. Coordinates landing outside the source clamp to its edge
// (see volume.rs).
//
// gpu/rotate.rs must agree with `rotate` here to within f32 rounding.

use crate::error::Result;
use crate::transform::RotationMatrix;
use crate::volume::{Filter, Volume};

/// Resample `src` under `rotation` about `center`, into a new volume of
/// shape `out_shape` (`[nz, ny, nx]`).
///
/// # Errors
/// `Error::SingularMatrix` if `rotation` has no inverse.
pub fn rotate(
    src: &Volume,
    rotation: &RotationMatrix,
    center: [f32; 3],
    out_shape: [usize; 3],
    filter: Filter,
) -> Result<Volume> {
    let inv = rotation.inverse()?;
    Ok(rotate_with_inverse(src, &inv, center, out_shape, filter))
}

/// Same as [`rotate`] with the inverse already computed.
pub fn rotate_with_inverse(
    src: &Volume,
    inverse: &RotationMatrix,
    center: [f32; 3],
    out_shape: [usize; 3],
    filter: Filter,
) -> Volume {
    let [cx, cy, cz] = center;
    Volume::from_fn(out_shape, |x, y, z| {
        let d = [x as f32 - cx, y as f32 - cy, z as f32 - cz];
        let r = inverse.apply(d);
        src.sample([r[0] + cx, r[1] + cy, r[2] + cz], filter)
    })
}
