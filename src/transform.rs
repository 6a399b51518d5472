// transform.rs — 3×3 linear transforms for volume resampling.
//
// The rotation kernel resamples *backward*: for every output voxel p it
// looks up the source at R⁻¹·(p − c) + c. The host therefore never hands
// the caller's matrix to the device, only its inverse, packed into the
// kernel's fixed 16-float layout.
//
// Inversion runs in f64 via glam's `DMat3`. The matrices that reach this
// module are usually products of several rotations in f32, so the extra
// precision costs nothing and keeps R⁻¹·R within f32 rounding of identity.

use glam::{DMat3, DVec3};

use crate::error::{Error, Result};

/// Relative determinant threshold below which a matrix is treated as
/// singular. Scaled by `max|m_ij|³` so uniformly scaled matrices behave the
/// same as their unit-scale counterparts.
const SINGULAR_TOLERANCE: f64 = 1e-10;

/// A 3×3 linear transform stored row-major in single precision.
///
/// Acts on column vectors `(x, y, z)` in voxel-index coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RotationMatrix {
    rows: [[f32; 3]; 3],
}

impl RotationMatrix {
    pub const IDENTITY: RotationMatrix = RotationMatrix {
        rows: [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]],
    };

    pub fn from_rows(rows: [[f32; 3]; 3]) -> Self {
        RotationMatrix { rows }
    }

    /// Build from a flat row-major slice of 9 values.
    pub fn from_row_major(m: [f32; 9]) -> Self {
        RotationMatrix {
            rows: [[m[0], m[1], m[2]], [m[3], m[4], m[5]], [m[6], m[7], m[8]]],
        }
    }

    /// Right-handed rotation by `angle` radians about `axis`.
    /// The axis need not be normalised; a zero axis yields the identity.
    pub fn from_axis_angle(axis: [f32; 3], angle: f32) -> Self {
        let axis = DVec3::new(axis[0] as f64, axis[1] as f64, axis[2] as f64);
        if axis.length_squared() == 0.0 {
            return Self::IDENTITY;
        }
        Self::from_dmat3(DMat3::from_axis_angle(axis.normalize(), angle as f64))
    }

    pub fn rows(&self) -> [[f32; 3]; 3] {
        self.rows
    }

    /// Matrix product `self · rhs`.
    pub fn compose(&self, rhs: &RotationMatrix) -> RotationMatrix {
        Self::from_dmat3(self.to_dmat3() * rhs.to_dmat3())
    }

    pub fn determinant(&self) -> f64 {
        self.to_dmat3().determinant()
    }

    /// The inverse transform.
    ///
    /// # Errors
    /// `Error::SingularMatrix` when an entry is not finite or the
    /// determinant is zero relative to the matrix scale.
    pub fn inverse(&self) -> Result<RotationMatrix> {
        let m = self.to_dmat3();
        let det = m.determinant();
        let scale = self
            .rows
            .iter()
            .flatten()
            .fold(0.0f64, |acc, &v| acc.max((v as f64).abs()));

        if !m.is_finite() || scale == 0.0 || det.abs() <= SINGULAR_TOLERANCE * scale.powi(3) {
            return Err(Error::SingularMatrix { determinant: det });
        }
        Ok(Self::from_dmat3(m.inverse()))
    }

    /// `self · v`.
    pub fn apply(&self, v: [f32; 3]) -> [f32; 3] {
        let r = &self.rows;
        [
            r[0][0] * v[0] + r[0][1] * v[1] + r[0][2] * v[2],
            r[1][0] * v[0] + r[1][1] * v[1] + r[1][2] * v[2],
            r[2][0] * v[0] + r[2][1] * v[1] + r[2][2] * v[2],
        ]
    }

    /// Pack into a row-major 4×4 homogeneous layout: the upper-left 3×3
    /// holds this matrix, every other entry is zero.
    ///
    /// ```text
    ///   [ m00 m01 m02 0 ]
    ///   [ m10 m11 m12 0 ]
    ///   [ m20 m21 m22 0 ]
    ///   [  0   0   0  0 ]
    /// ```
    pub fn to_homogeneous16(&self) -> [f32; 16] {
        let mut out = [0.0f32; 16];
        for (i, row) in self.rows.iter().enumerate() {
            out[i * 4..i * 4 + 3].copy_from_slice(row);
        }
        out
    }

    fn to_dmat3(self) -> DMat3 {
        // glam is column-major: feed rows as columns, then transpose.
        let r = self.rows.map(|row| row.map(|v| v as f64));
        DMat3::from_cols_array_2d(&r).transpose()
    }

    fn from_dmat3(m: DMat3) -> Self {
        let rows = m.transpose().to_cols_array_2d();
        RotationMatrix { rows: rows.map(|row| row.map(|v| v as f32)) }
    }
}

impl Default for RotationMatrix {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// Pack a 3-component center into the kernel's `vec4` slot (w = 0).
pub fn pack_center(center: [f32; 3]) -> [f32; 4] {
    [center[0], center[1], center[2], 0.0]
}

/// Pack a 3-D shape `[d0, d1, d2]` as `[d0, d1, d2, d0·d1·d2]`.
///
/// # Errors
/// `Error::ShapeMismatch` if the voxel count does not fit in `i32`.
pub fn pack_shape(shape: [usize; 3]) -> Result<[i32; 4]> {
    let total = shape
        .iter()
        .try_fold(1usize, |acc, &d| acc.checked_mul(d))
        .filter(|&t| t <= i32::MAX as usize)
        .ok_or_else(|| Error::ShapeMismatch(format!("{shape:?} exceeds i32 voxel count")))?;
    Ok([shape[0] as i32, shape[1] as i32, shape[2] as i32, total as i32])
}

/// Geometric center of a grid with shape `[nz, ny, nx]`, as `(x, y, z)`
/// in voxel-index coordinates.
pub fn grid_center(shape: [usize; 3]) -> [f32; 3] {
    [
        (shape[2] as f32 - 1.0) * 0.5,
        (shape[1] as f32 - 1.0) * 0.5,
        (shape[0] as f32 - 1.0) * 0.5,
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::FRAC_PI_2;

    fn assert_close(a: &RotationMatrix, b: &RotationMatrix, tol: f32) {
        for (ra, rb) in a.rows().iter().zip(b.rows().iter()) {
            for (x, y) in ra.iter().zip(rb.iter()) {
                assert!((x - y).abs() <= tol, "{a:?} != {b:?}");
            }
        }
    }

    #[test]
    fn test_identity_inverse() {
        let inv = RotationMatrix::IDENTITY.inverse().unwrap();
        assert_eq!(inv, RotationMatrix::IDENTITY);
    }

    #[test]
    fn test_rotation_inverse_is_transpose() {
        let r = RotationMatrix::from_axis_angle([1.0, 2.0, 3.0], 0.7);
        let rows = r.rows();
        let t = RotationMatrix::from_rows([
            [rows[0][0], rows[1][0], rows[2][0]],
            [rows[0][1], rows[1][1], rows[2][1]],
            [rows[0][2], rows[1][2], rows[2][2]],
        ]);
        assert_close(&r.inverse().unwrap(), &t, 1e-6);
    }

    #[test]
    fn test_general_inverse_round_trip() {
        // Non-orthogonal: shear + anisotropic scale.
        let m = RotationMatrix::from_row_major([2.0, 0.5, 0.0, 0.0, 1.0, -0.3, 0.1, 0.0, 0.5]);
        let prod = m.compose(&m.inverse().unwrap());
        assert_close(&prod, &RotationMatrix::IDENTITY, 1e-6);
    }

    #[test]
    fn test_quarter_turn_about_z() {
        let r = RotationMatrix::from_axis_angle([0.0, 0.0, 1.0], FRAC_PI_2);
        let v = r.apply([1.0, 0.0, 0.0]);
        assert!((v[0]).abs() < 1e-6);
        assert!((v[1] - 1.0).abs() < 1e-6);
        assert!((v[2]).abs() < 1e-6);
    }

    #[test]
    fn test_singular_rejected() {
        let m = RotationMatrix::from_row_major([1.0, 2.0, 3.0, 2.0, 4.0, 6.0, 0.0, 0.0, 1.0]);
        assert!(matches!(m.inverse(), Err(Error::SingularMatrix { .. })));

        let zero = RotationMatrix::from_rows([[0.0; 3]; 3]);
        assert!(matches!(zero.inverse(), Err(Error::SingularMatrix { .. })));
    }

    #[test]
    fn test_non_finite_rejected() {
        let m = RotationMatrix::from_row_major([f32::NAN, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0]);
        assert!(matches!(m.inverse(), Err(Error::SingularMatrix { .. })));
    }

    #[test]
    fn test_small_scale_is_not_singular() {
        // det = 1e-9 but the matrix is a well-conditioned scaled identity.
        let m = RotationMatrix::from_row_major([1e-3, 0.0, 0.0, 0.0, 1e-3, 0.0, 0.0, 0.0, 1e-3]);
        let inv = m.inverse().unwrap();
        assert!((inv.rows()[0][0] - 1e3).abs() < 1e-2);
    }

    #[test]
    fn test_homogeneous_layout() {
        let m = RotationMatrix::from_row_major([1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0]);
        let p = m.to_homogeneous16();
        assert_eq!(
            p,
            [
                1.0, 2.0, 3.0, 0.0, //
                4.0, 5.0, 6.0, 0.0, //
                7.0, 8.0, 9.0, 0.0, //
                0.0, 0.0, 0.0, 0.0,
            ]
        );
    }

    #[test]
    fn test_pack_center_and_shape() {
        assert_eq!(pack_center([1.0, 2.0, 3.0]), [1.0, 2.0, 3.0, 0.0]);
        assert_eq!(pack_shape([4, 5, 6]).unwrap(), [4, 5, 6, 120]);
        assert!(matches!(
            pack_shape([1 << 12, 1 << 12, 1 << 12]),
            Err(Error::ShapeMismatch(_))
        ));
    }

    #[test]
    fn test_grid_center_order() {
        // shape is [nz, ny, nx]; center comes back as (x, y, z).
        assert_eq!(grid_center([3, 5, 9]), [4.0, 2.0, 1.0]);
    }
}
