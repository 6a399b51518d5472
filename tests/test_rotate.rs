// tests/test_rotate.rs — Integration tests for CPU volume rotation.

use volfit_kernels::gpu::device::LaunchGeometry;
use volfit_kernels::gpu::rotate::RotationPlan;
use volfit_kernels::rotate::rotate;
use volfit_kernels::transform::grid_center;
use volfit_kernels::{Error, Filter, RotationMatrix, Volume};

use std::f32::consts::{FRAC_PI_2, PI};

/// Smooth anisotropic Gaussian centred in the grid.
fn gaussian_blob(shape: [usize; 3], width: f32) -> Volume {
    let c = grid_center(shape);
    Volume::from_fn(shape, |x, y, z| {
        let dx = x as f32 - c[0];
        let dy = (y as f32 - c[1]) * 1.3;
        let dz = (z as f32 - c[2]) * 0.8;
        (-(dx * dx + dy * dy + dz * dz) / (2.0 * width * width)).exp()
    })
}

// ===== Identity =====

#[test]
fn identity_about_center_reproduces_volume() {
    let shape = [9, 10, 11];
    let src = gaussian_blob(shape, 2.5);
    let out = rotate(&src, &RotationMatrix::IDENTITY, grid_center(shape), shape, Filter::Linear)
        .unwrap();
    assert_eq!(out, src);
}

#[test]
fn identity_about_any_center_reproduces_volume() {
    let shape = [6, 6, 6];
    let src = gaussian_blob(shape, 2.0);
    let out = rotate(&src, &RotationMatrix::IDENTITY, [0.0, 5.0, 2.0], shape, Filter::Nearest)
        .unwrap();
    assert_eq!(out, src);
}

// ===== Round trip =====

#[test]
fn rotate_then_inverse_recovers_interior() {
    let shape = [24, 24, 24];
    let src = gaussian_blob(shape, 5.0);
    let c = grid_center(shape);

    let r = RotationMatrix::from_axis_angle([1.0, 1.0, 0.3], 0.7);
    let r_inv = r.inverse().unwrap();

    let once = rotate(&src, &r, c, shape, Filter::Linear).unwrap();
    let back = rotate(&once, &r_inv, c, shape, Filter::Linear).unwrap();

    // Points within radius 6 of the center never leave the grid under any
    // rotation, so no edge clamping is involved.
    let mut max_err = 0.0f32;
    for z in 0..24 {
        for y in 0..24 {
            for x in 0..24 {
                let d2 = (x as f32 - c[0]).powi(2)
                    + (y as f32 - c[1]).powi(2)
                    + (z as f32 - c[2]).powi(2);
                if d2 > 36.0 {
                    continue;
                }
                max_err = max_err.max((back.get(x, y, z) - src.get(x, y, z)).abs());
            }
        }
    }
    assert!(max_err < 0.05, "round trip error {max_err}");
}

#[test]
fn quarter_turns_compose_to_identity() {
    let shape = [5, 7, 7];
    let src = Volume::from_fn(shape, |x, y, z| (x * 100 + y * 10 + z) as f32);
    let c = grid_center(shape);
    let q = RotationMatrix::from_axis_angle([0.0, 0.0, 1.0], FRAC_PI_2);

    let mut v = src.clone();
    for _ in 0..4 {
        v = rotate(&v, &q, c, shape, Filter::Nearest).unwrap();
    }
    assert_eq!(v, src);
}

#[test]
fn half_turn_about_z_mirrors_xy() {
    let shape = [3, 5, 5];
    let src = Volume::from_fn(shape, |x, y, z| (x + 5 * y + 25 * z) as f32);
    let c = grid_center(shape);
    let r = RotationMatrix::from_axis_angle([0.0, 0.0, 1.0], PI);
    let out = rotate(&src, &r, c, shape, Filter::Nearest).unwrap();
    for z in 0..3 {
        for y in 0..5 {
            for x in 0..5 {
                assert_eq!(out.get(x, y, z), src.get(4 - x, 4 - y, z), "({x},{y},{z})");
            }
        }
    }
}

// ===== Output shape and edges =====

#[test]
fn output_grid_may_be_smaller_than_source() {
    let src = gaussian_blob([16, 16, 16], 3.0);
    let out = rotate(&src, &RotationMatrix::IDENTITY, [0.0; 3], [4, 5, 6], Filter::Linear).unwrap();
    assert_eq!(out.shape(), [4, 5, 6]);
    assert_eq!(out.get(5, 4, 3), src.get(5, 4, 3));
}

#[test]
fn samples_outside_source_clamp_to_edge() {
    // Constant volume: every sample, clamped or not, is the constant.
    let src = Volume::from_fn([4, 4, 4], |_, _, _| 3.25);
    let r = RotationMatrix::from_axis_angle([0.2, 0.9, 0.1], 1.1);
    let out = rotate(&src, &r, [0.0; 3], [8, 8, 8], Filter::Linear).unwrap();
    assert!(out.as_slice().iter().all(|&v| (v - 3.25).abs() < 1e-6));
}

#[test]
fn singular_matrix_is_an_error() {
    let src = Volume::new([2, 2, 2]);
    let zero = RotationMatrix::from_rows([[0.0; 3]; 3]);
    assert!(matches!(
        rotate(&src, &zero, [0.0; 3], [2, 2, 2], Filter::Linear),
        Err(Error::SingularMatrix { .. })
    ));
}

// ===== Launch planning =====

#[test]
fn launch_depends_on_compute_units_only() {
    let r = RotationMatrix::from_axis_angle([0.0, 1.0, 0.0], 0.25);
    for cu in [1, 14, 28] {
        let a = RotationPlan::new(&r, grid_center([8, 8, 8]), [8, 8, 8], cu, 128).unwrap();
        let b = RotationPlan::new(&r, grid_center([96, 64, 48]), [96, 64, 48], cu, 128).unwrap();
        assert_eq!(a.launch, b.launch);
        assert_eq!(a.launch, LaunchGeometry::for_rotation(cu, 128));
        assert_eq!(a.launch.work_items, cu * 16 * 8);
    }
}
