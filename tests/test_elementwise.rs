// tests/test_elementwise.rs — Integration tests for the CPU elementwise
// reference operations.

use volfit_kernels::elementwise::{conjugate_multiply, fill, multiply_f32, multiply_i32, FillValue};
use volfit_kernels::{Complex32, ElementType, Error};

#[test]
fn multiply_f32_matches_products() {
    let x = [1.5f32, -2.0, 0.0, 1e-3];
    let y = [2.0f32, 3.0, 7.0, 1e3];
    let mut out = [0.0f32; 4];
    multiply_f32(&x, &y, &mut out).unwrap();
    for i in 0..4 {
        assert!((out[i] - x[i] * y[i]).abs() < 1e-6);
    }
}

#[test]
fn multiply_i32_is_exact_and_wraps() {
    let x = [3, -4, i32::MAX, 65_536];
    let y = [5, 6, 2, 65_536];
    let mut out = [0; 4];
    multiply_i32(&x, &y, &mut out).unwrap();
    assert_eq!(out, [15, -24, -2, 0]);
}

#[test]
fn conjugate_multiply_of_self_is_norm_squared() {
    let x: Vec<Complex32> =
        (0..16).map(|i| Complex32::new(i as f32 * 0.5, 1.0 - i as f32)).collect();
    let mut out = vec![Complex32::default(); 16];
    conjugate_multiply(&x, &x, &mut out).unwrap();
    for (o, v) in out.iter().zip(&x) {
        assert!((o.re - v.norm_sqr()).abs() < 1e-4);
        assert!(o.im.abs() < 1e-6);
    }
}

#[test]
fn conjugate_multiply_known_value() {
    // conj(1 + 2i) · (3 + 4i) = (1 − 2i)(3 + 4i) = 11 − 2i
    let mut out = [Complex32::default()];
    conjugate_multiply(&[Complex32::new(1.0, 2.0)], &[Complex32::new(3.0, 4.0)], &mut out)
        .unwrap();
    assert_eq!(out[0], Complex32::new(11.0, -2.0));
}

#[test]
fn length_mismatch_rejected_before_writing() {
    let mut out = [9.0f32; 3];
    let err = multiply_f32(&[1.0, 2.0, 3.0], &[1.0, 2.0], &mut out).unwrap_err();
    assert!(matches!(err, Error::LengthMismatch { op: "multiply", .. }));
    assert_eq!(out, [9.0; 3]);
}

#[test]
fn fill_sets_every_element() {
    let mut a = vec![0i32; 100];
    fill(&mut a, 7);
    assert!(a.iter().all(|&v| v == 7));
}

#[test]
fn fill_value_coercion() {
    assert_eq!(FillValue::coerce(ElementType::F32, 0.1).unwrap(), FillValue::F32(0.1f64 as f32));
    assert_eq!(FillValue::coerce(ElementType::I32, 2.9).unwrap(), FillValue::I32(2));
    assert_eq!(FillValue::coerce(ElementType::I32, -1e12).unwrap(), FillValue::I32(i32::MIN));
    assert!(matches!(
        FillValue::coerce(ElementType::C64, 1.0),
        Err(Error::UnsupportedType { op: "fill", .. })
    ));
}
