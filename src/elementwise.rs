// elementwise.rs — CPU reference for the elementwise kernels.
//
// These are the authoritative semantics. Each GPU kernel in
// gpu/elementwise.rs is validated against the function of the same name
// here, element by element.
//
// The type and length rules shared by both paths also live here, so the GPU
// dispatcher and the CPU reference reject exactly the same inputs.

use crate::element::{Complex32, ElementType};
use crate::error::{Error, Result};

/// `out[i] = x[i] * y[i]`.
pub fn multiply_f32(x: &[f32], y: &[f32], out: &mut [f32]) -> Result<()> {
    check_lengths("multiply", &[x.len(), y.len(), out.len()])?;
    for ((o, &a), &b) in out.iter_mut().zip(x).zip(y) {
        *o = a * b;
    }
    Ok(())
}

/// `out[i] = x[i] * y[i]`, two's-complement wrapping like the WGSL `*`.
pub fn multiply_i32(x: &[i32], y: &[i32], out: &mut [i32]) -> Result<()> {
    check_lengths("multiply", &[x.len(), y.len(), out.len()])?;
    for ((o, &a), &b) in out.iter_mut().zip(x).zip(y) {
        *o = a.wrapping_mul(b);
    }
    Ok(())
}

/// `out[i] = conj(x[i]) * y[i]`.
///
/// Conjugating one spectrum before the product turns a frequency-domain
/// convolution into a cross-correlation.
pub fn conjugate_multiply(x: &[Complex32], y: &[Complex32], out: &mut [Complex32]) -> Result<()> {
    check_lengths("conjugate_multiply", &[x.len(), y.len(), out.len()])?;
    for ((o, a), b) in out.iter_mut().zip(x).zip(y) {
        *o = a.conj() * b;
    }
    Ok(())
}

/// Set every element to `value`.
pub fn fill<T: Copy>(array: &mut [T], value: T) {
    array.fill(value);
}

/// A fill scalar already converted to the target buffer's element type.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FillValue {
    F32(f32),
    I32(i32),
}

impl FillValue {
    /// Coerce `value` to `ty`. Integers truncate toward zero and saturate
    /// at the `i32` range; NaN becomes 0.
    ///
    /// # Errors
    /// `Error::UnsupportedType` for element types without a fill kernel.
    pub fn coerce(ty: ElementType, value: f64) -> Result<FillValue> {
        match ty {
            ElementType::F32 => Ok(FillValue::F32(value as f32)),
            ElementType::I32 => Ok(FillValue::I32(value as i32)),
            ElementType::C64 => Err(Error::UnsupportedType { op: "fill", found: vec![ty] }),
        }
    }
}

/// Element type accepted by `multiply`: all operands equal and one of
/// float32 / int32.
pub(crate) fn multiply_type(types: [ElementType; 3]) -> Result<ElementType> {
    match ElementType::common(&types) {
        Some(t @ (ElementType::F32 | ElementType::I32)) => Ok(t),
        _ => Err(Error::UnsupportedType { op: "multiply", found: types.to_vec() }),
    }
}

/// `conjugate_multiply` only has a complex64 kernel.
pub(crate) fn conjugate_multiply_type(types: [ElementType; 3]) -> Result<()> {
    match ElementType::common(&types) {
        Some(ElementType::C64) => Ok(()),
        _ => Err(Error::UnsupportedType { op: "conjugate_multiply", found: types.to_vec() }),
    }
}

pub(crate) fn check_lengths(op: &'static str, lengths: &[usize]) -> Result<usize> {
    match lengths.split_first() {
        Some((&n, rest)) if rest.iter().all(|&l| l == n) => Ok(n),
        Some(_) => Err(Error::LengthMismatch { op, lengths: lengths.to_vec() }),
        None => Ok(0),
    }
}
