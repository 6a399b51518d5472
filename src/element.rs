// element.rs — Closed set of element types a device buffer can hold.
//
// Every buffer carries exactly one `ElementType`, fixed at creation. Kernel
// selection is a `match` over this enum at the call boundary: there is no
// "other" arm that could reach the device with an unknown layout.

use std::fmt;

/// Single-precision complex number, laid out as `[re, im]` (8 bytes).
/// Matches `vec2<f32>` in the WGSL kernels.
pub type Complex32 = num_complex::Complex<f32>;

/// Element type of a device buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElementType {
    /// 32-bit IEEE float.
    F32,
    /// 32-bit signed integer.
    I32,
    /// Two 32-bit floats, real part first.
    C64,
}

impl ElementType {
    /// Size of one element in bytes.
    pub const fn size_bytes(self) -> usize {
        match self {
            ElementType::F32 | ElementType::I32 => 4,
            ElementType::C64 => 8,
        }
    }

    /// The type shared by every entry of `types`, or `None` if they differ
    /// (or `types` is empty).
    pub fn common(types: &[ElementType]) -> Option<ElementType> {
        let (first, rest) = types.split_first()?;
        rest.iter().all(|t| t == first).then_some(*first)
    }
}

impl fmt::Display for ElementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ElementType::F32 => write!(f, "float32"),
            ElementType::I32 => write!(f, "int32"),
            ElementType::C64 => write!(f, "complex64"),
        }
    }
}

/// Host-side Rust type that maps onto one `ElementType`.
///
/// `Pod` lets buffers be filled and read back with `bytemuck::cast_slice`
/// instead of raw pointer casts.
pub trait Element: bytemuck::Pod + Send + Sync + 'static {
    const TYPE: ElementType;
}

impl Element for f32 {
    const TYPE: ElementType = ElementType::F32;
}

impl Element for i32 {
    const TYPE: ElementType = ElementType::I32;
}

impl Element for Complex32 {
    const TYPE: ElementType = ElementType::C64;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_size_matches_rust_layout() {
        assert_eq!(ElementType::F32.size_bytes(), std::mem::size_of::<f32>());
        assert_eq!(ElementType::I32.size_bytes(), std::mem::size_of::<i32>());
        assert_eq!(ElementType::C64.size_bytes(), std::mem::size_of::<Complex32>());
    }

    #[test]
    fn test_common_type() {
        use ElementType::*;
        assert_eq!(ElementType::common(&[F32, F32, F32]), Some(F32));
        assert_eq!(ElementType::common(&[C64]), Some(C64));
        assert_eq!(ElementType::common(&[F32, I32, F32]), None);
        assert_eq!(ElementType::common(&[]), None);
    }

    #[test]
    fn test_complex_is_re_im_pair() {
        let c = [Complex32::new(1.5, -2.0)];
        let raw: &[f32] = bytemuck::cast_slice(&c);
        assert_eq!(raw, &[1.5, -2.0]);
    }

    #[test]
    fn test_display_uses_numpy_names() {
        assert_eq!(ElementType::F32.to_string(), "float32");
        assert_eq!(ElementType::I32.to_string(), "int32");
        assert_eq!(ElementType::C64.to_string(), "complex64");
    }
}
