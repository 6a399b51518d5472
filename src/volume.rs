// volume.rs — Dense host-side scalar volume and its sampling rules.
//
// Layout: shape is `[nz, ny, nx]`, x varies fastest, no padding.
//
//   index(x, y, z) = (z * ny + y) * nx + x
//
// This is the same flat order the rotation kernel writes, so a `Volume`
// built from a readback buffer needs no reshuffling.
//
// SAMPLING
// ────────
// Coordinates are unnormalised voxel indices; voxel (x, y, z) has its
// center at exactly (x, y, z). Addressing is clamp-to-edge: a coordinate
// outside [0, n−1] on any axis reads the nearest edge voxel. The GPU
// kernel in shaders/rotate.wgsl implements the same arithmetic, so CPU and
// GPU results agree to f32 rounding.

use crate::error::{Error, Result};

/// Interpolation applied when sampling between voxel centers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Filter {
    /// Trilinear interpolation of the 8 surrounding voxels.
    #[default]
    Linear,
    /// Value of the voxel whose center is closest (ties round up).
    Nearest,
}

/// A 3-D `f32` grid with runtime shape.
#[derive(Debug, Clone, PartialEq)]
pub struct Volume {
    data: Vec<f32>,
    shape: [usize; 3],
}

impl Volume {
    /// Zero-filled volume of shape `[nz, ny, nx]`.
    pub fn new(shape: [usize; 3]) -> Self {
        Volume { data: vec![0.0; shape.iter().product()], shape }
    }

    /// Wrap existing data.
    ///
    /// # Errors
    /// `Error::ShapeMismatch` if `data.len()` is not `nz * ny * nx`.
    pub fn from_vec(shape: [usize; 3], data: Vec<f32>) -> Result<Self> {
        let expected: usize = shape.iter().product();
        if data.len() != expected {
            return Err(Error::ShapeMismatch(format!(
                "volume {shape:?} needs {expected} values, got {}",
                data.len()
            )));
        }
        Ok(Volume { data, shape })
    }

    /// Build a volume by evaluating `f(x, y, z)` at every voxel.
    pub fn from_fn(shape: [usize; 3], mut f: impl FnMut(usize, usize, usize) -> f32) -> Self {
        let [nz, ny, nx] = shape;
        let mut data = Vec::with_capacity(nz * ny * nx);
        for z in 0..nz {
            for y in 0..ny {
                for x in 0..nx {
                    data.push(f(x, y, z));
                }
            }
        }
        Volume { data, shape }
    }

    pub fn shape(&self) -> [usize; 3] {
        self.shape
    }

    pub fn nx(&self) -> usize {
        self.shape[2]
    }

    pub fn ny(&self) -> usize {
        self.shape[1]
    }

    pub fn nz(&self) -> usize {
        self.shape[0]
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    #[inline]
    pub fn index(&self, x: usize, y: usize, z: usize) -> usize {
        (z * self.ny() + y) * self.nx() + x
    }

    #[inline]
    pub fn get(&self, x: usize, y: usize, z: usize) -> f32 {
        self.data[self.index(x, y, z)]
    }

    #[inline]
    pub fn set(&mut self, x: usize, y: usize, z: usize, v: f32) {
        let i = self.index(x, y, z);
        self.data[i] = v;
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    pub fn as_mut_slice(&mut self) -> &mut [f32] {
        &mut self.data
    }

    pub fn into_vec(self) -> Vec<f32> {
        self.data
    }

    /// Sample at a fractional coordinate `(x, y, z)` with clamp-to-edge
    /// addressing. Returns 0 for an empty volume.
    pub fn sample(&self, q: [f32; 3], filter: Filter) -> f32 {
        if self.is_empty() {
            return 0.0;
        }
        match filter {
            Filter::Nearest => {
                let x = nearest_index(q[0], self.nx());
                let y = nearest_index(q[1], self.ny());
                let z = nearest_index(q[2], self.nz());
                self.get(x, y, z)
            }
            Filter::Linear => {
                let (x0, x1, tx) = linear_taps(q[0], self.nx());
                let (y0, y1, ty) = linear_taps(q[1], self.ny());
                let (z0, z1, tz) = linear_taps(q[2], self.nz());

                let lerp = |a: f32, b: f32, t: f32| a + (b - a) * t;
                let c00 = lerp(self.get(x0, y0, z0), self.get(x1, y0, z0), tx);
                let c10 = lerp(self.get(x0, y1, z0), self.get(x1, y1, z0), tx);
                let c01 = lerp(self.get(x0, y0, z1), self.get(x1, y0, z1), tx);
                let c11 = lerp(self.get(x0, y1, z1), self.get(x1, y1, z1), tx);
                lerp(lerp(c00, c10, ty), lerp(c01, c11, ty), tz)
            }
        }
    }
}

/// Clamp `c` into `[0, n-1]` and split it into the two neighbouring voxel
/// indices plus the fractional weight of the upper one.
#[inline]
fn linear_taps(c: f32, n: usize) -> (usize, usize, f32) {
    let hi = (n - 1) as f32;
    // NaN clamps to NaN; treat it as the low edge.
    let c = if c.is_nan() { 0.0 } else { c.clamp(0.0, hi) };
    let i0 = c.floor();
    let t = c - i0;
    let i0 = i0 as usize;
    (i0, (i0 + 1).min(n - 1), t)
}

#[inline]
fn nearest_index(c: f32, n: usize) -> usize {
    let hi = (n - 1) as f32;
    let c = (c + 0.5).floor();
    if c.is_nan() {
        0
    } else {
        c.clamp(0.0, hi) as usize
    }
}
