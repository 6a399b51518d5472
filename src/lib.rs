// volfit-kernels: host-side GPU dispatch for rigid-body density fitting
//
// Compiles a fixed set of WGSL compute kernels once per device and
// dispatches them: elementwise array products and fills for the
// Fourier-space correlation, and backward resampling of a 3-D density
// under a rotation. Each kernel has a CPU reference in this crate that the
// GPU results are checked against.

pub mod element;
pub mod elementwise;
pub mod error;
pub mod gpu;
pub mod rotate;
pub mod transform;
pub mod volume;

pub use element::{Complex32, Element, ElementType};
pub use error::{Error, Result};
pub use transform::RotationMatrix;
pub use volume::{Filter, Volume};
