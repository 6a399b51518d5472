// error.rs — Crate-wide error type.
//
// Every check in this crate runs synchronously at the call site, before any
// GPU command is encoded. A returned `Err` therefore guarantees that nothing
// was enqueued on the device queue.

use thiserror::Error;

use crate::element::ElementType;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors from device setup, kernel compilation and kernel dispatch.
#[derive(Debug, Error)]
pub enum Error {
    /// No Vulkan adapter was found.
    #[error(
        "no suitable Vulkan adapter found (only CPU/software renderers visible); \
         check that `vulkaninfo` lists a real GPU"
    )]
    NoSuitableAdapter,

    /// wgpu device request failed (driver issue, unsupported limits, etc.).
    #[error("device request failed: {0}")]
    DeviceRequest(#[from] wgpu::RequestDeviceError),

    /// Requested workgroup size is empty or exceeds the profile's
    /// invocation limit.
    #[error("workgroup size {total} outside 1..={max} invocations")]
    InvalidWorkgroupSize { total: u32, max: u32 },

    /// A compute-unit count of zero would produce an empty launch.
    #[error("compute unit count must be at least 1")]
    InvalidComputeUnits,

    /// A shader module or pipeline failed validation. Fatal: the program
    /// is discarded and no kernel becomes usable.
    #[error("kernel program failed to build ({label}): {message}")]
    Compile { label: &'static str, message: String },

    /// Element-type mismatch or an element type the operation has no
    /// kernel for. Recoverable: retry with correctly typed buffers.
    #[error("{op}: unsupported element types {found:?}")]
    UnsupportedType {
        op: &'static str,
        found: Vec<ElementType>,
    },

    /// Operand lengths disagree.
    #[error("{op}: operand lengths differ {lengths:?}")]
    LengthMismatch {
        op: &'static str,
        lengths: Vec<usize>,
    },

    /// The output buffer is also bound as an input of the same dispatch.
    #[error("{op}: output buffer is also an input")]
    AliasedOperands { op: &'static str },

    /// The rotation matrix has no (numerically stable) inverse.
    #[error("rotation matrix is singular (determinant {determinant:e})")]
    SingularMatrix { determinant: f64 },

    /// A buffer or volume shape does not fit the operation.
    #[error("shape mismatch: {0}")]
    ShapeMismatch(String),

    /// Mapping a readback buffer failed.
    #[error("readback failed: {0}")]
    Readback(String),
}
