// gpu/elementwise.rs — Elementwise array kernels.
//
// Mirrors the CPU functions in elementwise.rs:
//   multiply           : out = x * y               (float32, int32)
//   conjugate_multiply : out = conj(x) * y         (complex64)
//   fill               : array = value             (float32, int32)
//
// Every call validates element types first, then lengths, then that the
// output is not also an input and that every buffer fits one storage
// binding, and only then encodes anything. A rejected call leaves every buffer untouched and
// submits nothing.
//
// PARAMS UNIFORM
// ──────────────
// All three sources share one 16-byte `Params` block. `value` is the raw
// bit pattern of the fill scalar: f32 bits for `set_to_f`, two's-complement
// bits for `set_to_i`, ignored by the multiply kernels.

use wgpu::util::DeviceExt;

use crate::element::ElementType;
use crate::elementwise::{check_lengths, conjugate_multiply_type, multiply_type, FillValue};
use crate::error::{Error, Result};
use crate::gpu::buffer::{check_distinct, TypedBuffer};
use crate::gpu::device::{Completion, GpuDevice, LaunchGeometry};
use crate::gpu::program::{Kernel, KernelProgram};

/// Layout must match `Params` in the elementwise WGSL files:
///   offset  0: len   (u32)
///   offset  4: value (f32 / i32 / unused, as raw bits)
///   offset  8: _pad  (2 × u32)
///   total:  16 bytes
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Eq, bytemuck::Pod, bytemuck::Zeroable)]
struct ElementwiseParams {
    len: u32,
    value: u32,
    _pad: [u32; 2],
}

impl ElementwiseParams {
    fn new(len: usize, value: u32) -> Self {
        ElementwiseParams { len: len as u32, value, _pad: [0; 2] }
    }
}

impl FillValue {
    fn bits(self) -> u32 {
        match self {
            FillValue::F32(v) => v.to_bits(),
            FillValue::I32(v) => v as u32,
        }
    }

    fn kernel(self) -> Kernel {
        match self {
            FillValue::F32(_) => Kernel::FillF32,
            FillValue::I32(_) => Kernel::FillI32,
        }
    }
}

/// Kernel for a `multiply` over `types`; int32 and float32 only.
fn multiply_kernel(types: [ElementType; 3]) -> Result<Kernel> {
    match multiply_type(types)? {
        ElementType::F32 => Ok(Kernel::MultiplyF32),
        ElementType::I32 => Ok(Kernel::MultiplyI32),
        ElementType::C64 => Err(Error::UnsupportedType { op: "multiply", found: types.to_vec() }),
    }
}

/// Checks shared by the two-input kernels, after the type check.
fn check_binary(
    gpu: &GpuDevice,
    op: &'static str,
    x: &TypedBuffer,
    y: &TypedBuffer,
    out: &TypedBuffer,
) -> Result<usize> {
    let len = check_lengths(op, &[x.len(), y.len(), out.len()])?;
    check_distinct(op, out, &[x, y])?;
    for buf in [x, y, out] {
        buf.check_binding(gpu, op)?;
    }
    Ok(len)
}

/// Launches the elementwise kernels of a [`KernelProgram`].
///
/// Cheap to create; holds only a borrow of the program.
pub struct ElementwiseDispatcher<'p> {
    program: &'p KernelProgram,
}

impl<'p> ElementwiseDispatcher<'p> {
    pub fn new(program: &'p KernelProgram) -> Self {
        ElementwiseDispatcher { program }
    }

    /// `out[i] = x[i] * y[i]` for float32 or int32 buffers (int32 wraps).
    ///
    /// # Errors
    /// `Error::UnsupportedType` unless all three buffers share one of those
    /// types; `Error::LengthMismatch` if their lengths differ;
    /// `Error::AliasedOperands` if `out` is `x` or `y`; `Error::ShapeMismatch`
    /// if a buffer exceeds the device's storage binding size.
    pub fn multiply(
        &self,
        gpu: &GpuDevice,
        x: &TypedBuffer,
        y: &TypedBuffer,
        out: &TypedBuffer,
    ) -> Result<Completion> {
        let (kernel, len) =
            multiply_kernel([x.element_type(), y.element_type(), out.element_type()])
                .and_then(|k| Ok((k, check_binary(gpu, "multiply", x, y, out)?)))
                .inspect_err(|e| tracing::debug!(error = %e, "dispatch rejected"))?;
        Ok(self.dispatch_binary(gpu, kernel, x, y, out, len))
    }

    /// `out[i] = conj(x[i]) * y[i]` for complex64 buffers.
    ///
    /// # Errors
    /// `Error::UnsupportedType` unless all three buffers are complex64;
    /// `Error::LengthMismatch` if their lengths differ;
    /// `Error::AliasedOperands` if `out` is `x` or `y`; `Error::ShapeMismatch`
    /// if a buffer exceeds the device's storage binding size.
    pub fn conjugate_multiply(
        &self,
        gpu: &GpuDevice,
        x: &TypedBuffer,
        y: &TypedBuffer,
        out: &TypedBuffer,
    ) -> Result<Completion> {
        let len = conjugate_multiply_type([x.element_type(), y.element_type(), out.element_type()])
            .and_then(|()| check_binary(gpu, "conjugate_multiply", x, y, out))
            .inspect_err(|e| tracing::debug!(error = %e, "dispatch rejected"))?;
        Ok(self.dispatch_binary(gpu, Kernel::ConjugateMultiplyC64, x, y, out, len))
    }

    /// Set every element of `array` to `value`, converted to the buffer's
    /// element type first (see [`FillValue::coerce`]).
    ///
    /// # Errors
    /// `Error::UnsupportedType` for complex64 buffers; `Error::ShapeMismatch`
    /// if `array` exceeds the device's storage binding size.
    pub fn fill(&self, gpu: &GpuDevice, array: &TypedBuffer, value: f64) -> Result<Completion> {
        let value = FillValue::coerce(array.element_type(), value)
            .and_then(|v| array.check_binding(gpu, "fill").map(|()| v))
            .inspect_err(|e| tracing::debug!(error = %e, "dispatch rejected"))?;
        let kernel = value.kernel();
        let len = array.len();

        let params = ElementwiseParams::new(len, value.bits());
        let params_buf = self.params_buffer(gpu, &params);
        let bind_group = gpu.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("fill bind group"),
            layout: self.program.bind_group_layout(kernel),
            entries: &[
                wgpu::BindGroupEntry { binding: 2, resource: array.raw().as_entire_binding() },
                wgpu::BindGroupEntry { binding: 3, resource: params_buf.as_entire_binding() },
            ],
        });
        Ok(self.encode(gpu, kernel, &bind_group, len))
    }

    fn dispatch_binary(
        &self,
        gpu: &GpuDevice,
        kernel: Kernel,
        x: &TypedBuffer,
        y: &TypedBuffer,
        out: &TypedBuffer,
        len: usize,
    ) -> Completion {
        let params_buf = self.params_buffer(gpu, &ElementwiseParams::new(len, 0));
        let bind_group = gpu.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("elementwise bind group"),
            layout: self.program.bind_group_layout(kernel),
            entries: &[
                wgpu::BindGroupEntry { binding: 0, resource: x.raw().as_entire_binding() },
                wgpu::BindGroupEntry { binding: 1, resource: y.raw().as_entire_binding() },
                wgpu::BindGroupEntry { binding: 2, resource: out.raw().as_entire_binding() },
                wgpu::BindGroupEntry { binding: 3, resource: params_buf.as_entire_binding() },
            ],
        });
        self.encode(gpu, kernel, &bind_group, len)
    }

    fn params_buffer(&self, gpu: &GpuDevice, params: &ElementwiseParams) -> wgpu::Buffer {
        gpu.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("ElementwiseParams"),
            contents: bytemuck::bytes_of(params),
            usage: wgpu::BufferUsages::UNIFORM,
        })
    }

    /// Record one compute pass and submit it. Zero-length operands submit
    /// an empty command buffer so the caller still gets a handle.
    fn encode(
        &self,
        gpu: &GpuDevice,
        kernel: Kernel,
        bind_group: &wgpu::BindGroup,
        len: usize,
    ) -> Completion {
        let launch = LaunchGeometry::for_elementwise(len, self.program.workgroup_size());
        tracing::trace!(%kernel, len, workgroups = launch.workgroups, "elementwise dispatch");
        let mut encoder = gpu.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some(kernel.entry_point()),
        });
        if launch.workgroups > 0 {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some(kernel.entry_point()),
                timestamp_writes: None,
            });
            pass.set_pipeline(self.program.pipeline(kernel));
            pass.set_bind_group(0, bind_group, &[]);
            pass.dispatch_workgroups(launch.workgroups, 1, 1);
        }
        gpu.submit(encoder)
    }
}
