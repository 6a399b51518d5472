// gpu/buffer.rs — Device buffers with a fixed element type.
//
// A `TypedBuffer` is a plain STORAGE buffer plus the metadata the
// dispatchers check before launching anything: element type, element count
// and a logical shape. The type is set at creation and cannot change, which
// is what lets `ElementwiseDispatcher` reject mismatched operands without
// touching the device.
//
// ALLOCATION SIZE
// ───────────────
// wgpu rejects zero-sized storage bindings, so every buffer is allocated
// with at least `MIN_BUFFER_BYTES` even when it holds no elements. The
// kernels read the logical length from their params uniform, never from
// `arrayLength`, so the padding is never touched.
//
// BINDING CHECKS
// ──────────────
// wgpu treats both of these as validation errors at dispatch time, which
// the default error handler turns into a panic. The dispatchers run them
// up front instead:
//   - a buffer bound read-write may not also be bound read-only in the same
//     dispatch (`check_distinct`);
//   - a bound buffer may not exceed `max_storage_buffer_binding_size`
//     (`check_binding`).
//
// Upload and readback exist for tests, benches and callers without their
// own transfer path. Readback is synchronous and stalls the queue.

use crate::element::{Element, ElementType};
use crate::error::{Error, Result};
use crate::gpu::device::GpuDevice;

/// Smallest allocation, in bytes, for any buffer.
const MIN_BUFFER_BYTES: u64 = 16;

/// A device buffer holding `len` elements of one `ElementType`.
pub struct TypedBuffer {
    buffer: wgpu::Buffer,
    ty: ElementType,
    len: usize,
    shape: Vec<usize>,
}

impl TypedBuffer {
    /// Allocate a buffer and initialise it with `data`. Shape is 1-D.
    pub fn from_slice<T: Element>(gpu: &GpuDevice, data: &[T]) -> Self {
        let bytes: &[u8] = bytemuck::cast_slice(data);
        let buffer = gpu.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("TypedBuffer"),
            size: padded_size(bytes.len()),
            usage: storage_usage(),
            mapped_at_creation: true,
        });
        buffer.slice(..).get_mapped_range_mut()[..bytes.len()].copy_from_slice(bytes);
        buffer.unmap();

        TypedBuffer { buffer, ty: T::TYPE, len: data.len(), shape: vec![data.len()] }
    }

    /// Allocate a zero-initialised buffer of `len` elements.
    pub fn zeroed(gpu: &GpuDevice, ty: ElementType, len: usize) -> Self {
        // wgpu zero-initialises every buffer it creates.
        let buffer = gpu.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("TypedBuffer"),
            size: padded_size(len * ty.size_bytes()),
            usage: storage_usage(),
            mapped_at_creation: false,
        });
        TypedBuffer { buffer, ty, len, shape: vec![len] }
    }

    /// Reinterpret the elements with a new logical shape.
    ///
    /// # Errors
    /// `Error::ShapeMismatch` if the shape's product is not `len()`.
    pub fn with_shape(mut self, shape: &[usize]) -> Result<Self> {
        let n: usize = shape.iter().product();
        if n != self.len {
            return Err(Error::ShapeMismatch(format!(
                "shape {shape:?} holds {n} elements, buffer has {}",
                self.len
            )));
        }
        self.shape = shape.to_vec();
        Ok(self)
    }

    pub fn element_type(&self) -> ElementType {
        self.ty
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    /// Bytes of live element data (excludes allocation padding).
    pub fn size_bytes(&self) -> u64 {
        (self.len * self.ty.size_bytes()) as u64
    }

    /// The underlying wgpu buffer.
    pub fn raw(&self) -> &wgpu::Buffer {
        &self.buffer
    }

    /// Overwrite the contents with `data` through the queue. Ordered before
    /// any work submitted afterwards.
    ///
    /// # Errors
    /// `Error::UnsupportedType` if `T` is not this buffer's element type,
    /// `Error::LengthMismatch` if `data.len() != len()`.
    pub fn write<T: Element>(&self, gpu: &GpuDevice, data: &[T]) -> Result<()> {
        self.expect_type::<T>("write")?;
        if data.len() != self.len {
            return Err(Error::LengthMismatch { op: "write", lengths: vec![self.len, data.len()] });
        }
        if !data.is_empty() {
            gpu.queue.write_buffer(&self.buffer, 0, bytemuck::cast_slice(data));
        }
        Ok(())
    }

    /// Copy the buffer back to host memory.
    ///
    /// **Expensive and synchronous**: waits for every submission on the
    /// queue to finish. Use in tests, debugging and end-of-pipeline reads.
    ///
    /// # Errors
    /// `Error::UnsupportedType` if `T` is not this buffer's element type,
    /// `Error::Readback` if mapping fails.
    pub fn readback<T: Element>(&self, gpu: &GpuDevice) -> Result<Vec<T>> {
        self.expect_type::<T>("readback")?;
        if self.len == 0 {
            return Ok(Vec::new());
        }
        let size = self.size_bytes();

        let staging = gpu.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("TypedBuffer::readback"),
            size,
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let mut encoder = gpu.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("TypedBuffer::readback"),
        });
        encoder.copy_buffer_to_buffer(&self.buffer, 0, &staging, 0, size);
        gpu.queue.submit(std::iter::once(encoder.finish()));

        let slice = staging.slice(..);
        let (tx, rx) = std::sync::mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |r| {
            // The receiver outlives the poll below; a failed send means the
            // map was abandoned and recv() reports it.
            let _ = tx.send(r);
        });
        gpu.device.poll(wgpu::Maintain::Wait);
        rx.recv()
            .map_err(|_| Error::Readback("map callback never fired".to_string()))?
            .map_err(|e| Error::Readback(e.to_string()))?;

        let mapped = slice.get_mapped_range();
        let out: Vec<T> = bytemuck::cast_slice(&mapped[..]).to_vec();
        drop(mapped);
        staging.unmap();
        Ok(out)
    }

    /// Whether both handles refer to the same device allocation.
    pub(crate) fn aliases(&self, other: &TypedBuffer) -> bool {
        self.buffer.global_id() == other.buffer.global_id()
    }

    /// Fail unless this buffer fits in one storage binding on `gpu`.
    pub(crate) fn check_binding(&self, gpu: &GpuDevice, op: &'static str) -> Result<()> {
        let limit = gpu.device.limits().max_storage_buffer_binding_size;
        check_binding_size(op, self.buffer.size(), u64::from(limit))
    }

    fn expect_type<T: Element>(&self, op: &'static str) -> Result<()> {
        if T::TYPE != self.ty {
            return Err(Error::UnsupportedType { op, found: vec![self.ty, T::TYPE] });
        }
        Ok(())
    }
}

/// Fail if `out` is the same allocation as any of `inputs`.
pub(crate) fn check_distinct(
    op: &'static str,
    out: &TypedBuffer,
    inputs: &[&TypedBuffer],
) -> Result<()> {
    if inputs.iter().any(|b| b.aliases(out)) {
        return Err(Error::AliasedOperands { op });
    }
    Ok(())
}

fn check_binding_size(op: &'static str, bytes: u64, limit: u64) -> Result<()> {
    if bytes > limit {
        return Err(Error::ShapeMismatch(format!(
            "{op}: buffer of {bytes} bytes exceeds the {limit}-byte storage binding limit"
        )));
    }
    Ok(())
}

fn storage_usage() -> wgpu::BufferUsages {
    wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_SRC | wgpu::BufferUsages::COPY_DST
}

/// Allocation size for `bytes` of payload: at least `MIN_BUFFER_BYTES`,
/// rounded up to `wgpu::COPY_BUFFER_ALIGNMENT`.
fn padded_size(bytes: usize) -> u64 {
    let align = wgpu::COPY_BUFFER_ALIGNMENT;
    (bytes as u64).max(MIN_BUFFER_BYTES).div_ceil(align) * align
}
