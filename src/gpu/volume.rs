// gpu/volume.rs — Source volumes resident on the GPU, and how they are sampled.
//
// `GpuVolume` is a single-channel R32Float 3-D texture. The rotation kernel
// reads it with `textureLoad` and does its own clamp-to-edge trilinear
// filtering, for two reasons:
//
//   - R32Float is not filterable in core WebGPU (hardware linear filtering
//     needs the FLOAT32_FILTERABLE feature, which many Vulkan drivers on
//     our targets do not expose);
//   - WGSL samplers only take normalised coordinates, while the kernel
//     works in voxel indices.
//
// `VolumeSampler` is therefore a small descriptor passed to the kernel in
// its params uniform rather than a `wgpu::Sampler`. Addressing is always
// clamp-to-edge and coordinates are always unnormalised; only the filter
// is selectable.
//
// UPLOAD LAYOUT
// ─────────────
// `copy_buffer_to_texture` needs `bytes_per_row` to be a multiple of 256.
// Each x-row of the host volume (nx × 4 bytes) is copied into a staging row
// padded to that alignment; `rows_per_image` is ny, one image per z-slice.

use wgpu::util::DeviceExt;

use crate::error::{Error, Result};
use crate::gpu::device::GpuDevice;
use crate::volume::{Filter, Volume};

/// wgpu row alignment for buffer↔texture copies.
const COPY_ALIGNMENT: u32 = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;

/// Sampling mode for the rotation kernel: clamp-to-edge addressing,
/// unnormalised coordinates, configurable filter (linear by default).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct VolumeSampler {
    pub filter: Filter,
}

impl VolumeSampler {
    pub const fn linear() -> Self {
        VolumeSampler { filter: Filter::Linear }
    }

    pub const fn nearest() -> Self {
        VolumeSampler { filter: Filter::Nearest }
    }

    /// Packed form read by the kernel: `[filter, addressing, normalized, 0]`.
    /// filter: 0 = linear, 1 = nearest. addressing: 0 = clamp-to-edge.
    pub(crate) fn packed(&self) -> [u32; 4] {
        let filter = match self.filter {
            Filter::Linear => 0,
            Filter::Nearest => 1,
        };
        [filter, 0, 0, 0]
    }
}

/// A scalar `f32` volume resident on the GPU as a 3-D texture.
///
/// Texture extent is `(nx, ny, nz)`; host shape is `[nz, ny, nx]`.
pub struct GpuVolume {
    pub texture: wgpu::Texture,
    pub view: wgpu::TextureView,
    shape: [usize; 3],
}

impl GpuVolume {
    /// Upload a host volume.
    ///
    /// The copy is submitted immediately and is ordered before anything
    /// submitted to the same queue afterwards.
    ///
    /// # Errors
    /// `Error::ShapeMismatch` if any dimension is zero or exceeds the
    /// device's `max_texture_dimension_3d`.
    pub fn upload(gpu: &GpuDevice, src: &Volume) -> Result<Self> {
        let [nz, ny, nx] = src.shape();
        let max = gpu.device.limits().max_texture_dimension_3d as usize;
        if src.shape().iter().any(|&d| d == 0 || d > max) {
            return Err(Error::ShapeMismatch(format!(
                "volume {:?} outside texture limits 1..={max}",
                src.shape()
            )));
        }
        let (width, height, depth) = (nx as u32, ny as u32, nz as u32);
        let extent = wgpu::Extent3d { width, height, depth_or_array_layers: depth };

        let texture = gpu.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("GpuVolume"),
            size: extent,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D3,
            format: wgpu::TextureFormat::R32Float,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());

        let bytes_per_row = align_to(width * 4, COPY_ALIGNMENT);
        let staging = stage_rows(src, bytes_per_row as usize);

        let staging_buf = gpu.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("GpuVolume::staging"),
            contents: &staging,
            usage: wgpu::BufferUsages::COPY_SRC,
        });

        let mut encoder = gpu.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("GpuVolume::upload"),
        });
        encoder.copy_buffer_to_texture(
            wgpu::ImageCopyBuffer {
                buffer: &staging_buf,
                layout: wgpu::ImageDataLayout {
                    offset: 0,
                    bytes_per_row: Some(bytes_per_row),
                    rows_per_image: Some(height),
                },
            },
            wgpu::ImageCopyTexture {
                texture: &texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            extent,
        );
        gpu.queue.submit(std::iter::once(encoder.finish()));

        tracing::trace!(shape = ?src.shape(), "volume uploaded");
        Ok(GpuVolume { texture, view, shape: src.shape() })
    }

    /// Host shape `[nz, ny, nx]`.
    pub fn shape(&self) -> [usize; 3] {
        self.shape
    }
}

/// Copy each x-row of `src` into a staging buffer whose rows are
/// `bytes_per_row` bytes apart (little-endian f32).
fn stage_rows(src: &Volume, bytes_per_row: usize) -> Vec<u8> {
    let [nz, ny, nx] = src.shape();
    let mut staging = vec![0u8; bytes_per_row * ny * nz];
    for (row, values) in src.as_slice().chunks_exact(nx).enumerate() {
        let dst = row * bytes_per_row;
        staging[dst..dst + nx * 4].copy_from_slice(bytemuck::cast_slice(values));
    }
    staging
}

/// Round `value` up to the next multiple of `alignment`.
#[inline]
pub(crate) fn align_to(value: u32, alignment: u32) -> u32 {
    value.div_ceil(alignment) * alignment
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpu::run_gpu_test_in_subprocess;

    #[test]
    fn test_align_to() {
        assert_eq!(align_to(0, 256), 0);
        assert_eq!(align_to(1, 256), 256);
        assert_eq!(align_to(256, 256), 256);
        assert_eq!(align_to(257, 256), 512);
        assert_eq!(align_to(640 * 4, 256), 2560);
    }

    #[test]
    fn test_stage_rows_pads_each_row() {
        // shape [2, 2, 3]: four x-rows of three floats.
        let v = Volume::from_fn([2, 2, 3], |x, y, z| (x + 3 * y + 6 * z) as f32);
        let bpr = align_to(3 * 4, 256) as usize;
        let staging = stage_rows(&v, bpr);
        assert_eq!(staging.len(), bpr * 4);

        for row in 0..4 {
            let expected: Vec<f32> = (0..3).map(|x| (row * 3 + x) as f32).collect();
            let expected: &[u8] = bytemuck::cast_slice(&expected);
            assert_eq!(&staging[row * bpr..row * bpr + 12], expected);
            // Padding stays zero.
            assert!(staging[row * bpr + 12..(row + 1) * bpr].iter().all(|&b| b == 0));
        }
    }

    #[test]
    fn test_sampler_packing() {
        assert_eq!(VolumeSampler::default(), VolumeSampler::linear());
        assert_eq!(VolumeSampler::linear().packed(), [0, 0, 0, 0]);
        assert_eq!(VolumeSampler::nearest().packed(), [1, 0, 0, 0]);
    }

    #[test]
    #[ignore = "GPU integration: run via outer subprocess wrapper"]
    fn inner_volume_upload() {
        let gpu = GpuDevice::new().expect("need Vulkan GPU");
        let v = Volume::from_fn([5, 7, 9], |x, y, z| (x * y + z) as f32);
        let gv = GpuVolume::upload(&gpu, &v).unwrap();
        assert_eq!(gv.shape(), [5, 7, 9]);
        assert_eq!(gv.texture.size().depth_or_array_layers, 5);

        assert!(matches!(
            GpuVolume::upload(&gpu, &Volume::new([0, 4, 4])),
            Err(Error::ShapeMismatch(_))
        ));
        println!("GPU_TEST_OK");
    }

    #[test]
    #[ignore = "requires a real Vulkan GPU"]
    fn test_volume_upload() {
        let out = run_gpu_test_in_subprocess("gpu::volume::tests::inner_volume_upload");
        assert!(out.contains("GPU_TEST_OK"), "inner test failed:\n{out}");
    }
}
