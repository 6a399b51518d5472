// gpu/rotate.rs — 3-D volume rotation on the GPU.
//
// Mirrors the CPU `rotate::rotate` in rotate.rs. For every output voxel p the
// kernel samples the source volume at
//
//     q = R⁻¹ · (p − c) + c
//
// so the host's job is to invert R, pack the kernel arguments and choose the
// launch size. That work is split out as `RotationPlan`, which needs no
// device and is what the unit tests below exercise.
//
//
// LAUNCH SIZE
// ───────────
// The rotation launch is sized from the device, not from the volume:
// `compute_units × 16 × 8` work-items, each walking the flat output with
// that stride. Two volumes of different shapes on the same device get the
// same launch.
//
//
// PARAMS UNIFORM
// ──────────────
// Layout must match `RotateParams` in `rotate.wgsl`:
//   offset   0: sampler    (vec4<u32>)   filter, addressing, normalized, 0
//   offset  16: inv_rot    (4 × vec4<f32>) row-major homogeneous inverse
//   offset  80: center     (vec4<f32>)   cx, cy, cz, 0
//   offset  96: shape      (vec4<i32>)   d0, d1, d2, d0·d1·d2
//   offset 112: work_items (u32)
//   offset 116: _pad       (3 × u32)
//   total:  128 bytes

use wgpu::util::DeviceExt;

use crate::element::ElementType;
use crate::error::{Error, Result};
use crate::gpu::buffer::TypedBuffer;
use crate::gpu::device::{Completion, GpuDevice, LaunchGeometry};
use crate::gpu::program::{Kernel, KernelProgram};
use crate::gpu::volume::{GpuVolume, VolumeSampler};
use crate::transform::{pack_center, pack_shape, RotationMatrix};

/// Arguments of `rotate_image3d`, in uniform-buffer layout.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct RotateParams {
    pub sampler: [u32; 4],
    pub inv_rot: [f32; 16],
    pub center: [f32; 4],
    pub shape: [i32; 4],
    pub work_items: u32,
    _pad: [u32; 3],
}

/// Everything the rotation kernel needs apart from the buffers: packed
/// arguments and launch geometry.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RotationPlan {
    pub params: RotateParams,
    pub launch: LaunchGeometry,
}

impl RotationPlan {
    /// Plan a rotation of an output grid `shape = [nz, ny, nx]` by `matrix`
    /// about `center = (x, y, z)`, linear sampling.
    ///
    /// # Errors
    /// `Error::SingularMatrix` if `matrix` has no stable inverse,
    /// `Error::ShapeMismatch` if the voxel count exceeds `i32::MAX`,
    /// `Error::InvalidComputeUnits` if `compute_units` is zero.
    pub fn new(
        matrix: &RotationMatrix,
        center: [f32; 3],
        shape: [usize; 3],
        compute_units: u32,
        workgroup_size: u32,
    ) -> Result<Self> {
        if compute_units == 0 {
            return Err(Error::InvalidComputeUnits);
        }
        let inverse = matrix.inverse()?;
        let launch = LaunchGeometry::for_rotation(compute_units, workgroup_size);
        let params = RotateParams {
            sampler: VolumeSampler::default().packed(),
            inv_rot: inverse.to_homogeneous16(),
            center: pack_center(center),
            shape: pack_shape(shape)?,
            work_items: launch.work_items,
            _pad: [0; 3],
        };
        Ok(RotationPlan { params, launch })
    }

    /// Same plan with a different sampler.
    pub fn with_sampler(mut self, sampler: VolumeSampler) -> Self {
        self.params.sampler = sampler.packed();
        self
    }
}

/// Launches the rotation kernel of a [`KernelProgram`].
pub struct VolumeRotator<'p> {
    program: &'p KernelProgram,
}

impl<'p> VolumeRotator<'p> {
    pub fn new(program: &'p KernelProgram) -> Self {
        VolumeRotator { program }
    }

    /// Resample `volume` into `output`, rotated by `rotation_matrix` about
    /// `center` (voxel coordinates, x/y/z order).
    ///
    /// `output` must be float32 with a 3-D shape `[nz, ny, nx]`; it may
    /// differ from the volume's shape. Out-of-range source coordinates are
    /// clamped to the nearest edge voxel.
    ///
    /// # Errors
    /// `Error::UnsupportedType` if `output` is not float32,
    /// `Error::ShapeMismatch` if `output` is not 3-D, has too many voxels or
    /// exceeds the device's storage binding size,
    /// `Error::SingularMatrix` if `rotation_matrix` cannot be inverted.
    pub fn rotate(
        &self,
        gpu: &GpuDevice,
        sampler: VolumeSampler,
        volume: &GpuVolume,
        rotation_matrix: &RotationMatrix,
        output: &TypedBuffer,
        center: [f32; 3],
    ) -> Result<Completion> {
        let (shape, plan) = self
            .plan(gpu, sampler, rotation_matrix, output, center)
            .inspect_err(|e| tracing::debug!(error = %e, "rotate rejected"))?;

        tracing::debug!(
            src = ?volume.shape(),
            dst = ?shape,
            work_items = plan.launch.work_items,
            workgroups = plan.launch.workgroups,
            "rotate dispatch"
        );

        let params_buf = gpu.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("RotateParams"),
            contents: bytemuck::bytes_of(&plan.params),
            usage: wgpu::BufferUsages::UNIFORM,
        });

        let kernel = Kernel::RotateImage3d;
        let bind_group = gpu.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("rotate bind group"),
            layout: self.program.bind_group_layout(kernel),
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&volume.view),
                },
                wgpu::BindGroupEntry { binding: 1, resource: output.raw().as_entire_binding() },
                wgpu::BindGroupEntry { binding: 2, resource: params_buf.as_entire_binding() },
            ],
        });

        let mut encoder = gpu.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("VolumeRotator::rotate"),
        });
        {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some(kernel.entry_point()),
                timestamp_writes: None,
            });
            pass.set_pipeline(self.program.pipeline(kernel));
            pass.set_bind_group(0, &bind_group, &[]);
            pass.dispatch_workgroups(plan.launch.workgroups, 1, 1);
        }
        Ok(gpu.submit(encoder))
    }

    fn plan(
        &self,
        gpu: &GpuDevice,
        sampler: VolumeSampler,
        rotation_matrix: &RotationMatrix,
        output: &TypedBuffer,
        center: [f32; 3],
    ) -> Result<([usize; 3], RotationPlan)> {
        if output.element_type() != ElementType::F32 {
            return Err(Error::UnsupportedType { op: "rotate", found: vec![output.element_type()] });
        }
        let shape: [usize; 3] = output.shape().try_into().map_err(|_| {
            Error::ShapeMismatch(format!("rotate output must be 3-D, got {:?}", output.shape()))
        })?;
        output.check_binding(gpu, "rotate")?;
        let plan = RotationPlan::new(
            rotation_matrix,
            center,
            shape,
            gpu.compute_units(),
            self.program.workgroup_size(),
        )?;
        Ok((shape, plan.with_sampler(sampler)))
    }
}
