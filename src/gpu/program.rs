// gpu/program.rs — The compiled kernel program.
//
// Every kernel this crate dispatches is compiled here, once per device, when
// `KernelProgram::build` runs. Dispatchers borrow the program; they never
// compile anything themselves.
//
// SOURCES
// ───────
//   elementwise_f32.wgsl  multiply_f32, set_to_f
//   elementwise_i32.wgsl  multiply_int32, set_to_i
//   elementwise_c64.wgsl  c_conj_multiply
//   rotate.wgsl           rotate_image3d
//
// The elementwise modules declare identical bindings over different element
// types, which is why they are separate modules rather than one file.
//
// naga does not accept `override` expressions inside @workgroup_size(), so
// the size is baked into the source by replacing the `{{WG_SIZE}}` token.
// That substitution is the only thing that varies between builds.
//
// ALL-OR-NOTHING BUILD
// ────────────────────
// wgpu reports shader and pipeline validation failures through the device's
// error sink, not as return values. The whole build runs inside a validation
// error scope; if the scope captures anything, the modules and pipelines
// created so far are dropped and `Error::Compile` is returned.

use std::fmt;

use crate::error::{Error, Result};
use crate::gpu::device::GpuDevice;

/// Every entry point in the program.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Kernel {
    MultiplyF32,
    MultiplyI32,
    ConjugateMultiplyC64,
    FillF32,
    FillI32,
    RotateImage3d,
}

impl Kernel {
    pub const ALL: [Kernel; 6] = [
        Kernel::MultiplyF32,
        Kernel::MultiplyI32,
        Kernel::ConjugateMultiplyC64,
        Kernel::FillF32,
        Kernel::FillI32,
        Kernel::RotateImage3d,
    ];

    /// WGSL entry-point name.
    pub const fn entry_point(self) -> &'static str {
        match self {
            Kernel::MultiplyF32 => "multiply_f32",
            Kernel::MultiplyI32 => "multiply_int32",
            Kernel::ConjugateMultiplyC64 => "c_conj_multiply",
            Kernel::FillF32 => "set_to_f",
            Kernel::FillI32 => "set_to_i",
            Kernel::RotateImage3d => "rotate_image3d",
        }
    }

    fn source(self) -> Source {
        match self {
            Kernel::MultiplyF32 | Kernel::FillF32 => Source::ElementwiseF32,
            Kernel::MultiplyI32 | Kernel::FillI32 => Source::ElementwiseI32,
            Kernel::ConjugateMultiplyC64 => Source::ElementwiseC64,
            Kernel::RotateImage3d => Source::Rotate,
        }
    }

    fn layout(self) -> Layout {
        match self {
            Kernel::MultiplyF32 | Kernel::MultiplyI32 | Kernel::ConjugateMultiplyC64 => {
                Layout::Binary
            }
            Kernel::FillF32 | Kernel::FillI32 => Layout::Fill,
            Kernel::RotateImage3d => Layout::Rotate,
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Kernel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.entry_point())
    }
}

/// One WGSL file. Discriminants index `Source::ALL`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Source {
    ElementwiseF32,
    ElementwiseI32,
    ElementwiseC64,
    Rotate,
}

impl Source {
    const ALL: [Source; 4] =
        [Source::ElementwiseF32, Source::ElementwiseI32, Source::ElementwiseC64, Source::Rotate];

    fn label(self) -> &'static str {
        match self {
            Source::ElementwiseF32 => "elementwise_f32.wgsl",
            Source::ElementwiseI32 => "elementwise_i32.wgsl",
            Source::ElementwiseC64 => "elementwise_c64.wgsl",
            Source::Rotate => "rotate.wgsl",
        }
    }

    fn template(self) -> &'static str {
        match self {
            Source::ElementwiseF32 => include_str!("../shaders/elementwise_f32.wgsl"),
            Source::ElementwiseI32 => include_str!("../shaders/elementwise_i32.wgsl"),
            Source::ElementwiseC64 => include_str!("../shaders/elementwise_c64.wgsl"),
            Source::Rotate => include_str!("../shaders/rotate.wgsl"),
        }
    }
}

/// Bind group layouts shared between entry points.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Layout {
    /// 0: x, 1: y (read-only storage), 2: out (read_write), 3: params.
    Binary,
    /// 2: out (read_write), 3: params. Same binding numbers as `Binary`.
    Fill,
    /// 0: texture_3d<f32>, 1: out (read_write), 2: params.
    Rotate,
}

/// Substitute the workgroup size into a WGSL template.
fn specialise(template: &str, workgroup_size: u32) -> String {
    template.replace("{{WG_SIZE}}", &workgroup_size.to_string())
}

/// All compute pipelines for one device, built together.
///
/// Must only be used with the `GpuDevice` it was built on. Holds no
/// reference to it, so it can be stored next to the device.
pub struct KernelProgram {
    pipelines: Vec<wgpu::ComputePipeline>,
    binary_bgl: wgpu::BindGroupLayout,
    fill_bgl: wgpu::BindGroupLayout,
    rotate_bgl: wgpu::BindGroupLayout,
    workgroup_size: u32,
}

impl KernelProgram {
    /// Compile every kernel source and create one pipeline per entry point.
    ///
    /// Blocks until the device has validated the shaders.
    ///
    /// # Errors
    /// `Error::Compile` if any module or pipeline fails validation. Nothing
    /// partial is returned.
    pub fn build(gpu: &GpuDevice) -> Result<Self> {
        let workgroup_size = gpu.workgroup_size.total();
        let device = &gpu.device;

        device.push_error_scope(wgpu::ErrorFilter::Validation);

        let modules: Vec<wgpu::ShaderModule> = Source::ALL
            .iter()
            .map(|&src| {
                device.create_shader_module(wgpu::ShaderModuleDescriptor {
                    label: Some(src.label()),
                    source: wgpu::ShaderSource::Wgsl(
                        specialise(src.template(), workgroup_size).into(),
                    ),
                })
            })
            .collect();

        let binary_bgl = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("elementwise binary BGL"),
            entries: &[
                storage_entry(0, true),
                storage_entry(1, true),
                storage_entry(2, false),
                uniform_entry(3),
            ],
        });

        let fill_bgl = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("elementwise fill BGL"),
            entries: &[storage_entry(2, false), uniform_entry(3)],
        });

        let rotate_bgl = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("rotate BGL"),
            entries: &[
                // Binding 0 — source volume, read with textureLoad
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::Texture {
                        multisampled: false,
                        view_dimension: wgpu::TextureViewDimension::D3,
                        sample_type: wgpu::TextureSampleType::Float { filterable: false },
                    },
                    count: None,
                },
                storage_entry(1, false),
                uniform_entry(2),
            ],
        });

        let layout_for = |label: &str, bgl: &wgpu::BindGroupLayout| {
            device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some(label),
                bind_group_layouts: &[bgl],
                push_constant_ranges: &[],
            })
        };
        let binary_layout = layout_for("elementwise binary layout", &binary_bgl);
        let fill_layout = layout_for("elementwise fill layout", &fill_bgl);
        let rotate_layout = layout_for("rotate layout", &rotate_bgl);

        let pipelines: Vec<wgpu::ComputePipeline> = Kernel::ALL
            .iter()
            .map(|&kernel| {
                let layout = match kernel.layout() {
                    Layout::Binary => &binary_layout,
                    Layout::Fill => &fill_layout,
                    Layout::Rotate => &rotate_layout,
                };
                device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
                    label: Some(kernel.entry_point()),
                    layout: Some(layout),
                    module: &modules[kernel.source() as usize],
                    entry_point: kernel.entry_point(),
                    compilation_options: wgpu::PipelineCompilationOptions::default(),
                    cache: None,
                })
            })
            .collect();

        if let Some(err) = pollster::block_on(device.pop_error_scope()) {
            let message = err.to_string();
            tracing::error!(%message, "kernel program failed to build");
            return Err(Error::Compile { label: "KernelProgram", message });
        }

        tracing::info!(
            workgroup_size,
            kernels = Kernel::ALL.len(),
            "kernel program built"
        );

        Ok(KernelProgram { pipelines, binary_bgl, fill_bgl, rotate_bgl, workgroup_size })
    }

    /// Names of every compiled entry point, in `Kernel::ALL` order.
    pub fn entry_points(&self) -> Vec<&'static str> {
        Kernel::ALL.iter().map(|k| k.entry_point()).collect()
    }

    /// Invocations per workgroup baked into every kernel.
    pub fn workgroup_size(&self) -> u32 {
        self.workgroup_size
    }

    pub(crate) fn pipeline(&self, kernel: Kernel) -> &wgpu::ComputePipeline {
        &self.pipelines[kernel.index()]
    }

    pub(crate) fn bind_group_layout(&self, kernel: Kernel) -> &wgpu::BindGroupLayout {
        match kernel.layout() {
            Layout::Binary => &self.binary_bgl,
            Layout::Fill => &self.fill_bgl,
            Layout::Rotate => &self.rotate_bgl,
        }
    }
}

fn storage_entry(binding: u32, read_only: bool) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::COMPUTE,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Storage { read_only },
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

fn uniform_entry(binding: u32) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::COMPUTE,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Uniform,
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}
