// gpu/device.rs — wgpu device abstraction.
//
// Responsibilities:
//   - Enumerate Vulkan adapters and select the first non-CPU one.
//   - Expose a `DeviceProfile` for simulating hardware limits on a
//     development machine (e.g., cap invocations to match Raspberry Pi).
//   - Provide `WorkgroupSize`, validated against the active profile and
//     baked into every kernel when the program is built.
//   - Own the compute-unit count that sizes the rotation launch, and turn
//     it into `LaunchGeometry`.
//   - Hand out `Completion` handles for submitted work.
//
// ADAPTER SELECTION:
// wgpu's default `request_adapter` uses power preference heuristics that
// may pick a software rasteriser (llvmpipe, softpipe) when one is
// installed alongside the GPU driver. We enumerate explicitly and prefer
// real hardware.
//
// DEVICE LIMITS:
// Non-Native profiles request *lower* limits than the hardware supports.
// wgpu validates every dispatch against the requested limits, so a fit that
// would not run on a Raspberry Pi fails the same way on any other GPU.
//
// A `Native` request on a VideoCore (V3D) adapter is promoted to the
// `RaspberryPi` profile; see `profile_for_adapter`.
//
// COMPUTE UNITS:
// wgpu exposes no compute-unit (SM / CU) count for an adapter.
// The count is taken from `DeviceConfig::compute_units` when given,
// otherwise estimated from the adapter type (see `default_compute_units`).
// It only affects how many invocations the rotation kernel launches, never
// correctness: the kernel strides over every voxel regardless.

use std::fmt;

use crate::error::{Error, Result};

/// Work-items launched per compute unit by the rotation kernel (16 × 8).
pub const ROTATION_ITEMS_PER_COMPUTE_UNIT: u32 = 16 * 8;

/// Upper bound on workgroups for one elementwise dispatch. wgpu's default
/// `max_compute_workgroups_per_dimension`; larger buffers are covered by
/// the kernels' grid-stride loop.
pub const MAX_WORKGROUPS: u32 = 65_535;

/// Hardware profile controlling device limits and default workgroup sizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeviceProfile {
    /// Use the adapter's actual hardware limits. No artificial caps.
    #[default]
    Native,
    /// Simulate Raspberry Pi 4/5 (Broadcom VideoCore VI/VII, V3DV Vulkan).
    /// Caps `max_compute_invocations_per_workgroup` to 256.
    RaspberryPi,
}

impl fmt::Display for DeviceProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceProfile::Native => write!(f, "Native"),
            DeviceProfile::RaspberryPi => write!(f, "RaspberryPi (simulated limits)"),
        }
    }
}

/// Device creation options.
#[derive(Debug, Clone, Copy, Default)]
pub struct DeviceConfig {
    pub profile: DeviceProfile,
    /// Override the estimated compute-unit count. Must be ≥ 1.
    pub compute_units: Option<u32>,
}

/// A workgroup size configuration.
///
/// All kernels in this crate are 1-D and use `total()` invocations per
/// workgroup; the 2-D split is kept so the size reads the same way the
/// hardware limits are documented.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkgroupSize {
    pub x: u32,
    pub y: u32,
}

impl WorkgroupSize {
    /// Total invocations per workgroup (x * y).
    pub fn total(&self) -> u32 {
        self.x * self.y
    }

    /// Select a validated default workgroup size for the given profile.
    ///
    /// - `Native` (NVIDIA/AMD): 16×8 = 128 invocations, 4 warps or 2 waves.
    /// - `RaspberryPi`: 8×8 = 64 invocations, well inside the V3DV limit.
    pub(crate) fn for_profile(profile: DeviceProfile) -> Self {
        match profile {
            DeviceProfile::Native => WorkgroupSize { x: 16, y: 8 },
            DeviceProfile::RaspberryPi => WorkgroupSize { x: 8, y: 8 },
        }
    }
}

impl fmt::Display for WorkgroupSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}×{} ({} invocations)", self.x, self.y, self.total())
    }
}

/// How many invocations a 1-D dispatch launches.
///
/// `work_items` is the number of invocations that do work; any extra
/// invocations in the last workgroup exit immediately.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LaunchGeometry {
    pub work_items: u32,
    pub workgroup_size: u32,
    pub workgroups: u32,
}

impl LaunchGeometry {
    /// Rotation launch: `compute_units × 128` work-items, whatever the
    /// volume size. The kernel covers every voxel with a strided loop.
    pub fn for_rotation(compute_units: u32, workgroup_size: u32) -> Self {
        let work_items = compute_units.saturating_mul(ROTATION_ITEMS_PER_COMPUTE_UNIT);
        LaunchGeometry {
            work_items,
            workgroup_size,
            workgroups: work_items.div_ceil(workgroup_size),
        }
    }

    /// Elementwise launch: one invocation per element, capped at
    /// `MAX_WORKGROUPS` workgroups.
    pub fn for_elementwise(len: usize, workgroup_size: u32) -> Self {
        let wg = workgroup_size as usize;
        let workgroups = len.div_ceil(wg).min(MAX_WORKGROUPS as usize) as u32;
        LaunchGeometry {
            work_items: workgroups * workgroup_size,
            workgroup_size,
            workgroups,
        }
    }
}

/// Cached adapter information for logging and debugging.
#[derive(Debug, Clone)]
pub struct AdapterInfo {
    pub name: String,
    pub vendor: u32,
    pub device: u32,
    pub device_type: wgpu::DeviceType,
    pub backend: wgpu::Backend,
}

impl fmt::Display for AdapterInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({:?}, {:?})", self.name, self.backend, self.device_type)
    }
}

/// Handle to work submitted on the device queue.
///
/// Dropping it does not cancel anything; the work still runs. Call
/// [`Completion::wait`] before reading an output buffer on the host or
/// handing it to work that is not ordered after this submission.
#[must_use = "wait on the completion before reading the output"]
#[derive(Debug)]
pub struct Completion {
    index: wgpu::SubmissionIndex,
}

impl Completion {
    /// Block until the submission has finished executing.
    pub fn wait(self, gpu: &GpuDevice) {
        gpu.device.poll(wgpu::Maintain::WaitForSubmissionIndex(self.index));
    }
}

/// The core GPU context: adapter, device, queue, and active profile.
///
/// Hold one `GpuDevice` for the lifetime of the application — it is
/// expensive to create (Vulkan instance + device initialization).
///
/// # Field drop order
/// Rust drops struct fields in declaration order. `_instance` is declared
/// last so the `wgpu::Instance` outlives `device` and `queue`. Some Vulkan
/// layers (the D3D12 translation layer among them) crash when the instance
/// is destroyed while device-level objects still reference it.
pub struct GpuDevice {
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
    pub profile: DeviceProfile,
    pub adapter_info: AdapterInfo,
    pub workgroup_size: WorkgroupSize,
    compute_units: u32,
    _instance: wgpu::Instance,
}

impl GpuDevice {
    /// Create a `GpuDevice` on the best Vulkan adapter with the `Native`
    /// profile.
    ///
    /// # Errors
    /// `Error::NoSuitableAdapter` or `Error::DeviceRequest`.
    pub fn new() -> Result<Self> {
        Self::new_with_config(DeviceConfig::default())
    }

    /// Create a `GpuDevice` with an explicit hardware profile.
    pub fn new_with_profile(profile: DeviceProfile) -> Result<Self> {
        Self::new_with_config(DeviceConfig { profile, ..DeviceConfig::default() })
    }

    pub fn new_with_config(config: DeviceConfig) -> Result<Self> {
        if config.compute_units == Some(0) {
            return Err(Error::InvalidComputeUnits);
        }
        pollster::block_on(Self::init_async(config))
    }

    async fn init_async(config: DeviceConfig) -> Result<Self> {
        // Validation layer in debug builds for shader error feedback.
        // ALLOW_UNDERLYING_NONCOMPLIANT_ADAPTER admits translation layers
        // that are not fully Vulkan-conformant.
        let flags = if cfg!(debug_assertions) {
            wgpu::InstanceFlags::VALIDATION
                | wgpu::InstanceFlags::ALLOW_UNDERLYING_NONCOMPLIANT_ADAPTER
        } else {
            wgpu::InstanceFlags::ALLOW_UNDERLYING_NONCOMPLIANT_ADAPTER
        };

        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends: wgpu::Backends::VULKAN,
            flags,
            ..Default::default()
        });

        let all_adapters: Vec<wgpu::Adapter> = instance
            .enumerate_adapters(wgpu::Backends::VULKAN)
            .into_iter()
            .collect();

        if all_adapters.is_empty() {
            return Err(Error::NoSuitableAdapter);
        }

        for a in &all_adapters {
            let info = a.get_info();
            tracing::debug!(
                name = %info.name,
                backend = ?info.backend,
                device_type = ?info.device_type,
                "Vulkan adapter"
            );
        }

        // Prefer real or virtual hardware; fall back to whatever exists
        // (translation layers sometimes report DeviceType::Cpu).
        let adapter = all_adapters
            .into_iter()
            .find(|a| {
                matches!(
                    a.get_info().device_type,
                    wgpu::DeviceType::DiscreteGpu
                        | wgpu::DeviceType::IntegratedGpu
                        | wgpu::DeviceType::VirtualGpu
                        | wgpu::DeviceType::Other
                )
            })
            .or_else(|| {
                instance
                    .enumerate_adapters(wgpu::Backends::VULKAN)
                    .into_iter()
                    .next()
            })
            .ok_or(Error::NoSuitableAdapter)?;

        let raw_info = adapter.get_info();
        let adapter_info = AdapterInfo {
            name: raw_info.name.clone(),
            vendor: raw_info.vendor,
            device: raw_info.device,
            device_type: raw_info.device_type,
            backend: raw_info.backend,
        };

        let profile = profile_for_adapter(config.profile, &raw_info.name);
        if profile != config.profile {
            tracing::info!(
                adapter = %raw_info.name,
                requested = %config.profile,
                %profile,
                "profile limits applied for adapter"
            );
        }

        let limits = limits_for_profile(profile);

        let (device, queue): (wgpu::Device, wgpu::Queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("volfit-kernels"),
                    required_features: wgpu::Features::empty(),
                    required_limits: limits,
                    memory_hints: wgpu::MemoryHints::default(),
                },
                None,
            )
            .await?;

        let compute_units = config
            .compute_units
            .unwrap_or_else(|| default_compute_units(adapter_info.device_type, profile));
        let workgroup_size = WorkgroupSize::for_profile(profile);

        tracing::info!(
            adapter = %adapter_info,
            %profile,
            %workgroup_size,
            compute_units,
            "GPU device ready"
        );

        Ok(GpuDevice {
            device,
            queue,
            profile,
            adapter_info,
            workgroup_size,
            compute_units,
            _instance: instance,
        })
    }

    /// Override the default workgroup size, validating against the active
    /// profile. Only affects programs built afterwards.
    pub fn set_workgroup_size(&mut self, x: u32, y: u32) -> Result<()> {
        let total = x * y;
        let max = max_invocations_for_profile(self.profile);
        if total == 0 || total > max {
            return Err(Error::InvalidWorkgroupSize { total, max });
        }
        self.workgroup_size = WorkgroupSize { x, y };
        Ok(())
    }

    /// Compute-unit count used to size the rotation launch.
    pub fn compute_units(&self) -> u32 {
        self.compute_units
    }

    pub fn set_compute_units(&mut self, compute_units: u32) -> Result<()> {
        if compute_units == 0 {
            return Err(Error::InvalidComputeUnits);
        }
        self.compute_units = compute_units;
        Ok(())
    }

    /// Launch geometry of the rotation kernel on this device.
    pub fn rotation_launch(&self) -> LaunchGeometry {
        LaunchGeometry::for_rotation(self.compute_units, self.workgroup_size.total())
    }

    /// Launch geometry of an elementwise kernel over `len` elements.
    pub fn elementwise_launch(&self, len: usize) -> LaunchGeometry {
        LaunchGeometry::for_elementwise(len, self.workgroup_size.total())
    }

    /// Submit one command buffer and return its completion handle.
    pub(crate) fn submit(&self, encoder: wgpu::CommandEncoder) -> Completion {
        let index = self.queue.submit(std::iter::once(encoder.finish()));
        Completion { index }
    }
}

impl fmt::Display for GpuDevice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "GpuDevice {{ adapter: {}, profile: {}, workgroup: {}, compute units: {} }}",
            self.adapter_info, self.profile, self.workgroup_size, self.compute_units
        )
    }
}

// ============================================================
// Limits helpers
// ============================================================

/// Estimated compute units for an adapter wgpu cannot query.
pub fn default_compute_units(device_type: wgpu::DeviceType, profile: DeviceProfile) -> u32 {
    if profile == DeviceProfile::RaspberryPi {
        return 8;
    }
    match device_type {
        wgpu::DeviceType::DiscreteGpu => 32,
        wgpu::DeviceType::IntegratedGpu | wgpu::DeviceType::VirtualGpu => 8,
        wgpu::DeviceType::Other | wgpu::DeviceType::Cpu => 4,
    }
}

/// Profile actually used on an adapter. VideoCore GPUs cannot meet the
/// `Native` limits, so a `Native` request on one gets the `RaspberryPi`
/// caps; explicit profiles are kept.
fn profile_for_adapter(requested: DeviceProfile, adapter_name: &str) -> DeviceProfile {
    match requested {
        DeviceProfile::Native if adapter_name.to_ascii_lowercase().contains("v3d") => {
            DeviceProfile::RaspberryPi
        }
        other => other,
    }
}

/// Build wgpu limits for the given profile.
fn limits_for_profile(profile: DeviceProfile) -> wgpu::Limits {
    match profile {
        DeviceProfile::Native => wgpu::Limits::default(),

        DeviceProfile::RaspberryPi => wgpu::Limits {
            // VideoCore VI/VII: vulkaninfo reports 256 max invocations.
            max_compute_invocations_per_workgroup: 256,
            max_compute_workgroup_size_x: 256,
            max_compute_workgroup_size_y: 256,
            max_compute_workgroup_size_z: 64,
            // Largest density map `GpuVolume::upload` accepts: 512 voxels
            // per axis, the V3DV 3-D image limit.
            max_texture_dimension_3d: 512,
            // Largest `TypedBuffer` a kernel may bind: 128 MiB.
            max_storage_buffer_binding_size: 128 << 20,
            ..wgpu::Limits::default()
        },
    }
}

/// Maximum compute invocations per workgroup for the given profile.
fn max_invocations_for_profile(profile: DeviceProfile) -> u32 {
    match profile {
        DeviceProfile::Native => wgpu::Limits::default().max_compute_invocations_per_workgroup,
        DeviceProfile::RaspberryPi => 256,
    }
}

// ============================================================
// Tests
// ============================================================
