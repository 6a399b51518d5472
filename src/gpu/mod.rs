// gpu/mod.rs — wgpu dispatch layer.
//
// Each kernel module here has a CPU counterpart in the parent crate that
// remains the authoritative reference; the GPU tests compare against it
// element by element.
//
//   device      — adapter/device/queue, profiles, launch geometry
//   program     — compiles every kernel once per device (KernelProgram)
//   buffer      — typed device buffers (TypedBuffer)
//   volume      — 3-D source textures and their sampler (GpuVolume)
//   elementwise — multiply / conjugate_multiply / fill dispatch
//   rotate      — 3-D backward resampling dispatch
//
// Every dispatch returns a `Completion` without blocking; nothing in this
// module waits on the device except the explicit readback helpers.

pub mod buffer;
pub mod device;
pub mod elementwise;
pub mod program;
pub mod rotate;
pub mod volume;

// ---- GPU test harness (subprocess isolation) ---------------------------------
//
// Some Vulkan drivers (Mesa's D3D12 translation layer in particular) crash
// with SIGSEGV during process exit once any Vulkan device has been created
// in the process. The crash is in the driver's own cleanup and cannot be
// avoided by drop order.
//
// Each GPU test therefore comes in two halves: an `inner_*` test marked
// `#[ignore]` that does the real work and prints "GPU_TEST_OK" on success, and
// an outer `test_*` wrapper that runs the inner one in a child `cargo test`
// and checks for the token instead of the exit status.

/// Spawn a child `cargo test` process running a single named test with
/// `--nocapture`. Returns the combined stdout+stderr.
#[cfg(test)]
pub(crate) fn run_gpu_test_in_subprocess(test_name: &str) -> String {
    let output = std::process::Command::new("cargo")
        .args([
            "test", "--lib", "--",
            test_name, "--exact", "--ignored", "--nocapture",
        ])
        .output()
        .unwrap_or_else(|e| panic!("failed to spawn subprocess for {test_name}: {e}"));

    let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
    let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
    print!("{stdout}");
    eprint!("{stderr}");
    stdout + &stderr
}
