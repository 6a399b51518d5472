// benches/benchmarks.rs -- CPU reference benchmarks.
//
//   cargo bench --bench benchmarks
//
// Baselines for the GPU numbers in gpu_benchmarks.rs. The grid sizes are
// the ones a density fit typically searches over.

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};

use volfit_kernels::elementwise::{conjugate_multiply, fill, multiply_f32};
use volfit_kernels::rotate::rotate;
use volfit_kernels::transform::grid_center;
use volfit_kernels::{Complex32, Filter, RotationMatrix, Volume};

// ============================================================
// Helpers
// ============================================================

/// Two off-centre Gaussians, enough structure that sampling is not trivial.
fn make_density(n: usize) -> Volume {
    let c = grid_center([n, n, n]);
    let w = n as f32 / 6.0;
    Volume::from_fn([n, n, n], |x, y, z| {
        let (dx, dy, dz) = (x as f32 - c[0], y as f32 - c[1], z as f32 - c[2]);
        let a = ((dx - w) * (dx - w) + dy * dy + dz * dz) / (2.0 * w * w);
        let b = ((dx + w) * (dx + w) + (dy - w) * (dy - w) + dz * dz) / (2.0 * w * w);
        (-a).exp() + 0.5 * (-b).exp()
    })
}

fn make_spectrum(len: usize, phase: f32) -> Vec<Complex32> {
    (0..len)
        .map(|i| Complex32::from_polar(1.0 / (1.0 + i as f32 * 1e-3), i as f32 * phase))
        .collect()
}

// ============================================================
// Benchmarks
// ============================================================

fn bench_rotate(c: &mut Criterion) {
    let r = RotationMatrix::from_axis_angle([0.3, 1.0, -0.4], 0.9);

    let mut group = c.benchmark_group("rotate_cpu");
    group.sample_size(10);
    for n in [32usize, 64] {
        let src = make_density(n);
        let center = grid_center(src.shape());
        group.bench_with_input(BenchmarkId::new("linear", n), &src, |b, src| {
            b.iter(|| rotate(src, &r, center, src.shape(), Filter::Linear))
        });
        group.bench_with_input(BenchmarkId::new("nearest", n), &src, |b, src| {
            b.iter(|| rotate(src, &r, center, src.shape(), Filter::Nearest))
        });
    }
    group.finish();
}

fn bench_elementwise(c: &mut Criterion) {
    let len = 64 * 64 * 33; // half-spectrum of a 64³ real grid

    let mut group = c.benchmark_group("elementwise_cpu");

    let x: Vec<f32> = (0..len).map(|i| i as f32 * 1e-3).collect();
    let y: Vec<f32> = (0..len).map(|i| 1.0 - i as f32 * 1e-4).collect();
    let mut out = vec![0.0f32; len];
    group.bench_function("multiply_f32", |b| b.iter(|| multiply_f32(&x, &y, &mut out)));

    let xc = make_spectrum(len, 0.01);
    let yc = make_spectrum(len, -0.02);
    let mut outc = vec![Complex32::default(); len];
    group.bench_function("conjugate_multiply", |b| {
        b.iter(|| conjugate_multiply(&xc, &yc, &mut outc))
    });

    group.bench_function("fill_f32", |b| b.iter(|| fill(&mut out, 0.5)));
    group.finish();
}

criterion_group!(benches, bench_rotate, bench_elementwise);
criterion_main!(benches);
