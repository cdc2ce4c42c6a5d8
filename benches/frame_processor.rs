use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use std::collections::HashMap;

use compute_pass::core::{CpuBackend, CpuKernel, DispatchSize, FrameProcessor, Image, Viewport, WorkgroupSize};
use compute_pass::traits::{ComputeProgram, CustomPass, FrameContext};
use compute_pass::KERNEL_ENTRY_POINT;

fn gradient_program() -> ComputeProgram<CpuKernel> {
    let kernels = HashMap::from([(
        KERNEL_ENTRY_POINT.to_string(),
        CpuKernel::new(|x, y, img: &mut Image| img.set(x, y, [x as u8, y as u8, 128, 255])),
    )]);
    ComputeProgram::kernels("gradient", kernels)
}

fn bench_dispatch_sizing(c: &mut Criterion) {
    let workgroup = WorkgroupSize::default();
    c.bench_function("dispatch_cover_4k", |b| {
        b.iter(|| DispatchSize::cover(black_box(Viewport::new(3840, 2160)), black_box(workgroup)))
    });
}

fn bench_steady_frames(c: &mut Criterion) {
    let mut group = c.benchmark_group("cpu_frame");

    for (w, h) in [(320u32, 240u32), (800, 600)] {
        let mut backend = CpuBackend::new();
        let mut pass = FrameProcessor::<CpuBackend>::new(Some(gradient_program()));
        pass.setup(&mut backend).expect("setup");
        let mut out = Image::new(w, h);

        group.bench_with_input(BenchmarkId::from_parameter(format!("{}x{}", w, h)), &(w, h), |b, &(w, h)| {
            b.iter(|| {
                let mut ctx = FrameContext::new(Viewport::new(w, h), &mut out, &mut backend);
                pass.execute(&mut ctx).expect("execute");
            })
        });

        pass.cleanup(&mut backend);
    }

    group.finish();
}

fn bench_resize_every_frame(c: &mut Criterion) {
    let mut backend = CpuBackend::new();
    let mut pass = FrameProcessor::<CpuBackend>::new(Some(gradient_program()));
    pass.setup(&mut backend).expect("setup");
    let sizes = [Viewport::new(128, 128), Viewport::new(160, 120)];
    let mut frame = 0usize;

    c.bench_function("cpu_frame_resize", |b| {
        b.iter(|| {
            let camera = sizes[frame % sizes.len()];
            frame += 1;
            let mut out = Image::new(camera.width, camera.height);
            let mut ctx = FrameContext::new(camera, &mut out, &mut backend);
            pass.execute(&mut ctx).expect("execute");
        })
    });
}

criterion_group!(benches, bench_dispatch_sizing, bench_steady_frames, bench_resize_every_frame);
criterion_main!(benches);
