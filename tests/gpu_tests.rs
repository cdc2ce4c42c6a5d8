//! End-to-end runs on a real adapter. Run with `--ignored` on a machine with a GPU.

use std::collections::HashMap;

use compute_pass::core::{
    ColorBuffer, CpuBackend, CpuKernel, FrameProcessor, GpuContext, Image, PassVolume, Viewport,
    WgpuBackend, WorkgroupSize,
};
use compute_pass::traits::{ComputeBackend, ComputeProgram, CustomPass, FrameContext};
use compute_pass::{PassError, GRADIENT_WGSL, KERNEL_ENTRY_POINT};

const SOLID_WGSL: &str = r#"
@group(0) @binding(0)
var Result: texture_storage_2d<rgba8unorm, write>;

@compute @workgroup_size({{WORKGROUP_X}}, {{WORKGROUP_Y}}, {{WORKGROUP_Z}})
fn CSMain(@builtin(global_invocation_id) id: vec3<u32>) {
    let dims = textureDimensions(Result);
    if (id.x >= dims.x || id.y >= dims.y) {
        return;
    }
    textureStore(Result, vec2<i32>(id.xy), vec4<f32>(1.0, 0.0, 1.0, 1.0));
}
"#;

const MAGENTA: [u8; 4] = [255, 0, 255, 255];

fn backend() -> WgpuBackend {
    WgpuBackend::new(GpuContext::new_blocking().expect("GPU adapter"))
}

#[test]
#[ignore = "requires a GPU adapter"]
fn test_solid_kernel_fills_color_buffer() {
    let mut backend = backend();
    let gpu = backend.gpu().clone();
    let mut volume = PassVolume::<WgpuBackend>::new().with_pass(Box::new(
        FrameProcessor::<WgpuBackend>::new(Some(ComputeProgram::wgsl("solid", SOLID_WGSL))),
    ));

    // Odd sizes exercise rounded-up groups and padded readback rows
    for (w, h) in [(801, 601), (801, 601), (67, 13)] {
        let mut color = ColorBuffer::new(&gpu, w, h);
        color.clear(&gpu, [0, 0, 0, 255]);
        volume
            .render_frame(&mut backend, Viewport::new(w, h), &mut color)
            .unwrap();

        let pixels = color.read_pixels(&gpu).unwrap();
        assert_eq!(pixels.len(), Viewport::new(w, h).buffer_size());
        assert!(pixels.chunks_exact(4).all(|p| p == MAGENTA));
    }

    volume.teardown(&mut backend);
}

#[test]
#[ignore = "requires a GPU adapter"]
fn test_inactive_pass_leaves_color_buffer() {
    let mut backend = backend();
    let gpu = backend.gpu().clone();
    let mut pass = FrameProcessor::<WgpuBackend>::new(Some(ComputeProgram::wgsl("solid", SOLID_WGSL)));
    pass.setup(&mut backend).unwrap();
    pass.set_active(false);

    let mut color = ColorBuffer::new(&gpu, 32, 32);
    color.clear(&gpu, [1, 2, 3, 4]);
    pass.execute(&mut FrameContext::new(Viewport::new(32, 32), &mut color, &mut backend))
        .unwrap();
    backend.submit().unwrap();

    let pixels = color.read_pixels(&gpu).unwrap();
    assert!(pixels.chunks_exact(4).all(|p| p == [1, 2, 3, 4]));
    assert!(pass.surface_size().is_none());
}

#[test]
#[ignore = "requires a GPU adapter"]
fn test_gradient_with_custom_workgroup_compiles() {
    let mut backend = backend();
    let mut pass = FrameProcessor::<WgpuBackend>::new(Some(ComputeProgram::wgsl("gradient", GRADIENT_WGSL)))
        .with_workgroup_size(WorkgroupSize::new(16, 4, 1));
    pass.setup(&mut backend).unwrap();
    assert!(pass.kernel().is_some());
}

#[test]
#[ignore = "requires a GPU adapter"]
fn test_missing_entry_point_is_kernel_not_found() {
    let mut backend = backend();
    let source = SOLID_WGSL.replace("fn CSMain", "fn main");
    let mut pass = FrameProcessor::<WgpuBackend>::new(Some(ComputeProgram::wgsl("renamed", source)));
    assert!(matches!(
        pass.setup(&mut backend),
        Err(PassError::KernelNotFound { .. })
    ));
}

#[test]
#[ignore = "requires a GPU adapter"]
fn test_invalid_wgsl_is_device_error() {
    let mut backend = backend();
    let mut pass = FrameProcessor::<WgpuBackend>::new(Some(ComputeProgram::wgsl(
        "broken",
        "fn CSMain() { this is not wgsl }",
    )));
    assert!(matches!(pass.setup(&mut backend), Err(PassError::Device(_))));
}

#[test]
#[ignore = "requires a GPU adapter"]
fn test_gpu_output_matches_cpu_backend() {
    let camera = Viewport::new(37, 19);

    let mut cpu = CpuBackend::new();
    let kernels = HashMap::from([(
        KERNEL_ENTRY_POINT.to_string(),
        CpuKernel::new(|x, y, img: &mut Image| img.set(x, y, MAGENTA)),
    )]);
    let mut cpu_volume = PassVolume::<CpuBackend>::new().with_pass(Box::new(
        FrameProcessor::<CpuBackend>::new(Some(ComputeProgram::kernels("solid", kernels))),
    ));
    let mut expected = Image::new(camera.width, camera.height);
    cpu_volume.render_frame(&mut cpu, camera, &mut expected).unwrap();

    let mut gpu_backend = backend();
    let gpu = gpu_backend.gpu().clone();
    let mut gpu_volume = PassVolume::<WgpuBackend>::new().with_pass(Box::new(
        FrameProcessor::<WgpuBackend>::new(Some(ComputeProgram::wgsl("solid", SOLID_WGSL))),
    ));
    let mut color = ColorBuffer::new(&gpu, camera.width, camera.height);
    color.clear(&gpu, [0, 0, 0, 0]);
    gpu_volume.render_frame(&mut gpu_backend, camera, &mut color).unwrap();

    assert_eq!(color.read_pixels(&gpu).unwrap(), expected.as_bytes());
}

#[test]
#[ignore = "requires a GPU adapter"]
fn test_cleanup_frees_kernel_for_reuse() {
    let mut backend = backend();
    let mut first = FrameProcessor::<WgpuBackend>::new(Some(ComputeProgram::wgsl("solid", SOLID_WGSL)));
    first.setup(&mut backend).unwrap();
    let handle = first.kernel();
    first.cleanup(&mut backend);

    let mut second = FrameProcessor::<WgpuBackend>::new(Some(ComputeProgram::wgsl("solid", SOLID_WGSL)));
    second.setup(&mut backend).unwrap();
    assert_eq!(second.kernel(), handle);
}
