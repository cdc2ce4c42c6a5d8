use anyhow::{ensure, Context, Result};
use clap::Parser;

use compute_pass::cli::Cli;
use compute_pass::core::{ColorBuffer, FrameProcessor, GpuContext, PassVolume, WgpuBackend};
use compute_pass::traits::ComputeProgram;
use compute_pass::{PassConfig, GRADIENT_WGSL};

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    let base = match &cli.config {
        Some(path) => PassConfig::load(path).with_context(|| format!("Failed to load config {:?}", path))?,
        None => PassConfig::default(),
    };
    let config = cli.apply(base);
    let program = config
        .load_program()?
        .unwrap_or_else(|| ComputeProgram::wgsl("gradient", GRADIENT_WGSL));

    let gpu = GpuContext::new_blocking().context("Failed to create GPU context")?;
    let mut backend = WgpuBackend::new(gpu.clone());
    let mut volume = PassVolume::<WgpuBackend>::new()
        .with_pass(Box::new(FrameProcessor::<WgpuBackend>::from_config(&config, Some(program))));

    if !cli.no_ui {
        println!(
            "Compute pass on {} - active: {}, workgroup {}",
            gpu.adapter_name(),
            config.active,
            config.workgroup_size
        );
    }

    for (frame, camera) in cli.sizes.iter().enumerate() {
        ensure!(!camera.is_empty(), "camera size {}x{} has no pixels", camera.width, camera.height);

        let mut color = ColorBuffer::new(&gpu, camera.width, camera.height);
        color.clear(&gpu, [0, 0, 0, 255]);

        volume
            .render_frame(&mut backend, *camera, &mut color)
            .with_context(|| format!("Frame {} failed", frame))?;

        let pixels = color.read_pixels(&gpu)?;
        if !cli.no_ui {
            let center = ((camera.height / 2) * camera.width + camera.width / 2) as usize * 4;
            println!(
                "frame {}: {}x{} center {:?}",
                frame,
                camera.width,
                camera.height,
                &pixels[center..center + 4]
            );
        }
    }

    volume.teardown(&mut backend);
    Ok(())
}
