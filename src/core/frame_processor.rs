use crate::config::PassConfig;
use crate::error::{PassError, Result};
use crate::traits::backend::{ComputeBackend, ComputeProgram, Dimensions, KernelHandle, SurfaceDescriptor};
use crate::traits::custom_pass::{CustomPass, FrameContext};
use crate::{KERNEL_ENTRY_POINT, RESULT_BINDING};

use super::viewport::Viewport;
use super::workgroup::{DispatchSize, WorkgroupSize};

/// Compute-then-composite pass.
///
/// Each active frame it sizes an owned surface to the camera, dispatches the
/// program's `CSMain` kernel over it and blits the result onto the camera's
/// color buffer.
pub struct FrameProcessor<B: ComputeBackend> {
    program: Option<ComputeProgram<B::Kernel>>,
    active: bool,
    workgroup_size: WorkgroupSize,
    kernel: Option<KernelHandle>,
    surface: Option<B::Surface>,
}

impl<B: ComputeBackend> FrameProcessor<B> {
    pub fn new(program: Option<ComputeProgram<B::Kernel>>) -> Self {
        Self {
            program,
            active: true,
            workgroup_size: WorkgroupSize::default(),
            kernel: None,
            surface: None,
        }
    }

    /// Build from user configuration and an already loaded program
    pub fn from_config(config: &PassConfig, program: Option<ComputeProgram<B::Kernel>>) -> Self {
        Self {
            active: config.active,
            workgroup_size: config.workgroup_size,
            ..Self::new(program)
        }
    }

    pub fn with_workgroup_size(mut self, size: WorkgroupSize) -> Self {
        self.workgroup_size = size;
        self
    }

    pub fn active(&self) -> bool {
        self.active
    }

    pub fn set_active(&mut self, active: bool) {
        self.active = active;
    }

    pub fn workgroup_size(&self) -> WorkgroupSize {
        self.workgroup_size
    }

    pub fn kernel(&self) -> Option<KernelHandle> {
        self.kernel
    }

    /// Current surface dimensions, if one is allocated
    pub fn surface_size(&self) -> Option<Viewport> {
        self.surface.as_ref().map(|s| Viewport::from(s.extent()))
    }

    /// Make sure the owned surface matches the camera exactly
    fn ensure_surface(&mut self, backend: &mut B, camera: Viewport) -> Result<()> {
        let matches = self
            .surface
            .as_ref()
            .is_some_and(|s| s.extent() == camera.extent());
        if matches {
            return Ok(());
        }

        if let Some(old) = self.surface.take() {
            log::debug!(
                "releasing {}x{} surface before resize",
                old.width(),
                old.height()
            );
            backend.release_surface(old);
        }

        if camera.is_empty() {
            return Err(PassError::InvalidSurfaceSize {
                width: camera.width,
                height: camera.height,
            });
        }

        log::debug!("allocating {}x{} surface", camera.width, camera.height);
        let surface = backend.create_surface(&SurfaceDescriptor::storage(camera.width, camera.height))?;
        self.surface = Some(surface);
        Ok(())
    }
}

impl<B: ComputeBackend> CustomPass<B> for FrameProcessor<B> {
    fn setup(&mut self, backend: &mut B) -> Result<()> {
        let program = self.program.as_ref().ok_or(PassError::MissingProgram)?;
        self.workgroup_size.validate(&backend.limits())?;

        let kernel = backend.find_kernel(program, KERNEL_ENTRY_POINT, self.workgroup_size)?;
        log::info!(
            "resolved kernel {} in '{}' (workgroup {})",
            KERNEL_ENTRY_POINT,
            program.label,
            self.workgroup_size
        );
        self.kernel = Some(kernel);
        Ok(())
    }

    fn execute(&mut self, ctx: &mut FrameContext<'_, B>) -> Result<()> {
        if !self.active {
            return Ok(());
        }

        let kernel = self.kernel.ok_or(PassError::NotInitialized)?;
        let camera = ctx.camera;

        self.ensure_surface(ctx.cmd, camera)?;
        let surface = self.surface.as_ref().ok_or(PassError::NotInitialized)?;

        let groups = DispatchSize::cover(camera, self.workgroup_size);
        ctx.cmd.set_texture(kernel, RESULT_BINDING, surface)?;
        ctx.cmd.dispatch(kernel, groups)?;

        ctx.cmd.blit(surface, ctx.color_buffer)
    }

    fn cleanup(&mut self, backend: &mut B) {
        if let Some(surface) = self.surface.take() {
            backend.release_surface(surface);
        }
        if let Some(kernel) = self.kernel.take() {
            backend.release_kernel(kernel);
        }
    }

    fn name(&self) -> &str {
        "frame processor"
    }
}
