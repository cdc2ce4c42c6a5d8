use super::backend::ComputeBackend;
use crate::core::viewport::Viewport;
use crate::error::Result;

/// Per-frame context handed to a pass by the host
pub struct FrameContext<'a, B: ComputeBackend> {
    /// Active camera pixel dimensions
    pub camera: Viewport,
    /// The frame's output color buffer
    pub color_buffer: &'a mut B::ColorTarget,
    /// Command recorder
    pub cmd: &'a mut B,
}

impl<'a, B: ComputeBackend> FrameContext<'a, B> {
    pub fn new(camera: Viewport, color_buffer: &'a mut B::ColorTarget, cmd: &'a mut B) -> Self {
        Self {
            camera,
            color_buffer,
            cmd,
        }
    }
}

/// Host-driven render pass lifecycle.
///
/// The host guarantees ordering: `setup` once before any `execute`, and
/// `cleanup` once after the last `execute`. Calls are never concurrent.
pub trait CustomPass<B: ComputeBackend> {
    /// Resolve resources needed for the lifetime of the pass
    fn setup(&mut self, backend: &mut B) -> Result<()>;

    /// Record this frame's work
    fn execute(&mut self, ctx: &mut FrameContext<'_, B>) -> Result<()>;

    /// Release owned resources. Must be safe to call more than once.
    fn cleanup(&mut self, backend: &mut B);

    fn name(&self) -> &str {
        "custom pass"
    }
}
