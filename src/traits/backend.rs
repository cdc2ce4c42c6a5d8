use std::collections::HashMap;

use glam::UVec2;

use crate::core::workgroup::{DispatchSize, WorkgroupLimits, WorkgroupSize};
use crate::error::Result;

/// Opaque index of an entry point inside a compute program
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct KernelHandle(pub usize);

/// Allocation request for a frame surface
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SurfaceDescriptor {
    pub width: u32,
    pub height: u32,
    /// Mip levels beyond the base level
    pub extra_mip_levels: u32,
    pub random_write: bool,
}

impl SurfaceDescriptor {
    /// Single-level, random-write surface of the given size
    pub fn storage(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            extra_mip_levels: 0,
            random_write: true,
        }
    }
}

/// Pixel dimensions of a surface or color target
pub trait Dimensions {
    fn width(&self) -> u32;
    fn height(&self) -> u32;

    fn extent(&self) -> UVec2 {
        UVec2::new(self.width(), self.height())
    }
}

/// Source of a compute program for a backend
#[derive(Clone)]
pub enum ProgramSource<K> {
    /// WGSL source text, possibly containing workgroup placeholders
    Wgsl(String),
    /// Named kernels executed by the backend itself
    Kernels(HashMap<String, K>),
}

/// An externally supplied compute program
#[derive(Clone)]
pub struct ComputeProgram<K = ()> {
    pub label: String,
    pub source: ProgramSource<K>,
    /// Output-image binding names and their slots in group 0
    pub bindings: HashMap<String, u32>,
}

impl<K> ComputeProgram<K> {
    pub fn wgsl(label: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            source: ProgramSource::Wgsl(source.into()),
            bindings: HashMap::from([(crate::RESULT_BINDING.to_string(), 0)]),
        }
    }

    pub fn kernels(label: impl Into<String>, kernels: HashMap<String, K>) -> Self {
        Self {
            label: label.into(),
            source: ProgramSource::Kernels(kernels),
            bindings: HashMap::from([(crate::RESULT_BINDING.to_string(), 0)]),
        }
    }

    /// Declare an additional output-image binding
    pub fn with_binding(mut self, name: impl Into<String>, slot: u32) -> Self {
        self.bindings.insert(name.into(), slot);
        self
    }
}

/// Host capability a pass records GPU work through.
///
/// Stands in for the engine's compute-shader, render-texture and command
/// buffer APIs. Work recorded here is deferred until `submit`.
pub trait ComputeBackend {
    type Surface: Dimensions;
    type ColorTarget: Dimensions;
    type Kernel;

    fn limits(&self) -> WorkgroupLimits;

    /// Resolve a named entry point. The workgroup size is what the program
    /// is compiled with when the backend compiles from source.
    fn find_kernel(
        &mut self,
        program: &ComputeProgram<Self::Kernel>,
        entry_point: &str,
        workgroup: WorkgroupSize,
    ) -> Result<KernelHandle>;

    /// Free a resolved kernel. The handle may be reused by a later lookup.
    fn release_kernel(&mut self, kernel: KernelHandle);

    fn create_surface(&mut self, desc: &SurfaceDescriptor) -> Result<Self::Surface>;

    fn release_surface(&mut self, surface: Self::Surface);

    /// Bind a surface as the named output image of a kernel
    fn set_texture(&mut self, kernel: KernelHandle, name: &str, surface: &Self::Surface) -> Result<()>;

    fn dispatch(&mut self, kernel: KernelHandle, groups: DispatchSize) -> Result<()>;

    /// Full-frame copy, no blending
    fn blit(&mut self, source: &Self::Surface, target: &mut Self::ColorTarget) -> Result<()>;

    /// Flush recorded work to the device
    fn submit(&mut self) -> Result<()> {
        Ok(())
    }

    /// Drop recorded work without submitting it
    fn discard(&mut self) {}
}
