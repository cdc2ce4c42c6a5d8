pub mod cpu_backend;
pub mod frame_processor;
pub mod gpu_context;
pub mod pass_volume;
pub mod viewport;
pub mod wgpu_backend;
pub mod workgroup;

pub use cpu_backend::{CpuBackend, CpuKernel, CpuStats, CpuSurface, DispatchRecord, Image};
pub use frame_processor::FrameProcessor;
pub use gpu_context::GpuContext;
pub use pass_volume::{PassVolume, VolumeState};
pub use viewport::Viewport;
pub use wgpu_backend::{ColorBuffer, GpuSurface, WgpuBackend, SURFACE_FORMAT};
pub use workgroup::{DispatchSize, WorkgroupLimits, WorkgroupSize};
