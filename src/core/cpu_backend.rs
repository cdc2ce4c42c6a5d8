//! Software compute backend.
//!
//! Runs kernels written as Rust closures, one invocation per thread of every
//! dispatched group, and keeps count of every allocation, release, dispatch
//! and blit. Used to exercise passes without a GPU.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::error::{PassError, Result};
use crate::traits::backend::{
    ComputeBackend, ComputeProgram, Dimensions, KernelHandle, ProgramSource, SurfaceDescriptor,
};

use super::workgroup::{DispatchSize, WorkgroupLimits, WorkgroupSize};

/// RGBA8 image held in memory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Image {
    width: u32,
    height: u32,
    pixels: Vec<[u8; 4]>,
}

impl Image {
    /// Transparent black image
    pub fn new(width: u32, height: u32) -> Self {
        Self::filled(width, height, [0, 0, 0, 0])
    }

    pub fn filled(width: u32, height: u32, rgba: [u8; 4]) -> Self {
        Self {
            width,
            height,
            pixels: vec![rgba; width as usize * height as usize],
        }
    }

    fn index(&self, x: u32, y: u32) -> Option<usize> {
        (x < self.width && y < self.height).then(|| (y * self.width + x) as usize)
    }

    pub fn get(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        self.index(x, y).map(|i| self.pixels[i])
    }

    /// Write a pixel; out-of-bounds writes are dropped like storage texture stores
    pub fn set(&mut self, x: u32, y: u32, rgba: [u8; 4]) {
        if let Some(i) = self.index(x, y) {
            self.pixels[i] = rgba;
        }
    }

    pub fn pixels(&self) -> &[[u8; 4]] {
        &self.pixels
    }

    /// Tightly packed RGBA bytes
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.pixels)
    }

    /// True if every pixel equals `rgba`
    pub fn is_uniform(&self, rgba: [u8; 4]) -> bool {
        self.pixels.iter().all(|p| *p == rgba)
    }

    /// Copy `source` over this image, nearest-sampling when sizes differ
    fn copy_from(&mut self, source: &Image) {
        if source.width == self.width && source.height == self.height {
            self.pixels.copy_from_slice(&source.pixels);
            return;
        }
        if source.width == 0 || source.height == 0 {
            return;
        }
        for y in 0..self.height {
            let sy = (y as u64 * source.height as u64 / self.height as u64) as u32;
            for x in 0..self.width {
                let sx = (x as u64 * source.width as u64 / self.width as u64) as u32;
                let i = (y * self.width + x) as usize;
                self.pixels[i] = source.pixels[(sy * source.width + sx) as usize];
            }
        }
    }
}

impl Dimensions for Image {
    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }
}

/// Kernel body: called once per invocation with its global x/y id
#[derive(Clone)]
pub struct CpuKernel(Arc<dyn Fn(u32, u32, &mut Image) + Send + Sync>);

impl CpuKernel {
    pub fn new(f: impl Fn(u32, u32, &mut Image) + Send + Sync + 'static) -> Self {
        Self(Arc::new(f))
    }
}

impl fmt::Debug for CpuKernel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("CpuKernel")
    }
}

/// Handle to a surface living inside a `CpuBackend`
#[derive(Debug, PartialEq, Eq)]
pub struct CpuSurface {
    id: u64,
    width: u32,
    height: u32,
}

impl CpuSurface {
    pub fn id(&self) -> u64 {
        self.id
    }
}

impl Dimensions for CpuSurface {
    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }
}

/// One recorded dispatch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchRecord {
    pub kernel: KernelHandle,
    pub groups: DispatchSize,
    /// Surface bound to the kernel's first output slot
    pub surface: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CpuStats {
    pub allocations: u64,
    pub releases: u64,
    pub blits: u64,
    pub submits: u64,
    /// Frames dropped without submitting
    pub discards: u64,
    pub kernels_resolved: u64,
    pub kernels_released: u64,
}

struct KernelSlot {
    body: CpuKernel,
    workgroup: WorkgroupSize,
    bindings: HashMap<String, u32>,
    bound: HashMap<u32, u64>,
}

pub struct CpuBackend {
    limits: WorkgroupLimits,
    kernels: Vec<Option<KernelSlot>>,
    surfaces: HashMap<u64, Image>,
    next_surface: u64,
    dispatches: Vec<DispatchRecord>,
    stats: CpuStats,
}

impl CpuBackend {
    pub fn new() -> Self {
        Self {
            limits: WorkgroupLimits::default(),
            kernels: Vec::new(),
            surfaces: HashMap::new(),
            next_surface: 0,
            dispatches: Vec::new(),
            stats: CpuStats::default(),
        }
    }

    pub fn with_limits(mut self, limits: WorkgroupLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn stats(&self) -> CpuStats {
        self.stats
    }

    /// Surfaces allocated and not yet released
    pub fn live_surfaces(&self) -> usize {
        self.surfaces.len()
    }

    /// Kernels resolved and not yet released
    pub fn live_kernels(&self) -> usize {
        self.kernels.iter().filter(|k| k.is_some()).count()
    }

    pub fn dispatches(&self) -> &[DispatchRecord] {
        &self.dispatches
    }

    /// Contents of a live surface
    pub fn surface_pixels(&self, surface: &CpuSurface) -> Option<&Image> {
        self.surfaces.get(&surface.id)
    }

    fn slot_mut(&mut self, kernel: KernelHandle) -> Result<&mut KernelSlot> {
        self.kernels
            .get_mut(kernel.0)
            .and_then(Option::as_mut)
            .ok_or_else(|| PassError::device(format!("unknown kernel handle {}", kernel.0)))
    }
}

impl Default for CpuBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl ComputeBackend for CpuBackend {
    type Surface = CpuSurface;
    type ColorTarget = Image;
    type Kernel = CpuKernel;

    fn limits(&self) -> WorkgroupLimits {
        self.limits
    }

    fn find_kernel(
        &mut self,
        program: &ComputeProgram<CpuKernel>,
        entry_point: &str,
        workgroup: WorkgroupSize,
    ) -> Result<KernelHandle> {
        let ProgramSource::Kernels(kernels) = &program.source else {
            return Err(PassError::device("CPU backend only runs closure kernels"));
        };
        let body = kernels
            .get(entry_point)
            .ok_or_else(|| PassError::KernelNotFound {
                program: program.label.clone(),
                entry_point: entry_point.to_string(),
            })?
            .clone();

        let slot = KernelSlot {
            body,
            workgroup,
            bindings: program.bindings.clone(),
            bound: HashMap::new(),
        };
        self.stats.kernels_resolved += 1;
        match self.kernels.iter().position(Option::is_none) {
            Some(free) => {
                self.kernels[free] = Some(slot);
                Ok(KernelHandle(free))
            }
            None => {
                self.kernels.push(Some(slot));
                Ok(KernelHandle(self.kernels.len() - 1))
            }
        }
    }

    fn release_kernel(&mut self, kernel: KernelHandle) {
        if let Some(slot) = self.kernels.get_mut(kernel.0) {
            if slot.take().is_some() {
                self.stats.kernels_released += 1;
            }
        }
    }

    fn create_surface(&mut self, desc: &SurfaceDescriptor) -> Result<CpuSurface> {
        if desc.width == 0 || desc.height == 0 {
            return Err(PassError::InvalidSurfaceSize {
                width: desc.width,
                height: desc.height,
            });
        }
        let id = self.next_surface;
        self.next_surface += 1;
        self.surfaces.insert(id, Image::new(desc.width, desc.height));
        self.stats.allocations += 1;
        Ok(CpuSurface {
            id,
            width: desc.width,
            height: desc.height,
        })
    }

    fn release_surface(&mut self, surface: CpuSurface) {
        if self.surfaces.remove(&surface.id).is_some() {
            self.stats.releases += 1;
        }
        for slot in self.kernels.iter_mut().flatten() {
            slot.bound.retain(|_, id| *id != surface.id);
        }
    }

    fn set_texture(&mut self, kernel: KernelHandle, name: &str, surface: &CpuSurface) -> Result<()> {
        if !self.surfaces.contains_key(&surface.id) {
            return Err(PassError::UnknownSurface);
        }
        let slot = self.slot_mut(kernel)?;
        let binding = *slot.bindings.get(name).ok_or_else(|| PassError::UnknownBinding {
            kernel: kernel.0,
            name: name.to_string(),
        })?;
        slot.bound.insert(binding, surface.id);
        Ok(())
    }

    fn dispatch(&mut self, kernel: KernelHandle, groups: DispatchSize) -> Result<()> {
        let slot = self
            .kernels
            .get(kernel.0)
            .and_then(Option::as_ref)
            .ok_or_else(|| PassError::device(format!("unknown kernel handle {}", kernel.0)))?;
        let (_, &surface_id) = slot
            .bound
            .iter()
            .min_by_key(|(binding, _)| **binding)
            .ok_or_else(|| PassError::device("dispatch with no output image bound"))?;
        let image = self
            .surfaces
            .get_mut(&surface_id)
            .ok_or(PassError::UnknownSurface)?;

        let wg = slot.workgroup;
        for _gz in 0..groups.z {
            for gy in 0..groups.y {
                for gx in 0..groups.x {
                    for _lz in 0..wg.z {
                        for ly in 0..wg.y {
                            for lx in 0..wg.x {
                                (slot.body.0)(gx * wg.x + lx, gy * wg.y + ly, image);
                            }
                        }
                    }
                }
            }
        }

        self.dispatches.push(DispatchRecord {
            kernel,
            groups,
            surface: surface_id,
        });
        Ok(())
    }

    fn blit(&mut self, source: &CpuSurface, target: &mut Image) -> Result<()> {
        let image = self
            .surfaces
            .get(&source.id)
            .ok_or(PassError::UnknownSurface)?;
        target.copy_from(image);
        self.stats.blits += 1;
        Ok(())
    }

    fn submit(&mut self) -> Result<()> {
        self.stats.submits += 1;
        Ok(())
    }

    fn discard(&mut self) {
        self.stats.discards += 1;
    }
}
