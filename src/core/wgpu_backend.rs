use std::collections::{BTreeMap, HashMap};

use glam::UVec2;

use crate::error::{PassError, Result};
use crate::traits::backend::{
    ComputeBackend, ComputeProgram, Dimensions, KernelHandle, ProgramSource, SurfaceDescriptor,
};

use super::gpu_context::GpuContext;
use super::workgroup::{DispatchSize, WorkgroupLimits, WorkgroupSize};

/// Format of every frame surface and color buffer
pub const SURFACE_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;

/// Round `value` up to the next multiple of `alignment`
pub(crate) fn align_to(value: u32, alignment: u32) -> u32 {
    value.div_ceil(alignment) * alignment
}

/// Replace workgroup placeholders in a WGSL template
pub fn specialize_wgsl(source: &str, workgroup: WorkgroupSize) -> String {
    workgroup
        .substitutions()
        .iter()
        .fold(source.to_string(), |src, (token, value)| {
            src.replace(token, &value.to_string())
        })
}

/// Parse WGSL and check for a compute entry point named `entry_point`.
/// Comments and ordinary functions with that name do not count.
pub fn declares_entry_point(source: &str, entry_point: &str) -> Result<bool> {
    let module = naga::front::wgsl::parse_str(source)
        .map_err(|e| PassError::device(format!("invalid WGSL: {}", e.emit_to_string(source))))?;
    Ok(module
        .entry_points
        .iter()
        .any(|ep| ep.name == entry_point && ep.stage == naga::ShaderStage::Compute))
}

fn texture_extent(size: UVec2) -> wgpu::Extent3d {
    wgpu::Extent3d {
        width: size.x,
        height: size.y,
        depth_or_array_layers: 1,
    }
}

/// Storage texture owned by a pass
pub struct GpuSurface {
    id: u64,
    texture: wgpu::Texture,
    view: wgpu::TextureView,
}

impl Dimensions for GpuSurface {
    fn width(&self) -> u32 {
        self.texture.width()
    }

    fn height(&self) -> u32 {
        self.texture.height()
    }
}

/// Camera color buffer a pass composites into
pub struct ColorBuffer {
    texture: wgpu::Texture,
}

impl ColorBuffer {
    pub fn new(gpu: &GpuContext, width: u32, height: u32) -> Self {
        let texture = gpu.device().create_texture(&wgpu::TextureDescriptor {
            label: Some("Camera Color Buffer"),
            size: texture_extent(UVec2::new(width, height)),
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: SURFACE_FORMAT,
            usage: wgpu::TextureUsages::COPY_DST
                | wgpu::TextureUsages::COPY_SRC
                | wgpu::TextureUsages::TEXTURE_BINDING
                | wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        });
        Self { texture }
    }

    /// Overwrite every pixel with `rgba`
    pub fn clear(&self, gpu: &GpuContext, rgba: [u8; 4]) {
        let (width, height) = (self.width(), self.height());
        let pixels = vec![rgba; width as usize * height as usize];
        gpu.queue().write_texture(
            self.texture.as_image_copy(),
            bytemuck::cast_slice(&pixels),
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(4 * width),
                rows_per_image: Some(height),
            },
            self.texture.size(),
        );
    }

    /// Read back tightly packed RGBA bytes (blocking)
    pub fn read_pixels(&self, gpu: &GpuContext) -> Result<Vec<u8>> {
        let (width, height) = (self.width(), self.height());
        let row_bytes = 4 * width;
        let padded_row = align_to(row_bytes, wgpu::COPY_BYTES_PER_ROW_ALIGNMENT);

        let staging = gpu.device().create_buffer(&wgpu::BufferDescriptor {
            label: Some("Color Buffer Readback"),
            size: padded_row as u64 * height as u64,
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });

        let mut encoder = gpu
            .device()
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Color Buffer Readback Encoder"),
            });
        encoder.copy_texture_to_buffer(
            self.texture.as_image_copy(),
            wgpu::TexelCopyBufferInfo {
                buffer: &staging,
                layout: wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(padded_row),
                    rows_per_image: Some(height),
                },
            },
            self.texture.size(),
        );
        gpu.queue().submit(Some(encoder.finish()));

        let padded = gpu.read_buffer_sync(&staging)?;
        Ok(padded
            .chunks_exact(padded_row as usize)
            .flat_map(|row| &row[..row_bytes as usize])
            .copied()
            .collect())
    }
}

impl Dimensions for ColorBuffer {
    fn width(&self) -> u32 {
        self.texture.width()
    }

    fn height(&self) -> u32 {
        self.texture.height()
    }
}

/// A compiled entry point and what is currently bound to it
struct GpuKernel {
    label: String,
    pipeline: wgpu::ComputePipeline,
    layout: wgpu::BindGroupLayout,
    bindings: HashMap<String, u32>,
    bound: BTreeMap<u32, (u64, wgpu::TextureView)>,
    bind_group: Option<wgpu::BindGroup>,
}

/// wgpu implementation of the compute backend.
///
/// Dispatches and blits are recorded into one encoder per frame and only
/// reach the queue on `submit`.
pub struct WgpuBackend {
    gpu: GpuContext,
    kernels: Vec<Option<GpuKernel>>,
    encoder: Option<wgpu::CommandEncoder>,
    next_surface: u64,
}

impl WgpuBackend {
    pub fn new(gpu: GpuContext) -> Self {
        Self {
            gpu,
            kernels: Vec::new(),
            encoder: None,
            next_surface: 0,
        }
    }

    pub fn gpu(&self) -> &GpuContext {
        &self.gpu
    }

    fn encoder(&mut self) -> &mut wgpu::CommandEncoder {
        let device = self.gpu.device();
        self.encoder.get_or_insert_with(|| {
            device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Compute Pass Encoder"),
            })
        })
    }

    fn kernel_mut(&mut self, kernel: KernelHandle) -> Result<&mut GpuKernel> {
        self.kernels
            .get_mut(kernel.0)
            .and_then(Option::as_mut)
            .ok_or_else(|| PassError::device(format!("unknown kernel handle {}", kernel.0)))
    }

    fn create_layout(&self, label: &str, bindings: &HashMap<String, u32>) -> wgpu::BindGroupLayout {
        let mut slots: Vec<u32> = bindings.values().copied().collect();
        slots.sort_unstable();
        slots.dedup();

        let entries: Vec<wgpu::BindGroupLayoutEntry> = slots
            .into_iter()
            .map(|binding| wgpu::BindGroupLayoutEntry {
                binding,
                visibility: wgpu::ShaderStages::COMPUTE,
                ty: wgpu::BindingType::StorageTexture {
                    access: wgpu::StorageTextureAccess::WriteOnly,
                    format: SURFACE_FORMAT,
                    view_dimension: wgpu::TextureViewDimension::D2,
                },
                count: None,
            })
            .collect();

        self.gpu
            .device()
            .create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some(label),
                entries: &entries,
            })
    }
}

impl ComputeBackend for WgpuBackend {
    type Surface = GpuSurface;
    type ColorTarget = ColorBuffer;
    type Kernel = ();

    fn limits(&self) -> WorkgroupLimits {
        WorkgroupLimits::from(&self.gpu.limits())
    }

    fn find_kernel(
        &mut self,
        program: &ComputeProgram,
        entry_point: &str,
        workgroup: WorkgroupSize,
    ) -> Result<KernelHandle> {
        let ProgramSource::Wgsl(template) = &program.source else {
            return Err(PassError::device("wgpu backend only compiles WGSL programs"));
        };
        let source = specialize_wgsl(template, workgroup);
        if !declares_entry_point(&source, entry_point)? {
            return Err(PassError::KernelNotFound {
                program: program.label.clone(),
                entry_point: entry_point.to_string(),
            });
        }

        let device = self.gpu.device();
        device.push_error_scope(wgpu::ErrorFilter::Validation);

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(&program.label),
            source: wgpu::ShaderSource::Wgsl(source.into()),
        });
        let layout = self.create_layout(&format!("{} Bind Group Layout", program.label), &program.bindings);
        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some(&format!("{} Pipeline Layout", program.label)),
            bind_group_layouts: &[&layout],
            push_constant_ranges: &[],
        });
        let pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some(&format!("{}::{}", program.label, entry_point)),
            layout: Some(&pipeline_layout),
            module: &shader,
            entry_point: Some(entry_point),
            compilation_options: Default::default(),
            cache: None,
        });

        if let Some(err) = pollster::block_on(device.pop_error_scope()) {
            return Err(PassError::device(format!(
                "failed to build kernel {} in '{}': {}",
                entry_point, program.label, err
            )));
        }

        let kernel = GpuKernel {
            label: format!("{}::{}", program.label, entry_point),
            pipeline,
            layout,
            bindings: program.bindings.clone(),
            bound: BTreeMap::new(),
            bind_group: None,
        };
        match self.kernels.iter().position(Option::is_none) {
            Some(free) => {
                self.kernels[free] = Some(kernel);
                Ok(KernelHandle(free))
            }
            None => {
                self.kernels.push(Some(kernel));
                Ok(KernelHandle(self.kernels.len() - 1))
            }
        }
    }

    fn release_kernel(&mut self, kernel: KernelHandle) {
        if let Some(slot) = self.kernels.get_mut(kernel.0) {
            if let Some(released) = slot.take() {
                log::debug!("released kernel {}", released.label);
            }
        }
    }

    fn create_surface(&mut self, desc: &SurfaceDescriptor) -> Result<GpuSurface> {
        let max = self.gpu.limits().max_texture_dimension_2d;
        if desc.width == 0 || desc.height == 0 || desc.width > max || desc.height > max {
            return Err(PassError::InvalidSurfaceSize {
                width: desc.width,
                height: desc.height,
            });
        }

        let mut usage = wgpu::TextureUsages::COPY_SRC | wgpu::TextureUsages::TEXTURE_BINDING;
        if desc.random_write {
            usage |= wgpu::TextureUsages::STORAGE_BINDING;
        }

        let texture = self.gpu.device().create_texture(&wgpu::TextureDescriptor {
            label: Some("Frame Surface"),
            size: texture_extent(UVec2::new(desc.width, desc.height)),
            mip_level_count: 1 + desc.extra_mip_levels,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: SURFACE_FORMAT,
            usage,
            view_formats: &[],
        });
        // Storage bindings see exactly one mip level
        let view = texture.create_view(&wgpu::TextureViewDescriptor {
            mip_level_count: Some(1),
            ..Default::default()
        });

        let id = self.next_surface;
        self.next_surface += 1;
        Ok(GpuSurface { id, texture, view })
    }

    fn release_surface(&mut self, surface: GpuSurface) {
        for kernel in self.kernels.iter_mut().flatten() {
            let before = kernel.bound.len();
            kernel.bound.retain(|_, (id, _)| *id != surface.id);
            if kernel.bound.len() != before {
                kernel.bind_group = None;
            }
        }
        // Dropping rather than destroying keeps recorded work valid until submit
        drop(surface);
    }

    fn set_texture(&mut self, kernel: KernelHandle, name: &str, surface: &GpuSurface) -> Result<()> {
        let slot = self.kernel_mut(kernel)?;
        let binding = *slot.bindings.get(name).ok_or_else(|| PassError::UnknownBinding {
            kernel: kernel.0,
            name: name.to_string(),
        })?;

        let unchanged = slot.bound.get(&binding).is_some_and(|(id, _)| *id == surface.id);
        if !unchanged {
            slot.bound.insert(binding, (surface.id, surface.view.clone()));
            slot.bind_group = None;
        }
        Ok(())
    }

    fn dispatch(&mut self, kernel: KernelHandle, groups: DispatchSize) -> Result<()> {
        let device = self.gpu.device().clone();
        let slot = self.kernel_mut(kernel)?;

        if slot.bind_group.is_none() {
            let missing = slot.bindings.iter().find(|(_, b)| !slot.bound.contains_key(*b));
            if let Some((name, _)) = missing {
                return Err(PassError::device(format!(
                    "kernel {} dispatched with '{}' unbound",
                    slot.label, name
                )));
            }
            let entries: Vec<wgpu::BindGroupEntry> = slot
                .bound
                .iter()
                .map(|(binding, (_, view))| wgpu::BindGroupEntry {
                    binding: *binding,
                    resource: wgpu::BindingResource::TextureView(view),
                })
                .collect();
            slot.bind_group = Some(device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some(&slot.label),
                layout: &slot.layout,
                entries: &entries,
            }));
        }

        let pipeline = slot.pipeline.clone();
        let bind_group = slot.bind_group.clone();
        let label = slot.label.clone();

        let encoder = self.encoder();
        let mut compute_pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
            label: Some(&label),
            timestamp_writes: None,
        });
        compute_pass.set_pipeline(&pipeline);
        compute_pass.set_bind_group(0, bind_group.as_ref(), &[]);
        compute_pass.dispatch_workgroups(groups.x, groups.y, groups.z);
        Ok(())
    }

    fn blit(&mut self, source: &GpuSurface, target: &mut ColorBuffer) -> Result<()> {
        if source.extent() != target.extent() {
            return Err(PassError::device(format!(
                "blit size mismatch: {}x{} onto {}x{}",
                source.width(),
                source.height(),
                target.width(),
                target.height()
            )));
        }

        let size = target.texture.size();
        self.encoder().copy_texture_to_texture(
            source.texture.as_image_copy(),
            target.texture.as_image_copy(),
            size,
        );
        Ok(())
    }

    fn submit(&mut self) -> Result<()> {
        if let Some(encoder) = self.encoder.take() {
            self.gpu.queue().submit(Some(encoder.finish()));
        }
        Ok(())
    }

    fn discard(&mut self) {
        if self.encoder.take().is_some() {
            log::debug!("discarded unsubmitted frame commands");
        }
    }
}
