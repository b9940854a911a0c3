//! Internal GPU path: a wgpu compute pass running the layer chain.
//!
//! Supports 8-bit frames with 1–4 layers. The source rows are packed
//! tightly and uploaded as one `u32` per pixel; all layer lattices share a
//! single storage buffer addressed through per-layer offsets. The result is
//! read back with a blocking poll and only then copied into the
//! destination, so a failed dispatch never touches it.

use std::num::NonZeroU64;
use std::sync::{Arc, mpsc};

use bytemuck::{Pod, Zeroable};
use lookchain_core::{FrameDescriptor, MAX_LAYERS, PixelFormat};
use parking_lot::Mutex;

use crate::backend::GpuBackend;
use crate::descriptor::GpuDispatchDescriptor;
use crate::error::GpuError;

const WORKGROUP_SIZE: u32 = 8;

/// Per-layer uniform, mirrors `Layer` in `apply_layers.wgsl`.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, Pod, Zeroable)]
struct LayerUniform {
    offset: u32,
    dimension: u32,
    scale: f32,
    intensity: f32,
}

/// Mirrors `Uniforms` in `apply_layers.wgsl`.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, Pod, Zeroable)]
struct ApplyUniforms {
    width: u32,
    height: u32,
    layer_count: u32,
    full_intensity: f32,
    layers: [LayerUniform; MAX_LAYERS],
}

/// Frame-sized buffers, reallocated when the pixel count changes.
struct FrameBuffers {
    pixel_count: u32,
    src: wgpu::Buffer,
    dst: wgpu::Buffer,
    staging: wgpu::Buffer,
}

/// LUT storage, grown on demand and never shrunk.
struct LutBuffer {
    capacity: u64,
    buffer: wgpu::Buffer,
}

#[derive(Default)]
struct Resources {
    frame: Option<FrameBuffers>,
    lut: Option<LutBuffer>,
}

/// wgpu implementation of [`GpuBackend`].
pub struct WgpuLutBackend {
    device: Arc<wgpu::Device>,
    queue: Arc<wgpu::Queue>,
    pipeline: wgpu::ComputePipeline,
    layout: wgpu::BindGroupLayout,
    uniform_buffer: wgpu::Buffer,
    limits: wgpu::Limits,
    resources: Mutex<Resources>,
}

impl WgpuLutBackend {
    /// Compile `apply_layers.wgsl` on an existing device.
    pub fn new(device: Arc<wgpu::Device>, queue: Arc<wgpu::Queue>) -> Self {
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("lookchain_apply_layers_shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("../shaders/apply_layers.wgsl").into()),
        });

        let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("lookchain_apply_layers_layout"),
            entries: &[
                storage_ro_entry(0, 4),
                storage_rw_entry(1, 4),
                storage_ro_entry(2, 4),
                uniform_entry(3, size_of::<ApplyUniforms>() as u64),
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("lookchain_apply_layers_pipeline_layout"),
            bind_group_layouts: &[&layout],
            push_constant_ranges: &[],
        });

        let pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some("lookchain_apply_layers_pipeline"),
            layout: Some(&pipeline_layout),
            module: &shader,
            entry_point: Some("apply_layers"),
            compilation_options: wgpu::PipelineCompilationOptions::default(),
            cache: None,
        });

        let uniform_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("lookchain_apply_layers_uniforms"),
            size: size_of::<ApplyUniforms>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let limits = device.limits();
        Self {
            device,
            queue,
            pipeline,
            layout,
            uniform_buffer,
            limits,
            resources: Mutex::new(Resources::default()),
        }
    }

    /// Request a default adapter and device, blocking the calling thread.
    pub fn create_blocking() -> Result<Self, GpuError> {
        let result = Self::request_device().map(|(device, queue)| Self::new(device, queue));
        if let Err(err) = &result {
            tracing::warn!(error = %err, "wgpu LUT backend unavailable");
        }
        result
    }

    fn request_device() -> Result<(Arc<wgpu::Device>, Arc<wgpu::Queue>), GpuError> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor::default());
        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            ..Default::default()
        }))
        .map_err(|e| GpuError::NoAdapter(e.to_string()))?;

        let (device, queue) = pollster::block_on(adapter.request_device(&wgpu::DeviceDescriptor {
            label: Some("lookchain_device"),
            required_features: wgpu::Features::empty(),
            required_limits: adapter.limits(),
            ..Default::default()
        }))?;

        let info = adapter.get_info();
        tracing::info!(adapter = %info.name, backend = ?info.backend, "wgpu LUT backend ready");
        Ok((Arc::new(device), Arc::new(queue)))
    }

    /// Run one job, returning the error that made it fail.
    pub fn dispatch(
        &self,
        desc: &GpuDispatchDescriptor<'_>,
        src: &FrameDescriptor<'_>,
        dst: &mut FrameDescriptor<'_>,
    ) -> Result<(), GpuError> {
        if !self.supports(desc.format, desc.layer_count()) {
            return Err(GpuError::Unsupported {
                format: desc.format,
                layers: desc.layer_count(),
            });
        }
        if !src.same_geometry(dst)
            || src.width() as u32 != desc.frame_width
            || src.height() as u32 != desc.frame_height
            || !dst.is_writable()
        {
            return Err(GpuError::Frame);
        }
        let frame_bytes = check_limits(
            &self.limits,
            desc.frame_width,
            desc.frame_height,
            desc.lut_float_count() as u64 * 4,
        )?;
        let packed = src.read_packed_rows().ok_or(GpuError::Frame)?;
        let pixel_count = desc.frame_width * desc.frame_height;

        let mut uniforms = ApplyUniforms {
            width: desc.frame_width,
            height: desc.frame_height,
            layer_count: desc.layer_count() as u32,
            full_intensity: desc.full_intensity,
            ..Default::default()
        };
        let mut lut_floats: Vec<f32> = Vec::with_capacity(desc.lut_float_count());
        for (slot, layer) in uniforms.layers.iter_mut().zip(desc.layers()) {
            *slot = LayerUniform {
                offset: lut_floats.len() as u32,
                dimension: layer.dimension,
                scale: layer.scale,
                intensity: layer.intensity,
            };
            lut_floats.extend_from_slice(layer.lut_data);
        }

        let mut guard = self.resources.lock();
        let resources = &mut *guard;

        // Validation and allocation failures land in these scopes instead of
        // the device's uncaptured-error handler.
        self.device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);
        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        {
            let frame = ensure_frame_buffers(&self.device, &mut resources.frame, pixel_count);
            let lut_bytes = lut_floats.len() as u64 * 4;
            let lut = ensure_lut_buffer(&self.device, &mut resources.lut, lut_bytes);
            self.encode_and_submit(frame, lut, &packed, &lut_floats, &uniforms, desc);
        }
        let validation = pollster::block_on(self.device.pop_error_scope());
        let out_of_memory = pollster::block_on(self.device.pop_error_scope());
        if let Some(err) = validation.or(out_of_memory) {
            resources.frame = None;
            resources.lut = None;
            return Err(GpuError::Validation(err.to_string()));
        }
        let frame = resources.frame.as_ref().ok_or(GpuError::Frame)?;

        let slice = frame.staging.slice(..frame_bytes);
        let (tx, rx) = mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });
        self.device
            .poll(wgpu::PollType::wait_indefinitely())
            .map_err(|e| GpuError::Poll(e.to_string()))?;
        rx.recv()
            .map_err(|e| GpuError::Readback(e.to_string()))?
            .map_err(|e| GpuError::Readback(e.to_string()))?;

        let output = {
            let data = slice.get_mapped_range();
            data.to_vec()
        };
        frame.staging.unmap();

        if dst.write_packed_rows(&output) {
            Ok(())
        } else {
            Err(GpuError::Frame)
        }
    }

    fn encode_and_submit(
        &self,
        frame: &FrameBuffers,
        lut: &LutBuffer,
        packed: &[u8],
        lut_floats: &[f32],
        uniforms: &ApplyUniforms,
        desc: &GpuDispatchDescriptor<'_>,
    ) {
        self.queue.write_buffer(&frame.src, 0, packed);
        self.queue.write_buffer(&lut.buffer, 0, bytemuck::cast_slice(lut_floats));
        self.queue.write_buffer(&self.uniform_buffer, 0, bytemuck::bytes_of(uniforms));

        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("lookchain_apply_layers_bg"),
            layout: &self.layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: frame.src.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: frame.dst.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: lut.buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: self.uniform_buffer.as_entire_binding(),
                },
            ],
        });

        let mut encoder = self.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("lookchain_apply_layers_encoder"),
        });
        {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("lookchain_apply_layers_pass"),
                timestamp_writes: None,
            });
            pass.set_pipeline(&self.pipeline);
            pass.set_bind_group(0, &bind_group, &[]);
            pass.dispatch_workgroups(
                desc.frame_width.div_ceil(WORKGROUP_SIZE),
                desc.frame_height.div_ceil(WORKGROUP_SIZE),
                1,
            );
        }
        encoder.copy_buffer_to_buffer(&frame.dst, 0, &frame.staging, 0, packed.len() as u64);
        self.queue.submit(std::iter::once(encoder.finish()));
    }
}

impl GpuBackend for WgpuLutBackend {
    fn name(&self) -> &str {
        "wgpu"
    }

    fn supports(&self, format: PixelFormat, layer_count: usize) -> bool {
        format == PixelFormat::U8 && (1..=MAX_LAYERS).contains(&layer_count)
    }

    fn try_dispatch(
        &self,
        descriptor: &GpuDispatchDescriptor<'_>,
        src: &FrameDescriptor<'_>,
        dst: &mut FrameDescriptor<'_>,
    ) -> bool {
        match self.dispatch(descriptor, src, dst) {
            Ok(()) => true,
            Err(err) => {
                tracing::debug!(error = %err, "wgpu dispatch failed");
                false
            }
        }
    }
}

/// Frame buffer size for a `width × height` job, or an error when the frame
/// or its LUT data exceeds what the device can bind or dispatch.
fn check_limits(
    limits: &wgpu::Limits,
    width: u32,
    height: u32,
    lut_bytes: u64,
) -> Result<u64, GpuError> {
    let too_large = || GpuError::FrameTooLarge { width, height };
    let frame_bytes = width
        .checked_mul(height)
        .and_then(|pixels| (pixels as u64).checked_mul(4))
        .ok_or_else(too_large)?;
    let max_binding = (limits.max_storage_buffer_binding_size as u64).min(limits.max_buffer_size);
    let max_groups = limits.max_compute_workgroups_per_dimension;
    if frame_bytes > max_binding
        || lut_bytes > max_binding
        || width.div_ceil(WORKGROUP_SIZE) > max_groups
        || height.div_ceil(WORKGROUP_SIZE) > max_groups
    {
        return Err(too_large());
    }
    Ok(frame_bytes)
}

fn ensure_frame_buffers<'a>(
    device: &wgpu::Device,
    cache: &'a mut Option<FrameBuffers>,
    pixel_count: u32,
) -> &'a FrameBuffers {
    if cache.as_ref().is_some_and(|f| f.pixel_count != pixel_count) {
        *cache = None;
    }
    cache.get_or_insert_with(|| {
        let size = pixel_count as u64 * 4;
        let storage = |label| {
            device.create_buffer(&wgpu::BufferDescriptor {
                label: Some(label),
                size,
                usage: wgpu::BufferUsages::STORAGE
                    | wgpu::BufferUsages::COPY_DST
                    | wgpu::BufferUsages::COPY_SRC,
                mapped_at_creation: false,
            })
        };
        FrameBuffers {
            pixel_count,
            src: storage("lookchain_frame_src"),
            dst: storage("lookchain_frame_dst"),
            staging: device.create_buffer(&wgpu::BufferDescriptor {
                label: Some("lookchain_frame_staging"),
                size,
                usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
                mapped_at_creation: false,
            }),
        }
    })
}

fn ensure_lut_buffer<'a>(
    device: &wgpu::Device,
    cache: &'a mut Option<LutBuffer>,
    bytes: u64,
) -> &'a LutBuffer {
    if cache.as_ref().is_some_and(|l| l.capacity < bytes) {
        *cache = None;
    }
    cache.get_or_insert_with(|| {
        let capacity = bytes.max(4);
        LutBuffer {
            capacity,
            buffer: device.create_buffer(&wgpu::BufferDescriptor {
                label: Some("lookchain_lut_data"),
                size: capacity,
                usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            }),
        }
    })
}

// ── Layout helpers ──────────────────────────────────────────────────

fn storage_ro_entry(binding: u32, min_size: u64) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::COMPUTE,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Storage { read_only: true },
            has_dynamic_offset: false,
            min_binding_size: NonZeroU64::new(min_size),
        },
        count: None,
    }
}

fn storage_rw_entry(binding: u32, min_size: u64) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::COMPUTE,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Storage { read_only: false },
            has_dynamic_offset: false,
            min_binding_size: NonZeroU64::new(min_size),
        },
        count: None,
    }
}

fn uniform_entry(binding: u32, min_size: u64) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::COMPUTE,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Uniform,
            has_dynamic_offset: false,
            min_binding_size: NonZeroU64::new(min_size),
        },
        count: None,
    }
}
