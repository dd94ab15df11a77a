// SPDX-License-Identifier: GPL-3.0-only
//! Compute-shader filter pipeline for recorded frames
//!
//! One pipeline is created per recording session and dropped with it; the
//! input texture and readback buffers are reallocated only when the frame
//! size changes.

use crate::filters::FilterType;
use crate::gpu::{self, wgpu};
use std::sync::Arc;
use tracing::{debug, info};

/// WGSL source for the filter compute shader
pub const FILTER_SHADER: &str = include_str!("filter.wgsl");

const WORKGROUP_SIZE: u32 = 16;

/// Filter parameters uniform
#[repr(C)]
#[derive(Debug, Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
struct FilterParams {
    width: u32,
    height: u32,
    filter_mode: u32,
    _padding: u32,
}

/// Per-size resources, replaced when the frame size changes
struct FrameBuffers {
    width: u32,
    height: u32,
    input_texture: wgpu::Texture,
    output_buffer: wgpu::Buffer,
    staging_buffer: wgpu::Buffer,
}

impl FrameBuffers {
    fn fits(&self, width: u32, height: u32) -> bool {
        self.width == width && self.height == height
    }

    fn byte_len(&self) -> u64 {
        packed_len(self.width, self.height)
    }
}

/// GPU filter pipeline for RGBA frames
pub struct GpuFilterPipeline {
    device: Arc<wgpu::Device>,
    queue: Arc<wgpu::Queue>,
    pipeline: wgpu::ComputePipeline,
    bind_group_layout: wgpu::BindGroupLayout,
    uniform_buffer: wgpu::Buffer,
    buffers: Option<FrameBuffers>,
}

impl GpuFilterPipeline {
    /// Create the device, shader module and compute pipeline
    pub async fn new() -> Result<Self, String> {
        info!("Initializing GPU filter pipeline");

        let (device, queue, gpu_info) = gpu::create_compute_device("recorder_filter_gpu").await?;

        info!(
            adapter_name = %gpu_info.adapter_name,
            adapter_backend = ?gpu_info.backend,
            "GPU device created for filter pipeline"
        );

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("recorder_filter_shader"),
            source: wgpu::ShaderSource::Wgsl(FILTER_SHADER.into()),
        });

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("recorder_filter_bind_group_layout"),
            entries: &[
                // Input frame
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: false },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                // Packed RGBA output
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Storage { read_only: false },
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
                // FilterParams
                wgpu::BindGroupLayoutEntry {
                    binding: 2,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("recorder_filter_pipeline_layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        let pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some("recorder_filter_pipeline"),
            layout: Some(&pipeline_layout),
            module: &shader,
            entry_point: Some("main"),
            compilation_options: Default::default(),
            cache: None,
        });

        let uniform_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("recorder_filter_uniforms"),
            size: std::mem::size_of::<FilterParams>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        Ok(Self {
            device,
            queue,
            pipeline,
            bind_group_layout,
            uniform_buffer,
            buffers: None,
        })
    }

    /// Allocate the texture and readback buffers for a new frame size
    fn allocate(&self, width: u32, height: u32) -> FrameBuffers {
        debug!(width, height, "Allocating filter pipeline resources");

        let size = packed_len(width, height);

        let input_texture = self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("recorder_filter_input"),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba8Unorm,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });

        let output_buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("recorder_filter_output"),
            size,
            usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_SRC,
            mapped_at_creation: false,
        });

        let staging_buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("recorder_filter_staging"),
            size,
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });

        FrameBuffers {
            width,
            height,
            input_texture,
            output_buffer,
            staging_buffer,
        }
    }

    /// Filter an RGBA frame and return tightly packed RGBA (`width * 4` per row)
    pub async fn apply_filter_rgba(
        &mut self,
        rgba_data: &[u8],
        width: u32,
        height: u32,
        stride: u32,
        filter: FilterType,
    ) -> Result<Vec<u8>, String> {
        if width == 0 || height == 0 {
            return Err("Empty frame".to_string());
        }
        let row = width
            .checked_mul(4)
            .ok_or_else(|| format!("Frame width {} too large", width))?;
        let stride = stride.max(row);
        let required = stride as usize * (height as usize - 1) + row as usize;
        if rgba_data.len() < required {
            return Err(format!(
                "Frame data too short: {} bytes for {}x{} stride {}",
                rgba_data.len(),
                width,
                height,
                stride
            ));
        }

        if !self
            .buffers
            .as_ref()
            .is_some_and(|buffers| buffers.fits(width, height))
        {
            self.buffers = Some(self.allocate(width, height));
        }
        let buffers = self.buffers.as_ref().ok_or("Frame buffers not allocated")?;
        let input_texture = &buffers.input_texture;
        let output_buffer = &buffers.output_buffer;

        self.queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: input_texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            rgba_data,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(stride),
                rows_per_image: Some(height),
            },
            wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
        );

        let params = FilterParams {
            width,
            height,
            filter_mode: filter.mode(),
            _padding: 0,
        };
        self.queue
            .write_buffer(&self.uniform_buffer, 0, bytemuck::bytes_of(&params));

        let input_view = input_texture.create_view(&wgpu::TextureViewDescriptor::default());

        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("recorder_filter_bind_group"),
            layout: &self.bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&input_view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: output_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: self.uniform_buffer.as_entire_binding(),
                },
            ],
        });

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("recorder_filter_encoder"),
            });

        {
            let mut compute_pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("recorder_filter_pass"),
                timestamp_writes: None,
            });

            compute_pass.set_pipeline(&self.pipeline);
            compute_pass.set_bind_group(0, Some(&bind_group), &[]);
            compute_pass.dispatch_workgroups(
                width.div_ceil(WORKGROUP_SIZE),
                height.div_ceil(WORKGROUP_SIZE),
                1,
            );
        }

        encoder.copy_buffer_to_buffer(
            output_buffer,
            0,
            &buffers.staging_buffer,
            0,
            buffers.byte_len(),
        );

        self.queue.submit(std::iter::once(encoder.finish()));

        read_back(&self.device, &buffers.staging_buffer).await
    }
}

/// Bytes in a tightly packed RGBA frame
fn packed_len(width: u32, height: u32) -> u64 {
    width as u64 * height as u64 * 4
}

/// Copy a mapped staging buffer back to the CPU
async fn read_back(device: &wgpu::Device, staging: &wgpu::Buffer) -> Result<Vec<u8>, String> {
    let slice = staging.slice(..);
    let (sender, receiver) = futures::channel::oneshot::channel();
    slice.map_async(wgpu::MapMode::Read, move |result| {
        let _ = sender.send(result);
    });

    let _ = device.poll(wgpu::PollType::wait_indefinitely());

    match receiver.await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => return Err(format!("Failed to map filter output: {:?}", e)),
        Err(_) => return Err("Filter output mapping was abandoned".to_string()),
    }

    let pixels = slice.get_mapped_range().to_vec();
    staging.unmap();
    Ok(pixels)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn packed_len_is_four_bytes_per_pixel() {
        assert_eq!(packed_len(8, 6), 192);
        assert_eq!(packed_len(1920, 1080), 8_294_400);
    }

    #[test]
    fn dispatch_covers_partial_workgroups() {
        assert_eq!(640u32.div_ceil(WORKGROUP_SIZE), 40);
        assert_eq!(641u32.div_ceil(WORKGROUP_SIZE), 41);
    }

    #[tokio::test]
    async fn oversized_width_is_rejected() {
        // Skip on machines without an adapter
        let Ok(mut pipeline) = GpuFilterPipeline::new().await else {
            return;
        };
        let result = pipeline
            .apply_filter_rgba(&[0u8; 16], u32::MAX / 2, 1, 0, FilterType::Mono)
            .await;
        assert!(result.is_err());
    }
}
