// src/shadows/blur_pass.rs
// Separable Gaussian prefilter over the moment map, horizontal then
// vertical, so the eval shader can run with a smaller kernel
// RELEVANT FILES: src/shaders/shadow_blur.wgsl, src/shadows/target.rs, src/shadows/filter.rs

use bytemuck::{Pod, Zeroable};
use wgpu::{
    BindGroupDescriptor, BindGroupEntry, BindGroupLayout, BindGroupLayoutDescriptor,
    BindGroupLayoutEntry, BindingResource, BindingType, Buffer, BufferBindingType,
    BufferDescriptor, BufferUsages, CommandEncoder, ComputePassDescriptor, ComputePipeline,
    ComputePipelineDescriptor, Device, ErrorFilter, Extent3d, PipelineLayoutDescriptor, Queue,
    ShaderModuleDescriptor, ShaderSource, ShaderStages, StorageTextureAccess, Texture,
    TextureDescriptor, TextureDimension, TextureSampleType, TextureUsages, TextureView,
    TextureViewDescriptor, TextureViewDimension,
};

use crate::error::{RenderError, RenderResult};

use super::target::{MomentTarget, MOMENT_FORMAT};

/// Parameters for one blur direction
#[repr(C, align(16))]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
struct BlurParams {
    direction: [f32; 2], // (1,0) for horizontal, (0,1) for vertical
    kernel_radius: u32,
    texture_size: u32,
    kernel_falloff: f32,
    _padding: [f32; 3],
}

/// Two-pass Gaussian blur over the moment target
pub struct MomentBlurPass {
    pipeline: ComputePipeline,
    bind_group_layout: BindGroupLayout,
    // Uniforms differ only in direction; one buffer per pass so both
    // dispatches in the same encoder see their own values
    horizontal_params: Buffer,
    vertical_params: Buffer,
    intermediate_texture: Option<Texture>,
    intermediate_view: Option<TextureView>,
    current_size: u32,
}

impl MomentBlurPass {
    pub fn new(device: &Device) -> RenderResult<Self> {
        device.push_error_scope(ErrorFilter::Validation);

        let shader = device.create_shader_module(ShaderModuleDescriptor {
            label: Some("vsm_blur_shader"),
            source: ShaderSource::Wgsl(include_str!("../shaders/shadow_blur.wgsl").into()),
        });

        let bind_group_layout = device.create_bind_group_layout(&BindGroupLayoutDescriptor {
            label: Some("vsm_blur_bind_group_layout"),
            entries: &[
                // Input moments (binding 0)
                BindGroupLayoutEntry {
                    binding: 0,
                    visibility: ShaderStages::COMPUTE,
                    ty: BindingType::Texture {
                        sample_type: TextureSampleType::Float { filterable: false },
                        view_dimension: TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                // Output moments (binding 1)
                BindGroupLayoutEntry {
                    binding: 1,
                    visibility: ShaderStages::COMPUTE,
                    ty: BindingType::StorageTexture {
                        access: StorageTextureAccess::WriteOnly,
                        format: MOMENT_FORMAT,
                        view_dimension: TextureViewDimension::D2,
                    },
                    count: None,
                },
                // Parameters uniform (binding 2)
                BindGroupLayoutEntry {
                    binding: 2,
                    visibility: ShaderStages::COMPUTE,
                    ty: BindingType::Buffer {
                        ty: BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&PipelineLayoutDescriptor {
            label: Some("vsm_blur_pipeline_layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        let pipeline = device.create_compute_pipeline(&ComputePipelineDescriptor {
            label: Some("vsm_blur_pipeline"),
            layout: Some(&pipeline_layout),
            module: &shader,
            entry_point: "cs_blur",
        });

        let params_descriptor = |label| BufferDescriptor {
            label: Some(label),
            size: std::mem::size_of::<BlurParams>() as u64,
            usage: BufferUsages::UNIFORM | BufferUsages::COPY_DST,
            mapped_at_creation: false,
        };
        let horizontal_params =
            device.create_buffer(&params_descriptor("vsm_blur_horizontal_params"));
        let vertical_params = device.create_buffer(&params_descriptor("vsm_blur_vertical_params"));

        if let Some(error) = pollster::block_on(device.pop_error_scope()) {
            return Err(RenderError::render(format!(
                "blur pass creation failed: {error}"
            )));
        }

        Ok(Self {
            pipeline,
            bind_group_layout,
            horizontal_params,
            vertical_params,
            intermediate_texture: None,
            intermediate_view: None,
            current_size: 0,
        })
    }

    /// Ensure the ping-pong texture matches the target resolution
    fn ensure_intermediate_texture(&mut self, device: &Device, size: u32) {
        if self.current_size == size {
            return;
        }

        let texture = device.create_texture(&TextureDescriptor {
            label: Some("vsm_blur_intermediate"),
            size: Extent3d {
                width: size,
                height: size,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: TextureDimension::D2,
            format: MOMENT_FORMAT,
            usage: TextureUsages::TEXTURE_BINDING | TextureUsages::STORAGE_BINDING,
            view_formats: &[],
        });
        let view = texture.create_view(&TextureViewDescriptor::default());

        self.intermediate_texture = Some(texture);
        self.intermediate_view = Some(view);
        self.current_size = size;
    }

    /// Blur the target's moments in place with exp(-d^2/falloff) weights
    pub fn execute(
        &mut self,
        device: &Device,
        queue: &Queue,
        encoder: &mut CommandEncoder,
        target: &MomentTarget,
        kernel_radius: u32,
        kernel_falloff: f32,
    ) {
        let size = target.resolution();
        self.ensure_intermediate_texture(device, size);
        let intermediate_view = self.intermediate_view.as_ref().unwrap();

        let horizontal = BlurParams {
            direction: [1.0, 0.0],
            kernel_radius,
            texture_size: size,
            kernel_falloff,
            _padding: [0.0; 3],
        };
        let vertical = BlurParams {
            direction: [0.0, 1.0],
            ..horizontal
        };
        queue.write_buffer(&self.horizontal_params, 0, bytemuck::bytes_of(&horizontal));
        queue.write_buffer(&self.vertical_params, 0, bytemuck::bytes_of(&vertical));

        // Pass 1: Horizontal blur (moments -> intermediate)
        self.execute_pass(
            device,
            encoder,
            target.moment_view(),
            intermediate_view,
            &self.horizontal_params,
            size,
            "vsm_blur_horizontal",
        );

        // Pass 2: Vertical blur (intermediate -> moments)
        self.execute_pass(
            device,
            encoder,
            intermediate_view,
            target.moment_view(),
            &self.vertical_params,
            size,
            "vsm_blur_vertical",
        );
    }

    fn execute_pass(
        &self,
        device: &Device,
        encoder: &mut CommandEncoder,
        input_view: &TextureView,
        output_view: &TextureView,
        params: &Buffer,
        texture_size: u32,
        label: &str,
    ) {
        let bind_group = device.create_bind_group(&BindGroupDescriptor {
            label: Some(label),
            layout: &self.bind_group_layout,
            entries: &[
                BindGroupEntry {
                    binding: 0,
                    resource: BindingResource::TextureView(input_view),
                },
                BindGroupEntry {
                    binding: 1,
                    resource: BindingResource::TextureView(output_view),
                },
                BindGroupEntry {
                    binding: 2,
                    resource: params.as_entire_binding(),
                },
            ],
        });

        let workgroup_size = 8;
        let dispatch = (texture_size + workgroup_size - 1) / workgroup_size;

        let mut compute_pass = encoder.begin_compute_pass(&ComputePassDescriptor {
            label: Some(label),
            timestamp_writes: None,
        });
        compute_pass.set_pipeline(&self.pipeline);
        compute_pass.set_bind_group(0, &bind_group, &[]);
        compute_pass.dispatch_workgroups(dispatch, dispatch, 1);
    }
}
