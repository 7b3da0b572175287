// src/shadows/moment_pass.rs
// Instanced render pass that rasterizes shadow casters from the light and
// writes (depth, depth^2 + slope term) into the Rg32Float moment target
// RELEVANT FILES: src/shaders/shadow_moments.wgsl, src/shadows/target.rs, src/shadows/pipeline.rs

use bytemuck::{Pod, Zeroable};
use glam::Mat4;
use wgpu::{
    AddressMode, BindGroup, BindGroupDescriptor, BindGroupEntry, BindGroupLayout,
    BindGroupLayoutDescriptor, BindGroupLayoutEntry, BindingResource, BindingType, Buffer,
    BufferBindingType, BufferDescriptor, BufferUsages, ColorTargetState, ColorWrites,
    CommandEncoder, CompareFunction, DepthBiasState, DepthStencilState, Device, ErrorFilter,
    Extent3d, FilterMode, FragmentState, FrontFace, ImageCopyTexture, ImageDataLayout,
    IndexFormat, LoadOp, MultisampleState, Operations, Origin3d, PipelineLayoutDescriptor,
    PolygonMode, PrimitiveState, PrimitiveTopology, Queue, RenderPassColorAttachment,
    RenderPassDepthStencilAttachment, RenderPassDescriptor, RenderPipeline,
    RenderPipelineDescriptor, Sampler, SamplerBindingType, SamplerDescriptor,
    ShaderModuleDescriptor, ShaderSource, ShaderStages, StencilState, StoreOp, TextureAspect,
    TextureDescriptor, TextureDimension, TextureFormat, TextureSampleType, TextureUsages,
    TextureView, TextureViewDescriptor, TextureViewDimension, VertexAttribute,
    VertexBufferLayout, VertexState, VertexStepMode,
};

use crate::error::{RenderError, RenderResult};

use super::target::{MomentTarget, CLEAR_COLOR, DEPTH_FORMAT, MOMENT_FORMAT};

/// Coverage below this mask value discards the fragment
pub const ALPHA_CUTOFF: f32 = 0.5;

/// Per-vertex input: object-space position plus mask texture coordinates
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct ShadowVertex {
    pub position: [f32; 3],
    pub uv: [f32; 2],
}

impl ShadowVertex {
    const ATTRIBUTES: [VertexAttribute; 2] =
        wgpu::vertex_attr_array![0 => Float32x3, 1 => Float32x2];

    pub fn layout() -> VertexBufferLayout<'static> {
        VertexBufferLayout {
            array_stride: std::mem::size_of::<ShadowVertex>() as u64,
            step_mode: VertexStepMode::Vertex,
            attributes: &Self::ATTRIBUTES,
        }
    }
}

/// Per-instance input: the model matrix, one vec4 column per attribute slot
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct ShadowInstance {
    pub model: [f32; 16],
}

impl ShadowInstance {
    const ATTRIBUTES: [VertexAttribute; 4] = wgpu::vertex_attr_array![
        2 => Float32x4, 3 => Float32x4, 4 => Float32x4, 5 => Float32x4
    ];

    pub fn from_matrix(matrix: Mat4) -> Self {
        Self {
            model: matrix.to_cols_array(),
        }
    }

    pub fn layout() -> VertexBufferLayout<'static> {
        VertexBufferLayout {
            array_stride: std::mem::size_of::<ShadowInstance>() as u64,
            step_mode: VertexStepMode::Instance,
            attributes: &Self::ATTRIBUTES,
        }
    }
}

/// Frame uniforms for the moment shader
#[repr(C, align(16))]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
struct MomentPassParams {
    world_to_clip: [f32; 16],
    alpha_cutoff: f32,
    _padding: [f32; 3],
}

/// One batch of casters sharing a mask bind group
pub struct MomentDraw<'a> {
    pub vertices: &'a Buffer,
    /// Uint32 index buffer with its index count; None draws unindexed
    pub indices: Option<(&'a Buffer, u32)>,
    pub vertex_count: u32,
    pub instances: &'a Buffer,
    pub instance_count: u32,
    pub material: &'a BindGroup,
}

/// Pipeline and resources for writing the moment map
pub struct MomentPass {
    pipeline: RenderPipeline,
    material_layout: BindGroupLayout,
    params_buffer: Buffer,
    frame_bind_group: BindGroup,
    fallback_mask_view: TextureView,
    mask_sampler: Sampler,
}

impl MomentPass {
    pub fn new(device: &Device, queue: &Queue) -> RenderResult<Self> {
        device.push_error_scope(ErrorFilter::Validation);

        let shader = device.create_shader_module(ShaderModuleDescriptor {
            label: Some("vsm_moment_shader"),
            source: ShaderSource::Wgsl(include_str!("../shaders/shadow_moments.wgsl").into()),
        });

        let frame_layout = device.create_bind_group_layout(&BindGroupLayoutDescriptor {
            label: Some("vsm_moment_frame_layout"),
            entries: &[BindGroupLayoutEntry {
                binding: 0,
                visibility: ShaderStages::VERTEX_FRAGMENT,
                ty: BindingType::Buffer {
                    ty: BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            }],
        });

        let material_layout = device.create_bind_group_layout(&BindGroupLayoutDescriptor {
            label: Some("vsm_moment_material_layout"),
            entries: &[
                // Coverage mask (binding 0)
                BindGroupLayoutEntry {
                    binding: 0,
                    visibility: ShaderStages::FRAGMENT,
                    ty: BindingType::Texture {
                        sample_type: TextureSampleType::Float { filterable: true },
                        view_dimension: TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                // Mask sampler (binding 1)
                BindGroupLayoutEntry {
                    binding: 1,
                    visibility: ShaderStages::FRAGMENT,
                    ty: BindingType::Sampler(SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&PipelineLayoutDescriptor {
            label: Some("vsm_moment_pipeline_layout"),
            bind_group_layouts: &[&frame_layout, &material_layout],
            push_constant_ranges: &[],
        });

        let pipeline = device.create_render_pipeline(&RenderPipelineDescriptor {
            label: Some("vsm_moment_pipeline"),
            layout: Some(&pipeline_layout),
            vertex: VertexState {
                module: &shader,
                entry_point: "vs_main",
                buffers: &[ShadowVertex::layout(), ShadowInstance::layout()],
            },
            fragment: Some(FragmentState {
                module: &shader,
                entry_point: "fs_main",
                targets: &[Some(ColorTargetState {
                    format: MOMENT_FORMAT,
                    blend: None,
                    write_mask: ColorWrites::ALL,
                })],
            }),
            primitive: PrimitiveState {
                topology: PrimitiveTopology::TriangleList,
                strip_index_format: None,
                front_face: FrontFace::Ccw,
                // Casters occlude from either side
                cull_mode: None,
                unclipped_depth: false,
                polygon_mode: PolygonMode::Fill,
                conservative: false,
            },
            depth_stencil: Some(DepthStencilState {
                format: DEPTH_FORMAT,
                depth_write_enabled: true,
                depth_compare: CompareFunction::LessEqual,
                stencil: StencilState::default(),
                bias: DepthBiasState::default(),
            }),
            multisample: MultisampleState::default(),
            multiview: None,
        });

        let params_buffer = device.create_buffer(&BufferDescriptor {
            label: Some("vsm_moment_params"),
            size: std::mem::size_of::<MomentPassParams>() as u64,
            usage: BufferUsages::UNIFORM | BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let frame_bind_group = device.create_bind_group(&BindGroupDescriptor {
            label: Some("vsm_moment_frame_bind_group"),
            layout: &frame_layout,
            entries: &[BindGroupEntry {
                binding: 0,
                resource: params_buffer.as_entire_binding(),
            }],
        });

        // Opaque 1x1 mask for casters without one
        let fallback_mask = device.create_texture(&TextureDescriptor {
            label: Some("vsm_fallback_mask"),
            size: Extent3d {
                width: 1,
                height: 1,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: TextureDimension::D2,
            format: TextureFormat::R8Unorm,
            usage: TextureUsages::TEXTURE_BINDING | TextureUsages::COPY_DST,
            view_formats: &[],
        });
        queue.write_texture(
            ImageCopyTexture {
                texture: &fallback_mask,
                mip_level: 0,
                origin: Origin3d::ZERO,
                aspect: TextureAspect::All,
            },
            &[0xff],
            ImageDataLayout {
                offset: 0,
                bytes_per_row: None,
                rows_per_image: None,
            },
            Extent3d {
                width: 1,
                height: 1,
                depth_or_array_layers: 1,
            },
        );
        let fallback_mask_view = fallback_mask.create_view(&TextureViewDescriptor::default());

        let mask_sampler = device.create_sampler(&SamplerDescriptor {
            label: Some("vsm_mask_sampler"),
            address_mode_u: AddressMode::ClampToEdge,
            address_mode_v: AddressMode::ClampToEdge,
            address_mode_w: AddressMode::ClampToEdge,
            mag_filter: FilterMode::Linear,
            min_filter: FilterMode::Linear,
            mipmap_filter: FilterMode::Nearest,
            ..Default::default()
        });

        if let Some(error) = pollster::block_on(device.pop_error_scope()) {
            return Err(RenderError::render(format!(
                "moment pass creation failed: {error}"
            )));
        }

        Ok(Self {
            pipeline,
            material_layout,
            params_buffer,
            frame_bind_group,
            fallback_mask_view,
            mask_sampler,
        })
    }

    /// Upload the per-frame uniforms before encoding draws
    pub fn set_frame(&self, queue: &Queue, world_to_clip: Mat4, alpha_cutoff: f32) {
        let params = MomentPassParams {
            world_to_clip: world_to_clip.to_cols_array(),
            alpha_cutoff,
            _padding: [0.0; 3],
        };
        queue.write_buffer(&self.params_buffer, 0, bytemuck::bytes_of(&params));
    }

    /// Bind group for a caster's coverage mask; None binds the opaque fallback
    pub fn material_bind_group(
        &self,
        device: &Device,
        mask: Option<&TextureView>,
    ) -> BindGroup {
        device.create_bind_group(&BindGroupDescriptor {
            label: Some("vsm_moment_material_bind_group"),
            layout: &self.material_layout,
            entries: &[
                BindGroupEntry {
                    binding: 0,
                    resource: BindingResource::TextureView(
                        mask.unwrap_or(&self.fallback_mask_view),
                    ),
                },
                BindGroupEntry {
                    binding: 1,
                    resource: BindingResource::Sampler(&self.mask_sampler),
                },
            ],
        })
    }

    /// Clear the target and rasterize every draw into the moment map
    pub fn execute(
        &self,
        encoder: &mut CommandEncoder,
        target: &MomentTarget,
        draws: &[MomentDraw],
    ) {
        let mut pass = encoder.begin_render_pass(&RenderPassDescriptor {
            label: Some("vsm_moment_pass"),
            color_attachments: &[Some(RenderPassColorAttachment {
                view: target.moment_view(),
                resolve_target: None,
                ops: Operations {
                    load: LoadOp::Clear(CLEAR_COLOR),
                    store: StoreOp::Store,
                },
            })],
            depth_stencil_attachment: Some(RenderPassDepthStencilAttachment {
                view: target.depth_view(),
                depth_ops: Some(Operations {
                    load: LoadOp::Clear(1.0),
                    store: StoreOp::Store,
                }),
                stencil_ops: None,
            }),
            timestamp_writes: None,
            occlusion_query_set: None,
        });

        pass.set_pipeline(&self.pipeline);
        pass.set_bind_group(0, &self.frame_bind_group, &[]);

        for draw in draws {
            pass.set_bind_group(1, draw.material, &[]);
            pass.set_vertex_buffer(0, draw.vertices.slice(..));
            pass.set_vertex_buffer(1, draw.instances.slice(..));
            match draw.indices {
                Some((buffer, index_count)) => {
                    pass.set_index_buffer(buffer.slice(..), IndexFormat::Uint32);
                    pass.draw_indexed(0..index_count, 0, 0..draw.instance_count);
                }
                None => pass.draw(0..draw.vertex_count, 0..draw.instance_count),
            }
        }
    }
}
