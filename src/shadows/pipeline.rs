// src/shadows/pipeline.rs
// Frame orchestration for variance shadows: fits the light frame, uploads
// uniforms, runs the moment pass and optional prefilter, and hands the
// caller's color pass a bind group plus the WGSL evaluation library
// RELEVANT FILES: src/shadows/moment_pass.rs, src/shadows/target.rs, src/shaders/shadow_eval.wgsl

use std::num::NonZeroU64;
use std::path::Path;

use bytemuck::{Pod, Zeroable};
use glam::Vec3;
use log::debug;
use wgpu::{
    BindGroup, BindGroupDescriptor, BindGroupEntry, BindGroupLayout, BindGroupLayoutDescriptor,
    BindGroupLayoutEntry, BindingResource, BindingType, Buffer, BufferBindingType,
    BufferDescriptor, BufferUsages, CommandEncoder, Device, Queue, SamplerBindingType,
    ShaderStages, TextureSampleType, TextureView, TextureViewDimension,
};

use crate::error::{RenderError, RenderResult};

use super::bounds::Aabb;
use super::blur_pass::MomentBlurPass;
use super::light_frame::LightFrame;
use super::moment_pass::{MomentDraw, MomentPass, ALPHA_CUTOFF};
use super::profile::VsmProfile;
use super::readback;
use super::target::{MomentTarget, DEFAULT_MEMORY_BUDGET};

/// Bind group index the evaluation library expects; the color pass binds
/// [`ShadowPipeline::bind_group`] at this slot
pub const SHADOW_EVAL_BIND_GROUP: u32 = 2;

/// Uniform block consumed by shaders/shadow_eval.wgsl
#[repr(C, align(16))]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct ShadowUniforms {
    /// World to light clip space; the same matrix the moment pass rasters with
    pub world_to_clip: [f32; 16],
    /// 1.0 / moment map resolution
    pub texel_size: f32,
    pub depth_bias: f32,
    pub bleed_reduction: f32,
    pub min_variance: f32,
    pub kernel_radius: u32,
    pub kernel_falloff: f32,
    pub _padding: [f32; 2],
}

/// Owns every GPU resource of the variance shadow technique.
///
/// Constructed once at startup and passed by reference into the render
/// loop. Per frame, strictly in order: [`fit`](Self::fit) with the current
/// light direction and scene bounds, [`encode`](Self::encode) with the
/// caster draw list, then the external color pass samples the moment map
/// through [`bind_group`](Self::bind_group) and `shadow_factor()` from
/// [`shader_source`](Self::shader_source).
pub struct ShadowPipeline {
    profile: VsmProfile,
    target: MomentTarget,
    moment_pass: MomentPass,
    blur_pass: Option<MomentBlurPass>,
    uniform_buffer: Buffer,
    bind_group_layout: BindGroupLayout,
    bind_group: BindGroup,
    light_frame: Option<LightFrame>,
}

impl ShadowPipeline {
    /// Build the pipeline under the default memory budget
    pub fn new(device: &Device, queue: &Queue, profile: VsmProfile) -> RenderResult<Self> {
        Self::with_budget(device, queue, profile, DEFAULT_MEMORY_BUDGET)
    }

    /// Build the pipeline, downsizing the moment map to fit `budget_bytes`
    pub fn with_budget(
        device: &Device,
        queue: &Queue,
        profile: VsmProfile,
        budget_bytes: u64,
    ) -> RenderResult<Self> {
        profile
            .validate()
            .map_err(|msg| RenderError::render(format!("invalid shadow profile: {msg}")))?;

        let target = MomentTarget::with_budget(device, profile.resolution, budget_bytes);
        let moment_pass = MomentPass::new(device, queue)?;
        let blur_pass = if profile.prefilter {
            Some(MomentBlurPass::new(device)?)
        } else {
            None
        };

        let uniform_buffer = device.create_buffer(&BufferDescriptor {
            label: Some("vsm_eval_uniforms"),
            size: std::mem::size_of::<ShadowUniforms>() as u64,
            usage: BufferUsages::UNIFORM | BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let bind_group_layout = device.create_bind_group_layout(&BindGroupLayoutDescriptor {
            label: Some("vsm_eval_bind_group_layout"),
            entries: &[
                BindGroupLayoutEntry {
                    binding: 0,
                    visibility: ShaderStages::VERTEX | ShaderStages::FRAGMENT,
                    ty: BindingType::Buffer {
                        ty: BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: NonZeroU64::new(
                            std::mem::size_of::<ShadowUniforms>() as u64
                        ),
                    },
                    count: None,
                },
                BindGroupLayoutEntry {
                    binding: 1,
                    visibility: ShaderStages::FRAGMENT,
                    ty: BindingType::Texture {
                        sample_type: TextureSampleType::Float { filterable: false },
                        view_dimension: TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                BindGroupLayoutEntry {
                    binding: 2,
                    visibility: ShaderStages::FRAGMENT,
                    ty: BindingType::Sampler(SamplerBindingType::NonFiltering),
                    count: None,
                },
            ],
        });

        let bind_group = device.create_bind_group(&BindGroupDescriptor {
            label: Some("vsm_eval_bind_group"),
            layout: &bind_group_layout,
            entries: &[
                BindGroupEntry {
                    binding: 0,
                    resource: uniform_buffer.as_entire_binding(),
                },
                BindGroupEntry {
                    binding: 1,
                    resource: BindingResource::TextureView(target.moment_view()),
                },
                BindGroupEntry {
                    binding: 2,
                    resource: BindingResource::Sampler(target.sampler()),
                },
            ],
        });

        Ok(Self {
            profile,
            target,
            moment_pass,
            blur_pass,
            uniform_buffer,
            bind_group_layout,
            bind_group,
            light_frame: None,
        })
    }

    /// Refit the light frame to the scene and upload this frame's uniforms.
    /// Call once per frame before [`encode`](Self::encode); the light may
    /// move freely between frames.
    pub fn fit(&mut self, queue: &Queue, light_direction: Vec3, bounds: &Aabb) -> LightFrame {
        let frame = LightFrame::fit(light_direction, bounds);
        let world_to_clip = frame.world_to_clip();

        let settings = &self.profile.settings;
        let uniforms = ShadowUniforms {
            world_to_clip: world_to_clip.to_cols_array(),
            texel_size: 1.0 / self.target.resolution() as f32,
            depth_bias: settings.depth_bias,
            bleed_reduction: settings.bleed_reduction,
            min_variance: settings.min_variance,
            kernel_radius: settings.kernel_radius,
            kernel_falloff: settings.kernel_falloff,
            _padding: [0.0; 2],
        };
        queue.write_buffer(&self.uniform_buffer, 0, bytemuck::bytes_of(&uniforms));
        self.moment_pass.set_frame(queue, world_to_clip, ALPHA_CUTOFF);

        debug!(
            "light frame fit: centroid ({:.2}, {:.2}, {:.2}), half extents ({:.2}, {:.2}, {:.2})",
            frame.centroid.x,
            frame.centroid.y,
            frame.centroid.z,
            frame.half_extents.x,
            frame.half_extents.y,
            frame.half_extents.z,
        );

        self.light_frame = Some(frame);
        frame
    }

    /// Clear the moment map, rasterize the caster draws, and prefilter if
    /// the profile asks for it. The target is fully rewritten; afterwards it
    /// is read-only until the next frame.
    pub fn encode(
        &mut self,
        device: &Device,
        queue: &Queue,
        encoder: &mut CommandEncoder,
        draws: &[MomentDraw],
    ) {
        self.moment_pass.execute(encoder, &self.target, draws);
        if let Some(blur) = self.blur_pass.as_mut() {
            let settings = &self.profile.settings;
            blur.execute(
                device,
                queue,
                encoder,
                &self.target,
                settings.kernel_radius,
                settings.kernel_falloff,
            );
        }
    }

    /// Layout for the evaluation bind group, for the caller's pipeline layout
    pub fn bind_group_layout(&self) -> &BindGroupLayout {
        &self.bind_group_layout
    }

    /// Uniforms, moment texture, and sampler; bind at
    /// [`SHADOW_EVAL_BIND_GROUP`] in the color pass
    pub fn bind_group(&self) -> &BindGroup {
        &self.bind_group
    }

    /// WGSL library defining `shadow_factor(world_pos)`; concatenate ahead of
    /// the color pass shader source
    pub fn shader_source() -> &'static str {
        include_str!("../shaders/shadow_eval.wgsl")
    }

    /// Bind group for a caster's coverage mask in the moment pass; None
    /// binds an opaque fallback that never discards
    pub fn material_bind_group(&self, device: &Device, mask: Option<&TextureView>) -> BindGroup {
        self.moment_pass.material_bind_group(device, mask)
    }

    /// Light frame from the most recent [`fit`](Self::fit)
    pub fn light_frame(&self) -> Option<&LightFrame> {
        self.light_frame.as_ref()
    }

    pub fn profile(&self) -> &VsmProfile {
        &self.profile
    }

    pub fn target(&self) -> &MomentTarget {
        &self.target
    }

    /// Download the moment map as tight row-major texels (tests, debugging)
    pub fn read_moments(&self, device: &Device, queue: &Queue) -> RenderResult<Vec<[f32; 2]>> {
        readback::read_moments_tight(device, queue, self.target.moments(), self.target.resolution())
    }

    /// Dump the first moment as a grayscale PNG
    pub fn debug_dump_png(
        &self,
        device: &Device,
        queue: &Queue,
        path: &Path,
    ) -> anyhow::Result<()> {
        let texels = self.read_moments(device, queue)?;
        readback::write_moment_png(path, self.target.resolution(), &texels)
    }

    /// One-look technique summary for logs
    pub fn debug_info(&self) -> String {
        let settings = &self.profile.settings;
        let taps = 2 * settings.kernel_radius + 1;
        let memory_mib = self.target.memory_bytes() as f64 / (1024.0 * 1024.0);

        format!(
            "Variance Shadow Pipeline:\n\
             - Profile: {}\n\
             - Moment Map: {}x{} Rg32Float\n\
             - Prefilter: {}\n\
             - Kernel: radius {} ({}x{} taps), falloff {}\n\
             - Depth Bias: {:.4}\n\
             - Bleed Reduction: {:.3}\n\
             - Min Variance: {:e}\n\
             - Memory: {:.2} MiB",
            self.profile.name,
            self.target.resolution(),
            self.target.resolution(),
            self.blur_pass.is_some(),
            settings.kernel_radius,
            taps,
            taps,
            settings.kernel_falloff,
            settings.depth_bias,
            settings.bleed_reduction,
            settings.min_variance,
            memory_mib,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uniforms_match_the_wgsl_block_size() {
        assert_eq!(std::mem::size_of::<ShadowUniforms>(), 96);
    }
}
