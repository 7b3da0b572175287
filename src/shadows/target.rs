// src/shadows/target.rs
// GPU render targets for the moment pass: an Rg32Float moment texture, a
// throwaway depth buffer, and the sampler the eval shader binds
// RELEVANT FILES: src/shadows/moment_pass.rs, src/shadows/pipeline.rs, src/shadows/readback.rs

use log::{info, warn};
use wgpu::{
    AddressMode, Color, Device, Extent3d, FilterMode, Sampler, SamplerDescriptor, Texture,
    TextureDescriptor, TextureDimension, TextureFormat, TextureUsages, TextureView,
    TextureViewDescriptor,
};

use super::profile::MIN_RESOLUTION;

pub const MOMENT_FORMAT: TextureFormat = TextureFormat::Rg32Float;
pub const DEPTH_FORMAT: TextureFormat = TextureFormat::Depth24Plus;

/// Matches [`MOMENT_CLEAR`](super::moments::MOMENT_CLEAR) in the red and
/// green channels; blue and alpha are unused
pub const CLEAR_COLOR: Color = Color {
    r: 1.0,
    g: 1.0,
    b: 0.0,
    a: 0.0,
};

/// 512 MiB cap on the combined moment and depth allocations
pub const DEFAULT_MEMORY_BUDGET: u64 = 512 * 1024 * 1024;

const MOMENT_BYTES_PER_TEXEL: u64 = 8;
const DEPTH_BYTES_PER_TEXEL: u64 = 4;

/// Moment map attachments plus the sampler shared by the eval bind group
pub struct MomentTarget {
    resolution: u32,
    moments: Texture,
    moment_view: TextureView,
    depth: Texture,
    depth_view: TextureView,
    sampler: Sampler,
}

impl MomentTarget {
    pub fn new(device: &Device, resolution: u32) -> Self {
        Self::with_budget(device, resolution, DEFAULT_MEMORY_BUDGET)
    }

    /// Create the target, halving the resolution until it fits the budget
    pub fn with_budget(device: &Device, resolution: u32, budget_bytes: u64) -> Self {
        let fitted = fit_resolution(resolution, budget_bytes);
        if fitted != resolution {
            warn!(
                "moment target downsized from {}x{} to {}x{} to fit {} byte budget",
                resolution, resolution, fitted, fitted, budget_bytes
            );
        }
        let resolution = fitted;

        let extent = Extent3d {
            width: resolution,
            height: resolution,
            depth_or_array_layers: 1,
        };

        let moments = device.create_texture(&TextureDescriptor {
            label: Some("vsm_moment_target"),
            size: extent,
            mip_level_count: 1,
            sample_count: 1,
            dimension: TextureDimension::D2,
            format: MOMENT_FORMAT,
            usage: TextureUsages::RENDER_ATTACHMENT
                | TextureUsages::TEXTURE_BINDING
                | TextureUsages::STORAGE_BINDING
                | TextureUsages::COPY_SRC,
            view_formats: &[],
        });
        let moment_view = moments.create_view(&TextureViewDescriptor::default());

        let depth = device.create_texture(&TextureDescriptor {
            label: Some("vsm_moment_depth"),
            size: extent,
            mip_level_count: 1,
            sample_count: 1,
            dimension: TextureDimension::D2,
            format: DEPTH_FORMAT,
            usage: TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        });
        let depth_view = depth.create_view(&TextureViewDescriptor::default());

        // Rg32Float is not filterable without extra device features; the
        // Gaussian taps in the eval shader do the smoothing instead
        let sampler = device.create_sampler(&SamplerDescriptor {
            label: Some("vsm_moment_sampler"),
            address_mode_u: AddressMode::ClampToEdge,
            address_mode_v: AddressMode::ClampToEdge,
            address_mode_w: AddressMode::ClampToEdge,
            mag_filter: FilterMode::Nearest,
            min_filter: FilterMode::Nearest,
            mipmap_filter: FilterMode::Nearest,
            ..Default::default()
        });

        info!(
            "moment target ready: {}x{} Rg32Float, {} bytes",
            resolution,
            resolution,
            bytes_for(resolution)
        );

        Self {
            resolution,
            moments,
            moment_view,
            depth,
            depth_view,
            sampler,
        }
    }

    pub fn resolution(&self) -> u32 {
        self.resolution
    }

    pub fn moments(&self) -> &Texture {
        &self.moments
    }

    pub fn moment_view(&self) -> &TextureView {
        &self.moment_view
    }

    pub fn depth(&self) -> &Texture {
        &self.depth
    }

    pub fn depth_view(&self) -> &TextureView {
        &self.depth_view
    }

    pub fn sampler(&self) -> &Sampler {
        &self.sampler
    }

    pub fn memory_bytes(&self) -> u64 {
        bytes_for(self.resolution)
    }
}

/// Combined attachment footprint for a square map of the given edge
pub fn bytes_for(resolution: u32) -> u64 {
    let texels = resolution as u64 * resolution as u64;
    texels * (MOMENT_BYTES_PER_TEXEL + DEPTH_BYTES_PER_TEXEL)
}

/// Halve the edge until the attachments fit, never below [`MIN_RESOLUTION`]
pub fn fit_resolution(resolution: u32, budget_bytes: u64) -> u32 {
    let mut fitted = resolution;
    while fitted > MIN_RESOLUTION && bytes_for(fitted) > budget_bytes {
        fitted /= 2;
    }
    fitted
}
