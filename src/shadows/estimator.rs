// src/shadows/estimator.rs
// Variance shadow evaluation: filtered moments, Chebyshev upper bound,
// light-bleed remap; the CPU mirror of shaders/shadow_eval.wgsl
// RELEVANT FILES: src/shadows/moments.rs, src/shadows/filter.rs, src/shadows/profile.rs

use glam::{Mat4, Vec2, Vec3};
use serde::{Deserialize, Serialize};

use super::filter::{GaussianKernel, DEFAULT_KERNEL_FALLOFF, DEFAULT_KERNEL_RADIUS};
use super::moments::MomentMap;

/// Depth bias subtracted from the receiver before the occlusion test
pub const DEFAULT_DEPTH_BIAS: f32 = 0.005;
/// Probabilities below this cutoff are treated as fully shadowed
pub const DEFAULT_BLEED_REDUCTION: f32 = 0.125;
/// Variance floor keeping the Chebyshev bound finite on flat occluders
pub const DEFAULT_MIN_VARIANCE: f32 = 1e-6;

/// Tunable evaluation parameters, serializable for profiles
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VsmSettings {
    /// Gaussian filter radius in texels; the footprint is (2r+1)^2 taps
    pub kernel_radius: u32,
    /// Divisor in exp(-(dx^2+dy^2)/falloff)
    pub kernel_falloff: f32,
    pub depth_bias: f32,
    /// Remap cutoff in [0, 1); 0 disables bleed reduction
    pub bleed_reduction: f32,
    pub min_variance: f32,
}

impl Default for VsmSettings {
    fn default() -> Self {
        Self {
            kernel_radius: DEFAULT_KERNEL_RADIUS,
            kernel_falloff: DEFAULT_KERNEL_FALLOFF,
            depth_bias: DEFAULT_DEPTH_BIAS,
            bleed_reduction: DEFAULT_BLEED_REDUCTION,
            min_variance: DEFAULT_MIN_VARIANCE,
        }
    }
}

impl VsmSettings {
    pub fn validate(&self) -> Result<(), String> {
        if self.kernel_radius > 16 {
            return Err(format!(
                "kernel_radius must be at most 16, got {}",
                self.kernel_radius
            ));
        }
        if !(self.kernel_falloff.is_finite() && self.kernel_falloff > 0.0) {
            return Err(format!(
                "kernel_falloff must be positive and finite, got {}",
                self.kernel_falloff
            ));
        }
        if !(self.depth_bias.is_finite() && self.depth_bias >= 0.0) {
            return Err(format!(
                "depth_bias must be non-negative and finite, got {}",
                self.depth_bias
            ));
        }
        if !(0.0..1.0).contains(&self.bleed_reduction) {
            return Err(format!(
                "bleed_reduction must be in [0, 1), got {}",
                self.bleed_reduction
            ));
        }
        if !(self.min_variance.is_finite() && self.min_variance > 0.0) {
            return Err(format!(
                "min_variance must be positive and finite, got {}",
                self.min_variance
            ));
        }
        Ok(())
    }
}

/// CPU shadow-factor evaluator over a [`MomentMap`]
#[derive(Debug, Clone)]
pub struct ShadowEstimator {
    settings: VsmSettings,
    kernel: GaussianKernel,
}

impl ShadowEstimator {
    pub fn new(settings: VsmSettings) -> Result<Self, String> {
        settings.validate()?;
        let kernel = GaussianKernel::new(settings.kernel_radius, settings.kernel_falloff);
        Ok(Self { settings, kernel })
    }

    pub fn settings(&self) -> &VsmSettings {
        &self.settings
    }

    /// Fraction of direct light reaching `world_point`, in [0, 1].
    ///
    /// Points that land outside the fitted shadow volume, on its boundary
    /// included, are fully lit. Inside, the filtered moments feed a
    /// one-tailed Chebyshev bound on the probability that the stored
    /// occluder distribution lies at or beyond the receiver depth.
    ///
    /// The lookup follows the render target's orientation: the +Y edge of
    /// the light frame is texel row 0, so a map built from
    /// [`read_moments_tight`](super::readback::read_moments_tight) output
    /// evaluates identically to the WGSL library.
    pub fn evaluate(&self, world_point: Vec3, world_to_shadow: Mat4, moments: &MomentMap) -> f32 {
        let clip = world_to_shadow * world_point.extend(1.0);
        let ndc = clip.truncate() / clip.w;
        let pos = ndc * 0.5 + Vec3::splat(0.5);

        let inside = pos.x > 0.0
            && pos.x < 1.0
            && pos.y > 0.0
            && pos.y < 1.0
            && pos.z > 0.0
            && pos.z < 1.0;
        if !inside {
            return 1.0;
        }

        let [mean, m2] = moments.filtered_moments(Vec2::new(pos.x, 1.0 - pos.y), &self.kernel);
        let variance = (m2 - mean * mean).max(self.settings.min_variance);

        let depth = pos.z - self.settings.depth_bias;
        if depth <= mean {
            return 1.0;
        }

        let delta = depth - mean;
        let p_max = variance / (variance + delta * delta);
        remap_bleed(p_max, self.settings.bleed_reduction)
    }
}

/// Rescale the Chebyshev bound so probabilities below `cutoff` become full
/// shadow and the rest stretch back to [0, 1]
pub fn remap_bleed(p_max: f32, cutoff: f32) -> f32 {
    if p_max < cutoff {
        0.0
    } else {
        (p_max - cutoff) / (1.0 - cutoff)
    }
}
