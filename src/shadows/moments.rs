// src/shadows/moments.rs
// CPU moment image storing depth and slope-compensated squared depth per
// texel; the reference the GPU moment pass is validated against
// RELEVANT FILES: src/shadows/estimator.rs, src/shadows/moment_pass.rs, src/shaders/shadow_moments.wgsl

use glam::Vec2;

use super::filter::GaussianKernel;

/// Clear value: maximum depth with zero variance, meaning no occluder
pub const MOMENT_CLEAR: [f32; 2] = [1.0, 1.0];

/// Square two-channel moment image.
///
/// Texel (0, 0) sits at uv (0, 0) and is the row the +Y edge of the light
/// frame rasterizes to, matching the GPU render target. Per frame the image
/// is written once in full and then read by any number of evaluations.
#[derive(Debug, Clone)]
pub struct MomentMap {
    resolution: u32,
    texels: Vec<[f32; 2]>,
}

impl MomentMap {
    pub fn new(resolution: u32) -> Self {
        assert!(resolution > 0, "moment map resolution must be at least 1");
        Self {
            resolution,
            texels: vec![MOMENT_CLEAR; (resolution * resolution) as usize],
        }
    }

    /// Wrap tight row-major texels, e.g. a moment target readback
    pub fn from_texels(resolution: u32, texels: Vec<[f32; 2]>) -> Self {
        assert!(resolution > 0, "moment map resolution must be at least 1");
        assert_eq!(
            texels.len(),
            (resolution * resolution) as usize,
            "texel count does not match the resolution"
        );
        Self { resolution, texels }
    }

    pub fn resolution(&self) -> u32 {
        self.resolution
    }

    /// Reset every texel to the no-occluder clear value
    pub fn clear(&mut self) {
        self.texels.fill(MOMENT_CLEAR);
    }

    pub fn texel(&self, x: u32, y: u32) -> [f32; 2] {
        self.texels[(y * self.resolution + x) as usize]
    }

    pub fn set_texel(&mut self, x: u32, y: u32, moments: [f32; 2]) {
        self.texels[(y * self.resolution + x) as usize] = moments;
    }

    pub fn texels(&self) -> &[[f32; 2]] {
        &self.texels
    }

    /// Rasterize occluder depths. `depth_fn` returns the normalized depth of
    /// the nearest occluder covering a texel, or None where nothing opaque
    /// covers it (no geometry, or the binary alpha mask discards the sample).
    ///
    /// Covered texels store (z, z^2 + 0.25 * ((dz/dx)^2 + (dz/dy)^2)) with
    /// the partials taken as finite differences over covered neighbors, the
    /// CPU analogue of the fragment derivatives in the moment shader.
    pub fn write_depths<F>(&mut self, depth_fn: F)
    where
        F: Fn(u32, u32) -> Option<f32>,
    {
        let res = self.resolution as i64;
        let depths: Vec<Option<f32>> = (0..self.resolution * self.resolution)
            .map(|i| depth_fn(i % self.resolution, i / self.resolution))
            .collect();

        let at = |x: i64, y: i64| -> Option<f32> {
            if x < 0 || y < 0 || x >= res || y >= res {
                None
            } else {
                depths[(y * res + x) as usize]
            }
        };

        for y in 0..res {
            for x in 0..res {
                let index = (y * res + x) as usize;
                match depths[index] {
                    None => self.texels[index] = MOMENT_CLEAR,
                    Some(z) => {
                        let dzdx = finite_difference(at(x - 1, y), z, at(x + 1, y));
                        let dzdy = finite_difference(at(x, y - 1), z, at(x, y + 1));
                        let m2 = z * z + 0.25 * (dzdx * dzdx + dzdy * dzdy);
                        self.texels[index] = [z, m2];
                    }
                }
            }
        }
    }

    /// Bilinear sample with clamp-to-edge; uv in [0, 1]
    pub fn sample(&self, uv: Vec2) -> [f32; 2] {
        let res = self.resolution as f32;
        let max_texel = res - 1.0;
        let x = (uv.x * res - 0.5).clamp(0.0, max_texel);
        let y = (uv.y * res - 0.5).clamp(0.0, max_texel);
        let fx = x - x.floor();
        let fy = y - y.floor();
        let x0 = x.floor() as u32;
        let y0 = y.floor() as u32;
        let x1 = (x0 + 1).min(self.resolution - 1);
        let y1 = (y0 + 1).min(self.resolution - 1);

        let blend = |a: [f32; 2], b: [f32; 2], t: f32| {
            [a[0] + (b[0] - a[0]) * t, a[1] + (b[1] - a[1]) * t]
        };
        let top = blend(self.texel(x0, y0), self.texel(x1, y0), fx);
        let bottom = blend(self.texel(x0, y1), self.texel(x1, y1), fx);
        blend(top, bottom, fy)
    }

    /// Gaussian-weighted moments around `uv`, one texel of spacing per tap
    pub fn filtered_moments(&self, uv: Vec2, kernel: &GaussianKernel) -> [f32; 2] {
        let res = self.resolution as f32;
        let r = kernel.radius() as i32;
        let mut accum = [0.0f32; 2];
        for dy in -r..=r {
            for dx in -r..=r {
                let w = kernel.weight(dx, dy);
                let tap = self.sample(uv + Vec2::new(dx as f32 / res, dy as f32 / res));
                accum[0] += w * tap[0];
                accum[1] += w * tap[1];
            }
        }
        accum
    }
}

/// Central difference per texel step, one-sided where a neighbor is uncovered
fn finite_difference(before: Option<f32>, center: f32, after: Option<f32>) -> f32 {
    match (before, after) {
        (Some(b), Some(a)) => (a - b) * 0.5,
        (None, Some(a)) => a - center,
        (Some(b), None) => center - b,
        (None, None) => 0.0,
    }
}
