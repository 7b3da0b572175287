// src/shadows/filter.rs
// Gaussian tap weights shared by the CPU estimator and the blur prefilter
// RELEVANT FILES: src/shadows/estimator.rs, src/shadows/blur_pass.rs, src/shaders/shadow_eval.wgsl

/// Default kernel radius (7x7 footprint)
pub const DEFAULT_KERNEL_RADIUS: u32 = 3;
/// Default falloff divisor in exp(-(x^2 + y^2) / falloff)
pub const DEFAULT_KERNEL_FALLOFF: f32 = 8.0;

/// Normalized 2D Gaussian kernel over integer texel offsets
#[derive(Debug, Clone)]
pub struct GaussianKernel {
    radius: u32,
    falloff: f32,
    // (2r+1)^2 weights, row-major, summing to one
    weights: Vec<f32>,
}

impl GaussianKernel {
    pub fn new(radius: u32, falloff: f32) -> Self {
        assert!(
            falloff.is_finite() && falloff > 0.0,
            "kernel falloff must be positive"
        );
        let r = radius as i32;
        let diameter = (2 * r + 1) as usize;
        let mut weights = Vec::with_capacity(diameter * diameter);
        let mut sum = 0.0;
        for y in -r..=r {
            for x in -r..=r {
                let w = (-((x * x + y * y) as f32) / falloff).exp();
                weights.push(w);
                sum += w;
            }
        }
        for w in &mut weights {
            *w /= sum;
        }
        Self {
            radius,
            falloff,
            weights,
        }
    }

    pub fn radius(&self) -> u32 {
        self.radius
    }

    pub fn falloff(&self) -> f32 {
        self.falloff
    }

    /// Weight at integer offset (dx, dy); zero outside the footprint
    pub fn weight(&self, dx: i32, dy: i32) -> f32 {
        let r = self.radius as i32;
        if dx.abs() > r || dy.abs() > r {
            return 0.0;
        }
        let diameter = 2 * r + 1;
        self.weights[((dy + r) * diameter + (dx + r)) as usize]
    }

    /// Normalized 1D weights for the separable blur passes
    pub fn weights_1d(&self) -> Vec<f32> {
        let r = self.radius as i32;
        let mut weights: Vec<f32> = (-r..=r)
            .map(|i| (-((i * i) as f32) / self.falloff).exp())
            .collect();
        let sum: f32 = weights.iter().sum();
        for w in &mut weights {
            *w /= sum;
        }
        weights
    }
}

impl Default for GaussianKernel {
    fn default() -> Self {
        Self::new(DEFAULT_KERNEL_RADIUS, DEFAULT_KERNEL_FALLOFF)
    }
}
