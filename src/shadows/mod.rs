// src/shadows/mod.rs
// Variance shadow mapping: light-frame fitting, moment rendering, Chebyshev
// evaluation, with a CPU reference mirroring the GPU path
// RELEVANT FILES: src/shaders/shadow_moments.wgsl, src/shaders/shadow_eval.wgsl, tests/test_vsm_eval.rs

pub mod blur_pass;
pub mod bounds;
pub mod estimator;
pub mod filter;
pub mod light_frame;
pub mod moment_pass;
pub mod moments;
pub mod pipeline;
pub mod profile;
pub mod readback;
pub mod target;

pub use blur_pass::MomentBlurPass;
pub use bounds::Aabb;
pub use estimator::{remap_bleed, ShadowEstimator, VsmSettings};
pub use filter::GaussianKernel;
pub use light_frame::LightFrame;
pub use moment_pass::{MomentDraw, MomentPass, ShadowInstance, ShadowVertex, ALPHA_CUTOFF};
pub use moments::{MomentMap, MOMENT_CLEAR};
pub use pipeline::{ShadowPipeline, ShadowUniforms, SHADOW_EVAL_BIND_GROUP};
pub use profile::VsmProfile;
pub use target::MomentTarget;
