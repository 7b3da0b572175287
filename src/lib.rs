//! Fixed-step rigid-body simulation driving and variance shadow mapping.
//!
//! Two loosely coupled systems for an interactive scene on wgpu 0.19:
//!
//! - [`sim`] drains variable frame durations into fixed-size physics steps
//!   through an accumulator clock, drives an external rigid-body world
//!   behind the [`sim::RigidWorld`] trait, and snapshots body transforms
//!   (with inter-step blending) for rendering.
//! - [`shadows`] fits a light-facing orthographic frame to the scene
//!   bounds, renders depth moments into a filterable `Rg32Float` target,
//!   and evaluates a one-sided Chebyshev shadow bound with light-bleed
//!   reduction, on the GPU via a WGSL library and on the CPU via a
//!   reference [`shadows::ShadowEstimator`].
//!
//! Per frame the two compose in strict order: advance the simulation, read
//! body transforms, fit the light frame, render the moment pass, then let
//! the color pass consume the moment map. Window creation, input, asset
//! loading, and the physics solver itself stay with the caller.

pub mod error;
pub mod gpu;
pub mod shadows;
pub mod sim;

pub use error::{RenderError, RenderResult};
pub use shadows::{
    Aabb, LightFrame, MomentMap, ShadowEstimator, ShadowPipeline, VsmProfile, VsmSettings,
};
pub use sim::{Drain, FixedStepClock, FixedStepConfig, RigidTransform, RigidWorld, SimulationDriver};
