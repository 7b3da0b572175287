// src/sim/driver.rs
// Drives an external rigid-body world with fixed steps and snapshots body
// transforms for rendering, including blended states for smooth motion
// RELEVANT FILES: src/sim/clock.rs, src/shadows/moment_pass.rs, tests/test_fixed_step.rs

use glam::{Mat4, Quat, Vec3};

use super::clock::{Drain, FixedStepClock, FixedStepConfig};

/// Position and orientation of one rigid body
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RigidTransform {
    pub position: Vec3,
    pub orientation: Quat,
}

impl RigidTransform {
    pub const IDENTITY: Self = Self {
        position: Vec3::ZERO,
        orientation: Quat::IDENTITY,
    };

    /// Column-major model matrix for rendering
    pub fn to_matrix(&self) -> Mat4 {
        Mat4::from_rotation_translation(self.orientation, self.position)
    }

    /// Blend two states: linear for position, spherical for orientation
    pub fn interpolate(a: &Self, b: &Self, alpha: f32) -> Self {
        Self {
            position: a.position.lerp(b.position, alpha),
            orientation: a.orientation.slerp(b.orientation, alpha),
        }
    }
}

impl Default for RigidTransform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// Narrow contract to the external physics engine.
///
/// The driver owns no body state. It only commands fixed-size steps and
/// reads per-body transforms back after stepping; body creation, forces,
/// and collision setup stay with the engine.
pub trait RigidWorld {
    /// Advance every body by exactly `dt` seconds
    fn step(&mut self, dt: f32);
    /// Number of simulated bodies
    fn body_count(&self) -> usize;
    /// Transform of body `index` after the most recent step
    fn body_transform(&self, index: usize) -> RigidTransform;
}

/// Fixed-step driver owning the clock and the last two transform snapshots
pub struct SimulationDriver<W: RigidWorld> {
    clock: FixedStepClock,
    world: W,
    previous: Vec<RigidTransform>,
    current: Vec<RigidTransform>,
}

impl<W: RigidWorld> SimulationDriver<W> {
    pub fn new(world: W, config: FixedStepConfig) -> Result<Self, String> {
        let clock = FixedStepClock::new(config)?;
        let current = snapshot(&world);
        let previous = current.clone();
        Ok(Self {
            clock,
            world,
            previous,
            current,
        })
    }

    /// Drain a frame duration into fixed steps, advancing the world once per
    /// step. Transforms are snapshotted after every step so the last two
    /// simulation states are always available for blending; a frame that
    /// fits no step leaves both snapshots untouched.
    pub fn advance(&mut self, dt: f32) -> Drain {
        let drain = self.clock.advance(dt);
        for _ in 0..drain.steps {
            std::mem::swap(&mut self.previous, &mut self.current);
            self.world.step(self.clock.step());
            refresh(&self.world, &mut self.current);
        }
        drain
    }

    /// Transforms after the most recent completed step
    pub fn transforms(&self) -> &[RigidTransform] {
        &self.current
    }

    /// Transforms blended between the last two steps by the clock's alpha
    pub fn blended_transforms(&self) -> Vec<RigidTransform> {
        let alpha = self.clock.alpha();
        self.previous
            .iter()
            .zip(&self.current)
            .map(|(a, b)| RigidTransform::interpolate(a, b, alpha))
            .collect()
    }

    /// Blended model matrices, ready for instance upload
    pub fn blended_matrices(&self) -> Vec<Mat4> {
        self.blended_transforms()
            .iter()
            .map(RigidTransform::to_matrix)
            .collect()
    }

    pub fn clock(&self) -> &FixedStepClock {
        &self.clock
    }

    pub fn world(&self) -> &W {
        &self.world
    }

    /// Direct world access. Mutations made here are not reflected in the
    /// snapshots until the next `advance` executes a step.
    pub fn world_mut(&mut self) -> &mut W {
        &mut self.world
    }
}

fn snapshot<W: RigidWorld>(world: &W) -> Vec<RigidTransform> {
    (0..world.body_count())
        .map(|i| world.body_transform(i))
        .collect()
}

fn refresh<W: RigidWorld>(world: &W, into: &mut Vec<RigidTransform>) {
    into.clear();
    into.extend((0..world.body_count()).map(|i| world.body_transform(i)));
}
