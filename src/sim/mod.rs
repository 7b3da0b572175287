// src/sim/mod.rs
// Fixed-step simulation: accumulator clock and rigid-body world driver
// RELEVANT FILES: src/sim/clock.rs, src/sim/driver.rs, tests/test_fixed_step.rs

pub mod clock;
pub mod driver;

pub use clock::{Drain, FixedStepClock, FixedStepConfig};
pub use driver::{RigidTransform, RigidWorld, SimulationDriver};
